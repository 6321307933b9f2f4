//! Prepared-graph cache
//!
//! A routing-ready artifact is built once from the CSR arrays by a
//! [`PreparationBackend`] and persisted at `{cache_dir}/ch_graph{suffix}.bin`.
//! The cache does not check that a cached artifact matches the arrays passed
//! later; callers that care put [`RoadGraph::fingerprint`] into the suffix
//! (see [`fingerprint_suffix`]).
//!
//! [`RoadGraph::fingerprint`]: crate::graph::RoadGraph::fingerprint

use hexreach_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::formats::write_atomic;
use crate::graph::CsrGraph;

/// CSR arrays coerced to the backend's fixed numeric types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedInput {
    pub indptr: Vec<i64>,
    pub indices: Vec<i32>,
    pub weights: Vec<u16>,
}

fn coerce<S, T>(values: &[S], what: &str) -> Result<Vec<T>>
where
    S: Copy + TryInto<T> + Display,
{
    values
        .iter()
        .map(|&v| {
            v.try_into()
                .map_err(|_| Error::Overflow(format!("{what} value {v} out of range")))
        })
        .collect()
}

impl PreparedInput {
    /// Coerce arbitrary integer arrays, failing instead of truncating
    pub fn coerce<O, I, W>(indptr: &[O], indices: &[I], weights: &[W]) -> Result<Self>
    where
        O: Copy + TryInto<i64> + Display,
        I: Copy + TryInto<i32> + Display,
        W: Copy + TryInto<u16> + Display,
    {
        let input = Self {
            indptr: coerce(indptr, "indptr")?,
            indices: coerce(indices, "indices")?,
            weights: coerce(weights, "weights")?,
        };
        input.check_shape()?;
        Ok(input)
    }

    pub fn from_csr(csr: &CsrGraph) -> Result<Self> {
        Self::coerce(&csr.indptr, &csr.indices, &csr.weights)
    }

    pub fn n_nodes(&self) -> usize {
        self.indptr.len().saturating_sub(1)
    }

    fn check_shape(&self) -> Result<()> {
        let m = self.indices.len();
        if self.weights.len() != m {
            return Err(Error::InvalidInput(format!(
                "indices/weights length mismatch: {m} vs {}",
                self.weights.len()
            )));
        }
        let Some(&last) = self.indptr.last() else {
            return Err(Error::InvalidInput("indptr is empty".to_string()));
        };
        if self.indptr[0] != 0 || last != m as i64 {
            return Err(Error::InvalidInput(format!(
                "indptr must span [0, {m}], got [{}, {last}]",
                self.indptr[0]
            )));
        }
        if self.indptr.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::InvalidInput("indptr not monotone".to_string()));
        }
        let n = self.n_nodes() as i64;
        if let Some(&bad) = self.indices.iter().find(|&&v| v < 0 || v as i64 >= n) {
            return Err(Error::InvalidInput(format!(
                "edge head {bad} out of range for {n} nodes"
            )));
        }
        Ok(())
    }
}

/// Routing-preparation primitive plugged into [`GraphCache`]
pub trait PreparationBackend {
    type Artifact;

    fn name(&self) -> &'static str;

    fn prepare(&self, input: &PreparedInput) -> Result<Self::Artifact>;

    fn serialize(&self, artifact: &Self::Artifact) -> Result<Vec<u8>>;

    fn deserialize(&self, bytes: &[u8]) -> Result<Self::Artifact>;
}

/// `{cache_dir}/ch_graph{suffix}.bin` store for one backend
pub struct GraphCache<B> {
    dir: PathBuf,
    backend: B,
}

impl<B: PreparationBackend> GraphCache<B> {
    pub fn new(dir: impl Into<PathBuf>, backend: B) -> Self {
        Self {
            dir: dir.into(),
            backend,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Deterministic file for `suffix`; the empty suffix is the default slot
    pub fn cache_path(&self, suffix: &str) -> Result<PathBuf> {
        if suffix.contains(['/', '\\']) || suffix.contains("..") {
            return Err(Error::InvalidInput(format!(
                "cache suffix '{suffix}' must not contain path separators"
            )));
        }
        Ok(self.dir.join(format!("ch_graph{suffix}.bin")))
    }

    /// Cached artifact for `suffix`, `None` when no file exists
    pub fn load(&self, suffix: &str) -> Result<Option<B::Artifact>> {
        let path = self.cache_path(suffix)?;
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "cache miss");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let artifact = self.backend.deserialize(&bytes).map_err(|e| {
            Error::Backend(format!(
                "{}: {} artifact unreadable: {e}",
                path.display(),
                self.backend.name()
            ))
        })?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "loaded cached artifact");
        Ok(Some(artifact))
    }

    /// Prepare from the CSR arrays, persist atomically, return the artifact
    pub fn build_and_cache<O, I, W>(
        &self,
        indptr: &[O],
        indices: &[I],
        weights: &[W],
        suffix: &str,
    ) -> Result<B::Artifact>
    where
        O: Copy + TryInto<i64> + Display,
        I: Copy + TryInto<i32> + Display,
        W: Copy + TryInto<u16> + Display,
    {
        let path = self.cache_path(suffix)?;
        let input = PreparedInput::coerce(indptr, indices, weights)?;

        let start = Instant::now();
        let artifact = self.backend.prepare(&input)?;
        let bytes = self.backend.serialize(&artifact)?;
        write_atomic(&path, &bytes)?;

        tracing::info!(
            backend = self.backend.name(),
            path = %path.display(),
            nodes = input.n_nodes(),
            edges = input.indices.len(),
            bytes = bytes.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "prepared and cached artifact"
        );
        Ok(artifact)
    }

    /// Cached artifact if present, otherwise build and cache it
    pub fn load_or_build<O, I, W>(
        &self,
        indptr: &[O],
        indices: &[I],
        weights: &[W],
        suffix: &str,
    ) -> Result<B::Artifact>
    where
        O: Copy + TryInto<i64> + Display,
        I: Copy + TryInto<i32> + Display,
        W: Copy + TryInto<u16> + Display,
    {
        match self.load(suffix)? {
            Some(artifact) => Ok(artifact),
            None => self.build_and_cache(indptr, indices, weights, suffix),
        }
    }
}

/// `{base}_{first 16 hex chars of fingerprint}`, a suffix that changes with the graph
pub fn fingerprint_suffix(base: &str, fingerprint: &str) -> String {
    let short = fingerprint.get(..16).unwrap_or(fingerprint);
    format!("{base}_{short}")
}
