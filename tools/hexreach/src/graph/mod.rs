//! Road graph in compressed sparse row (CSR) form
//!
//! Edges of node `u` occupy `indices[indptr[u]..indptr[u + 1]]` with parallel
//! `weights` in whole seconds. A [`CsrGraph`] is never mutated in place: it is
//! built once by [`build_graph`] and transposed by [`reverse`].

mod builder;
mod dijkstra;
mod reverse;

pub use builder::{build_graph, clamp_weight, BuildStats, RawEdge, RawNode, RoadNetwork};
pub use builder::{MAX_WEIGHT_S, UNREACHABLE_WEIGHT_S};
pub use dijkstra::{shortest_times, UNREACHABLE};
pub use reverse::reverse;

use hexreach_common::{Error, Result};
use rustc_hash::FxHashMap;
use sha2::{Digest, Sha256};

/// CSR adjacency with u16 second weights
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CsrGraph {
    pub indptr: Vec<u64>,  // n_nodes + 1
    pub indices: Vec<u32>, // n_edges
    pub weights: Vec<u16>, // n_edges, seconds in [0, 65534]
}

impl CsrGraph {
    /// Graph with `n_nodes` nodes and no edges
    pub fn empty(n_nodes: usize) -> Self {
        Self {
            indptr: vec![0; n_nodes + 1],
            indices: Vec::new(),
            weights: Vec::new(),
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.indptr.len().saturating_sub(1)
    }

    pub fn n_edges(&self) -> usize {
        self.indices.len()
    }

    /// Edge range of node `u` in `indices`/`weights`
    #[inline]
    pub fn edge_range(&self, u: usize) -> std::ops::Range<usize> {
        self.indptr[u] as usize..self.indptr[u + 1] as usize
    }

    /// Heads and weights of the edges leaving `u`
    #[inline]
    pub fn neighbors(&self, u: usize) -> (&[u32], &[u16]) {
        let range = self.edge_range(u);
        (&self.indices[range.clone()], &self.weights[range])
    }

    pub fn out_degree(&self, u: usize) -> usize {
        (self.indptr[u + 1] - self.indptr[u]) as usize
    }

    /// Check structural invariants: indptr monotone and closed over the edge
    /// arrays, every index a valid node, every weight inside the clamp domain.
    pub fn validate(&self) -> Result<()> {
        if self.indptr.is_empty() {
            return Err(Error::InvalidInput("indptr must have n_nodes + 1 entries".into()));
        }
        if self.indptr[0] != 0 {
            return Err(Error::InvalidInput(format!(
                "indptr[0] must be 0, got {}",
                self.indptr[0]
            )));
        }
        if let Some(pos) = self.indptr.windows(2).position(|w| w[0] > w[1]) {
            return Err(Error::InvalidInput(format!(
                "indptr decreases at node {pos}"
            )));
        }
        let n_edges = self.indices.len();
        if self.indptr[self.n_nodes()] as usize != n_edges || self.weights.len() != n_edges {
            return Err(Error::InvalidInput(format!(
                "edge arrays disagree: indptr[N]={}, indices={}, weights={}",
                self.indptr[self.n_nodes()],
                n_edges,
                self.weights.len()
            )));
        }
        let n_nodes = self.n_nodes();
        if let Some(&bad) = self.indices.iter().find(|&&v| v as usize >= n_nodes) {
            return Err(Error::InvalidInput(format!(
                "edge head {bad} out of range for {n_nodes} nodes"
            )));
        }
        if let Some(&bad) = self.weights.iter().find(|&&w| w > MAX_WEIGHT_S) {
            return Err(Error::InvalidInput(format!(
                "edge weight {bad} exceeds {MAX_WEIGHT_S}"
            )));
        }
        Ok(())
    }
}

/// CSR graph plus parallel node arrays and the original-id lookup
#[derive(Debug, Clone)]
pub struct RoadGraph {
    pub csr: CsrGraph,
    pub original_id: Vec<i64>,
    pub lat: Vec<f32>,
    pub lon: Vec<f32>,
    lookup: FxHashMap<i64, u32>,
}

impl RoadGraph {
    /// Assemble from parts; node arrays must all have `csr.n_nodes()` entries.
    pub fn from_parts(
        csr: CsrGraph,
        original_id: Vec<i64>,
        lat: Vec<f32>,
        lon: Vec<f32>,
    ) -> Result<Self> {
        let n = csr.n_nodes();
        if original_id.len() != n || lat.len() != n || lon.len() != n {
            return Err(Error::InvalidInput(format!(
                "node arrays must have {n} entries (original_id={}, lat={}, lon={})",
                original_id.len(),
                lat.len(),
                lon.len()
            )));
        }
        let lookup = build_lookup(&original_id)?;
        Ok(Self {
            csr,
            original_id,
            lat,
            lon,
            lookup,
        })
    }

    pub fn n_nodes(&self) -> usize {
        self.csr.n_nodes()
    }

    /// Compact index of an original node id
    pub fn compact_index(&self, original_id: i64) -> Option<u32> {
        self.lookup.get(&original_id).copied()
    }

    /// SHA-256 over every array, hex encoded
    ///
    /// Identical graphs give identical fingerprints; used to key prepared-graph
    /// caches so a stale artifact is never picked up for a rebuilt graph.
    pub fn fingerprint(&self) -> String {
        hex::encode(self.fingerprint_bytes())
    }

    pub fn fingerprint_bytes(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update((self.n_nodes() as u64).to_le_bytes());
        hasher.update((self.csr.n_edges() as u64).to_le_bytes());
        for id in &self.original_id {
            hasher.update(id.to_le_bytes());
        }
        for off in &self.csr.indptr {
            hasher.update(off.to_le_bytes());
        }
        for head in &self.csr.indices {
            hasher.update(head.to_le_bytes());
        }
        for w in &self.csr.weights {
            hasher.update(w.to_le_bytes());
        }
        for lat in &self.lat {
            hasher.update(lat.to_le_bytes());
        }
        for lon in &self.lon {
            hasher.update(lon.to_le_bytes());
        }
        hasher.finalize().into()
    }
}

/// Reverse lookup `original_id -> compact_index`; duplicate ids are rejected.
pub(crate) fn build_lookup(original_id: &[i64]) -> Result<FxHashMap<i64, u32>> {
    let mut lookup = FxHashMap::with_capacity_and_hasher(original_id.len(), Default::default());
    for (idx, &id) in original_id.iter().enumerate() {
        let compact = u32::try_from(idx)
            .map_err(|_| Error::Overflow(format!("node index {idx} does not fit u32")))?;
        if lookup.insert(id, compact).is_some() {
            return Err(Error::InvalidInput(format!("duplicate original node id {id}")));
        }
    }
    Ok(lookup)
}
