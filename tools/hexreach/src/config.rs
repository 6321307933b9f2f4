//! Run configuration, read from TOML
//!
//! ```toml
//! low_resolution = 7
//! high_resolution = 9
//! ring_radius_km = 2.0
//! graph_dir = "graphs"
//! matrix_dir = "matrices"
//! cache_dir = "cache"
//! max_travel_minutes = 90
//! ```

use hexreach_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::delta::cells::ring_k;

/// Highest H3 resolution
pub const MAX_RESOLUTION: u8 = 15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HexreachConfig {
    pub low_resolution: u8,
    pub high_resolution: u8,
    pub ring_radius_km: f64,
    pub graph_dir: PathBuf,
    pub matrix_dir: PathBuf,
    pub cache_dir: PathBuf,
    /// Values above this are not written into matrices
    pub max_travel_minutes: Option<u16>,
}

impl Default for HexreachConfig {
    fn default() -> Self {
        Self {
            low_resolution: 7,
            high_resolution: 9,
            ring_radius_km: 2.0,
            graph_dir: PathBuf::from("graphs"),
            matrix_dir: PathBuf::from("matrices"),
            cache_dir: PathBuf::from("cache"),
            max_travel_minutes: None,
        }
    }
}

impl HexreachConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::MissingFile(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_toml_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// `load` when a path is given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, res) in [
            ("low_resolution", self.low_resolution),
            ("high_resolution", self.high_resolution),
        ] {
            if res > MAX_RESOLUTION {
                return Err(Error::Config(format!(
                    "{name} {res} outside 0..={MAX_RESOLUTION}"
                )));
            }
        }
        if self.low_resolution > self.high_resolution {
            return Err(Error::Config(format!(
                "low_resolution {} exceeds high_resolution {}",
                self.low_resolution, self.high_resolution
            )));
        }
        if !self.ring_radius_km.is_finite() || self.ring_radius_km < 0.0 {
            return Err(Error::Config(format!(
                "ring_radius_km must be finite and >= 0, got {}",
                self.ring_radius_km
            )));
        }
        for res in self.resolutions() {
            ring_k(self.ring_radius_km, res)?;
        }
        Ok(())
    }

    /// Resolutions matrices are kept at: low, then high if different
    pub fn resolutions(&self) -> Vec<u8> {
        if self.low_resolution == self.high_resolution {
            vec![self.low_resolution]
        } else {
            vec![self.low_resolution, self.high_resolution]
        }
    }
}
