//! File formats: road graph binary, CSV inputs, Arrow outputs

pub mod anchor_index;
pub mod arrow_io;
pub mod crc;
pub mod csr;
pub mod minutes;
pub mod tabular;

pub use anchor_index::{AnchorIndexFile, AnchorNodesFile};
pub use csr::{CsrFile, CsrHeader};
pub use minutes::MinutesMatrix;

use hexreach_common::Result;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Sibling temp path used while writing `path`
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `bytes` to a sibling temp file, fsync, then rename over `path`
///
/// Readers see either the old file or the complete new one.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(path);
    {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}
