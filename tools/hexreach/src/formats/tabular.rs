//! CSV inputs: road network nodes/edges, anchors, deltas
//!
//! Every reader checks the file exists and the header carries the required
//! columns before it touches a single row, so structural problems surface as
//! [`Error::MissingFile`] / [`Error::MissingColumn`] before any output exists.

use hexreach_common::{Error, Result};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::path::Path;

use crate::graph::{RawEdge, RawNode, RoadNetwork};

/// Open a CSV file and verify its header contains `required` columns
pub fn open_checked(path: &Path, required: &[&str]) -> Result<csv::Reader<File>> {
    if !path.exists() {
        return Err(Error::MissingFile(path.to_path_buf()));
    }
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| Error::Csv(format!("{}: {e}", path.display())))?;

    let headers = reader
        .headers()
        .map_err(|e| Error::Csv(format!("{}: {e}", path.display())))?
        .clone();
    for column in required {
        if !headers.iter().any(|h| h == *column) {
            return Err(Error::MissingColumn {
                column: column.to_string(),
                input: path.display().to_string(),
            });
        }
    }
    Ok(reader)
}

/// Deserialize every row; the first bad row aborts with its line number
pub fn read_rows<T: DeserializeOwned>(path: &Path, required: &[&str]) -> Result<Vec<T>> {
    let mut reader = open_checked(path, required)?;
    let mut rows = Vec::new();
    for (i, record) in reader.deserialize().enumerate() {
        let row: T = record.map_err(|e| {
            // +2: header line and 1-based numbering
            Error::Csv(format!("{} row {}: {e}", path.display(), i + 2))
        })?;
        rows.push(row);
    }
    Ok(rows)
}

/// Read a road network from `nodes.csv` (`id,lat,lon`) and `edges.csv` (`u,v,weight_s`)
///
/// An empty `weight_s` cell means the edge has no travel time; `NaN`, `inf`
/// and `-inf` are accepted and clamped later by the graph builder.
pub fn read_network(nodes_path: &Path, edges_path: &Path) -> Result<RoadNetwork> {
    let nodes: Vec<RawNode> = read_rows(nodes_path, &["id", "lat", "lon"])?;
    let edges: Vec<RawEdge> = read_rows(edges_path, &["u", "v", "weight_s"])?;
    tracing::info!(
        nodes = nodes.len(),
        edges = edges.len(),
        "read road network"
    );
    Ok(RoadNetwork { nodes, edges })
}
