//! Anchors: curated points of interest snapped onto road graph nodes
//!
//! Compact anchor ids are a pure function of the set of stable ids of one mode:
//! sort the distinct ids ascending, number them from 0. Both the identity
//! manager and the index builder go through [`sorted_distinct_ids`], so the two
//! can never disagree.

mod identity;
mod index;

pub use identity::{assign_stable_identity, map_anchors_to_nodes, AnchorNodeMap, NO_ANCHOR};
pub use index::{build_anchor_indexes, AnchorIndex};

use hexreach_common::{suggest_correction, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::formats::tabular;

/// Travel mode an anchor is reachable by
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Drive,
    Walk,
    Bike,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Drive, Mode::Walk, Mode::Bike];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Drive => "drive",
            Mode::Walk => "walk",
            Mode::Bike => "bike",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drive" => Ok(Mode::Drive),
            "walk" => Ok(Mode::Walk),
            "bike" => Ok(Mode::Bike),
            other => {
                let known: Vec<String> = Mode::ALL.iter().map(|m| m.to_string()).collect();
                let hint = suggest_correction(other, &known)
                    .map(|s| format!(" (did you mean '{s}'?)"))
                    .unwrap_or_default();
                Err(Error::InvalidInput(format!("unknown mode '{other}'{hint}")))
            }
        }
    }
}

/// A point of interest snapped to a road node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub stable_id: String,
    pub node_id: i64,
    pub mode: Mode,
    pub anchor_int_id: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct AnchorRow {
    id: String,
    node_id: i64,
    mode: String,
    #[serde(default)]
    anchor_int_id: Option<u32>,
}

/// Read anchors from CSV with columns `id,node_id,mode[,anchor_int_id]`
pub fn read_anchors(path: &Path) -> Result<Vec<Anchor>> {
    let rows: Vec<AnchorRow> = tabular::read_rows(path, &["id", "node_id", "mode"])?;
    let anchors = rows
        .into_iter()
        .map(|row| {
            Ok(Anchor {
                stable_id: row.id,
                node_id: row.node_id,
                mode: row.mode.parse()?,
                anchor_int_id: row.anchor_int_id,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    tracing::info!(anchors = anchors.len(), path = %path.display(), "read anchors");
    Ok(anchors)
}

/// Distinct stable ids, ascending (byte-wise lexicographic)
pub fn sorted_distinct_ids<'a>(ids: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    ids.into_iter()
        .collect::<BTreeSet<&str>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mode_parse() {
        assert_eq!("drive".parse::<Mode>().unwrap(), Mode::Drive);
        assert_eq!(" WALK ".parse::<Mode>().unwrap(), Mode::Walk);
        let err = "drvie".parse::<Mode>().unwrap_err();
        assert!(err.to_string().contains("did you mean 'drive'"), "{err}");
    }

    #[test]
    fn test_sorted_distinct_ids() {
        let ids = sorted_distinct_ids(["b", "a", "c", "a", "B"]);
        assert_eq!(ids, vec!["B", "a", "b", "c"]);
    }

    #[test]
    fn test_read_anchors_optional_int_id() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("anchors.csv");
        std::fs::write(&path, "id,node_id,mode\nstore-2,20,drive\nstore-1,10,walk\n").unwrap();
        let anchors = read_anchors(&path).unwrap();
        assert_eq!(anchors.len(), 2);
        assert_eq!(anchors[1].mode, Mode::Walk);
        assert!(anchors.iter().all(|a| a.anchor_int_id.is_none()));

        std::fs::write(
            &path,
            "id,node_id,mode,anchor_int_id\nstore-2,20,drive,1\nstore-1,10,drive,0\n",
        )
        .unwrap();
        let anchors = read_anchors(&path).unwrap();
        assert_eq!(anchors[0].anchor_int_id, Some(1));
    }

    #[test]
    fn test_read_anchors_requires_mode_column() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("anchors.csv");
        std::fs::write(&path, "id,node_id\nstore-1,10\n").unwrap();
        assert!(matches!(
            read_anchors(&path),
            Err(Error::MissingColumn { ref column, .. }) if column == "mode"
        ));
    }
}
