//! Delta records: `state,brand,action,lat,lon`

use hexreach_common::{suggest_correction, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::formats::tabular;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Add,
    Move,
    Close,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Add => "add",
            Action::Move => "move",
            Action::Close => "close",
        }
    }

    /// add/move can be merged with `min`; close cannot
    pub fn is_incremental(self) -> bool {
        !matches!(self, Action::Close)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "add" => Ok(Action::Add),
            "move" => Ok(Action::Move),
            "close" => Ok(Action::Close),
            other => {
                let known = ["add", "move", "close"].map(String::from);
                let hint = suggest_correction(other, &known)
                    .map(|s| format!(" (did you mean '{s}'?)"))
                    .unwrap_or_default();
                Err(Error::InvalidInput(format!("unknown action '{other}'{hint}")))
            }
        }
    }
}

/// A point-of-interest change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delta {
    pub state: String,
    pub brand: String,
    pub action: Action,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Deserialize)]
struct DeltaRow {
    state: String,
    brand: String,
    action: String,
    lat: f64,
    lon: f64,
}

impl TryFrom<DeltaRow> for Delta {
    type Error = Error;

    fn try_from(row: DeltaRow) -> Result<Self> {
        if row.state.is_empty() || row.brand.is_empty() {
            return Err(Error::InvalidInput("empty state or brand".to_string()));
        }
        if row.state.contains(['/', '\\']) || row.state.contains("..") {
            return Err(Error::InvalidInput(format!("state '{}' is not a region name", row.state)));
        }
        if !(-90.0..=90.0).contains(&row.lat) || !(-180.0..=180.0).contains(&row.lon) {
            return Err(Error::InvalidInput(format!(
                "coordinate ({}, {}) out of range",
                row.lat, row.lon
            )));
        }
        Ok(Delta {
            action: row.action.parse()?,
            state: row.state,
            brand: row.brand,
            lat: row.lat,
            lon: row.lon,
        })
    }
}

/// Read and validate every delta; any bad row fails the whole file
pub fn read_deltas(path: &Path) -> Result<Vec<Delta>> {
    let rows: Vec<DeltaRow> =
        tabular::read_rows(path, &["state", "brand", "action", "lat", "lon"])?;
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| {
            Delta::try_from(row).map_err(|e| {
                Error::InvalidInput(format!("{} row {}: {e}", path.display(), i + 2))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_actions() {
        assert_eq!("add".parse::<Action>().unwrap(), Action::Add);
        assert_eq!("MOVE".parse::<Action>().unwrap(), Action::Move);
        assert!(!Action::Close.is_incremental());

        let err = "clsoe".parse::<Action>().unwrap_err();
        assert!(err.to_string().contains("did you mean 'close'"), "{err}");
    }

    #[test]
    fn test_read_deltas() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deltas.csv");
        std::fs::write(
            &path,
            "state,brand,action,lat,lon\nca,aldi,add,37.77,-122.41\nca,lidl,close,37.70,-122.40\n",
        )
        .unwrap();

        let deltas = read_deltas(&path).unwrap();
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0].brand, "aldi");
        assert_eq!(deltas[1].action, Action::Close);
    }

    #[test]
    fn test_bad_row_fails_whole_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deltas.csv");
        std::fs::write(
            &path,
            "state,brand,action,lat,lon\nca,aldi,add,37.77,-122.41\nca,aldi,open,37.7,-122.4\n",
        )
        .unwrap();
        let err = read_deltas(&path).unwrap_err();
        assert!(err.to_string().contains("row 3"), "{err}");

        std::fs::write(&path, "state,brand,action,lat,lon\nca,aldi,add,97.0,-122.41\n").unwrap();
        assert!(read_deltas(&path).is_err());
    }

    #[test]
    fn test_missing_source_is_fatal() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            read_deltas(&dir.path().join("none.csv")),
            Err(Error::MissingFile(_))
        ));
    }

    #[test]
    fn test_header_only_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deltas.csv");
        std::fs::write(&path, "state,brand,action,lat,lon\n").unwrap();
        assert!(read_deltas(&path).unwrap().is_empty());
    }
}
