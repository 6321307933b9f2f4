//! Error types and utilities for the hexreach toolkit
//!
//! Library crates return [`Error`]; binaries wrap it with `anyhow` context.

use std::path::PathBuf;
use strsim::{jaro_winkler, normalized_levenshtein};
use thiserror::Error;

/// Find the best fuzzy match using Jaro-Winkler (70%) + normalized Levenshtein (30%)
///
/// A prefix bonus (up to 20%) favours candidates sharing the first characters of
/// the input, which is how region and brand typos usually look ("califronia").
/// Candidates scoring below 0.65 are never suggested.
fn find_best_fuzzy_match(input: &str, candidates: &[String]) -> Option<String> {
    if candidates.is_empty() {
        return None;
    }

    let input_lower = input.to_lowercase();
    let mut best_match = None;
    let mut best_score = 0.0f64;

    let min_threshold = 0.65;

    for candidate in candidates {
        let candidate_lower = candidate.to_lowercase();

        let jw_score = jaro_winkler(&input_lower, &candidate_lower);
        let lev_score = normalized_levenshtein(&input_lower, &candidate_lower);
        let combined_score = (jw_score * 0.7) + (lev_score * 0.3);

        let mut prefix_bonus = 0.0;
        let prefix_len = input_lower.chars().count().min(7);
        if prefix_len >= 4 {
            let input_prefix = input_lower.chars().take(prefix_len).collect::<String>();
            let candidate_prefix = candidate_lower.chars().take(prefix_len).collect::<String>();

            let prefix_similarity = normalized_levenshtein(&input_prefix, &candidate_prefix);
            if prefix_similarity > 0.7 {
                prefix_bonus = 0.2 * prefix_similarity;
            }
        }

        let final_score = combined_score + prefix_bonus;

        if final_score >= min_threshold && final_score > best_score {
            best_score = final_score;
            best_match = Some(candidate.clone());
        }
    }

    best_match
}

/// Suggest a correction for a misspelled name among known candidates
///
/// Returns `None` for an exact (case-insensitive) match or when nothing is close.
pub fn suggest_correction(input: &str, candidates: &[String]) -> Option<String> {
    if candidates.iter().any(|c| c.eq_ignore_ascii_case(input)) {
        return None;
    }
    find_best_fuzzy_match(input, candidates)
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean '{s}'?)"),
        None => String::new(),
    }
}

/// Main error type for hexreach operations
#[derive(Debug, Error)]
pub enum Error {
    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A required input file does not exist
    #[error("Required file not found: {}", .0.display())]
    MissingFile(PathBuf),

    /// A structured input lacks a required column
    #[error("Missing column '{column}' in {input}")]
    MissingColumn { column: String, input: String },

    /// Invalid records or parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Binary file with bad magic, version, checksum or lengths
    #[error("Invalid format in {}: {reason}", path.display())]
    Format { path: PathBuf, reason: String },

    /// Value does not fit the fixed-width type it is coerced to
    #[error("Numeric overflow: {0}")]
    Overflow(String),

    /// No graph node could be resolved for a coordinate
    #[error("No graph node near ({lat}, {lon})")]
    NoNearestNode { lat: f64, lon: f64 },

    /// Region has no prepared road graph or matrix
    #[error("Region '{region}' not found{}", did_you_mean(.suggestion))]
    RegionNotFound {
        region: String,
        suggestion: Option<String>,
    },

    /// Another writer holds the exclusive lock on an output file
    #[error("Output is locked by another writer: {}", .0.display())]
    Locked(PathBuf),

    /// Routing preparation backend failure
    #[error("Routing backend error: {0}")]
    Backend(String),

    /// CSV parsing error
    #[error("CSV error: {0}")]
    Csv(String),

    /// Arrow IPC encoding or decoding error
    #[error("Arrow error: {0}")]
    Arrow(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Artifact (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Convenience result type for hexreach operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_suggest_correction_typos() {
        let states = candidates(&["california", "colorado", "texas", "washington"]);
        assert_eq!(
            suggest_correction("colorada", &states),
            Some("colorado".to_string())
        );
        assert_eq!(
            suggest_correction("washingotn", &states),
            Some("washington".to_string())
        );
    }

    #[test]
    fn test_suggest_correction_exact_match_is_none() {
        let states = candidates(&["california", "texas"]);
        assert_eq!(suggest_correction("Texas", &states), None);
    }

    #[test]
    fn test_suggest_correction_no_match() {
        let actions = candidates(&["add", "move", "close"]);
        assert_eq!(suggest_correction("totally-invalid-action", &actions), None);
        assert_eq!(suggest_correction("x", &[]), None);
    }

    #[test]
    fn test_region_error_display() {
        let err = Error::RegionNotFound {
            region: "califronia".to_string(),
            suggestion: Some("california".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Region 'califronia' not found (did you mean 'california'?)"
        );

        let err = Error::RegionNotFound {
            region: "atlantis".to_string(),
            suggestion: None,
        };
        assert_eq!(err.to_string(), "Region 'atlantis' not found");
    }
}
