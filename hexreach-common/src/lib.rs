//! Common utilities for the hexreach toolkit

pub mod error;

pub use error::{suggest_correction, Error, Result};
