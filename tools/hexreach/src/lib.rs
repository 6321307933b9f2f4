//! hexreach - road-graph preparation and incremental H3 travel-time matrices
//!
//! Pipeline: road network -> [`graph::build_graph`] -> CSR (+ [`graph::reverse`])
//! -> {[`cache::GraphCache`], [`anchors`], [`delta::DeltaEngine`]}.

pub mod anchors;
pub mod cache;
pub mod ch;
pub mod cli;
pub mod config;
pub mod delta;
pub mod formats;
pub mod graph;
pub mod logging;
pub mod spatial;

pub use anchors::{Anchor, AnchorIndex, Mode};
pub use cache::{GraphCache, PreparationBackend, PreparedInput};
pub use ch::{ChBackend, ContractionHierarchy};
pub use config::HexreachConfig;
pub use delta::{Action, Delta, DeltaEngine, DeltaReport};
pub use graph::{build_graph, reverse, CsrGraph, RoadGraph, RoadNetwork};
