//! Road network -> CSR conversion

use hexreach_common::{Error, Result};
use rayon::prelude::*;

use super::{build_lookup, CsrGraph, RoadGraph};

/// Largest stored edge weight in seconds (~18.2 h); `u16::MAX` stays unused.
pub const MAX_WEIGHT_S: u16 = 65_534;

/// Stand-in for NaN / +inf weights before clamping
pub const UNREACHABLE_WEIGHT_S: f64 = 1_000_000.0;

/// Road network vertex as read from the source
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize)]
pub struct RawNode {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
}

/// Directed edge; `weight_s` is `None` when the source has no travel time
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize)]
pub struct RawEdge {
    pub u: i64,
    pub v: i64,
    pub weight_s: Option<f64>,
}

/// Directed multigraph with per-edge travel times
#[derive(Debug, Clone, Default)]
pub struct RoadNetwork {
    pub nodes: Vec<RawNode>,
    pub edges: Vec<RawEdge>,
}

/// Counters from one build pass
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct BuildStats {
    pub n_nodes: usize,
    pub n_edges: usize,
    pub duplicate_nodes: usize,
    pub dropped_unknown_node: usize,
    pub dropped_missing_weight: usize,
}

/// Clamp a travel time in seconds to the u16 edge weight domain
///
/// NaN and +inf become [`UNREACHABLE_WEIGHT_S`], negatives and -inf become 0,
/// then the value is rounded up and clamped to `[0, MAX_WEIGHT_S]`.
pub fn clamp_weight(weight_s: f64) -> u16 {
    let w = if weight_s.is_nan() || weight_s == f64::INFINITY {
        UNREACHABLE_WEIGHT_S
    } else if weight_s < 0.0 {
        0.0
    } else {
        weight_s
    };
    w.ceil().clamp(0.0, MAX_WEIGHT_S as f64) as u16
}

/// Build the CSR graph and node arrays from a road network
///
/// Nodes are sorted by `original_id` before compact indices are assigned, so
/// rebuilding from the same input always yields the same graph regardless of
/// input order. Edges are sorted by `(source, destination)`; parallel edges
/// keep their input order. Edges touching an unknown node, and edges without
/// a weight, are dropped and counted in [`BuildStats`].
pub fn build_graph(network: &RoadNetwork) -> Result<(RoadGraph, BuildStats)> {
    let mut stats = BuildStats::default();

    // Stable sort keeps the first occurrence of a duplicated id in front
    let mut nodes = network.nodes.clone();
    nodes.sort_by_key(|n| n.id);
    let before = nodes.len();
    nodes.dedup_by_key(|n| n.id);
    stats.duplicate_nodes = before - nodes.len();
    if stats.duplicate_nodes > 0 {
        tracing::warn!(
            duplicates = stats.duplicate_nodes,
            "duplicate node ids in road network, keeping first occurrence"
        );
    }

    let n_nodes = nodes.len();
    if n_nodes > u32::MAX as usize {
        return Err(Error::Overflow(format!(
            "{n_nodes} nodes exceed the u32 compact index space"
        )));
    }

    let original_id: Vec<i64> = nodes.iter().map(|n| n.id).collect();
    let lat: Vec<f32> = nodes.iter().map(|n| n.lat as f32).collect();
    let lon: Vec<f32> = nodes.iter().map(|n| n.lon as f32).collect();
    let lookup = build_lookup(&original_id)?;

    let mut edges: Vec<(u32, u32, u16)> = Vec::with_capacity(network.edges.len());
    for edge in &network.edges {
        let Some(weight_s) = edge.weight_s else {
            stats.dropped_missing_weight += 1;
            continue;
        };
        match (lookup.get(&edge.u), lookup.get(&edge.v)) {
            (Some(&src), Some(&dst)) => edges.push((src, dst, clamp_weight(weight_s))),
            _ => stats.dropped_unknown_node += 1,
        }
    }
    if stats.dropped_unknown_node > 0 {
        tracing::debug!(
            dropped = stats.dropped_unknown_node,
            "edges referencing unknown nodes dropped"
        );
    }

    // Stable: parallel edges stay in input order
    edges.par_sort_by_key(|&(src, dst, _)| (src, dst));

    let mut indptr = vec![0u64; n_nodes + 1];
    for &(src, _, _) in &edges {
        indptr[src as usize + 1] += 1;
    }
    for i in 0..n_nodes {
        indptr[i + 1] += indptr[i];
    }

    let indices: Vec<u32> = edges.iter().map(|&(_, dst, _)| dst).collect();
    let weights: Vec<u16> = edges.iter().map(|&(_, _, w)| w).collect();

    stats.n_nodes = n_nodes;
    stats.n_edges = indices.len();

    let csr = CsrGraph {
        indptr,
        indices,
        weights,
    };
    let graph = RoadGraph::from_parts(csr, original_id, lat, lon)?;

    tracing::info!(
        nodes = stats.n_nodes,
        edges = stats.n_edges,
        "built CSR road graph"
    );

    Ok((graph, stats))
}
