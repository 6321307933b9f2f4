//! Contraction hierarchy backend for the prepared-graph cache
//!
//! Both search directions only ever climb in rank:
//! - forward follows `up` edges `u -> v` with `rank[v] > rank[u]`
//! - backward follows `down` edges stored at the lower node `v` as
//!   `(u, w)` for an original or shortcut edge `u -> v` with `rank[u] > rank[v]`

mod contraction;

pub use contraction::contract;

use hexreach_common::{Error, Result};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::cache::{PreparationBackend, PreparedInput};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractionHierarchy {
    pub n_nodes: u32,
    pub n_shortcuts: u64,
    pub rank: Vec<u32>,

    pub up_offsets: Vec<u64>,
    pub up_heads: Vec<u32>,
    pub up_weights: Vec<u32>,

    pub down_offsets: Vec<u64>,
    pub down_heads: Vec<u32>,
    pub down_weights: Vec<u32>,
}

type Heap = BinaryHeap<Reverse<(u32, u32)>>;

struct Search<'a> {
    offsets: &'a [u64],
    heads: &'a [u32],
    weights: &'a [u32],
    dist: FxHashMap<u32, u32>,
    heap: Heap,
}

impl<'a> Search<'a> {
    fn new(offsets: &'a [u64], heads: &'a [u32], weights: &'a [u32], source: u32) -> Self {
        let mut dist = FxHashMap::default();
        dist.insert(source, 0);
        let mut heap = Heap::new();
        heap.push(Reverse((0, source)));
        Self {
            offsets,
            heads,
            weights,
            dist,
            heap,
        }
    }

    fn active(&self, best: u32) -> bool {
        self.heap.peek().is_some_and(|Reverse((d, _))| *d < best)
    }

    /// Settle one node; tighten `best` if the other side has reached it
    fn step(&mut self, other: &FxHashMap<u32, u32>, best: &mut u32) {
        let Some(Reverse((d, u))) = self.heap.pop() else {
            return;
        };
        if self.dist.get(&u).is_some_and(|&cur| d > cur) {
            return;
        }
        if let Some(&o) = other.get(&u) {
            *best = (*best).min(d.saturating_add(o));
        }
        let start = self.offsets[u as usize] as usize;
        let end = self.offsets[u as usize + 1] as usize;
        for i in start..end {
            let v = self.heads[i];
            let nd = d.saturating_add(self.weights[i]);
            if self.dist.get(&v).map_or(true, |&cur| nd < cur) {
                self.dist.insert(v, nd);
                self.heap.push(Reverse((nd, v)));
            }
        }
    }
}

impl ContractionHierarchy {
    pub fn n_nodes(&self) -> usize {
        self.n_nodes as usize
    }

    /// Shortest travel time in seconds from `source` to `target`, compact indices
    pub fn query(&self, source: u32, target: u32) -> Option<u32> {
        if source >= self.n_nodes || target >= self.n_nodes {
            return None;
        }
        if source == target {
            return Some(0);
        }

        let mut fwd = Search::new(&self.up_offsets, &self.up_heads, &self.up_weights, source);
        let mut bwd = Search::new(&self.down_offsets, &self.down_heads, &self.down_weights, target);
        let mut best = u32::MAX;

        loop {
            let (f, b) = (fwd.active(best), bwd.active(best));
            if !f && !b {
                break;
            }
            if f {
                fwd.step(&bwd.dist, &mut best);
            }
            if b {
                bwd.step(&fwd.dist, &mut best);
            }
        }

        (best != u32::MAX).then_some(best)
    }

    fn check_shape(&self) -> Result<()> {
        let n = self.n_nodes();
        let ok = self.rank.len() == n
            && self.up_offsets.len() == n + 1
            && self.down_offsets.len() == n + 1
            && self.up_offsets.last() == Some(&(self.up_heads.len() as u64))
            && self.down_offsets.last() == Some(&(self.down_heads.len() as u64))
            && self.up_heads.len() == self.up_weights.len()
            && self.down_heads.len() == self.down_weights.len()
            && self.up_offsets.windows(2).all(|w| w[0] <= w[1])
            && self.down_offsets.windows(2).all(|w| w[0] <= w[1])
            && self.up_heads.iter().chain(&self.down_heads).all(|&v| (v as usize) < n);
        if ok {
            Ok(())
        } else {
            Err(Error::Backend("contraction hierarchy arrays are inconsistent".to_string()))
        }
    }
}

/// Builds and (de)serializes [`ContractionHierarchy`] artifacts with bincode
#[derive(Debug, Clone, Copy, Default)]
pub struct ChBackend;

impl PreparationBackend for ChBackend {
    type Artifact = ContractionHierarchy;

    fn name(&self) -> &'static str {
        "ch"
    }

    fn prepare(&self, input: &PreparedInput) -> Result<ContractionHierarchy> {
        contract(input)
    }

    fn serialize(&self, artifact: &ContractionHierarchy) -> Result<Vec<u8>> {
        bincode::serialize(artifact).map_err(|e| Error::Serialization(e.to_string()))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<ContractionHierarchy> {
        let ch: ContractionHierarchy =
            bincode::deserialize(bytes).map_err(|e| Error::Serialization(e.to_string()))?;
        ch.check_shape()?;
        Ok(ch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::GraphCache;
    use crate::graph::{build_graph, shortest_times, RawEdge, RawNode, RoadNetwork, UNREACHABLE};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use tempfile::TempDir;

    fn random_network(rng: &mut StdRng, n: i64, m: usize) -> RoadNetwork {
        let nodes = (0..n)
            .map(|id| RawNode {
                id: id * 10,
                lat: 50.0 + id as f64 * 1e-3,
                lon: 4.0,
            })
            .collect();
        let edges = (0..m)
            .map(|_| RawEdge {
                u: rng.random_range(0..n) * 10,
                v: rng.random_range(0..n) * 10,
                weight_s: Some(rng.random_range(0.0..600.0)),
            })
            .collect();
        RoadNetwork { nodes, edges }
    }

    #[test]
    fn test_query_matches_dijkstra() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..3 {
            let (graph, _) = build_graph(&random_network(&mut rng, 80, 240)).unwrap();
            let ch = ChBackend
                .prepare(&PreparedInput::from_csr(&graph.csr).unwrap())
                .unwrap();

            for _ in 0..60 {
                let s = rng.random_range(0..80u32);
                let t = rng.random_range(0..80u32);
                let expected = shortest_times(&graph.csr, s, None)[t as usize];
                let expected = (expected != UNREACHABLE).then_some(expected);
                assert_eq!(ch.query(s, t), expected, "query {s} -> {t}");
            }
        }
    }

    #[test]
    fn test_query_small_path() {
        let input = PreparedInput {
            indptr: vec![0, 1, 2, 2],
            indices: vec![1, 2],
            weights: vec![60, 120],
        };
        let ch = ChBackend.prepare(&input).unwrap();
        assert_eq!(ch.query(0, 2), Some(180));
        assert_eq!(ch.query(1, 2), Some(120));
        assert_eq!(ch.query(2, 0), None);
        assert_eq!(ch.query(1, 1), Some(0));
        assert_eq!(ch.query(0, 9), None);
    }

    #[test]
    fn test_cache_round_trip_byte_identical() {
        let dir = TempDir::new().unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let (graph, _) = build_graph(&random_network(&mut rng, 40, 120)).unwrap();
        let cache = GraphCache::new(dir.path(), ChBackend);

        let built = cache
            .build_and_cache(&graph.csr.indptr, &graph.csr.indices, &graph.csr.weights, "_drive")
            .unwrap();
        let first = std::fs::read(cache.cache_path("_drive").unwrap()).unwrap();

        let loaded = cache.load("_drive").unwrap().unwrap();
        assert_eq!(loaded, built);
        assert_eq!(ChBackend.serialize(&loaded).unwrap(), first);
    }

    #[test]
    fn test_deserialize_rejects_garbage() {
        assert!(ChBackend.deserialize(&[1, 2, 3]).is_err());

        let mut ch = ChBackend
            .prepare(&PreparedInput {
                indptr: vec![0, 1, 1],
                indices: vec![1],
                weights: vec![5],
            })
            .unwrap();
        ch.up_heads.push(7);
        let bytes = ChBackend.serialize(&ch).unwrap();
        assert!(ChBackend.deserialize(&bytes).is_err());
    }
}
