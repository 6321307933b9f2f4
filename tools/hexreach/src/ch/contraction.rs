//! Directed node contraction with lazy edge-difference ordering
//!
//! Nodes are contracted one at a time, cheapest first. Before contracting `v`
//! a bounded witness search from every in-neighbour decides which
//! `u -> v -> x` pairs need a shortcut. The search gives up after
//! [`WITNESS_SETTLE_LIMIT`] settled nodes, which can only add superfluous
//! shortcuts, never drop a needed one.

use hexreach_common::{Error, Result};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Instant;

use super::ContractionHierarchy;
use crate::cache::PreparedInput;

const WITNESS_SETTLE_LIMIT: usize = 256;

/// Remaining (uncontracted) graph, min weight per neighbour
struct WorkGraph {
    out: Vec<FxHashMap<u32, u32>>,
    inc: Vec<FxHashMap<u32, u32>>,
}

impl WorkGraph {
    fn from_input(input: &PreparedInput) -> Result<Self> {
        let n = input.n_nodes();
        let mut graph = Self {
            out: vec![FxHashMap::default(); n],
            inc: vec![FxHashMap::default(); n],
        };
        for u in 0..n {
            let (start, end) = (input.indptr[u], input.indptr[u + 1]);
            let range = usize::try_from(start)
                .and_then(|s| usize::try_from(end).map(|e| s..e))
                .map_err(|_| Error::InvalidInput(format!("negative offset at node {u}")))?;
            for i in range {
                let v = u32::try_from(input.indices[i])
                    .map_err(|_| Error::InvalidInput(format!("negative edge head at {i}")))?;
                graph.add_edge(u as u32, v, input.weights[i] as u32);
            }
        }
        Ok(graph)
    }

    fn add_edge(&mut self, u: u32, v: u32, w: u32) {
        if u == v {
            return;
        }
        let fwd = self.out[u as usize].entry(v).or_insert(w);
        *fwd = (*fwd).min(w);
        let bwd = self.inc[v as usize].entry(u).or_insert(w);
        *bwd = (*bwd).min(w);
    }

    fn sorted(map: &FxHashMap<u32, u32>) -> Vec<(u32, u32)> {
        let mut edges: Vec<(u32, u32)> = map.iter().map(|(&v, &w)| (v, w)).collect();
        edges.sort_unstable();
        edges
    }

    /// Distances from `source` up to `bound`, never passing through `avoid`
    fn witness_distances(&self, source: u32, avoid: u32, bound: u32) -> FxHashMap<u32, u32> {
        let mut dist: FxHashMap<u32, u32> = FxHashMap::default();
        let mut heap = BinaryHeap::new();
        dist.insert(source, 0);
        heap.push(Reverse((0u32, source)));

        let mut settled = 0usize;
        while let Some(Reverse((d, u))) = heap.pop() {
            if dist.get(&u).is_some_and(|&best| d > best) {
                continue;
            }
            settled += 1;
            if d > bound || settled > WITNESS_SETTLE_LIMIT {
                break;
            }
            for (&x, &w) in &self.out[u as usize] {
                if x == avoid {
                    continue;
                }
                let nd = d.saturating_add(w);
                if nd <= bound && dist.get(&x).map_or(true, |&cur| nd < cur) {
                    dist.insert(x, nd);
                    heap.push(Reverse((nd, x)));
                }
            }
        }
        dist
    }

    /// Shortcuts `(u, x, weight)` needed if `v` were contracted now
    fn shortcuts_for(&self, v: u32) -> Vec<(u32, u32, u32)> {
        let outs = Self::sorted(&self.out[v as usize]);
        let Some(max_out) = outs.iter().map(|&(_, w)| w).max() else {
            return Vec::new();
        };

        let mut shortcuts = Vec::new();
        for (u, w_in) in Self::sorted(&self.inc[v as usize]) {
            let dist = self.witness_distances(u, v, w_in.saturating_add(max_out));
            for &(x, w_out) in &outs {
                if x == u {
                    continue;
                }
                let via = w_in.saturating_add(w_out);
                if dist.get(&x).map_or(true, |&d| d > via) {
                    shortcuts.push((u, x, via));
                }
            }
        }
        shortcuts
    }

    fn priority(&self, v: u32, shortcuts: usize, deleted_neighbors: u32) -> i64 {
        let removed = self.out[v as usize].len() + self.inc[v as usize].len();
        shortcuts as i64 - removed as i64 + deleted_neighbors as i64
    }
}

/// Build a contraction hierarchy over the directed CSR in `input`
pub fn contract(input: &PreparedInput) -> Result<ContractionHierarchy> {
    let start = Instant::now();
    let n = input.n_nodes();
    let n_nodes = u32::try_from(n).map_err(|_| Error::Overflow(format!("{n} nodes exceed u32")))?;
    let mut graph = WorkGraph::from_input(input)?;

    let initial: Vec<i64> = (0..n_nodes)
        .into_par_iter()
        .map(|v| graph.priority(v, graph.shortcuts_for(v).len(), 0))
        .collect();
    let mut heap: BinaryHeap<Reverse<(i64, u32)>> = initial
        .into_iter()
        .enumerate()
        .map(|(v, p)| Reverse((p, v as u32)))
        .collect();

    let mut rank = vec![u32::MAX; n];
    let mut deleted_neighbors = vec![0u32; n];
    let mut up: Vec<Vec<(u32, u32)>> = vec![Vec::new(); n];
    let mut down: Vec<Vec<(u32, u32)>> = vec![Vec::new(); n];
    let mut next_rank = 0u32;
    let mut n_shortcuts = 0u64;

    while let Some(Reverse((_, v))) = heap.pop() {
        if rank[v as usize] != u32::MAX {
            continue;
        }

        let shortcuts = graph.shortcuts_for(v);
        let fresh = graph.priority(v, shortcuts.len(), deleted_neighbors[v as usize]);
        if let Some(&Reverse((next, _))) = heap.peek() {
            if fresh > next {
                heap.push(Reverse((fresh, v)));
                continue;
            }
        }

        rank[v as usize] = next_rank;
        next_rank += 1;

        let outs = std::mem::take(&mut graph.out[v as usize]);
        let ins = std::mem::take(&mut graph.inc[v as usize]);
        for (&x, &w) in &outs {
            graph.inc[x as usize].remove(&v);
            deleted_neighbors[x as usize] += 1;
            up[v as usize].push((x, w));
        }
        for (&u, &w) in &ins {
            graph.out[u as usize].remove(&v);
            deleted_neighbors[u as usize] += 1;
            down[v as usize].push((u, w));
        }
        for (u, x, w) in shortcuts {
            graph.add_edge(u, x, w);
            n_shortcuts += 1;
        }

        if next_rank % 100_000 == 0 {
            tracing::debug!(
                contracted = next_rank,
                total = n,
                shortcuts = n_shortcuts,
                "contracting"
            );
        }
    }

    let (up_offsets, up_heads, up_weights) = to_csr(up);
    let (down_offsets, down_heads, down_weights) = to_csr(down);

    tracing::info!(
        nodes = n,
        shortcuts = n_shortcuts,
        up_edges = up_heads.len(),
        down_edges = down_heads.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "contraction complete"
    );

    Ok(ContractionHierarchy {
        n_nodes,
        n_shortcuts,
        rank,
        up_offsets,
        up_heads,
        up_weights,
        down_offsets,
        down_heads,
        down_weights,
    })
}

fn to_csr(adj: Vec<Vec<(u32, u32)>>) -> (Vec<u64>, Vec<u32>, Vec<u32>) {
    let mut offsets = Vec::with_capacity(adj.len() + 1);
    let mut heads = Vec::new();
    let mut weights = Vec::new();
    offsets.push(0u64);
    for mut edges in adj {
        edges.sort_unstable();
        for (v, w) in edges {
            heads.push(v);
            weights.push(w);
        }
        offsets.push(heads.len() as u64);
    }
    (offsets, heads, weights)
}
