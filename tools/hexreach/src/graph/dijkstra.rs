//! Single-source shortest travel times over a CSR graph

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::CsrGraph;

/// Distance marker for nodes not reached
pub const UNREACHABLE: u32 = u32::MAX;

/// Dijkstra from `source`, returning seconds per node ([`UNREACHABLE`] if not reached)
///
/// Run it on the reverse graph to get travel times *to* `source`. Nodes
/// farther than `cutoff_s` are left unreachable.
pub fn shortest_times(csr: &CsrGraph, source: u32, cutoff_s: Option<u32>) -> Vec<u32> {
    let n_nodes = csr.n_nodes();
    let mut dist = vec![UNREACHABLE; n_nodes];
    if source as usize >= n_nodes {
        return dist;
    }
    let cutoff = cutoff_s.unwrap_or(UNREACHABLE - 1);

    let mut heap: BinaryHeap<Reverse<(u32, u32)>> = BinaryHeap::new();
    dist[source as usize] = 0;
    heap.push(Reverse((0, source)));

    while let Some(Reverse((d, u))) = heap.pop() {
        if d > dist[u as usize] {
            continue;
        }

        for i in csr.edge_range(u as usize) {
            let v = csr.indices[i];
            let new_dist = d.saturating_add(csr.weights[i] as u32);
            if new_dist <= cutoff && new_dist < dist[v as usize] {
                dist[v as usize] = new_dist;
                heap.push(Reverse((new_dist, v)));
            }
        }
    }

    dist
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::reverse;

    fn path() -> CsrGraph {
        // 0 -> 1 (60s) -> 2 (120s), plus a slow shortcut 0 -> 2 (500s)
        CsrGraph {
            indptr: vec![0, 2, 3, 3],
            indices: vec![1, 2, 2],
            weights: vec![60, 500, 120],
        }
    }

    #[test]
    fn test_forward_times() {
        assert_eq!(shortest_times(&path(), 0, None), vec![0, 60, 180]);
        assert_eq!(shortest_times(&path(), 2, None), vec![UNREACHABLE, UNREACHABLE, 0]);
    }

    #[test]
    fn test_reverse_gives_times_to_target() {
        let rev = reverse(&path());
        assert_eq!(shortest_times(&rev, 2, None), vec![180, 120, 0]);
    }

    #[test]
    fn test_cutoff() {
        assert_eq!(shortest_times(&path(), 0, Some(100)), vec![0, 60, UNREACHABLE]);
    }

    #[test]
    fn test_out_of_range_source() {
        assert!(shortest_times(&path(), 7, None).iter().all(|&d| d == UNREACHABLE));
    }
}
