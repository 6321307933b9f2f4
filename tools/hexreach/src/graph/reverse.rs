//! CSR transpose for backward traversal

use super::CsrGraph;

/// Transpose a CSR graph: every edge `u -> v (w)` becomes `v -> u (w)`.
///
/// Two-pass counting sort, O(N + M). Pass 1 counts incoming edges per node and
/// prefix-sums them into the reverse offsets. Pass 2 rescans the forward rows
/// in source order and drops each edge into its destination bucket through a
/// per-node write cursor. Since sources are scanned in increasing order, each
/// reverse row comes out sorted by its new head.
pub fn reverse(csr: &CsrGraph) -> CsrGraph {
    let n_nodes = csr.n_nodes();
    let n_edges = csr.n_edges();

    // First pass: count incoming edges per node
    let mut counts = vec![0u64; n_nodes];
    for &target in &csr.indices {
        counts[target as usize] += 1;
    }

    let mut indptr = Vec::with_capacity(n_nodes + 1);
    let mut offset = 0u64;
    for &count in &counts {
        indptr.push(offset);
        offset += count;
    }
    indptr.push(offset);

    let mut indices = vec![0u32; n_edges];
    let mut weights = vec![0u16; n_edges];

    // Second pass: reuse counts as write cursors
    counts.copy_from_slice(&indptr[..n_nodes]);

    for source in 0..n_nodes {
        for i in csr.edge_range(source) {
            let target = csr.indices[i] as usize;
            let pos = counts[target] as usize;
            indices[pos] = source as u32;
            weights[pos] = csr.weights[i];
            counts[target] += 1;
        }
    }

    CsrGraph {
        indptr,
        indices,
        weights,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CsrGraph {
        // 0->1 (5), 0->2 (7), 1->2 (3), 2->0 (1), 2->2 (9), 3 isolated
        CsrGraph {
            indptr: vec![0, 2, 3, 5, 5],
            indices: vec![1, 2, 2, 0, 2],
            weights: vec![5, 7, 3, 1, 9],
        }
    }

    fn edge_list(csr: &CsrGraph) -> Vec<(u32, u32, u16)> {
        let mut out = Vec::new();
        for u in 0..csr.n_nodes() {
            for i in csr.edge_range(u) {
                out.push((u as u32, csr.indices[i], csr.weights[i]));
            }
        }
        out
    }

    #[test]
    fn test_reverse_small_graph() {
        let rev = reverse(&sample());
        assert_eq!(rev.indptr, vec![0, 1, 2, 5, 5]);
        assert_eq!(rev.indices, vec![2, 0, 0, 1, 2]);
        assert_eq!(rev.weights, vec![1, 5, 7, 3, 9]);
        rev.validate().unwrap();
    }

    #[test]
    fn test_reverse_is_edge_duality() {
        let fwd = sample();
        let rev = reverse(&fwd);
        assert_eq!(rev.n_edges(), fwd.n_edges());

        let mut flipped: Vec<_> = edge_list(&fwd)
            .into_iter()
            .map(|(u, v, w)| (v, u, w))
            .collect();
        flipped.sort_unstable();
        let mut got = edge_list(&rev);
        got.sort_unstable();
        assert_eq!(flipped, got);
    }

    #[test]
    fn test_reverse_twice_is_identity_on_sorted_input() {
        let fwd = sample();
        assert_eq!(reverse(&reverse(&fwd)), fwd);
    }

    #[test]
    fn test_reverse_empty() {
        let rev = reverse(&CsrGraph::empty(3));
        assert_eq!(rev.indptr, vec![0, 0, 0, 0]);
        assert!(rev.indices.is_empty());
    }
}
