use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::graph::LayoutGraph;

/// Longest-path ranks over a topological order. Cycles are broken by taking
/// the earliest remaining node (in input order) as the next source, so its
/// incoming edges act as back-edges.
pub(super) fn compute_ranks(graph: &LayoutGraph) -> Vec<usize> {
    let n = graph.len();
    let mut indeg: Vec<usize> = graph.incoming.iter().map(Vec::len).collect();
    let mut ready: BinaryHeap<Reverse<usize>> = BinaryHeap::new();
    for (idx, deg) in indeg.iter().enumerate() {
        if *deg == 0 {
            ready.push(Reverse(idx));
        }
    }

    let mut order = Vec::with_capacity(n);
    let mut processed = vec![false; n];
    loop {
        while let Some(Reverse(idx)) = ready.pop() {
            if processed[idx] {
                continue;
            }
            order.push(idx);
            processed[idx] = true;
            for &next in &graph.outgoing[idx] {
                if processed[next] {
                    continue;
                }
                indeg[next] = indeg[next].saturating_sub(1);
                if indeg[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        if order.len() >= n {
            break;
        }

        match processed.iter().position(|done| !done) {
            Some(idx) => ready.push(Reverse(idx)),
            None => break,
        }
    }

    let mut order_index = vec![0usize; n];
    for (pos, idx) in order.iter().enumerate() {
        order_index[*idx] = pos;
    }

    let mut ranks = vec![0usize; n];
    for &node in &order {
        let rank = ranks[node];
        for &next in &graph.outgoing[node] {
            if order_index[next] <= order_index[node] {
                continue;
            }
            ranks[next] = ranks[next].max(rank + 1);
        }
    }
    ranks
}

/// Groups node indices by rank, keeping input order inside a rank.
pub(super) fn rank_buckets(ranks: &[usize]) -> Vec<Vec<usize>> {
    let depth = ranks.iter().copied().max().map_or(0, |max| max + 1);
    let mut buckets = vec![Vec::new(); depth];
    for (idx, rank) in ranks.iter().enumerate() {
        buckets[*rank].push(idx);
    }
    buckets
}

/// Median of the neighbours' coordinates, or `own` when there are none.
pub(super) fn median_position(neighbor_positions: &mut [f32], own: f32) -> f32 {
    if neighbor_positions.is_empty() {
        return own;
    }
    neighbor_positions.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = neighbor_positions.len() / 2;
    if neighbor_positions.len() % 2 == 1 {
        neighbor_positions[mid]
    } else {
        (neighbor_positions[mid - 1] + neighbor_positions[mid]) * 0.5
    }
}
