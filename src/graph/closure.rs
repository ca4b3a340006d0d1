use ndarray::Array2;
use num_traits::{PrimInt, Unsigned};
use std::fmt::Debug;

use super::{Edge, NodeId};

/// Shortest distances between every ordered pair of nodes, together with
/// the first step to take along each shortest path.
///
/// Unreachable pairs hold `W::max_value()`, and sums are saturating so
/// the sentinel never wraps around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Closure<W> {
    dist: Array2<W>,
    /// `next[[i, j]]` is where to step from `i` when heading for `j`
    next: Array2<NodeId>,
}

impl<W: PrimInt + Unsigned + Debug> Closure<W> {
    /// Close the roads over all transitive paths in O(n^3) time and O(n^2) space.
    ///
    /// Every road must reference nodes in `0..n`. Parallel roads collapse to the cheapest
    /// and self-loops never improve the zero diagonal.
    pub fn new(n: usize, edges: &[Edge<W>]) -> Self {
        let mut dist = Array2::from_elem((n, n), W::max_value());
        let mut next = Array2::from_shape_fn((n, n), |(_, to)| to);
        for i in 0..n {
            dist[[i, i]] = W::zero();
        }

        for &Edge(u, v, weight) in edges {
            if weight < dist[[u, v]] {
                dist[[u, v]] = weight;
                dist[[v, u]] = weight;
                next[[u, v]] = v;
                next[[v, u]] = u;
            }
        }

        // Every k must be fully folded in before the next one is considered
        for k in 0..n {
            for i in 0..n {
                let to_k = dist[[i, k]];
                if to_k == W::max_value() {
                    continue;
                }
                for j in 0..n {
                    let through_k = to_k.saturating_add(dist[[k, j]]);
                    if through_k < dist[[i, j]] {
                        dist[[i, j]] = through_k;
                        next[[i, j]] = next[[i, k]];
                    }
                }
            }
        }

        Self { dist, next }
    }

    pub fn node_count(&self) -> usize {
        self.dist.nrows()
    }

    /// Shortest distance, if `to` can be reached at all.
    pub fn distance(&self, from: NodeId, to: NodeId) -> Option<W> {
        Some(self.dist[[from, to]]).filter(|d| *d != W::max_value())
    }

    /// Shortest distance with the unreachable sentinel left in.
    pub(crate) fn raw_distance(&self, from: NodeId, to: NodeId) -> W {
        self.dist[[from, to]]
    }

    /// Nodes along a shortest path, both ends included.
    ///
    /// A shortest path never repeats a node, so the walk gives up after `n` steps.
    pub fn path(&self, from: NodeId, to: NodeId) -> Option<Vec<NodeId>> {
        self.distance(from, to)?;
        let mut path = vec![from];
        let mut current = from;
        for _ in 0..self.node_count() {
            if current == to {
                break;
            }
            current = self.next[[current, to]];
            path.push(current);
        }
        (current == to).then_some(path)
    }

    /// Whether node 0 reaches every other node.
    pub fn is_connected(&self) -> bool {
        (0..self.node_count()).all(|to| self.distance(0, to).is_some())
    }
}

#[cfg(test)]
#[test]
fn closure_prefers_detour_over_expensive_road() {
    let closure = Closure::new(3, &[Edge(0, 1, 1u32), Edge(1, 2, 1), Edge(0, 2, 5)]);
    assert_eq!(closure.distance(0, 2), Some(2));
    assert_eq!(closure.distance(2, 0), Some(2));
    assert_eq!(closure.path(2, 0), Some(vec![2, 1, 0]));
    assert_eq!(closure.path(0, 1), Some(vec![0, 1]));
    assert_eq!(closure.path(1, 1), Some(vec![1]));
}

#[cfg(test)]
#[test]
fn closure_keeps_cheapest_parallel_road() {
    let closure = Closure::new(2, &[Edge(0, 1, 9u64), Edge(1, 0, 4), Edge(0, 1, 7)]);
    assert_eq!(closure.distance(0, 1), Some(4));
    assert_eq!(closure.distance(1, 0), Some(4));
}

#[cfg(test)]
#[test]
fn closure_ignores_self_loops() {
    let closure = Closure::new(2, &[Edge(0, 0, 3u64), Edge(0, 1, 2)]);
    assert_eq!(closure.distance(0, 0), Some(0));
    assert_eq!(closure.path(0, 0), Some(vec![0]));
}

#[cfg(test)]
#[test]
fn closure_reports_unreachable_pairs() {
    let closure = Closure::new(3, &[Edge(0, 1, 1u64)]);
    assert_eq!(closure.distance(0, 2), None);
    assert_eq!(closure.distance(2, 1), None);
    assert_eq!(closure.path(0, 2), None);
    assert!(!closure.is_connected());
    assert!(Closure::new(3, &[Edge(0, 1, 1u64), Edge(2, 1, 1)]).is_connected());
}

#[cfg(test)]
#[test]
fn closure_is_symmetric_and_satisfies_triangle_inequality() {
    let edges = [
        Edge(0, 1, 7u64),
        Edge(1, 2, 2),
        Edge(2, 3, 3),
        Edge(3, 4, 1),
        Edge(4, 0, 20),
        Edge(1, 3, 9),
        Edge(5, 2, 4),
    ];
    let closure = Closure::new(6, &edges);
    let dist = |i, j| closure.distance(i, j).unwrap();
    for i in 0..6 {
        assert_eq!(dist(i, i), 0);
        for j in 0..6 {
            assert_eq!(dist(i, j), dist(j, i));
            for k in 0..6 {
                assert!(dist(i, j) <= dist(i, k) + dist(k, j));
            }
        }
    }
    assert_eq!(closure.distance(0, 4), Some(13));
    assert_eq!(closure.path(0, 4), Some(vec![0, 1, 2, 3, 4]));
}
