use ndarray::Array2;
use num_traits::{PrimInt, Unsigned};
use serde::Serialize;
use std::fmt::Debug;
use thiserror::Error;
use tracing::debug;

use super::{closure::Closure, Edge, NodeId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TourError {
    #[error("need at least 2 nodes, got {0}")]
    InsufficientNodes(usize),
    #[error("invalid node {node}: nodes must be between 0 and {max}")]
    NodeOutOfRange { node: NodeId, max: NodeId },
    #[error("no Hamiltonian cycle exists")]
    NoHamiltonianCycle,
    #[error("road weights are too large: a round trip could cost more than {max}")]
    WeightTooLarge { max: String },
}

/// Largest node count callers should hand to [`solve`]. The subset tables hold
/// `n * 2^(n-1)` states, about 400 MB at 22 nodes with 64-bit weights.
pub const MAX_NODES: usize = 22;

/// Marks a subset table state with nowhere left to go.
const NO_NEXT: u8 = u8::MAX;

/// The cheapest round trip from node 0, as walked on the actual roads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tour<W> {
    pub cost: W,
    /// Starts and ends at node 0 and may pass through a node more than once
    pub path: Vec<NodeId>,
}

/// Reject instances that cannot be closed over.
///
/// Self-loops and parallel roads are fine: the closure absorbs them. Weights must leave
/// room below `W::max_value()`, which stands for "unreachable". Walking a spanning tree
/// there and back visits everyone, so no optimal round trip costs more than twice all
/// roads together.
pub fn validate<W: PrimInt + Unsigned + Debug>(
    n: usize,
    edges: &[Edge<W>],
) -> Result<(), TourError> {
    if n < 2 {
        return Err(TourError::InsufficientNodes(n));
    }
    if let Some(node) = edges
        .iter()
        .flat_map(|Edge(u, v, _)| [*u, *v])
        .find(|node| *node >= n)
    {
        return Err(TourError::NodeOutOfRange { node, max: n - 1 });
    }

    let worst_round_trip = edges
        .iter()
        .try_fold(W::zero(), |total, Edge(.., weight)| total.checked_add(weight))
        .and_then(|total| total.checked_add(&total));
    match worst_round_trip {
        Some(cost) if cost < W::max_value() => Ok(()),
        _ => Err(TourError::WeightTooLarge {
            max: format!("{:?}", W::max_value() - W::one()),
        }),
    }
}

/// Find the minimum cost round trip from node 0 that visits every node.
///
/// Roads are closed over with Floyd–Warshall so that the graph need not be complete,
/// then the [Held–Karp](https://en.wikipedia.org/wiki/Held%E2%80%93Karp_algorithm) subset
/// dynamic program picks the visiting order in O(2^n n^2) time and O(2^n n) space.
/// Each hop of that order is finally expanded back into the roads it stands for.
///
/// There is no heuristic fallback: callers must keep `n` small.
pub fn solve<W: PrimInt + Unsigned + Debug>(
    n: usize,
    edges: &[Edge<W>],
) -> Result<Tour<W>, TourError> {
    validate(n, edges)?;
    debug_assert!(n < usize::BITS as usize, "visit mask cannot hold {} nodes", n);

    debug!("Closing {} roads over {} nodes", edges.len(), n);
    let closure = Closure::new(n, edges);
    if !closure.is_connected() {
        debug!("Some nodes cannot be reached from node 0");
        return Err(TourError::NoHamiltonianCycle);
    }

    debug!("Filling subset table over {} masks", 1usize << n);
    let table = SubsetTable::new(&closure);
    let cost = table.cost().ok_or(TourError::NoHamiltonianCycle)?;

    let order = table.visiting_order();
    debug!("Visiting order {:?} costs {:?}", order, cost);
    let path = expand(&closure, &order).ok_or(TourError::NoHamiltonianCycle)?;

    Ok(Tour { cost, path })
}

/// Held–Karp state table indexed by `[[current node, visited mask >> 1]]`.
///
/// A state's mask always holds node 0 and the current node, so bit 0 is dropped from the
/// index. Its cost is the cheapest way to visit the remaining nodes and return to node 0.
struct SubsetTable<W> {
    cost: Array2<W>,
    /// Node to visit next, or [`NO_NEXT`]
    next: Array2<u8>,
}

impl<W: PrimInt + Unsigned + Debug> SubsetTable<W> {
    fn new(closure: &Closure<W>) -> Self {
        let n = closure.node_count();
        debug_assert!(n < NO_NEXT as usize, "next node of {} cannot fit a u8", n);
        let full = (1usize << n) - 1;
        let mut cost = Array2::from_elem((n, 1 << (n - 1)), W::max_value());
        let mut next = Array2::from_elem((n, 1 << (n - 1)), NO_NEXT);

        // Moving on only ever adds bits, so descending masks see every successor final
        for mask in (1..=full).rev().filter(|&mask| mask & 1 == 1) {
            for current in (0..n).filter(|&current| mask & (1 << current) != 0) {
                // Node 0 is only ever current at the start
                if current == 0 && mask != 1 {
                    continue;
                }
                if mask == full {
                    cost[[current, mask >> 1]] = closure.raw_distance(current, 0);
                    continue;
                }

                let mut best = W::max_value();
                let mut best_next = NO_NEXT;
                // Ascending order and a strict comparison: ties go to the lowest node
                for candidate in (0..n).filter(|&candidate| mask & (1 << candidate) == 0) {
                    let total = closure
                        .raw_distance(current, candidate)
                        .saturating_add(cost[[candidate, (mask | 1 << candidate) >> 1]]);
                    if total < best {
                        best = total;
                        best_next = candidate as u8;
                    }
                }
                cost[[current, mask >> 1]] = best;
                next[[current, mask >> 1]] = best_next;
            }
        }

        Self { cost, next }
    }

    fn cost(&self) -> Option<W> {
        Some(self.cost[[0, 0]]).filter(|cost| *cost != W::max_value())
    }

    /// Nodes in the order the table visits them, closed with a final hop back to node 0.
    fn visiting_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.cost.nrows() + 1);
        order.push(0);
        let (mut current, mut mask) = (0, 1usize);
        while self.next[[current, mask >> 1]] != NO_NEXT {
            let next = self.next[[current, mask >> 1]] as NodeId;
            order.push(next);
            mask |= 1 << next;
            current = next;
        }
        order.push(0);
        order
    }
}

/// Replace every hop of a visiting order with the shortest path it stands for,
/// without repeating the node shared by consecutive hops.
fn expand<W: PrimInt + Unsigned + Debug>(
    closure: &Closure<W>,
    order: &[NodeId],
) -> Option<Vec<NodeId>> {
    let mut path = order.first().copied().into_iter().collect::<Vec<_>>();
    for hop in order.windows(2) {
        let segment = closure.path(hop[0], hop[1])?;
        path.extend_from_slice(&segment[1..]);
    }
    Some(path)
}

/// JSON shape handed back to clients: `cost` and `path` on success, otherwise
/// a `reason` with an empty `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TourResponse<W> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<W>,
    pub path: Vec<NodeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl<W> TourResponse<W> {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            cost: None,
            path: vec![],
            reason: Some(reason.into()),
        }
    }
}

impl<W> From<Result<Tour<W>, TourError>> for TourResponse<W> {
    fn from(result: Result<Tour<W>, TourError>) -> Self {
        match result {
            Ok(Tour { cost, path }) => Self {
                cost: Some(cost),
                path,
                reason: None,
            },
            Err(err) => Self::rejected(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn rejects_fewer_than_two_nodes() {
        assert_eq!(
            solve::<u64>(0, &[]),
            Err(TourError::InsufficientNodes(0))
        );
        assert_eq!(
            solve::<u64>(1, &[]),
            Err(TourError::InsufficientNodes(1))
        );
    }

    #[test]
    fn rejects_node_one_past_the_end() {
        assert_eq!(
            solve(3, &[Edge(0, 1, 1u64), Edge(1, 3, 1)]),
            Err(TourError::NodeOutOfRange { node: 3, max: 2 })
        );
        assert_eq!(
            TourError::NodeOutOfRange { node: 3, max: 2 }.to_string(),
            "invalid node 3: nodes must be between 0 and 2"
        );
    }

    #[test]
    fn validation_tolerates_self_loops_and_parallel_roads() {
        assert_eq!(
            validate(2, &[Edge(1, 1, 4u64), Edge(0, 1, 2), Edge(1, 0, 3)]),
            Ok(())
        );
        assert_eq!(
            solve(2, &[Edge(1, 1, 4u64), Edge(0, 1, 2), Edge(1, 0, 3)]),
            Ok(Tour {
                cost: 4,
                path: vec![0, 1, 0]
            })
        );
    }

    #[test]
    fn disconnected_graph_has_no_tour() {
        assert_eq!(
            solve(3, &[Edge(0, 1, 1u64)]),
            Err(TourError::NoHamiltonianCycle)
        );
        assert_eq!(
            solve::<u64>(2, &[]),
            Err(TourError::NoHamiltonianCycle)
        );
    }

    #[test]
    fn square_is_walked_around() {
        let w = 3u64;
        let square = [Edge(0, 1, w), Edge(1, 2, w), Edge(2, 3, w), Edge(3, 0, w)];
        let tour = solve(4, &square).unwrap();
        assert_eq!(tour.cost, 4 * w);
        assert_eq!(tour.path, vec![0, 1, 2, 3, 0]);
    }

    #[test]
    fn return_leg_is_expanded_through_cheaper_detour() {
        let tour = solve(3, &[Edge(0, 1, 1u64), Edge(1, 2, 1), Edge(0, 2, 5)]).unwrap();
        assert_eq!(tour.cost, 4);
        assert_eq!(tour.path, vec![0, 1, 2, 1, 0]);
    }

    #[test]
    fn star_revisits_its_center() {
        let tour = solve(4, &[Edge(0, 1, 2u32), Edge(0, 2, 3), Edge(0, 3, 4)]).unwrap();
        assert_eq!(tour.cost, 18);
        assert_eq!(tour.path, vec![0, 1, 0, 2, 0, 3, 0]);
    }

    #[test]
    fn only_cheapest_parallel_road_counts() {
        let edges = [
            Edge(0, 1, 10u64),
            Edge(0, 1, 1),
            Edge(1, 2, 1),
            Edge(2, 0, 1),
            Edge(2, 0, 8),
        ];
        let tour = solve(3, &edges).unwrap();
        assert_eq!(tour.cost, 3);
        assert_eq!(tour.path, vec![0, 1, 2, 0]);
    }

    #[test]
    fn solving_twice_gives_the_same_tour() {
        let edges = random_edges(&mut StdRng::seed_from_u64(7), 8, 0.5);
        assert_eq!(solve(8, &edges), solve(8, &edges));
    }

    #[test]
    fn weights_reaching_the_sentinel_are_rejected() {
        assert_eq!(
            solve(2, &[Edge(0, 1, u64::MAX)]),
            Err(TourError::WeightTooLarge {
                max: (u64::MAX - 1).to_string()
            })
        );
        assert_eq!(
            solve(3, &[Edge(0, 1, 43u8), Edge(1, 2, 43), Edge(2, 0, 43)]),
            Err(TourError::WeightTooLarge {
                max: "254".to_string()
            })
        );
        assert_eq!(
            TourError::WeightTooLarge {
                max: "254".to_string()
            }
            .to_string(),
            "road weights are too large: a round trip could cost more than 254"
        );
    }

    #[test]
    fn heavy_connected_graph_still_has_a_tour() {
        assert_eq!(
            solve(3, &[Edge(0, 1, 42u8), Edge(1, 2, 42), Edge(2, 0, 42)]).map(|tour| tour.cost),
            Ok(126)
        );
        let heavy = u64::MAX / 5;
        assert_eq!(
            solve(2, &[Edge(0, 1, heavy), Edge(1, 0, heavy)]),
            Ok(Tour {
                cost: 2 * heavy,
                path: vec![0, 1, 0]
            })
        );
    }

    #[test]
    fn table_only_holds_states_containing_node_zero() {
        let square = [Edge(0, 1, 1u64), Edge(1, 2, 1), Edge(2, 3, 1), Edge(3, 0, 1)];
        let table = SubsetTable::new(&Closure::new(4, &square));
        assert_eq!(table.cost.dim(), (4, 8));
        assert_eq!(table.next.dim(), (4, 8));
        assert_eq!(table.cost(), Some(4));
        assert_eq!(table.visiting_order(), vec![0, 1, 2, 3, 0]);
    }

    #[test]
    fn response_carries_either_cost_or_reason() {
        let solved: TourResponse<u64> = solve(2, &[Edge(0, 1, 5u64)]).into();
        assert_eq!(
            serde_json::to_value(&solved).unwrap(),
            serde_json::json!({ "cost": 10, "path": [0, 1, 0] })
        );

        let failed: TourResponse<u64> = solve::<u64>(1, &[]).into();
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            serde_json::json!({ "path": [], "reason": "need at least 2 nodes, got 1" })
        );
    }

    #[test]
    fn matches_brute_force_on_random_graphs() {
        let mut rng = StdRng::seed_from_u64(1234);
        for _ in 0..200 {
            let n = rng.gen_range(2..=7);
            let density = rng.gen_range(0.2..0.9);
            let edges = random_edges(&mut rng, n, density);
            let closure = Closure::new(n, &edges);

            match solve(n, &edges) {
                Ok(tour) => {
                    assert_eq!(Some(tour.cost), brute_force(&closure), "edges: {:?}", edges);
                    assert_eq!(tour.path.first(), Some(&0));
                    assert_eq!(tour.path.last(), Some(&0));
                    assert!((0..n).all(|node| tour.path.contains(&node)));

                    // The literal path walks real roads and costs exactly the tour
                    let walked = tour
                        .path
                        .windows(2)
                        .map(|step| cheapest_road(&edges, step[0], step[1]))
                        .sum::<Option<u64>>();
                    assert_eq!(walked, Some(tour.cost), "path: {:?}", tour.path);
                }
                Err(err) => {
                    assert_eq!(err, TourError::NoHamiltonianCycle);
                    assert!(!closure.is_connected());
                    assert_eq!(brute_force(&closure), None);
                }
            }
        }
    }

    #[test]
    fn every_hop_ends_within_n_steps() {
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..50 {
            let n = rng.gen_range(2..=9);
            let edges = random_edges(&mut rng, n, 0.4);
            let closure = Closure::new(n, &edges);
            for from in 0..n {
                for to in 0..n {
                    if let Some(path) = closure.path(from, to) {
                        assert!(path.len() <= n);
                        assert_eq!(path.last(), Some(&to));
                    } else {
                        assert_eq!(closure.distance(from, to), None);
                    }
                }
            }
        }
    }

    fn random_edges(rng: &mut StdRng, n: usize, density: f64) -> Vec<Edge<u64>> {
        let mut edges = vec![];
        for u in 0..n {
            for v in u + 1..n {
                if rng.gen_bool(density) {
                    edges.push(Edge(u, v, rng.gen_range(1..20)));
                }
            }
        }
        edges
    }

    fn cheapest_road(edges: &[Edge<u64>], a: NodeId, b: NodeId) -> Option<u64> {
        edges
            .iter()
            .filter(|Edge(u, v, _)| (*u, *v) == (a, b) || (*u, *v) == (b, a))
            .map(|Edge(.., w)| *w)
            .min()
    }

    fn brute_force(closure: &Closure<u64>) -> Option<u64> {
        let mut best = None;
        let mut order = (1..closure.node_count()).collect::<Vec<_>>();
        permute(&mut order, 0, &mut |order| {
            let stops = std::iter::once(0)
                .chain(order.iter().copied())
                .chain(std::iter::once(0))
                .collect::<Vec<_>>();
            let cost = stops
                .windows(2)
                .map(|hop| closure.distance(hop[0], hop[1]))
                .sum::<Option<u64>>();
            if let Some(cost) = cost {
                best = Some(best.map_or(cost, |best: u64| best.min(cost)));
            }
        });
        best
    }

    fn permute(items: &mut [NodeId], k: usize, visit: &mut impl FnMut(&[NodeId])) {
        if k == items.len() {
            visit(items);
            return;
        }
        for i in k..items.len() {
            items.swap(k, i);
            permute(items, k + 1, visit);
            items.swap(k, i);
        }
    }
}
