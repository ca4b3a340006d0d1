use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Edge, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FuelError {
    #[error("invalid seats value {0}: every car needs at least one seat")]
    InvalidSeats(u64),
}

/// One tree edge driven towards node 0, serialized as `[from, to, cars, weight]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leg(pub NodeId, pub NodeId, pub u64, pub u64);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuelReport {
    pub min_fuel: u64,
    /// Legs in the order their subtrees finish
    pub paths: Vec<Leg>,
}

/// Intermediate state of the depth-first walk, in place of a call stack frame.
struct Frame {
    node: NodeId,
    parent: Option<NodeId>,
    weight_to_parent: u64,
    /// Position in the adjacency list of `node`
    neighbor: usize,
    representatives: u64,
}

impl Frame {
    fn new(node: NodeId, parent: Option<NodeId>, weight_to_parent: u64) -> Self {
        Self {
            node,
            parent,
            weight_to_parent,
            neighbor: 0,
            representatives: 1,
        }
    }
}

/// Fuel burnt when every node sends one representative to node 0.
///
/// Roads are explored depth-first from node 0, neighbors in the order roads were given,
/// and only the resulting spanning tree is driven. Everyone gathered in a subtree rides
/// across the edge to its parent in as few cars as `seats` allows, each car burning the
/// edge weight.
pub fn calculate_fuel(edges: &[Edge<u64>], seats: u64) -> Result<FuelReport, FuelError> {
    if seats < 1 {
        return Err(FuelError::InvalidSeats(seats));
    }

    // Node ids are arbitrary labels, so only the ones roads mention get a list.
    let mut adjacency: HashMap<NodeId, Vec<(NodeId, u64)>> = HashMap::default();
    for &Edge(u, v, weight) in edges {
        adjacency.entry(u).or_default().push((v, weight));
        adjacency.entry(v).or_default().push((u, weight));
    }

    let mut report = FuelReport::default();
    let mut visited = HashSet::default();
    visited.insert(0);
    let mut stack = vec![Frame::new(0, None, 0)];

    while let Some(frame) = stack.last_mut() {
        let next = adjacency
            .get(&frame.node)
            .and_then(|neighbors| neighbors.get(frame.neighbor))
            .copied();
        if let Some((neighbor, weight)) = next {
            frame.neighbor += 1;
            let (node, parent) = (frame.node, frame.parent);
            if parent != Some(neighbor) && visited.insert(neighbor) {
                stack.push(Frame::new(neighbor, Some(node), weight));
            }
            continue;
        }

        let Some(finished) = stack.pop() else {
            break;
        };
        if let Some(parent) = stack.last_mut() {
            let cars = finished.representatives.div_ceil(seats);
            report.min_fuel = report
                .min_fuel
                .saturating_add(cars.saturating_mul(finished.weight_to_parent));
            report.paths.push(Leg(
                finished.node,
                parent.node,
                cars,
                finished.weight_to_parent,
            ));
            parent.representatives += finished.representatives;
        }
    }

    Ok(report)
}
