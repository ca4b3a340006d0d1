use serde::{Deserialize, Serialize};

/// All-pairs shortest paths with the [Floyd–Warshall algorithm](https://en.wikipedia.org/wiki/Floyd%E2%80%93Warshall_algorithm)
pub mod closure;
/// Fuel needed to car-pool everyone to a meeting point over a [depth-first spanning tree](https://en.wikipedia.org/wiki/Depth-first_search)
pub mod fuel;
/// Solve the [Traveling Salesman Problem (TSP)](https://en.wikipedia.org/wiki/Travelling_salesman_problem) exactly
pub mod tsp;

/// Nodes are labeled `0..n`
pub type NodeId = usize;

/// An undirected road, serialized as `[u, v, weight]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge<W>(pub NodeId, pub NodeId, pub W);

/// A road graph as clients submit and store it.
///
/// `n` is authoritative: nodes without any road still count.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Instance<W> {
    #[serde(default)]
    pub roads: Vec<Edge<W>>,
    #[serde(default)]
    pub n: usize,
}

#[cfg(test)]
#[test]
fn instance_uses_road_list_format() {
    let instance: Instance<u64> =
        serde_json::from_str(r#"{"roads": [[0, 1, 3], [1, 2, 4]], "n": 3}"#).unwrap();
    pretty_assertions::assert_eq!(
        instance,
        Instance {
            roads: vec![Edge(0, 1, 3), Edge(1, 2, 4)],
            n: 3
        }
    );

    let empty: Instance<u64> = serde_json::from_str("{}").unwrap();
    assert_eq!(empty, Instance::default());
}
