use std::{cmp::Ordering, collections::BinaryHeap};

use ahash::{AHashMap, AHashSet};

use crate::network::{EdgeId, FlowNetwork, NodeId, SubNetwork};

/// A walk through a network, `nodes[i] -> nodes[i + 1]` along `edges[i]`.
#[derive(Clone, Debug, PartialEq)]
pub struct FlowPath {
    pub nodes: Vec<NodeId>,
    pub edges: Vec<EdgeId>,
    pub cost: f64,
}

impl FlowPath {
    pub fn start(&self) -> NodeId {
        self.nodes[0]
    }

    pub fn end(&self) -> NodeId {
        self.nodes[self.nodes.len() - 1]
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// `(from, edge, to)` for every step of the walk.
    pub fn steps(&self) -> impl Iterator<Item = (NodeId, EdgeId, NodeId)> + '_ {
        self.edges
            .iter()
            .enumerate()
            .map(|(i, e)| (self.nodes[i], *e, self.nodes[i + 1]))
    }

    /// Prepends the step `from -> self.start()` along `edge`.
    pub fn prepend(mut self, from: NodeId, edge: EdgeId, length: f64) -> Self {
        self.nodes.insert(0, from);
        self.edges.insert(0, edge);
        self.cost += length;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct State {
    cost: f64,
    node: NodeId,
}

impl Eq for State {}

impl Ord for State {
    // Reversed so the max-heap pops the cheapest state, lowest node first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Whether `edge` may be walked starting from `node`: a known edge only
/// along its direction, an unknown one either way.
pub fn traversable<P>(network: &FlowNetwork<P>, sub: &SubNetwork, edge: EdgeId, node: NodeId) -> bool {
    !network.edge(edge).is_known() || sub.from(network, edge) == node
}

/// Which way a search runs against known edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Walk {
    /// Along the flow, from a node toward the places it can drain to.
    Downstream,
    /// Against the flow, from targets toward the nodes that can drain there.
    Upstream,
}

struct Search {
    dist: AHashMap<NodeId, f64>,
    prev: AHashMap<NodeId, (NodeId, EdgeId)>,
    reached: Option<NodeId>,
}

fn dijkstra<P>(
    network: &FlowNetwork<P>,
    sub: &SubNetwork,
    sources: impl IntoIterator<Item = NodeId>,
    walk: Walk,
    is_target: impl Fn(NodeId) -> bool,
    avoid: impl Fn(NodeId) -> bool,
) -> Search {
    let mut dist = AHashMap::new();
    let mut prev = AHashMap::new();
    let mut settled = AHashSet::new();
    let mut heap = BinaryHeap::new();
    for source in sources {
        dist.insert(source, 0.0);
        heap.push(State {
            cost: 0.0,
            node: source,
        });
    }

    while let Some(State { cost, node }) = heap.pop() {
        if !settled.insert(node) {
            continue;
        }
        if is_target(node) {
            return Search {
                dist,
                prev,
                reached: Some(node),
            };
        }

        for &edge in sub.incident(node) {
            let open = match walk {
                Walk::Downstream => traversable(network, sub, edge, node),
                Walk::Upstream => !network.edge(edge).is_known() || sub.to(network, edge) == node,
            };
            if !open {
                continue;
            }
            let next = sub.opposite(network, edge, node);
            if settled.contains(&next) || avoid(next) {
                continue;
            }
            let candidate = cost + network.edge(edge).length();
            let better = dist.get(&next).map_or(true, |d| candidate < *d);
            if better {
                dist.insert(next, candidate);
                prev.insert(next, (node, edge));
                heap.push(State {
                    cost: candidate,
                    node: next,
                });
            }
        }
    }

    Search {
        dist,
        prev,
        reached: None,
    }
}

/// The cheapest path from `source` to the nearest member of `sinks` that
/// walks known edges only along their direction. `None` if no sink can be
/// reached that way.
pub fn shortest_path<P>(
    network: &FlowNetwork<P>,
    sub: &SubNetwork,
    source: NodeId,
    sinks: &AHashSet<NodeId>,
) -> Option<FlowPath> {
    shortest_path_avoiding(network, sub, source, |n| sinks.contains(&n), |_| false)
}

/// Like [`shortest_path`], stopping at the first node accepted by
/// `is_target` and never entering a node accepted by `avoid`.
pub fn shortest_path_avoiding<P>(
    network: &FlowNetwork<P>,
    sub: &SubNetwork,
    source: NodeId,
    is_target: impl Fn(NodeId) -> bool,
    avoid: impl Fn(NodeId) -> bool,
) -> Option<FlowPath> {
    let search = dijkstra(network, sub, [source], Walk::Downstream, is_target, avoid);
    let target = search.reached?;

    let mut nodes = vec![target];
    let mut edges = Vec::new();
    let mut cursor = target;
    while let Some(&(before, edge)) = search.prev.get(&cursor) {
        nodes.push(before);
        edges.push(edge);
        cursor = before;
    }
    nodes.reverse();
    edges.reverse();

    Some(FlowPath {
        nodes,
        edges,
        cost: search.dist.get(&target).copied().unwrap_or_default(),
    })
}

/// Constrained distances from `source` to every node it can reach.
pub fn distances<P>(network: &FlowNetwork<P>, sub: &SubNetwork, source: NodeId) -> AHashMap<NodeId, f64> {
    dijkstra(network, sub, [source], Walk::Downstream, |_| false, |_| false).dist
}

/// Constrained distance from every node that can drain into one of
/// `targets` to the nearest of them, from a single search.
pub fn distances_to<P>(
    network: &FlowNetwork<P>,
    sub: &SubNetwork,
    targets: impl IntoIterator<Item = NodeId>,
) -> AHashMap<NodeId, f64> {
    dijkstra(network, sub, targets, Walk::Upstream, |_| false, |_| false).dist
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{network::Segment, test_networks::points};

    fn node(network: &FlowNetwork<String>, p: &str) -> NodeId {
        network.node_at(&p.to_string()).unwrap()
    }

    #[test]
    fn picks_the_cheaper_arm() {
        let network = FlowNetwork::from_segments([
            Segment::new("A".to_string(), "B".to_string(), 1.0),
            Segment::new("B".to_string(), "S".to_string(), 1.0),
            Segment::new("A".to_string(), "C".to_string(), 1.0),
            Segment::new("C".to_string(), "S".to_string(), 5.0),
        ]);
        let sub = SubNetwork::component_of(&network, NodeId(0));
        let sinks = AHashSet::from_iter([node(&network, "S")]);

        let path = shortest_path(&network, &sub, node(&network, "A"), &sinks).unwrap();
        assert_eq!(path.nodes, points(&network, ["A", "B", "S"]));
        assert_eq!(path.cost, 2.0);
    }

    #[test]
    fn known_edges_are_one_way() {
        let network = FlowNetwork::from_segments([
            Segment::known("B".to_string(), "A".to_string(), 1.0),
            Segment::new("B".to_string(), "S".to_string(), 1.0),
            Segment::new("A".to_string(), "C".to_string(), 1.0),
            Segment::new("C".to_string(), "S".to_string(), 5.0),
        ]);
        let sub = SubNetwork::component_of(&network, NodeId(0));
        let sinks = AHashSet::from_iter([node(&network, "S")]);

        let path = shortest_path(&network, &sub, node(&network, "A"), &sinks).unwrap();
        assert_eq!(path.nodes, points(&network, ["A", "C", "S"]));
        for (from, edge, _) in path.steps() {
            assert!(traversable(&network, &sub, edge, from));
        }
    }

    #[test]
    fn blocked_sink_yields_nothing() {
        let network = FlowNetwork::from_segments([
            Segment::known("S".to_string(), "A".to_string(), 1.0),
            Segment::new("A".to_string(), "B".to_string(), 1.0),
        ]);
        let sub = SubNetwork::component_of(&network, NodeId(0));
        let sinks = AHashSet::from_iter([node(&network, "S")]);
        assert!(shortest_path(&network, &sub, node(&network, "B"), &sinks).is_none());
    }

    #[test]
    fn source_on_a_sink_is_an_empty_path() {
        let network = FlowNetwork::from_segments([Segment::new("S".to_string(), "A".to_string(), 1.0)]);
        let sub = SubNetwork::component_of(&network, NodeId(0));
        let s = node(&network, "S");
        let path = shortest_path(&network, &sub, s, &AHashSet::from_iter([s])).unwrap();
        assert!(path.is_empty());
        assert_eq!(path.start(), s);
        assert_eq!(path.end(), s);
    }

    #[test]
    fn avoided_nodes_are_never_entered() {
        let network = FlowNetwork::from_segments([
            Segment::new("A".to_string(), "B".to_string(), 1.0),
            Segment::new("B".to_string(), "S".to_string(), 1.0),
            Segment::new("A".to_string(), "C".to_string(), 1.0),
            Segment::new("C".to_string(), "S".to_string(), 5.0),
        ]);
        let sub = SubNetwork::component_of(&network, NodeId(0));
        let (s, b) = (node(&network, "S"), node(&network, "B"));

        let path =
            shortest_path_avoiding(&network, &sub, node(&network, "A"), |n| n == s, |n| n == b).unwrap();
        assert_eq!(path.nodes, points(&network, ["A", "C", "S"]));
        assert_eq!(path.cost, 6.0);
    }

    #[test]
    fn distances_cover_reachable_nodes() {
        let network = FlowNetwork::from_segments([
            Segment::new("A".to_string(), "B".to_string(), 2.0),
            Segment::known("C".to_string(), "B".to_string(), 1.0),
        ]);
        let sub = SubNetwork::component_of(&network, NodeId(0));
        let dist = distances(&network, &sub, node(&network, "A"));
        assert_eq!(dist.len(), 2);
        assert_eq!(dist[&node(&network, "B")], 2.0);
        assert!(!dist.contains_key(&node(&network, "C")));
    }

    #[test]
    fn distances_to_walk_against_the_flow() {
        // C can only drain through B; D is cut off by a known edge out of S.
        let network = FlowNetwork::from_segments([
            Segment::new("B".to_string(), "S".to_string(), 1.0),
            Segment::known("C".to_string(), "B".to_string(), 2.0),
            Segment::known("S".to_string(), "D".to_string(), 1.0),
        ]);
        let sub = SubNetwork::component_of(&network, NodeId(0));
        let dist = distances_to(&network, &sub, [node(&network, "S")]);

        assert_eq!(dist[&node(&network, "S")], 0.0);
        assert_eq!(dist[&node(&network, "B")], 1.0);
        assert_eq!(dist[&node(&network, "C")], 3.0);
        assert!(!dist.contains_key(&node(&network, "D")));
    }
}
