use ahash::AHashMap;
use bitvec::{bitvec, vec::BitVec};
use tracing::debug;

use crate::{
    error::FlowError,
    network::{EdgeId, FlowNetwork, NodeId, SubNetwork},
};

/// A region reduced to a tree: every biconnected component has been taken
/// out and replaced by a super-node, leaving only bridges between them.
#[derive(Clone, Debug)]
pub struct BridgeTree {
    /// The reduced graph. Its edges are exactly the bridges of the region.
    pub tree: SubNetwork,
    /// The extracted components, each remembering its super-node.
    pub components: Vec<SubNetwork>,
}

impl BridgeTree {
    /// Where `node` lives in the reduced tree.
    pub fn resolve(&self, node: NodeId) -> NodeId {
        self.tree.resolve(node)
    }
}

/// Splits `region` along `bridges` into its biconnected components.
///
/// Every component is collected by a traversal that never crosses a bridge,
/// extracted as its own [`SubNetwork`] and collapsed into a fresh super-node
/// of `network`. Bridges touching a collapsed node resolve to the super-node
/// in the returned tree.
pub fn partition<P>(
    network: &mut FlowNetwork<P>,
    region: &SubNetwork,
    bridges: &BitVec,
) -> Result<BridgeTree, FlowError> {
    let mut assigned: BitVec = bitvec![0; network.n_edges()];
    let mut collapsed = AHashMap::new();
    let mut components = Vec::new();

    for seed in region.edges() {
        if bridges[seed.0] || assigned[seed.0] {
            continue;
        }
        let edges = collect_component(network, region, bridges, &mut assigned, seed);
        if edges.len() == 1 {
            return Err(FlowError::SingleEdgeComponent { edge: edges[0] });
        }

        let super_node = network.add_super_node();
        let component = SubNetwork::from_edges(network, edges).with_super_node(super_node);
        for node in component.nodes() {
            collapsed.insert(node, super_node);
        }
        components.push(component);
    }

    let mut tree = SubNetwork::collapsed(
        network,
        region.edges().filter(|e| bridges[e.0]),
        collapsed,
    );
    for node in region.nodes() {
        tree.add_node(node);
    }

    debug!(
        components = components.len(),
        tree_nodes = tree.n_nodes(),
        bridges = tree.n_edges(),
        "region partitioned"
    );
    Ok(BridgeTree { tree, components })
}

/// Edges reachable from `seed` without crossing a bridge.
fn collect_component<P>(
    network: &FlowNetwork<P>,
    region: &SubNetwork,
    bridges: &BitVec,
    assigned: &mut BitVec,
    seed: EdgeId,
) -> Vec<EdgeId> {
    let mut edges = vec![seed];
    assigned.set(seed.0, true);
    let (a, b) = network.edge(seed).endpoints();
    let mut stack = vec![a, b];

    while let Some(node) = stack.pop() {
        for &e in region.incident(node) {
            if bridges[e.0] || assigned[e.0] {
                continue;
            }
            assigned.set(e.0, true);
            edges.push(e);
            stack.push(region.opposite(network, e, node));
        }
    }
    edges
}

#[cfg(test)]
mod test {
    use bitvec::order::Lsb0;

    use super::*;
    use crate::{algorithms::bridges::find_bridges, test_networks::TestNetwork};

    fn partitioned(fixture: TestNetwork) -> (FlowNetwork<String>, BridgeTree) {
        let mut network = fixture.network();
        let region = SubNetwork::component_of(&network, NodeId(0));
        let bridges = find_bridges(&network, &region, NodeId(0));
        let tree = partition(&mut network, &region, &bridges).unwrap();
        (network, tree)
    }

    #[test]
    fn tree_is_left_alone() {
        let (network, tree) = partitioned(TestNetwork::Path(4));
        assert!(tree.components.is_empty());
        assert_eq!(tree.tree.n_edges(), 3);
        assert_eq!(tree.tree.n_nodes(), 4);
        assert_eq!(network.n_nodes(), 4);
    }

    #[test]
    fn ring_collapses_to_a_single_node() {
        let (network, tree) = partitioned(TestNetwork::Ring(5));
        assert_eq!(tree.components.len(), 1);
        assert_eq!(tree.components[0].n_edges(), 5);
        assert_eq!(tree.tree.n_edges(), 0);
        assert_eq!(tree.tree.n_nodes(), 1);

        let super_node = tree.components[0].super_node().unwrap();
        assert!(network.node(super_node).is_super_node());
        assert_eq!(tree.resolve(NodeId(3)), super_node);
    }

    #[test]
    fn bridges_are_rewired_to_super_nodes() {
        let (network, tree) = partitioned(TestNetwork::Dumbbell(3, 4));
        assert_eq!(tree.components.len(), 2);
        assert_eq!(tree.tree.n_edges(), 1);
        assert_eq!(tree.tree.n_nodes(), 2);

        let bridge = tree.tree.edges().next().unwrap();
        let (from, to) = (tree.tree.from(&network, bridge), tree.tree.to(&network, bridge));
        let supers: Vec<_> = tree.components.iter().filter_map(|c| c.super_node()).collect();
        assert!(supers.contains(&from) && supers.contains(&to));
        assert_ne!(from, to);
    }

    #[test]
    fn pendant_keeps_its_own_tree_node() {
        let (network, tree) = partitioned(TestNetwork::RingWithOutlet(4));
        let outlet = network.node_at(&"S".to_string()).unwrap();
        assert_eq!(tree.resolve(outlet), outlet);
        assert_eq!(tree.tree.degree(outlet), 1);
        assert_eq!(tree.components[0].n_nodes(), 4);
    }

    #[test]
    fn lone_non_bridge_edge_is_fatal() {
        let mut network = TestNetwork::Path(3).network();
        let region = SubNetwork::component_of(&network, NodeId(0));
        let bridges: BitVec = bitvec![usize, Lsb0; 0, 1];
        let err = partition(&mut network, &region, &bridges).unwrap_err();
        assert_eq!(err, FlowError::SingleEdgeComponent { edge: EdgeId(0) });
    }
}
