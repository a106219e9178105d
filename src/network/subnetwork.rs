use std::collections::VecDeque;

use ahash::AHashMap;
use bitvec::{bitvec, vec::BitVec};
use indexmap::{IndexMap, IndexSet};

use super::{EdgeId, FlowNetwork, NodeId};
use crate::error::NetworkError;

/// A view of part of a [`FlowNetwork`]: an edge set, the nodes it touches and
/// its own adjacency.
///
/// Member nodes of collapsed components resolve to their super-node, so the
/// bridge tree is just a `SubNetwork` over the bridges whose collapse table is
/// filled in. A biconnected component extracted by the partitioner remembers
/// the super-node that stands for it in the bridge tree.
#[derive(Clone, Debug, Default)]
pub struct SubNetwork {
    adjacency: IndexMap<NodeId, Vec<EdgeId>>,
    edges: IndexSet<EdgeId>,
    collapsed: AHashMap<NodeId, NodeId>,
    super_node: Option<NodeId>,
}

impl SubNetwork {
    pub fn from_edges<P>(network: &FlowNetwork<P>, edges: impl IntoIterator<Item = EdgeId>) -> Self {
        Self::collapsed(network, edges, AHashMap::new())
    }

    /// A view over `edges` in which every key of `collapsed` is replaced by its
    /// value.
    pub fn collapsed<P>(
        network: &FlowNetwork<P>,
        edges: impl IntoIterator<Item = EdgeId>,
        collapsed: AHashMap<NodeId, NodeId>,
    ) -> Self {
        let mut sub = SubNetwork {
            collapsed,
            ..Default::default()
        };
        for e in edges {
            if !sub.edges.insert(e) {
                continue;
            }
            let (from, to) = network.edge(e).endpoints();
            let (from, to) = (sub.resolve(from), sub.resolve(to));
            sub.adjacency.entry(from).or_default().push(e);
            sub.adjacency.entry(to).or_default().push(e);
        }
        sub
    }

    /// The connected component of `start`, ignoring directions.
    pub fn component_of<P>(network: &FlowNetwork<P>, start: NodeId) -> Self {
        let mut seen_nodes: BitVec = bitvec![0; network.n_nodes()];
        let mut seen_edges: BitVec = bitvec![0; network.n_edges()];
        let mut edges = Vec::new();
        let mut queue = VecDeque::from([start]);
        seen_nodes.set(start.0, true);

        while let Some(node) = queue.pop_front() {
            for &e in network.incident(node) {
                if seen_edges[e.0] {
                    continue;
                }
                seen_edges.set(e.0, true);
                edges.push(e);
                if let Some(next) = network.edge(e).opposite(node) {
                    if !seen_nodes[next.0] {
                        seen_nodes.set(next.0, true);
                        queue.push_back(next);
                    }
                }
            }
        }

        let mut sub = Self::from_edges(network, edges);
        sub.add_node(start);
        sub
    }

    pub fn with_super_node(mut self, super_node: NodeId) -> Self {
        self.super_node = Some(super_node);
        self
    }

    /// Includes `node` even if no edge of the view touches it.
    pub fn add_node(&mut self, node: NodeId) {
        let node = self.resolve(node);
        self.adjacency.entry(node).or_default();
    }

    /// The node standing in for `node` inside this view.
    pub fn resolve(&self, node: NodeId) -> NodeId {
        self.collapsed.get(&node).copied().unwrap_or(node)
    }

    /// The super-node this component was collapsed into, if any.
    pub fn super_node(&self) -> Option<NodeId> {
        self.super_node
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.adjacency.keys().copied()
    }

    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.iter().copied()
    }

    pub fn n_nodes(&self) -> usize {
        self.adjacency.len()
    }

    pub fn n_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.adjacency.contains_key(&node)
    }

    /// Where `edge` sits in [`SubNetwork::edges`].
    pub fn edge_position(&self, edge: EdgeId) -> Option<usize> {
        self.edges.get_index_of(&edge)
    }

    pub fn incident(&self, node: NodeId) -> &[EdgeId] {
        self.adjacency.get(&node).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn degree(&self, node: NodeId) -> usize {
        self.incident(node).len()
    }

    pub fn from<P>(&self, network: &FlowNetwork<P>, edge: EdgeId) -> NodeId {
        self.resolve(network.edge(edge).from())
    }

    pub fn to<P>(&self, network: &FlowNetwork<P>, edge: EdgeId) -> NodeId {
        self.resolve(network.edge(edge).to())
    }

    /// The far end of `edge` seen from `node`.
    pub fn opposite<P>(&self, network: &FlowNetwork<P>, edge: EdgeId, node: NodeId) -> NodeId {
        let from = self.from(network, edge);
        if from == node {
            self.to(network, edge)
        } else {
            from
        }
    }

    /// Whether `edge` is known and flows into `node`.
    pub fn flows_into<P>(&self, network: &FlowNetwork<P>, edge: EdgeId, node: NodeId) -> bool {
        network.edge(edge).is_known() && self.to(network, edge) == node
    }

    /// Whether `edge` is known and flows out of `node`.
    pub fn flows_out_of<P>(&self, network: &FlowNetwork<P>, edge: EdgeId, node: NodeId) -> bool {
        network.edge(edge).is_known() && self.from(network, edge) == node
    }

    /// Makes `edge` flow into `node` (a node of this view), flipping it if
    /// needed. Returns whether a flip happened.
    pub fn orient_into<P>(
        &self,
        network: &mut FlowNetwork<P>,
        edge: EdgeId,
        node: NodeId,
    ) -> Result<bool, NetworkError> {
        let (a, b) = network.edge(edge).endpoints();
        if self.resolve(b) == node {
            network.orient(edge, a, b)
        } else {
            network.orient(edge, b, a)
        }
    }

    /// Known edges flowing into `node`.
    pub fn known_inflow<P>(&self, network: &FlowNetwork<P>, node: NodeId) -> usize {
        self.incident(node)
            .iter()
            .filter(|e| self.flows_into(network, **e, node))
            .count()
    }
}
