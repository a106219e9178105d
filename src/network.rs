//! # Flow network model
//!
//! A [`FlowNetwork`] is a multigraph of river segments. Nodes are interned
//! point identities, edges are segments whose `(from, to)` pair *is* their
//! current flow direction. Both live in arenas and are addressed by
//! [`NodeId`] / [`EdgeId`] handles; everything a pass needs to remember about
//! them (discovery numbers, distances, visited marks, bridge flags) lives in
//! side-tables owned by that pass.
//!
//! Edges keep their original endpoints for the whole run. Collapsing a
//! biconnected component into a super-node is expressed by a
//! [`SubNetwork`] that resolves member nodes to the super-node, so no edge is
//! ever rewired in the arena itself.

use std::{fmt, hash::Hash};

use ahash::AHashMap;
use bitvec::{bitvec, vec::BitVec};
use derive_more::{From, Into};
use itertools::Itertools;
use tracing::{error, warn};

use crate::error::NetworkError;

pub mod builder;
pub mod subnetwork;

pub use builder::{NetworkBuilder, Segment};
pub use subnetwork::SubNetwork;

crate::define_indexed_vec!(
    /// Handle of a node of a [`FlowNetwork`].
    pub struct NodeId, "n";

    /// Side-table keyed by [`NodeId`].
    pub struct NodeVec;
);

crate::define_indexed_vec!(
    /// Handle of an edge of a [`FlowNetwork`]. Edges built from segments keep
    /// the position of their segment in the input.
    pub struct EdgeId, "e";

    /// Side-table keyed by [`EdgeId`].
    pub struct EdgeVec;
);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DirectionState {
    /// Still to be decided.
    #[default]
    Unknown,
    /// Fixed, either by the input or by this run.
    Known,
}

/// Classification tag of a segment. Only consulted when a synthetic outlet
/// has to be invented for a sink-less component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, From, Into)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SegmentClass(pub u16);

#[derive(Clone, Debug)]
pub struct Node<P> {
    point: Option<P>,
    edges: Vec<EdgeId>,
    sink: bool,
}

impl<P> Node<P> {
    /// The spatial identity, `None` for super-nodes.
    pub fn point(&self) -> Option<&P> {
        self.point.as_ref()
    }

    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }

    pub fn degree(&self) -> usize {
        self.edges.len()
    }

    pub fn is_sink(&self) -> bool {
        self.sink
    }

    pub fn is_super_node(&self) -> bool {
        self.point.is_none()
    }
}

#[derive(Clone, Debug)]
pub struct Edge {
    from: NodeId,
    to: NodeId,
    state: DirectionState,
    original: DirectionState,
    length: f64,
    class: SegmentClass,
    reversed: bool,
}

impl Edge {
    pub fn from(&self) -> NodeId {
        self.from
    }

    pub fn to(&self) -> NodeId {
        self.to
    }

    pub fn endpoints(&self) -> (NodeId, NodeId) {
        (self.from, self.to)
    }

    pub fn state(&self) -> DirectionState {
        self.state
    }

    pub fn original_state(&self) -> DirectionState {
        self.original
    }

    pub fn is_known(&self) -> bool {
        self.state == DirectionState::Known
    }

    /// Whether the direction was fixed by the input and may never change.
    pub fn is_locked(&self) -> bool {
        self.original == DirectionState::Known
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn class(&self) -> SegmentClass {
        self.class
    }

    /// Whether `(from, to)` is the reverse of the input order.
    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// The endpoint that is not `node`, if `node` is an endpoint at all.
    pub fn opposite(&self, node: NodeId) -> Option<NodeId> {
        if self.from == node {
            Some(self.to)
        } else if self.to == node {
            Some(self.from)
        } else {
            None
        }
    }

    fn connects(&self, a: NodeId, b: NodeId) -> bool {
        (self.from == a && self.to == b) || (self.from == b && self.to == a)
    }
}

#[derive(Clone, Debug)]
pub struct FlowNetwork<P> {
    nodes: NodeVec<Node<P>>,
    edges: EdgeVec<Edge>,
    points: AHashMap<P, NodeId>,
    /// Parallel segments set aside behind their representative.
    same_edges: EdgeVec<Vec<EdgeId>>,
    shadowed: BitVec,
}

impl<P: Hash + Eq + Clone> FlowNetwork<P> {
    pub fn from_segments(segments: impl IntoIterator<Item = Segment<P>>) -> Self {
        let mut builder = NetworkBuilder::new();
        for segment in segments {
            builder.add_segment(segment);
        }
        builder.build()
    }

    pub fn node_at(&self, point: &P) -> Option<NodeId> {
        self.points.get(point).copied()
    }
}

impl<P> FlowNetwork<P> {
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, id: NodeId) -> &Node<P> {
        &self.nodes[id]
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node<P>)> {
        self.nodes.iter()
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.edges.iter()
    }

    pub fn point(&self, id: NodeId) -> Option<&P> {
        self.nodes.get(id).and_then(Node::point)
    }

    /// Edges at `node` that take part in processing (set-aside duplicates are
    /// not listed).
    pub fn incident(&self, node: NodeId) -> &[EdgeId] {
        &self.nodes[node].edges
    }

    pub fn mark_sink(&mut self, node: NodeId) -> Result<(), NetworkError> {
        let node = self.nodes.get_mut(node).ok_or(NetworkError::NoNode(node))?;
        node.sink = true;
        Ok(())
    }

    /// Adds a point-less node standing in for a collapsed component.
    pub fn add_super_node(&mut self) -> NodeId {
        self.nodes.push(Node {
            point: None,
            edges: Vec::new(),
            sink: false,
        })
    }

    /// Swaps `(from, to)` and marks the edge known.
    ///
    /// Flipping an edge whose direction was known on input is a defect in the
    /// caller; it is logged and refused.
    pub fn flip(&mut self, id: EdgeId) -> Result<(), NetworkError> {
        let edge = self.edges.get_mut(id).ok_or(NetworkError::NoEdge(id))?;
        if edge.is_locked() {
            error!(edge = %id, "attempted to flip an edge whose direction was known on input");
            return Err(NetworkError::FlipKnownEdge(id));
        }
        std::mem::swap(&mut edge.from, &mut edge.to);
        edge.reversed = !edge.reversed;
        edge.state = DirectionState::Known;
        Ok(())
    }

    /// Makes the edge flow `from -> to`, flipping it if needed, and marks it
    /// known. Returns whether a flip happened.
    pub fn orient(&mut self, id: EdgeId, from: NodeId, to: NodeId) -> Result<bool, NetworkError> {
        let edge = self.edges.get(id).ok_or(NetworkError::NoEdge(id))?;
        debug_assert!(edge.connects(from, to), "{id} does not connect {from} and {to}");
        if edge.from == from && edge.to == to {
            self.edges[id].state = DirectionState::Known;
            Ok(false)
        } else {
            self.flip(id)?;
            Ok(true)
        }
    }

    /// Marks the edge known in its current direction.
    pub fn fix(&mut self, id: EdgeId) {
        self.edges[id].state = DirectionState::Known;
    }

    /// Forgets a direction given during this run. Edges known on input keep
    /// theirs.
    pub fn release(&mut self, id: EdgeId) {
        let edge = &mut self.edges[id];
        if !edge.is_locked() {
            edge.state = DirectionState::Unknown;
        }
    }

    pub fn same_edges(&self, id: EdgeId) -> &[EdgeId] {
        &self.same_edges[id]
    }

    /// Whether the edge was set aside as a duplicate of another.
    pub fn is_shadowed(&self, id: EdgeId) -> bool {
        self.shadowed[id.0]
    }

    /// Sets aside all but one edge of every group of parallel edges.
    ///
    /// The representative is the first edge of the group whose direction was
    /// known on input, otherwise the first edge of the group. The others are
    /// removed from the incidence lists and remembered as its same-edges.
    /// Fails on the first self loop. Returns the number of edges set aside.
    pub fn remove_duplicate_edges(&mut self) -> Result<usize, NetworkError> {
        let mut groups: AHashMap<(NodeId, NodeId), Vec<EdgeId>> = AHashMap::new();
        let mut order = Vec::new();

        for (id, edge) in self.edges.iter() {
            if self.shadowed[id.0] {
                continue;
            }
            if edge.from == edge.to {
                return Err(NetworkError::SelfLoop {
                    edge: id,
                    node: edge.from,
                });
            }
            let key = (edge.from.min(edge.to), edge.from.max(edge.to));
            let group = groups.entry(key).or_insert_with(|| {
                order.push(key);
                Vec::new()
            });
            group.push(id);
        }

        let mut removed = 0;
        for key in order {
            let group = &groups[&key];
            if group.len() < 2 {
                continue;
            }
            let representative = group
                .iter()
                .copied()
                .find(|e| self.edges[*e].is_locked())
                .unwrap_or(group[0]);

            for &duplicate in group.iter().filter(|e| **e != representative) {
                self.shadowed.set(duplicate.0, true);
                self.same_edges[representative].push(duplicate);
                let (a, b) = key;
                self.nodes[a].edges.retain(|e| *e != duplicate);
                self.nodes[b].edges.retain(|e| *e != duplicate);
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Copies the representative's final direction onto its same-edges.
    ///
    /// A same-edge whose input direction is known and disagrees cannot follow;
    /// it is logged and left as it is. Returns the same-edges that now agree
    /// with their representative.
    pub fn align_same_edges(&mut self, representative: EdgeId) -> Result<Vec<EdgeId>, NetworkError> {
        let (from, to) = self.edges[representative].endpoints();
        let mut aligned = Vec::with_capacity(self.same_edges[representative].len());

        for duplicate in self.same_edges[representative].clone() {
            let edge = &self.edges[duplicate];
            if edge.from == from {
                self.fix(duplicate);
            } else if edge.is_locked() {
                warn!(
                    edge = %duplicate,
                    representative = %representative,
                    "duplicate segment is known to flow against its representative; left unchanged"
                );
                continue;
            } else {
                self.flip(duplicate)?;
            }
            debug_assert_eq!(self.edges[duplicate].to, to);
            aligned.push(duplicate);
        }
        Ok(aligned)
    }

    /// Edges whose final direction differs from their input direction.
    pub fn reversed_edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.iter().filter(|(_, e)| e.reversed).map(|(id, _)| id)
    }

    pub fn unknown_edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.iter().filter(|(_, e)| !e.is_known()).map(|(id, _)| id)
    }

    fn label(&self, node: NodeId) -> String
    where
        P: fmt::Display,
    {
        match self.point(node) {
            Some(p) => p.to_string(),
            None => node.to_string(),
        }
    }
}

impl<P: fmt::Display> fmt::Display for FlowNetwork<P> {
    /// One line per edge: `e<id>: <from> -> <to>`, with `?` marking edges
    /// whose direction is still unknown.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines = self.edges.iter().map(|(id, edge)| {
            format!(
                "{id}: {} {} {}",
                self.label(edge.from),
                if edge.is_known() { "->" } else { "-?" },
                self.label(edge.to)
            )
        });
        write!(f, "{}", lines.format("\n"))
    }
}

impl<P> FlowNetwork<P> {
    pub(crate) fn from_parts(
        nodes: NodeVec<Node<P>>,
        edges: EdgeVec<Edge>,
        points: AHashMap<P, NodeId>,
    ) -> Self {
        let same_edges = EdgeVec::filled(edges.len(), Vec::new());
        let shadowed = bitvec![0; edges.len()];
        FlowNetwork {
            nodes,
            edges,
            points,
            same_edges,
            shadowed,
        }
    }
}

#[cfg(test)]
mod tests;
