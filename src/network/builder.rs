use std::hash::Hash;

use ahash::AHashMap;

use super::{DirectionState, Edge, EdgeVec, FlowNetwork, Node, NodeId, NodeVec, SegmentClass};

/// One input segment: two endpoint identities and a length. When the
/// direction is known, `a -> b` is the fixed flow direction.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Segment<P> {
    pub a: P,
    pub b: P,
    pub length: f64,
    pub class: SegmentClass,
    pub direction: DirectionState,
}

impl<P> Segment<P> {
    pub fn new(a: P, b: P, length: f64) -> Self {
        Segment {
            a,
            b,
            length,
            class: SegmentClass::default(),
            direction: DirectionState::Unknown,
        }
    }

    /// A segment known to flow `from -> to`.
    pub fn known(from: P, to: P, length: f64) -> Self {
        Segment {
            direction: DirectionState::Known,
            ..Segment::new(from, to, length)
        }
    }

    pub fn with_class(mut self, class: impl Into<SegmentClass>) -> Self {
        self.class = class.into();
        self
    }
}

/// Interns point identities into nodes while segments are added.
#[derive(Clone, Debug)]
pub struct NetworkBuilder<P> {
    nodes: NodeVec<Node<P>>,
    edges: EdgeVec<Edge>,
    points: AHashMap<P, NodeId>,
}

impl<P: Hash + Eq + Clone> NetworkBuilder<P> {
    pub fn new() -> Self {
        NetworkBuilder {
            nodes: NodeVec::new(),
            edges: EdgeVec::new(),
            points: AHashMap::new(),
        }
    }

    pub fn build(self) -> FlowNetwork<P> {
        FlowNetwork::from_parts(self.nodes, self.edges, self.points)
    }

    /// The node for `point`, created on first sight.
    pub fn add_point(&mut self, point: P) -> NodeId {
        if let Some(id) = self.points.get(&point) {
            return *id;
        }
        let id = self.nodes.push(Node {
            point: Some(point.clone()),
            edges: Vec::new(),
            sink: false,
        });
        self.points.insert(point, id);
        id
    }

    pub fn add_segment(&mut self, segment: Segment<P>) -> super::EdgeId {
        let from = self.add_point(segment.a);
        let to = self.add_point(segment.b);
        let id = self.edges.push(Edge {
            from,
            to,
            state: segment.direction,
            original: segment.direction,
            length: segment.length,
            class: segment.class,
            reversed: false,
        });
        self.nodes[from].edges.push(id);
        if to != from {
            self.nodes[to].edges.push(id);
        }
        id
    }
}

impl<P: Hash + Eq + Clone> Default for NetworkBuilder<P> {
    fn default() -> Self {
        Self::new()
    }
}
