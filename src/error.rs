use thiserror::Error;

use crate::network::{EdgeId, NodeId};

/// Faults raised by the graph model itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Segment {edge} starts and ends at {node}: self loops are not valid input")]
    SelfLoop { edge: EdgeId, node: NodeId },
    /// Programming-invariant violation: the edge arrived with a known direction.
    #[error("Refusing to flip {0}: its direction was known on input")]
    FlipKnownEdge(EdgeId),
    #[error("Invalid edge {0}")]
    NoEdge(EdgeId),
    #[error("Invalid node {0}")]
    NoNode(NodeId),
}

/// Fatal topology faults. Any of these aborts the region being processed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error("Subgraph with only a single edge ({edge}): a lone bridge cannot be a biconnected component")]
    SingleEdgeComponent { edge: EdgeId },
    #[error("Cannot orient the path through {edge} without creating a cycle in either direction")]
    UnavoidableCycle { edge: EdgeId },
    #[error("No sink is reachable from {node}")]
    NoReachableSink { node: NodeId },
}
