use bitvec::{bitvec, vec::BitVec};
use tracing::debug;

use crate::network::{EdgeId, FlowNetwork, NodeId, NodeVec, SubNetwork};

/// Control points of the recursive bridge search, replayed on an explicit
/// stack so long river chains cannot exhaust the call stack.
#[derive(Clone, Copy, Debug)]
enum Frame {
    /// First visit of `node`, reached through `via`.
    Enter { node: NodeId, via: Option<EdgeId> },
    /// Look at the incident edge at position `cursor`.
    Dispatch {
        node: NodeId,
        via: Option<EdgeId>,
        cursor: usize,
    },
    /// The edge at `cursor` leads to the already discovered `target`.
    BackEdge {
        node: NodeId,
        via: Option<EdgeId>,
        cursor: usize,
        target: NodeId,
    },
    /// The search below `child`, entered through `edge`, has returned.
    TreeEdge {
        node: NodeId,
        via: Option<EdgeId>,
        cursor: usize,
        child: NodeId,
        edge: EdgeId,
    },
}

/// Finds the bridges of the part of `sub` connected to `start`.
///
/// The result is indexed by edge; an edge `(u, v)` where `v` was discovered
/// through `u` is a bridge iff `low[v] == discovery[v]`. The search follows
/// edges regardless of their direction.
pub fn find_bridges<P>(network: &FlowNetwork<P>, sub: &SubNetwork, start: NodeId) -> BitVec {
    let mut bridges: BitVec = bitvec![0; network.n_edges()];
    let mut discovery = NodeVec::filled(network.n_nodes(), None);
    let mut low = NodeVec::filled(network.n_nodes(), usize::MAX);
    let mut time = 0;

    let mut stack = vec![Frame::Enter {
        node: start,
        via: None,
    }];

    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Enter { node, via } => {
                discovery[node] = Some(time);
                low[node] = time;
                time += 1;
                stack.push(Frame::Dispatch {
                    node,
                    via,
                    cursor: 0,
                });
            }
            Frame::Dispatch { node, via, cursor } => {
                let Some(&edge) = sub.incident(node).get(cursor) else {
                    continue;
                };
                if Some(edge) == via {
                    stack.push(Frame::Dispatch {
                        node,
                        via,
                        cursor: cursor + 1,
                    });
                    continue;
                }
                let next = sub.opposite(network, edge, node);
                if discovery[next].is_some() {
                    stack.push(Frame::BackEdge {
                        node,
                        via,
                        cursor,
                        target: next,
                    });
                } else {
                    stack.push(Frame::TreeEdge {
                        node,
                        via,
                        cursor,
                        child: next,
                        edge,
                    });
                    stack.push(Frame::Enter {
                        node: next,
                        via: Some(edge),
                    });
                }
            }
            Frame::BackEdge {
                node,
                via,
                cursor,
                target,
            } => {
                if let Some(d) = discovery[target] {
                    low[node] = low[node].min(d);
                }
                stack.push(Frame::Dispatch {
                    node,
                    via,
                    cursor: cursor + 1,
                });
            }
            Frame::TreeEdge {
                node,
                via,
                cursor,
                child,
                edge,
            } => {
                low[node] = low[node].min(low[child]);
                if Some(low[child]) == discovery[child] {
                    bridges.set(edge.0, true);
                }
                stack.push(Frame::Dispatch {
                    node,
                    via,
                    cursor: cursor + 1,
                });
            }
        }
    }

    debug!(
        start = %start,
        discovered = time,
        bridges = bridges.count_ones(),
        "bridge search finished"
    );
    bridges
}
