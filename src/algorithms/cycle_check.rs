use std::collections::VecDeque;

use ahash::{AHashMap, AHashSet};
use tracing::{debug, warn};

use crate::{
    error::FlowError,
    network::{EdgeId, FlowNetwork, NodeId, NodeVec, SubNetwork},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Color {
    Unseen,
    OnStack,
    Done,
}

#[derive(Clone, Copy, Debug)]
enum Frame {
    Enter(NodeId),
    Dispatch { node: NodeId, cursor: usize },
}

/// Outcome of a whole-network acyclicity check.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CycleReport {
    /// Back edges found, one per cycle closed during the search.
    pub back_edges: Vec<EdgeId>,
}

impl CycleReport {
    pub fn is_acyclic(&self) -> bool {
        self.back_edges.is_empty()
    }
}

/// Depth-first search along known edges of `sub`, starting at each of
/// `roots` in turn. Calls `on_back_edge` for every edge that closes a
/// directed cycle; stops early once it returns `false`.
fn search<P>(
    network: &FlowNetwork<P>,
    sub: &SubNetwork,
    roots: impl IntoIterator<Item = NodeId>,
    mut on_back_edge: impl FnMut(EdgeId) -> bool,
) {
    let mut color = NodeVec::filled(network.n_nodes(), Color::Unseen);

    for root in roots {
        if color[root] != Color::Unseen {
            continue;
        }
        let mut stack = vec![Frame::Enter(root)];

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(node) => {
                    if color[node] != Color::Unseen {
                        continue;
                    }
                    color[node] = Color::OnStack;
                    stack.push(Frame::Dispatch { node, cursor: 0 });
                }
                Frame::Dispatch { node, cursor } => {
                    let Some(&edge) = sub.incident(node).get(cursor) else {
                        color[node] = Color::Done;
                        continue;
                    };
                    stack.push(Frame::Dispatch {
                        node,
                        cursor: cursor + 1,
                    });
                    if !sub.flows_out_of(network, edge, node) {
                        continue;
                    }
                    let next = sub.to(network, edge);
                    match color[next] {
                        Color::Unseen => stack.push(Frame::Enter(next)),
                        Color::OnStack => {
                            if !on_back_edge(edge) {
                                return;
                            }
                        }
                        Color::Done => {}
                    }
                }
            }
        }
    }
}

/// The first edge found closing a directed cycle reachable from `roots`.
pub fn find_cycle<P>(
    network: &FlowNetwork<P>,
    sub: &SubNetwork,
    roots: impl IntoIterator<Item = NodeId>,
) -> Option<EdgeId> {
    let mut found = None;
    search(network, sub, roots, |edge| {
        found = Some(edge);
        false
    });
    found
}

/// A topological order of the nodes of one component under its known
/// edges, kept valid while further edges are oriented.
///
/// Every known edge runs from a lower to a higher rank. A new edge that
/// already agrees with the ranks is accepted at once; otherwise only the
/// nodes ranked between its ends are searched and reordered.
#[derive(Clone, Debug, Default)]
pub struct TopoOrder {
    rank: AHashMap<NodeId, usize>,
}

impl TopoOrder {
    /// Ranks the nodes of `sub` by Kahn's algorithm over its known edges.
    /// Fails with an edge of a directed cycle if the known edges have one.
    pub fn new<P>(network: &FlowNetwork<P>, sub: &SubNetwork) -> Result<Self, FlowError> {
        let mut indegree: AHashMap<NodeId, usize> = sub
            .nodes()
            .map(|n| (n, sub.known_inflow(network, n)))
            .collect();
        let mut queue: VecDeque<NodeId> = sub
            .nodes()
            .filter(|n| indegree.get(n) == Some(&0))
            .collect();
        let mut rank = AHashMap::with_capacity(sub.n_nodes());

        while let Some(node) = queue.pop_front() {
            rank.insert(node, rank.len());
            for &e in sub.incident(node) {
                if !sub.flows_out_of(network, e, node) {
                    continue;
                }
                if let Some(d) = indegree.get_mut(&sub.to(network, e)) {
                    *d -= 1;
                    if *d == 0 {
                        queue.push_back(sub.to(network, e));
                    }
                }
            }
        }

        if rank.len() < sub.n_nodes() {
            let stuck: Vec<_> = sub.nodes().filter(|n| !rank.contains_key(n)).collect();
            if let Some(edge) = find_cycle(network, sub, stuck) {
                return Err(FlowError::UnavoidableCycle { edge });
            }
        }
        Ok(TopoOrder { rank })
    }

    fn rank(&self, node: NodeId) -> usize {
        self.rank.get(&node).copied().unwrap_or_default()
    }

    /// Whether `from -> to` can join the known edges without closing a
    /// directed cycle. If it can, the order is updated to allow it; the
    /// edge itself is left for the caller to orient.
    pub fn admits<P>(
        &mut self,
        network: &FlowNetwork<P>,
        sub: &SubNetwork,
        from: NodeId,
        to: NodeId,
    ) -> bool {
        let (lower, upper) = (self.rank(to), self.rank(from));
        if upper < lower {
            return true;
        }
        let Some(mut ahead) = self.affected(network, sub, to, upper, Walk::Down, Some(from)) else {
            return false;
        };
        let mut behind = self
            .affected(network, sub, from, lower, Walk::Up, None)
            .unwrap_or_default();

        behind.sort_by_key(|n| self.rank(*n));
        ahead.sort_by_key(|n| self.rank(*n));
        let mut slots: Vec<usize> = behind.iter().chain(&ahead).map(|n| self.rank(*n)).collect();
        slots.sort_unstable();
        for (node, slot) in behind.into_iter().chain(ahead).zip(slots) {
            self.rank.insert(node, slot);
        }
        true
    }

    /// Nodes reachable from `start` along (or against) known edges without
    /// leaving the rank window bounded by `bound`. `None` as soon as `stop`
    /// is met.
    fn affected<P>(
        &self,
        network: &FlowNetwork<P>,
        sub: &SubNetwork,
        start: NodeId,
        bound: usize,
        walk: Walk,
        stop: Option<NodeId>,
    ) -> Option<Vec<NodeId>> {
        let mut seen = AHashSet::from_iter([start]);
        let mut stack = vec![start];
        let mut found = Vec::new();
        while let Some(node) = stack.pop() {
            found.push(node);
            for &e in sub.incident(node) {
                let next = match walk {
                    Walk::Down if sub.flows_out_of(network, e, node) => sub.to(network, e),
                    Walk::Up if sub.flows_into(network, e, node) => sub.from(network, e),
                    _ => continue,
                };
                if Some(next) == stop {
                    return None;
                }
                let inside = match walk {
                    Walk::Down => self.rank(next) < bound,
                    Walk::Up => self.rank(next) > bound,
                };
                if inside && seen.insert(next) {
                    stack.push(next);
                }
            }
        }
        Some(found)
    }
}

#[derive(Clone, Copy, Debug)]
enum Walk {
    Down,
    Up,
}

/// Checks the committed orientation of the whole network, component by
/// component. Cycles are logged and reported, never repaired.
pub fn validate<P>(network: &FlowNetwork<P>) -> CycleReport {
    let all = SubNetwork::from_edges(
        network,
        network
            .edges()
            .map(|(id, _)| id)
            .filter(|id| !network.is_shadowed(*id)),
    );
    let mut report = CycleReport::default();
    search(network, &all, all.nodes(), |edge| {
        warn!(edge = %edge, "cycle found at {edge}");
        report.back_edges.push(edge);
        true
    });
    debug!(cycles = report.back_edges.len(), "orientation validated");
    report
}
