use std::collections::VecDeque;

use bitvec::{bitvec, vec::BitVec};
use itertools::Itertools;
use tracing::{debug, warn};

use crate::{
    error::FlowError,
    network::{EdgeId, FlowNetwork, NodeId, SubNetwork},
};

/// What a propagation over a bridge tree left behind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeOutcome {
    /// Tree edges no sink could claim; still unknown.
    pub missed: Vec<EdgeId>,
}

struct Marks {
    nodes: BitVec,
    edges: BitVec,
}

impl Marks {
    fn new<P>(network: &FlowNetwork<P>) -> Self {
        Marks {
            nodes: bitvec![0; network.n_nodes()],
            edges: bitvec![0; network.n_edges()],
        }
    }
}

/// Incident edges of `node` ordered by the far node, then by edge.
fn ordered_incident<P>(network: &FlowNetwork<P>, tree: &SubNetwork, node: NodeId) -> Vec<EdgeId> {
    tree.incident(node)
        .iter()
        .copied()
        .sorted_by_key(|e| (tree.opposite(network, *e, node), *e))
        .collect()
}

/// Breadth-first walk upstream from `queue`. Every unvisited edge is turned
/// to flow toward the node it was reached from; known edges pointing away
/// are left for a later sink.
fn upstream_walk<P>(
    network: &mut FlowNetwork<P>,
    tree: &SubNetwork,
    marks: &mut Marks,
    mut queue: VecDeque<NodeId>,
) -> Result<(), FlowError> {
    while let Some(node) = queue.pop_front() {
        for edge in ordered_incident(network, tree, node) {
            if marks.edges[edge.0] {
                continue;
            }
            if network.edge(edge).is_known() {
                if !tree.flows_into(network, edge, node) {
                    continue;
                }
            } else {
                tree.orient_into(network, edge, node)?;
            }
            marks.edges.set(edge.0, true);

            let far = tree.opposite(network, edge, node);
            if !marks.nodes[far.0] {
                marks.nodes.set(far.0, true);
                queue.push_back(far);
            }
        }
    }
    Ok(())
}

/// Reclaims the run of edges upstream of a secondary `sink`.
///
/// Starting at the sink, repeatedly turns one edge to flow into the current
/// node and steps across it. The walk goes on through simple chain nodes and
/// through nodes left without any known inflow (new local sources); it stops
/// at a branch node that still receives flow, in front of another sink, or
/// when nothing is left to turn. Returns the nodes walked, sink first.
fn claim_upstream<P>(
    network: &mut FlowNetwork<P>,
    tree: &SubNetwork,
    marks: &mut Marks,
    sink: NodeId,
    sinks: &[NodeId],
) -> Result<Vec<NodeId>, FlowError> {
    let mut walked = vec![sink];
    let mut current = sink;
    let mut arrived_by = None;

    loop {
        let candidate = tree
            .incident(current)
            .iter()
            .copied()
            .filter(|e| Some(*e) != arrived_by)
            .filter(|e| {
                let edge = network.edge(*e);
                if !edge.is_known() {
                    return true;
                }
                tree.flows_out_of(network, *e, current) && !edge.is_locked()
            })
            .filter(|e| {
                let far = tree.opposite(network, *e, current);
                !walked.contains(&far) && !sinks.contains(&far)
            })
            .min_by_key(|e| {
                (
                    !network.edge(*e).is_known(),
                    tree.opposite(network, *e, current),
                    *e,
                )
            });
        let Some(edge) = candidate else {
            break;
        };

        tree.orient_into(network, edge, current)?;
        marks.edges.set(edge.0, true);
        let far = tree.opposite(network, edge, current);
        walked.push(far);

        if tree.degree(far) > 2 && tree.known_inflow(network, far) > 0 {
            break;
        }
        arrived_by = Some(edge);
        current = far;
    }
    Ok(walked)
}

/// Orients the edges of a bridge tree toward `sinks`.
///
/// The first sink claims everything upstream of it. Every further sink
/// first reclaims the chain of edges feeding it (see [`claim_upstream`])
/// and then walks upstream from every node of that chain. Edges still
/// unknown at the end are logged and returned.
pub fn propagate<P>(
    network: &mut FlowNetwork<P>,
    tree: &SubNetwork,
    sinks: &[NodeId],
) -> Result<TreeOutcome, FlowError> {
    let mut marks = Marks::new(network);

    for (i, &sink) in sinks.iter().unique().enumerate() {
        let start = if i == 0 {
            vec![sink]
        } else {
            claim_upstream(network, tree, &mut marks, sink, sinks)?
        };
        for node in &start {
            marks.nodes.set(node.0, true);
        }
        debug!(sink = %sink, claimed = start.len(), "propagating upstream");
        upstream_walk(network, tree, &mut marks, start.into())?;
    }

    let missed: Vec<_> = tree
        .edges()
        .filter(|e| !network.edge(*e).is_known())
        .collect();
    for edge in &missed {
        warn!(
            edge = %edge,
            "not all edges visited when directionalizing tree; missed edge {edge}"
        );
    }
    Ok(TreeOutcome { missed })
}
