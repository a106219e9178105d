use std::{cmp::Reverse, collections::BinaryHeap};

use ahash::{AHashMap, AHashSet};
use indexmap::IndexSet;
use tracing::{debug, instrument, warn};

use super::{
    cycle_check::TopoOrder,
    shortest_path::{distances, distances_to, shortest_path, shortest_path_avoiding},
};
use crate::{
    error::FlowError,
    network::{EdgeId, FlowNetwork, NodeId, SubNetwork},
};

/// What orienting one biconnected component left behind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComponentOutcome {
    /// The node turned into a source by the loop-case fallback, if any.
    pub synthetic_source: Option<NodeId>,
    /// Edges of the component that no path reached; still unknown.
    pub missed: Vec<EdgeId>,
}

/// Where flow enters and leaves a component.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Terminals {
    pub sinks: IndexSet<NodeId>,
    pub sources: Vec<NodeId>,
}

/// Sinks are declared sink nodes and nodes through which a bridge leaves the
/// component. Sources are nodes through which a bridge enters it, and nodes
/// whose edges in the component all flow outward. No node is both.
pub fn classify<P>(network: &FlowNetwork<P>, component: &SubNetwork, tree: &SubNetwork) -> Terminals {
    let mut sinks: IndexSet<NodeId> = component
        .nodes()
        .filter(|n| network.node(*n).is_sink())
        .collect();
    let mut sources = IndexSet::new();

    for bridge in tree.edges() {
        let edge = network.edge(bridge);
        if !edge.is_known() {
            continue;
        }
        if component.contains_node(edge.from()) {
            sinks.insert(edge.from());
        }
        if component.contains_node(edge.to()) {
            sources.insert(edge.to());
        }
    }

    for node in component.nodes() {
        let incident = component.incident(node);
        if !incident.is_empty() && incident.iter().all(|e| component.flows_out_of(network, *e, node)) {
            sources.insert(node);
        }
    }

    sinks.sort();
    let mut sources: Vec<_> = sources.into_iter().filter(|n| !sinks.contains(n)).collect();
    sources.sort();
    Terminals { sinks, sources }
}

/// Whether an edge known on input flows into `node`.
fn locked_inflow<P>(network: &FlowNetwork<P>, component: &SubNetwork, node: NodeId) -> bool {
    component
        .incident(node)
        .iter()
        .any(|e| network.edge(*e).is_locked() && component.flows_into(network, *e, node))
}

type Step = (NodeId, EdgeId, NodeId);

struct Orienter<'a, P> {
    network: &'a mut FlowNetwork<P>,
    component: &'a SubNetwork,
    sinks: AHashSet<NodeId>,
    order: TopoOrder,
    committed: AHashSet<EdgeId>,
    reached: AHashSet<NodeId>,
    /// Uncommitted edges touching a reached node, by position in the
    /// component. May hold edges committed since they were pushed.
    pending: BinaryHeap<Reverse<(usize, EdgeId)>>,
}

impl<'a, P> Orienter<'a, P> {
    fn new(
        network: &'a mut FlowNetwork<P>,
        component: &'a SubNetwork,
        sinks: AHashSet<NodeId>,
    ) -> Result<Self, FlowError> {
        let order = TopoOrder::new(network, component)?;
        let mut orienter = Orienter {
            network,
            component,
            sinks: AHashSet::new(),
            order,
            committed: AHashSet::with_capacity(component.n_edges()),
            reached: AHashSet::with_capacity(component.n_nodes()),
            pending: BinaryHeap::new(),
        };
        for &sink in &sinks {
            orienter.reach(sink);
        }
        orienter.sinks = sinks;
        Ok(orienter)
    }

    fn is_sink(&self, node: NodeId) -> bool {
        self.sinks.contains(&node)
    }

    fn reach(&mut self, node: NodeId) {
        if !self.reached.insert(node) {
            return;
        }
        for &e in self.component.incident(node) {
            if self.committed.contains(&e) {
                continue;
            }
            if let Some(position) = self.component.edge_position(e) {
                self.pending.push(Reverse((position, e)));
            }
        }
    }

    /// Orients the unknown edges of a walk, each along the walk or each
    /// against it, as long as none closes a directed cycle. On the first
    /// edge that would, everything this call oriented is released again and
    /// that edge is returned.
    fn orient_walk(&mut self, steps: &[Step], against: bool) -> Result<Option<EdgeId>, FlowError> {
        let mut fresh = Vec::with_capacity(steps.len());
        for &(from, edge, to) in steps {
            if self.network.edge(edge).is_known() {
                continue;
            }
            let (from, to) = if against { (to, from) } else { (from, to) };
            if !self.order.admits(self.network, self.component, from, to) {
                for e in fresh {
                    self.network.release(e);
                }
                return Ok(Some(edge));
            }
            self.network.orient(edge, from, to)?;
            fresh.push(edge);
        }
        Ok(None)
    }

    /// Orients a walk `from -> to` step by step, or the whole walk reversed
    /// if that closes a cycle, and marks it committed. If both directions
    /// close a cycle nothing changes and the blocking edge is returned.
    fn commit(&mut self, steps: &[Step]) -> Result<Option<EdgeId>, FlowError> {
        if let Some(blocked) = self.orient_walk(steps, false)? {
            debug!(edge = %blocked, steps = steps.len(), "walk closes a cycle; reversing it");
            if let Some(blocked) = self.orient_walk(steps, true)? {
                return Ok(Some(blocked));
            }
        }
        for &(from, edge, to) in steps {
            self.committed.insert(edge);
            self.reach(from);
            self.reach(to);
        }
        Ok(None)
    }

    /// Commits a single edge, `from -> to` unless that closes a cycle. Only
    /// a cycle already present among known edges blocks both directions.
    fn commit_edge(&mut self, from: NodeId, edge: EdgeId, to: NodeId) -> Result<(), FlowError> {
        match self.commit(&[(from, edge, to)])? {
            Some(edge) => Err(FlowError::UnavoidableCycle { edge }),
            None => Ok(()),
        }
    }

    /// The uncommitted edge touching a reached node that comes first in the
    /// component, as `(edge, reached end, far end)`.
    fn frontier(&mut self) -> Option<(EdgeId, NodeId, NodeId)> {
        while let Some(Reverse((_, edge))) = self.pending.pop() {
            if self.committed.contains(&edge) {
                continue;
            }
            let (a, b) = self.network.edge(edge).endpoints();
            return Some(if self.reached.contains(&a) {
                (edge, a, b)
            } else {
                (edge, b, a)
            });
        }
        None
    }

    /// Absorbs `edge`, hanging off the reached node `near`.
    ///
    /// `far` is drained along the cheapest path to the nearest node that is
    /// already reached, and `edge` enters it from `near`. When that walk
    /// cannot be added either way, `edge` is committed on its own and the
    /// rest is left to later steps.
    fn extend(&mut self, edge: EdgeId, near: NodeId, far: NodeId) -> Result<(), FlowError> {
        if self.network.edge(edge).is_known() {
            let (from, to) = self.network.edge(edge).endpoints();
            return self.commit_edge(from, edge, to);
        }
        if self.is_sink(near) && !self.is_sink(far) {
            return self.commit_edge(far, edge, near);
        }
        if self.is_sink(far) {
            return self.commit_edge(near, edge, far);
        }

        let (reached, sinks) = (&self.reached, &self.sinks);
        let path = shortest_path_avoiding(
            self.network,
            self.component,
            far,
            |n| reached.contains(&n) || sinks.contains(&n),
            |n| n == near,
        );
        let Some(path) = path else {
            return self.commit_edge(far, edge, near);
        };
        let path = path.prepend(near, edge, self.network.edge(edge).length());
        debug!(from = %near, to = %path.end(), edges = path.edges.len(), "extending path");
        let steps: Vec<_> = path.steps().collect();
        if self.commit(&steps)?.is_none() {
            return Ok(());
        }
        debug!(edge = %edge, "extension blocked both ways; committing its first edge alone");
        self.commit_edge(far, edge, near)
    }
}

/// Picks a source for a component nothing flows into.
///
/// A node with a known outgoing edge whose far end has no other known inflow
/// is taken first. Failing that, the non-sink node farthest from every sink
/// becomes a source by turning all of its edges outward (the loop case).
/// `None` if no node that is not a sink can drain to one.
fn fallback_source<P>(
    network: &mut FlowNetwork<P>,
    component: &SubNetwork,
    sinks: &AHashSet<NodeId>,
) -> Result<Option<(NodeId, bool)>, FlowError> {
    let net = &*network;
    let headwater = component
        .nodes()
        .filter(|n| !sinks.contains(n))
        .filter(|n| {
            component.incident(*n).iter().any(|e| {
                component.flows_out_of(net, *e, *n)
                    && component.known_inflow(net, component.to(net, *e)) == 1
            })
        })
        .min_by_key(|n| (component.known_inflow(net, *n) > 0, *n));
    if let Some(node) = headwater {
        return Ok(Some((node, false)));
    }

    let to_sink = distances_to(net, component, sinks.iter().copied());
    let farthest = component
        .nodes()
        .filter(|n| !sinks.contains(n) && !locked_inflow(net, component, *n))
        .filter_map(|n| to_sink.get(&n).map(|d| (n, *d)))
        .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)));
    let Some((node, _)) = farthest else {
        return Ok(None);
    };

    warn!(node = %node, "loop case; synthetic source created at {node}");
    for e in component.incident(node).to_vec() {
        let far = component.opposite(network, e, node);
        component.orient_into(network, e, far)?;
    }
    Ok(Some((node, true)))
}

/// Distance from every source to the farthest sink it can reach, searching
/// from whichever side has fewer nodes.
fn farthest_sinks<P>(
    network: &FlowNetwork<P>,
    component: &SubNetwork,
    sources: &[NodeId],
    sinks: &AHashSet<NodeId>,
) -> AHashMap<NodeId, f64> {
    let mut farthest = AHashMap::with_capacity(sources.len());
    let mut record = |node: NodeId, d: f64| {
        let entry = farthest.entry(node).or_insert(d);
        if d > *entry {
            *entry = d;
        }
    };
    if sinks.len() <= sources.len() {
        for &sink in sinks {
            let dist = distances_to(network, component, [sink]);
            for &source in sources {
                if let Some(&d) = dist.get(&source) {
                    record(source, d);
                }
            }
        }
    } else {
        for &source in sources {
            let dist = distances(network, component, source);
            for sink in sinks {
                if let Some(&d) = dist.get(sink) {
                    record(source, d);
                }
            }
        }
    }
    farthest
}

/// Orients every edge of a biconnected `component` so that flow runs from
/// its sources to its sinks without closing a cycle.
///
/// `tree` is the bridge tree the component was collapsed out of, with its
/// bridges already oriented.
#[instrument(skip_all, fields(edges = component.n_edges(), nodes = component.n_nodes()))]
pub fn orient_component<P>(
    network: &mut FlowNetwork<P>,
    component: &SubNetwork,
    tree: &SubNetwork,
) -> Result<ComponentOutcome, FlowError> {
    let Terminals { sinks, mut sources } = classify(network, component, tree);
    let sinks: AHashSet<NodeId> = sinks.into_iter().collect();
    let mut outcome = ComponentOutcome::default();

    if sources.is_empty() && component.nodes().all(|n| sinks.contains(&n)) {
        debug!("every node is a sink; keeping stored directions where acyclic");
        let mut orienter = Orienter::new(network, component, sinks)?;
        for e in component.edges() {
            let (from, to) = orienter.network.edge(e).endpoints();
            orienter.commit_edge(from, e, to)?;
        }
        return Ok(outcome);
    }

    if sources.is_empty() {
        match fallback_source(network, component, &sinks)? {
            Some((node, synthetic)) => {
                sources.push(node);
                if synthetic {
                    outcome.synthetic_source = Some(node);
                }
            }
            None => {
                let net = &*network;
                let stranded = component
                    .nodes()
                    .filter(|n| !sinks.contains(n))
                    .min_by_key(|n| (locked_inflow(net, component, *n), *n));
                if let Some(node) = stranded {
                    return Err(FlowError::NoReachableSink { node });
                }
            }
        }
    }

    let farthest = farthest_sinks(network, component, &sources, &sinks);
    let mut ranked = Vec::with_capacity(sources.len());
    for &source in &sources {
        let d = farthest
            .get(&source)
            .copied()
            .ok_or(FlowError::NoReachableSink { node: source })?;
        ranked.push((source, d));
    }
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut orienter = Orienter::new(network, component, sinks)?;
    for (source, _) in ranked {
        let Some(path) = shortest_path(orienter.network, component, source, &orienter.sinks)
        else {
            debug!(source = %source, "backbone path cut off by earlier paths; left to extension");
            continue;
        };
        debug!(source = %source, sink = %path.end(), cost = path.cost, "committing backbone path");
        let steps: Vec<_> = path.steps().collect();
        orienter.reach(source);
        if let Some(edge) = orienter.commit(&steps)? {
            debug!(source = %source, edge = %edge, "backbone path blocked both ways; left to extension");
        }
    }

    while let Some((edge, near, far)) = orienter.frontier() {
        orienter.extend(edge, near, far)?;
    }

    outcome.missed = component
        .edges()
        .filter(|e| !orienter.committed.contains(e))
        .collect();
    for edge in &outcome.missed {
        warn!(edge = %edge, "edge {edge} left uncommitted in its component");
    }
    Ok(outcome)
}
