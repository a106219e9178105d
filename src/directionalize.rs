//! # Directionalization driver
//!
//! [`Directionalizer::run`] takes the segments of one region and its ordered
//! outlets and drives the whole pipeline: duplicate removal, then for every
//! connected part of the network bridge finding, partitioning, propagation
//! over the bridge tree and path orientation inside every biconnected
//! component. Parts no declared outlet reaches get a synthetic one.

use std::{collections::BTreeSet, fmt, hash::Hash};

use bitvec::{bitvec, vec::BitVec};
use itertools::Itertools;
use tracing::{debug, instrument, warn};

use crate::{
    algorithms::{
        bridges::find_bridges,
        cycle_check::{validate, CycleReport},
        partition::partition,
        path_orientation::orient_component,
        tree_propagation::propagate,
    },
    error::{FlowError, NetworkError},
    network::{EdgeId, EdgeVec, FlowNetwork, NodeId, Segment, SubNetwork},
    settings::FlowSettings,
};

/// The oriented network of one region.
#[derive(Clone, Debug)]
pub struct Directionalized<P> {
    /// Edges whose final direction is the reverse of their input order.
    pub flipped: BTreeSet<EdgeId>,
    /// Edges whose direction was decided by this run.
    pub processed: BTreeSet<EdgeId>,
    /// Edges no outlet could account for; left as they were.
    pub missed: BTreeSet<EdgeId>,
    /// Final `(from, to)` of every input segment, in input order.
    pub directions: EdgeVec<(P, P)>,
    /// Outlets invented for parts of the network without a declared one.
    pub synthetic_sinks: Vec<NodeId>,
    pub cycles: CycleReport,
    pub network: FlowNetwork<P>,
}

impl<P> Directionalized<P> {
    pub fn needs_flip(&self, edge: EdgeId) -> bool {
        self.flipped.contains(&edge)
    }

    /// Whether every edge got a direction and no cycle was found.
    pub fn is_complete(&self) -> bool {
        self.missed.is_empty() && self.cycles.is_acyclic()
    }
}

impl<P: fmt::Display> fmt::Display for Directionalized<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.network, f)
    }
}

#[derive(Default)]
struct Tally {
    processed: BTreeSet<EdgeId>,
    missed: BTreeSet<EdgeId>,
}

#[derive(Clone, Debug, Default)]
pub struct Directionalizer {
    settings: FlowSettings,
}

impl Directionalizer {
    pub fn new(settings: FlowSettings) -> Self {
        Directionalizer { settings }
    }

    pub fn settings(&self) -> &FlowSettings {
        &self.settings
    }

    /// Orients every segment of one region toward `sinks`.
    ///
    /// Sinks are listed by priority: the first one claims as much of its part
    /// of the network as it can reach. Points of `sinks` that no segment
    /// touches are logged and skipped.
    #[instrument(skip_all, fields(sinks = sinks.len()))]
    pub fn run<P>(
        &self,
        segments: impl IntoIterator<Item = Segment<P>>,
        sinks: &[P],
    ) -> Result<Directionalized<P>, FlowError>
    where
        P: Hash + Eq + Clone + fmt::Debug,
    {
        let mut network = FlowNetwork::from_segments(segments);
        let mut declared = Vec::with_capacity(sinks.len());
        for point in sinks {
            match network.node_at(point) {
                Some(node) => {
                    network.mark_sink(node)?;
                    declared.push(node);
                }
                None => warn!(point = ?point, "declared sink is not part of the network; skipped"),
            }
        }

        let set_aside = network.remove_duplicate_edges()?;
        debug!(
            nodes = network.n_nodes(),
            edges = network.n_edges(),
            set_aside,
            "network built"
        );

        let n_points = network.n_nodes();
        let mut covered: BitVec = bitvec![0; n_points];
        let mut tally = Tally::default();

        for &sink in declared.iter().unique() {
            if covered[sink.0] {
                continue;
            }
            let region = SubNetwork::component_of(&network, sink);
            for node in region.nodes() {
                covered.set(node.0, true);
            }
            let local: Vec<_> = declared
                .iter()
                .copied()
                .filter(|n| region.contains_node(*n))
                .unique()
                .collect();
            self.process_region(&mut network, &region, &local, &mut tally)?;
        }

        let mut synthetic_sinks = Vec::new();
        for node in (0..n_points).map(NodeId) {
            if covered[node.0] || network.incident(node).is_empty() {
                continue;
            }
            let region = SubNetwork::component_of(&network, node);
            for n in region.nodes() {
                covered.set(n.0, true);
            }
            let sink = self.synthetic_sink(&network, &region);
            let substantial = region
                .edges()
                .filter(|e| !self.settings.is_trivial(network.edge(*e).length()))
                .count();
            if substantial > self.settings.isolated_edge_warning {
                warn!(
                    sink = %sink,
                    edges = substantial,
                    "isolated part of the network has no outlet; likely a gap in the input"
                );
            }
            network.mark_sink(sink)?;
            synthetic_sinks.push(sink);
            self.process_region(&mut network, &region, &[sink], &mut tally)?;
        }

        let directions = network
            .edges()
            .map(|(_, edge)| -> Result<(P, P), NetworkError> {
                let from = network.point(edge.from()).ok_or(NetworkError::NoNode(edge.from()))?;
                let to = network.point(edge.to()).ok_or(NetworkError::NoNode(edge.to()))?;
                Ok((from.clone(), to.clone()))
            })
            .collect::<Result<EdgeVec<_>, NetworkError>>()?;
        let cycles = if self.settings.validate {
            validate(&network)
        } else {
            CycleReport::default()
        };

        Ok(Directionalized {
            flipped: network.reversed_edges().collect(),
            processed: tally.processed,
            missed: tally.missed,
            directions,
            synthetic_sinks,
            cycles,
            network,
        })
    }

    /// Runs every region on its own. A fatal fault in one region does not
    /// keep the others from being oriented.
    pub fn run_many<P, S>(
        &self,
        regions: impl IntoIterator<Item = (S, Vec<P>)>,
    ) -> Vec<Result<Directionalized<P>, FlowError>>
    where
        P: Hash + Eq + Clone + fmt::Debug,
        S: IntoIterator<Item = Segment<P>>,
    {
        regions
            .into_iter()
            .enumerate()
            .map(|(i, (segments, sinks))| {
                let result = self.run(segments, &sinks);
                if let Err(err) = &result {
                    warn!(region = i, error = %err, "region could not be directionalized");
                }
                result
            })
            .collect()
    }

    #[instrument(skip_all, fields(nodes = region.n_nodes(), edges = region.n_edges()))]
    fn process_region<P>(
        &self,
        network: &mut FlowNetwork<P>,
        region: &SubNetwork,
        sinks: &[NodeId],
        tally: &mut Tally,
    ) -> Result<(), FlowError> {
        let Some(&start) = sinks.first() else {
            return Ok(());
        };
        let bridges = find_bridges(network, region, start);
        let tree = partition(network, region, &bridges)?;

        let tree_sinks: Vec<_> = sinks.iter().map(|s| tree.resolve(*s)).collect();
        let propagated = propagate(network, &tree.tree, &tree_sinks)?;
        tally.missed.extend(propagated.missed);

        for component in &tree.components {
            let outcome = orient_component(network, component, &tree.tree)?;
            tally.missed.extend(outcome.missed);
        }

        for edge in region.edges() {
            if tally.missed.contains(&edge) {
                tally.missed.extend(network.same_edges(edge));
                continue;
            }
            tally.processed.insert(edge);
            let aligned = network.align_same_edges(edge)?;
            for &duplicate in network.same_edges(edge) {
                if aligned.contains(&duplicate) {
                    tally.processed.insert(duplicate);
                } else {
                    tally.missed.insert(duplicate);
                }
            }
        }

        debug!(
            components = tree.components.len(),
            bridges = tree.tree.n_edges(),
            processed = tally.processed.len(),
            missed = tally.missed.len(),
            "region directionalized"
        );
        Ok(())
    }

    /// An outlet for a part of the network that has none: a dangling node
    /// whose segment has the outlet class, else any dangling node, else the
    /// lowest node.
    fn synthetic_sink<P>(&self, network: &FlowNetwork<P>, region: &SubNetwork) -> NodeId {
        let dangling = || region.nodes().filter(|n| region.degree(*n) == 1);
        let outlet_class = self.settings.outlet_class;
        dangling()
            .filter(|n| {
                region
                    .incident(*n)
                    .iter()
                    .all(|e| network.edge(*e).class() == outlet_class)
            })
            .min()
            .or_else(|| dangling().min())
            .or_else(|| region.nodes().min())
            .unwrap_or(NodeId(0))
    }
}
