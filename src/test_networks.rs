//! Named network families shared by the unit tests.
//!
//! Points are strings and every family lists its segments so that points are
//! interned in a fixed order: in `Path(n)` and `Ring(n)` the point `"k"` is
//! `NodeId(k)`.

use std::fmt;

use proptest::sample::Index;

use crate::network::{FlowNetwork, NodeId, Segment};

#[derive(Debug, Clone)]
#[allow(dead_code)]
pub enum TestNetwork {
    /// `"0" - "1" - … - "n-1"`, draining to `"n-1"`.
    Path(usize),
    /// A cycle through `"0"` … `"n-1"`, draining to `"0"`.
    Ring(usize),
    /// `Ring(n)` with a pendant segment `"0" - "S"`, draining to `"S"`.
    RingWithOutlet(usize),
    /// Rings `"a0"…` and `"b0"…` joined by `"a0" - "b0"`, draining to `"b0"`.
    Dumbbell(usize, usize),
    /// Two rings sharing the chord `"B" - "D"`, with an outlet `"A" - "S"`.
    Theta,
    /// Node `k + 1` hangs off node `parents[k]`, draining to `"0"`.
    Tree(Vec<usize>),
}

impl fmt::Display for TestNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestNetwork::Path(n) => write!(f, "Path({n})"),
            TestNetwork::Ring(n) => write!(f, "Ring({n})"),
            TestNetwork::RingWithOutlet(n) => write!(f, "RingWithOutlet({n})"),
            TestNetwork::Dumbbell(a, b) => write!(f, "Dumbbell({a}, {b})"),
            TestNetwork::Theta => write!(f, "Theta"),
            TestNetwork::Tree(parents) => write!(f, "Tree({})", parents.len() + 1),
        }
    }
}

fn seg(a: impl ToString, b: impl ToString) -> Segment<String> {
    Segment::new(a.to_string(), b.to_string(), 1.0)
}

fn ring(prefix: &str, n: usize) -> impl Iterator<Item = Segment<String>> + '_ {
    (0..n).map(move |i| seg(format!("{prefix}{i}"), format!("{prefix}{}", (i + 1) % n)))
}

impl TestNetwork {
    /// A random tree from proptest indices: node `k` picks its parent among
    /// the nodes before it.
    pub fn random_tree(parents: &[Index]) -> Self {
        TestNetwork::Tree(
            parents
                .iter()
                .enumerate()
                .map(|(k, p)| p.index(k + 1))
                .collect(),
        )
    }

    pub fn tree(parents: &[Index]) -> FlowNetwork<String> {
        Self::random_tree(parents).network()
    }

    pub fn segments(&self) -> Vec<Segment<String>> {
        match self {
            TestNetwork::Path(n) => (1..*n).map(|i| seg(i - 1, i)).collect(),
            TestNetwork::Ring(n) => ring("", *n).collect(),
            TestNetwork::RingWithOutlet(n) => ring("", *n).chain([seg("0", "S")]).collect(),
            TestNetwork::Dumbbell(a, b) => ring("a", *a)
                .chain(ring("b", *b))
                .chain([seg("a0", "b0")])
                .collect(),
            TestNetwork::Theta => vec![
                seg("A", "B"),
                seg("B", "C"),
                seg("C", "D"),
                seg("D", "A"),
                seg("B", "D"),
                seg("A", "S"),
            ],
            TestNetwork::Tree(parents) => parents
                .iter()
                .enumerate()
                .map(|(k, parent)| seg(parent, k + 1))
                .collect(),
        }
    }

    pub fn sinks(&self) -> Vec<String> {
        let sink = match self {
            TestNetwork::Path(n) => (n - 1).to_string(),
            TestNetwork::Ring(_) | TestNetwork::Tree(_) => "0".to_string(),
            TestNetwork::RingWithOutlet(_) | TestNetwork::Theta => "S".to_string(),
            TestNetwork::Dumbbell(..) => "b0".to_string(),
        };
        vec![sink]
    }

    pub fn network(&self) -> FlowNetwork<String> {
        FlowNetwork::from_segments(self.segments())
    }
}

/// The nodes of `names`, in order.
pub fn points<const N: usize>(network: &FlowNetwork<String>, names: [&str; N]) -> Vec<NodeId> {
    names
        .iter()
        .map(|p| network.node_at(&p.to_string()).unwrap())
        .collect()
}
