use super::*;
use crate::test_networks::{points, TestNetwork};

fn seg(a: &str, b: &str) -> Segment<String> {
    Segment::new(a.to_string(), b.to_string(), 1.0)
}

fn known(a: &str, b: &str) -> Segment<String> {
    Segment::known(a.to_string(), b.to_string(), 1.0)
}

#[test]
fn points_are_interned() {
    let network = FlowNetwork::from_segments([seg("A", "B"), seg("B", "C"), seg("C", "A")]);
    assert_eq!(network.n_nodes(), 3);
    assert_eq!(network.n_edges(), 3);

    let b = network.node_at(&"B".to_string()).unwrap();
    assert_eq!(network.node(b).degree(), 2);
    assert_eq!(network.point(b), Some(&"B".to_string()));
    assert_eq!(network.node_at(&"Z".to_string()), None);
}

#[test]
fn edge_ids_follow_input_order() {
    let network = TestNetwork::Path(4).network();
    for (id, edge) in network.edges() {
        assert_eq!(edge.from(), NodeId(id.0));
        assert_eq!(edge.to(), NodeId(id.0 + 1));
    }
}

#[test]
fn builder_interns_explicit_points() {
    let mut builder = NetworkBuilder::new();
    let x = builder.add_point("X".to_string());
    assert_eq!(builder.add_point("X".to_string()), x);
    let e = builder.add_segment(known("X", "Y").with_class(2u16));
    let network = builder.build();

    assert!(network.edge(e).is_locked());
    assert_eq!(network.edge(e).class(), SegmentClass(2));
    assert_eq!(network.edge(e).from(), x);
}

#[test]
fn flip_toggles_the_direction() {
    let mut network = FlowNetwork::from_segments([seg("A", "B")]);
    let [a, b] = [NodeId(0), NodeId(1)];

    network.flip(EdgeId(0)).unwrap();
    let edge = network.edge(EdgeId(0));
    assert_eq!(edge.endpoints(), (b, a));
    assert!(edge.is_known());
    assert!(edge.is_reversed());

    assert_eq!(network.orient(EdgeId(0), a, b), Ok(true));
    assert!(!network.edge(EdgeId(0)).is_reversed());
    assert_eq!(network.orient(EdgeId(0), a, b), Ok(false));
}

#[test]
fn flipping_a_known_edge_is_refused() {
    let mut network = FlowNetwork::from_segments([known("A", "B")]);
    assert_eq!(
        network.flip(EdgeId(0)),
        Err(NetworkError::FlipKnownEdge(EdgeId(0)))
    );
    assert_eq!(network.edge(EdgeId(0)).endpoints(), (NodeId(0), NodeId(1)));
    assert_eq!(network.flip(EdgeId(7)), Err(NetworkError::NoEdge(EdgeId(7))));
}

#[test]
fn unknown_sink_node_is_an_error() {
    let mut network = FlowNetwork::from_segments([seg("A", "B")]);
    assert_eq!(network.mark_sink(NodeId(9)), Err(NetworkError::NoNode(NodeId(9))));
    network.mark_sink(NodeId(1)).unwrap();
    assert!(network.node(NodeId(1)).is_sink());
}

#[test]
fn duplicates_prefer_a_known_representative() {
    let mut network = FlowNetwork::from_segments([seg("P", "Q"), known("P", "Q"), seg("Q", "R")]);
    assert_eq!(network.remove_duplicate_edges(), Ok(1));

    assert!(network.is_shadowed(EdgeId(0)));
    assert!(!network.is_shadowed(EdgeId(1)));
    assert_eq!(network.same_edges(EdgeId(1)), &[EdgeId(0)]);
    let [p, q] = [NodeId(0), NodeId(1)];
    assert_eq!(network.incident(p), &[EdgeId(1)]);
    assert_eq!(network.incident(q), &[EdgeId(1), EdgeId(2)]);
}

#[test]
fn duplicates_in_opposite_order_are_grouped() {
    let mut network = FlowNetwork::from_segments([seg("P", "Q"), seg("Q", "P"), seg("P", "Q")]);
    assert_eq!(network.remove_duplicate_edges(), Ok(2));
    assert_eq!(network.same_edges(EdgeId(0)), &[EdgeId(1), EdgeId(2)]);
}

#[test]
fn self_loop_is_invalid() {
    let mut network = FlowNetwork::from_segments([seg("A", "B"), seg("B", "B")]);
    let b = NodeId(1);
    assert_eq!(
        network.remove_duplicate_edges(),
        Err(NetworkError::SelfLoop {
            edge: EdgeId(1),
            node: b
        })
    );
}

#[test]
fn same_edges_follow_their_representative() {
    let mut network = FlowNetwork::from_segments([known("P", "Q"), seg("Q", "P"), seg("P", "Q")]);
    network.remove_duplicate_edges().unwrap();

    let aligned = network.align_same_edges(EdgeId(0)).unwrap();
    assert_eq!(aligned, vec![EdgeId(1), EdgeId(2)]);
    for id in [EdgeId(1), EdgeId(2)] {
        assert_eq!(network.edge(id).endpoints(), network.edge(EdgeId(0)).endpoints());
        assert!(network.edge(id).is_known());
    }
    assert_eq!(network.reversed_edges().collect::<Vec<_>>(), vec![EdgeId(1)]);
}

#[test]
fn conflicting_known_duplicate_is_left_alone() {
    let mut network = FlowNetwork::from_segments([known("P", "Q"), known("Q", "P")]);
    network.remove_duplicate_edges().unwrap();

    let aligned = network.align_same_edges(EdgeId(0)).unwrap();
    assert!(aligned.is_empty());
    let [p, q] = [NodeId(0), NodeId(1)];
    assert_eq!(network.edge(EdgeId(1)).endpoints(), (q, p));
}

#[test]
fn subnetwork_resolves_collapsed_nodes() {
    let mut network = TestNetwork::RingWithOutlet(3).network();
    let nodes = points(&network, ["0", "1", "S"]);
    let (zero, one, outlet) = (nodes[0], nodes[1], nodes[2]);
    let super_node = network.add_super_node();
    assert!(network.node(super_node).is_super_node());

    let collapsed = ahash::AHashMap::from_iter([(zero, super_node), (one, super_node)]);
    let bridge = network.incident(outlet)[0];
    let tree = SubNetwork::collapsed(&network, [bridge], collapsed);

    assert_eq!(tree.resolve(zero), super_node);
    assert_eq!(tree.opposite(&network, bridge, outlet), super_node);
    assert!(tree.contains_node(super_node));
    assert!(!tree.contains_node(zero));

    tree.orient_into(&mut network, bridge, outlet).unwrap();
    assert!(tree.flows_into(&network, bridge, outlet));
    assert!(tree.flows_out_of(&network, bridge, super_node));
    assert_eq!(tree.known_inflow(&network, outlet), 1);
}

#[test]
fn component_of_ignores_other_regions() {
    let network = FlowNetwork::from_segments([seg("A", "B"), seg("C", "D"), seg("B", "E")]);
    let region = SubNetwork::component_of(&network, NodeId(0));
    assert_eq!(region.edges().collect::<Vec<_>>(), vec![EdgeId(0), EdgeId(2)]);
    assert_eq!(region.n_nodes(), 3);
}

#[test]
fn display_marks_unknown_edges() {
    let mut network = FlowNetwork::from_segments([seg("A", "B"), known("C", "B"), seg("B", "D")]);
    network.orient(EdgeId(0), NodeId(1), NodeId(0)).unwrap();
    insta::assert_snapshot!(network.to_string(), @r"
    e0: B -> A
    e1: C -> B
    e2: B -? D
    ");
}
