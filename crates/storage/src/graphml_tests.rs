// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use wf_core::{EdgeStatus, EdgeType, NodeStatus};

fn codec() -> GraphmlCodec {
    GraphmlCodec
}

#[test]
fn empty_graph_round_trips() {
    let graph = WorkGraph::new();
    let bytes = codec().encode(&graph).unwrap();
    let back = codec().decode(&bytes).unwrap();
    assert!(back.is_empty());
    assert_eq!(back.wrapper, "{}");
}

#[test]
fn nodes_edges_and_wrapper_round_trip() {
    let mut graph = WorkGraph::new();
    graph.wrapper = "bash -c '{}'".to_string();
    let a = graph.add_node("echo A", 10.0, 20.5, NodeStatus::Ran);
    let b = graph.add_node("echo B", -3.0, 0.0, NodeStatus::Empty);
    graph.add_edge(&a, &b, EdgeType::NonBlocking);

    let bytes = codec().encode(&graph).unwrap();
    let back = codec().decode(&bytes).unwrap();

    assert_eq!(back, graph);
}

#[test]
fn exec_record_and_legacy_log_round_trip() {
    let mut graph = WorkGraph::new();
    let a = graph.add_node("echo A", 0.0, 0.0, NodeStatus::Ran);
    graph.node_mut(&a).unwrap().exec = Some(ExecRecord {
        command: "bash -c 'echo A'".into(),
        stdout: "A\n".into(),
        stderr: "warning: <deprecated> & more\n".into(),
        pid: "12345".into(),
        error_code: "0".into(),
    });
    let b = graph.add_node("echo B", 0.0, 0.0, NodeStatus::Empty);
    graph.node_mut(&b).unwrap().log = Some("old-style log".into());

    let bytes = codec().encode(&graph).unwrap();
    let back = codec().decode(&bytes).unwrap();
    assert_eq!(back, graph);
}

#[test]
fn multiline_labels_preserved() {
    let mut graph = WorkGraph::new();
    graph.add_node("echo one\necho 'two'\necho <three>", 0.0, 0.0, NodeStatus::Empty);
    let bytes = codec().encode(&graph).unwrap();
    let back = codec().decode(&bytes).unwrap();
    assert_eq!(back.nodes().next().unwrap().label, "echo one\necho 'two'\necho <three>");
}

#[test]
fn foreign_minimal_document_parses() {
    // The kind of file a networkx writer produces: numbered key ids,
    // edge id carried as a data element, no statuses anywhere.
    let xml = r#"<?xml version='1.0' encoding='utf-8'?>
<graphml xmlns="http://graphml.graphdrawing.org/xmlns">
  <key id="d0" for="node" attr.name="label" attr.type="string"/>
  <key id="d1" for="node" attr.name="x" attr.type="string"/>
  <key id="d2" for="edge" attr.name="id" attr.type="string"/>
  <graph edgedefault="directed">
    <node id="n0">
      <data key="d0">echo hello</data>
      <data key="d1">4.25</data>
    </node>
    <node id="n1">
      <data key="d0">echo world</data>
    </node>
    <edge source="n0" target="n1">
      <data key="d2">e0</data>
    </edge>
  </graph>
</graphml>"#;

    let graph = codec().decode(xml.as_bytes()).unwrap();
    assert_eq!(graph.node_count(), 2);
    let n0 = graph.node(&"n0".into()).unwrap();
    assert_eq!(n0.label, "echo hello");
    assert_eq!(n0.x, 4.25);
    assert_eq!(n0.status, NodeStatus::Empty);

    let edge = graph.edge_between(&"n0".into(), &"n1".into()).unwrap();
    assert_eq!(edge.id.as_ref().unwrap().as_str(), "e0");
    assert_eq!(edge.edge_type, EdgeType::Blocking);
    assert_eq!(edge.status, EdgeStatus::Empty);
}

#[test]
fn self_closing_node_parses() {
    let xml = r#"<graphml><graph edgedefault="directed"><node id="n0"/></graph></graphml>"#;
    let graph = codec().decode(xml.as_bytes()).unwrap();
    assert_eq!(graph.node_count(), 1);
    assert_eq!(graph.node(&"n0".into()).unwrap().label, "");
}

#[test]
fn edge_id_on_xml_attribute_accepted() {
    let xml = r#"<graphml><graph edgedefault="directed">
        <node id="a"/><node id="b"/>
        <edge id="e-77" source="a" target="b"/>
    </graph></graphml>"#;
    let graph = codec().decode(xml.as_bytes()).unwrap();
    let edge = graph.edges().next().unwrap();
    assert_eq!(edge.id.as_ref().unwrap().as_str(), "e-77");
}

#[test]
fn edge_without_id_stays_idless() {
    let xml = r#"<graphml><graph edgedefault="directed">
        <node id="a"/><node id="b"/>
        <edge source="a" target="b"/>
    </graph></graphml>"#;
    let graph = codec().decode(xml.as_bytes()).unwrap();
    assert!(graph.edges().next().unwrap().id.is_none());
}

#[test]
fn dangling_edge_rejected() {
    let xml = r#"<graphml><graph edgedefault="directed">
        <node id="a"/>
        <edge source="a" target="ghost"/>
    </graph></graphml>"#;
    let err = codec().decode(xml.as_bytes()).unwrap_err();
    assert!(matches!(err, CodecError::Malformed(_)));
}

#[test]
fn unknown_status_rejected() {
    let xml = r#"<graphml>
        <key id="status" for="node" attr.name="status" attr.type="string"/>
        <graph edgedefault="directed">
        <node id="a"><data key="status">exploded</data></node>
    </graph></graphml>"#;
    let err = codec().decode(xml.as_bytes()).unwrap_err();
    assert!(matches!(err, CodecError::BadValue(_)));
}

#[test]
fn node_missing_id_rejected() {
    let xml = r#"<graphml><graph edgedefault="directed"><node/></graph></graphml>"#;
    let err = codec().decode(xml.as_bytes()).unwrap_err();
    assert!(matches!(err, CodecError::Malformed(_)));
}
