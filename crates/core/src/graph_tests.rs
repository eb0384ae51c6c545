// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::status::{EdgeStatus, EdgeType, NodeStatus};

fn chain(n: usize) -> (WorkGraph, Vec<NodeId>) {
    let mut g = WorkGraph::new();
    let ids: Vec<NodeId> =
        (0..n).map(|i| g.add_node(format!("echo {i}"), 0.0, 0.0, NodeStatus::Empty)).collect();
    for pair in ids.windows(2) {
        g.add_edge(&pair[0], &pair[1], EdgeType::Blocking);
    }
    (g, ids)
}

#[test]
fn add_node_mints_unique_ids() {
    let mut g = WorkGraph::new();
    let a = g.add_node("echo A", 1.0, 2.0, NodeStatus::Empty);
    let b = g.add_node("echo B", 0.0, 0.0, NodeStatus::Run);
    assert_ne!(a, b);
    assert_eq!(g.node_count(), 2);
    assert_eq!(g.node(&a).unwrap().label, "echo A");
    assert_eq!(g.node(&b).unwrap().status, NodeStatus::Run);
}

#[test]
fn remove_node_drops_incident_edges() {
    let (mut g, ids) = chain(3);
    assert_eq!(g.edge_count(), 2);
    assert!(g.remove_node(&ids[1]));
    assert_eq!(g.edge_count(), 0);
    assert_eq!(g.node_count(), 2);
}

#[test]
fn remove_missing_node_is_false() {
    let mut g = WorkGraph::new();
    assert!(!g.remove_node(&NodeId::from_string("node-nope")));
}

#[test]
fn add_edge_requires_endpoints() {
    let mut g = WorkGraph::new();
    let a = g.add_node("echo A", 0.0, 0.0, NodeStatus::Empty);
    let ghost = NodeId::from_string("node-ghost");
    assert!(g.add_edge(&a, &ghost, EdgeType::Blocking).is_none());
    assert!(g.add_edge(&ghost, &a, EdgeType::Blocking).is_none());
    assert_eq!(g.edge_count(), 0);
}

#[test]
fn edge_lookup_by_id_and_endpoints() {
    let (g, ids) = chain(2);
    let edge = g.edge_between(&ids[0], &ids[1]).unwrap();
    let eid = edge.id.clone().unwrap();
    assert_eq!(g.edge_by_id(&eid).unwrap().target, ids[1]);
    assert!(g.edge_between(&ids[1], &ids[0]).is_none());
}

#[test]
fn in_degree_and_roots() {
    let (g, ids) = chain(3);
    assert_eq!(g.in_degree(&ids[0]), 0);
    assert_eq!(g.in_degree(&ids[2]), 1);
    assert_eq!(g.roots(), vec![ids[0].clone()]);
}

#[test]
fn roots_within_ignores_outside_edges() {
    // A -> B -> C; within {B, C} only B is a root even though B has a
    // graph-level in-edge from A.
    let (g, ids) = chain(3);
    let subset: HashSet<NodeId> = [ids[1].clone(), ids[2].clone()].into_iter().collect();
    assert_eq!(g.roots_within(&subset), vec![ids[1].clone()]);
}

#[test]
fn blocking_cycle_detected() {
    let mut g = WorkGraph::new();
    let x = g.add_node("echo X", 0.0, 0.0, NodeStatus::Empty);
    let y = g.add_node("echo Y", 0.0, 0.0, NodeStatus::Empty);
    g.add_edge(&x, &y, EdgeType::Blocking);
    assert!(!g.has_blocking_cycle());
    g.add_edge(&y, &x, EdgeType::Blocking);
    assert!(g.has_blocking_cycle());
}

#[test]
fn non_blocking_cycle_is_allowed() {
    let mut g = WorkGraph::new();
    let x = g.add_node("echo X", 0.0, 0.0, NodeStatus::Empty);
    let y = g.add_node("echo Y", 0.0, 0.0, NodeStatus::Empty);
    g.add_edge(&x, &y, EdgeType::Blocking);
    g.add_edge(&y, &x, EdgeType::NonBlocking);
    assert!(!g.has_blocking_cycle());
}

#[test]
fn self_loop_is_a_cycle() {
    let mut g = WorkGraph::new();
    let x = g.add_node("echo X", 0.0, 0.0, NodeStatus::Empty);
    g.insert_edge(Edge::new(x.clone(), x.clone(), EdgeType::Blocking));
    assert!(g.has_blocking_cycle());
}

#[test]
fn subset_cycle_requires_both_endpoints_selected() {
    let mut g = WorkGraph::new();
    let x = g.add_node("echo X", 0.0, 0.0, NodeStatus::Empty);
    let y = g.add_node("echo Y", 0.0, 0.0, NodeStatus::Empty);
    g.add_edge(&x, &y, EdgeType::Blocking);
    g.add_edge(&y, &x, EdgeType::Blocking);

    let full: HashSet<NodeId> = [x.clone(), y.clone()].into_iter().collect();
    assert!(g.blocking_cycle_within(&full));

    let just_x: HashSet<NodeId> = [x.clone()].into_iter().collect();
    assert!(!g.blocking_cycle_within(&just_x));
}

#[test]
fn node_link_includes_exec_record() {
    let mut g = WorkGraph::new();
    let a = g.add_node("echo A", 1.0, 2.0, NodeStatus::Ran);
    g.node_mut(&a).unwrap().exec = Some(ExecRecord {
        command: "echo A".into(),
        stdout: "A\n".into(),
        stderr: String::new(),
        pid: "42".into(),
        error_code: "0".into(),
    });

    let full = g.node_link();
    let node = &full["nodes"][0];
    assert_eq!(node["stdout"], "A\n");
    assert_eq!(node["pid"], "42");
    assert_eq!(full["graph"]["wrapper"], "{}");

    let light = g.node_link_light();
    let node = &light["nodes"][0];
    assert_eq!(node["label"], "echo A");
    assert!(node.get("stdout").is_none());
    assert!(node.get("pid").is_none());
    assert_eq!(light["graph"], serde_json::json!({}));
}

#[test]
fn node_link_edge_fields() {
    let mut g = WorkGraph::new();
    let a = g.add_node("echo A", 0.0, 0.0, NodeStatus::Empty);
    let b = g.add_node("echo B", 0.0, 0.0, NodeStatus::Empty);
    g.add_edge(&a, &b, EdgeType::NonBlocking);

    let data = g.node_link();
    let link = &data["links"][0];
    assert_eq!(link["source"], serde_json::json!(a));
    assert_eq!(link["edge_type"], "non-blocking");
    assert_eq!(link["status"], "");
    assert!(link["id"].as_str().unwrap().starts_with("edge-"));
}

#[test]
fn idless_edge_serializes_without_id() {
    let mut g = WorkGraph::new();
    let a = g.add_node("echo A", 0.0, 0.0, NodeStatus::Empty);
    let b = g.add_node("echo B", 0.0, 0.0, NodeStatus::Empty);
    g.insert_edge(Edge {
        id: None,
        source: a,
        target: b,
        edge_type: EdgeType::Blocking,
        status: EdgeStatus::Empty,
    });
    let data = g.node_link();
    assert!(data["links"][0].get("id").is_none());
}
