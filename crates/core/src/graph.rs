// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The typed work graph: nodes are shell commands, edges are dependencies.
//!
//! Node order is preserved (workfiles diff cleanly when only appended to).
//! Edge ids are optional because workfiles written by other tools may omit
//! them; the scheduler mints ids lazily when propagation first needs one.

use crate::define_id;
use crate::status::{EdgeStatus, EdgeType, NodeStatus};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};

define_id! {
    /// Identifier for a node (one shell command) in a work graph.
    pub struct NodeId("node-");
}

define_id! {
    /// Identifier for a dependency edge in a work graph.
    pub struct EdgeId("edge-");
}

/// Execution record written by the runner that last executed a node.
///
/// All five fields are overwritten together; a partially-updated record is
/// never observable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecRecord {
    /// The exact command string that was executed.
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    /// Stored as text; foreign workfiles may carry non-numeric junk here.
    pub pid: String,
    pub error_code: String,
}

/// A node: one shell command with layout hints and execution state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// The shell command text; may span multiple lines.
    pub label: String,
    pub x: f64,
    pub y: f64,
    pub status: NodeStatus,
    /// Structured record from the most recent execution.
    pub exec: Option<ExecRecord>,
    /// Legacy single-field log, kept for workfiles written before the
    /// structured record existed.
    pub log: Option<String>,
}

impl Node {
    pub fn new(label: impl Into<String>, x: f64, y: f64, status: NodeStatus) -> Self {
        Self {
            id: NodeId::new(),
            label: label.into(),
            x,
            y,
            status,
            exec: None,
            log: None,
        }
    }
}

/// A directed dependency edge between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: Option<EdgeId>,
    pub source: NodeId,
    pub target: NodeId,
    pub edge_type: EdgeType,
    pub status: EdgeStatus,
}

impl Edge {
    pub fn new(source: NodeId, target: NodeId, edge_type: EdgeType) -> Self {
        Self { id: Some(EdgeId::new()), source, target, edge_type, status: EdgeStatus::Empty }
    }
}

/// A directed graph of shell commands plus the wrapper template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkGraph {
    nodes: IndexMap<NodeId, Node>,
    edges: Vec<Edge>,
    /// Template with a `{}` sigil; the node label is substituted in when a
    /// node is executed. No sigil means the label is appended after a space.
    pub wrapper: String,
}

pub const DEFAULT_WRAPPER: &str = "{}";

impl Default for WorkGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkGraph {
    pub fn new() -> Self {
        Self { nodes: IndexMap::new(), edges: Vec::new(), wrapper: DEFAULT_WRAPPER.to_string() }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    // -- nodes --

    /// Add a fresh node and return its minted id.
    pub fn add_node(
        &mut self,
        label: impl Into<String>,
        x: f64,
        y: f64,
        status: NodeStatus,
    ) -> NodeId {
        let node = Node::new(label, x, y, status);
        let id = node.id.clone();
        self.nodes.insert(id.clone(), node);
        id
    }

    /// Insert a node that already has an id (codec path).
    pub fn insert_node(&mut self, node: Node) {
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Remove a node and every edge incident to it.
    pub fn remove_node(&mut self, id: &NodeId) -> bool {
        if self.nodes.shift_remove(id).is_none() {
            return false;
        }
        self.edges.retain(|e| e.source != *id && e.target != *id);
        true
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    // -- edges --

    /// Add an edge between two existing nodes. Returns `None` when either
    /// endpoint is missing.
    pub fn add_edge(&mut self, source: &NodeId, target: &NodeId, edge_type: EdgeType) -> Option<EdgeId> {
        if !self.contains_node(source) || !self.contains_node(target) {
            return None;
        }
        let edge = Edge::new(source.clone(), target.clone(), edge_type);
        let id = edge.id.clone();
        self.edges.push(edge);
        id
    }

    /// Insert an edge as parsed from a workfile (codec path).
    pub fn insert_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    pub fn edge_between(&self, source: &NodeId, target: &NodeId) -> Option<&Edge> {
        self.edges.iter().find(|e| e.source == *source && e.target == *target)
    }

    pub fn edge_between_mut(&mut self, source: &NodeId, target: &NodeId) -> Option<&mut Edge> {
        self.edges.iter_mut().find(|e| e.source == *source && e.target == *target)
    }

    pub fn remove_edge_between(&mut self, source: &NodeId, target: &NodeId) -> bool {
        let before = self.edges.len();
        self.edges.retain(|e| !(e.source == *source && e.target == *target));
        self.edges.len() != before
    }

    pub fn edge_by_id(&self, id: &EdgeId) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id.as_ref() == Some(id))
    }

    pub fn edge_by_id_mut(&mut self, id: &EdgeId) -> Option<&mut Edge> {
        self.edges.iter_mut().find(|e| e.id.as_ref() == Some(id))
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub fn edges_mut(&mut self) -> impl Iterator<Item = &mut Edge> {
        self.edges.iter_mut()
    }

    pub fn out_edges<'a>(&'a self, node: &'a NodeId) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == *node)
    }

    pub fn in_edges<'a>(&'a self, node: &'a NodeId) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == *node)
    }

    pub fn in_degree(&self, node: &NodeId) -> usize {
        self.in_edges(node).count()
    }

    /// Nodes with no incoming edges, in insertion order.
    pub fn roots(&self) -> Vec<NodeId> {
        self.nodes
            .keys()
            .filter(|n| self.in_degree(n) == 0)
            .cloned()
            .collect()
    }

    /// Nodes of `subset` with no incoming edges from within `subset`.
    pub fn roots_within(&self, subset: &HashSet<NodeId>) -> Vec<NodeId> {
        self.nodes
            .keys()
            .filter(|n| subset.contains(*n))
            .filter(|n| !self.edges.iter().any(|e| e.target == **n && subset.contains(&e.source)))
            .cloned()
            .collect()
    }

    // -- cycle detection --

    /// True iff the subgraph of blocking edges contains a directed cycle.
    pub fn has_blocking_cycle(&self) -> bool {
        edges_have_cycle(
            self.edges
                .iter()
                .filter(|e| e.edge_type == EdgeType::Blocking)
                .map(|e| (&e.source, &e.target)),
        )
    }

    /// Cycle test over blocking edges restricted to `subset` (both
    /// endpoints must be selected for an edge to count).
    pub fn blocking_cycle_within(&self, subset: &HashSet<NodeId>) -> bool {
        edges_have_cycle(
            self.edges
                .iter()
                .filter(|e| e.edge_type == EdgeType::Blocking)
                .filter(|e| subset.contains(&e.source) && subset.contains(&e.target))
                .map(|e| (&e.source, &e.target)),
        )
    }

    // -- projections --

    /// Full node-link projection, execution records included.
    pub fn node_link(&self) -> Value {
        json!({
            "nodes": self.nodes.values().map(|n| node_json(n, true)).collect::<Vec<_>>(),
            "links": self.edges.iter().map(edge_json).collect::<Vec<_>>(),
            "graph": { "wrapper": self.wrapper },
        })
    }

    /// Transport projection: heavyweight log attributes stripped, graph
    /// metadata omitted, to bound payload size.
    pub fn node_link_light(&self) -> Value {
        json!({
            "nodes": self.nodes.values().map(|n| node_json(n, false)).collect::<Vec<_>>(),
            "links": self.edges.iter().map(edge_json).collect::<Vec<_>>(),
            "graph": {},
        })
    }
}

fn node_json(node: &Node, include_logs: bool) -> Value {
    let mut value = json!({
        "id": node.id,
        "label": node.label,
        "x": node.x,
        "y": node.y,
        "status": node.status,
    });
    if include_logs {
        if let Some(obj) = value.as_object_mut() {
            if let Some(exec) = &node.exec {
                obj.insert("command".into(), json!(exec.command));
                obj.insert("stdout".into(), json!(exec.stdout));
                obj.insert("stderr".into(), json!(exec.stderr));
                obj.insert("pid".into(), json!(exec.pid));
                obj.insert("error_code".into(), json!(exec.error_code));
            }
            if let Some(log) = &node.log {
                obj.insert("log".into(), json!(log));
            }
        }
    }
    value
}

fn edge_json(edge: &Edge) -> Value {
    let mut value = json!({
        "source": edge.source,
        "target": edge.target,
        "edge_type": edge.edge_type,
        "status": edge.status,
    });
    if let (Some(obj), Some(id)) = (value.as_object_mut(), &edge.id) {
        obj.insert("id".into(), json!(id));
    }
    value
}

/// Directed-cycle test over an explicit edge list, iterative DFS.
fn edges_have_cycle<'a>(edges: impl Iterator<Item = (&'a NodeId, &'a NodeId)>) -> bool {
    let mut adjacency: HashMap<&NodeId, Vec<&NodeId>> = HashMap::new();
    let mut vertices: HashSet<&NodeId> = HashSet::new();
    for (source, target) in edges {
        adjacency.entry(source).or_default().push(target);
        vertices.insert(source);
        vertices.insert(target);
    }

    // 0 = unvisited, 1 = on the current path, 2 = finished
    let mut state: HashMap<&NodeId, u8> = HashMap::new();
    for &start in &vertices {
        if state.get(start).copied().unwrap_or(0) != 0 {
            continue;
        }
        let mut stack: Vec<(&NodeId, usize)> = vec![(start, 0)];
        state.insert(start, 1);
        while let Some(&(node, child_idx)) = stack.last() {
            let children = adjacency.get(node).map(Vec::as_slice).unwrap_or(&[]);
            if child_idx < children.len() {
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                let child = children[child_idx];
                match state.get(child).copied().unwrap_or(0) {
                    0 => {
                        state.insert(child, 1);
                        stack.push((child, 0));
                    }
                    1 => return true,
                    _ => {}
                }
            } else {
                state.insert(node, 2);
                stack.pop();
            }
        }
    }
    false
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
