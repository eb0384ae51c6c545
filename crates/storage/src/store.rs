// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The graph store: load-modify-save mutations over one workfile.
//!
//! Writes are atomic at the filesystem: the codec output is staged to a
//! sibling temp file in the same directory and renamed over the target.
//! Within a workspace all writes arrive serialized through the mutation
//! worker, so no file lock is needed; the rename protects concurrent
//! readers and crash recovery.

use crate::codec::{CodecError, GraphCodec};
use crate::graphml::GraphmlCodec;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::info;
use wf_core::{
    EdgeId, EdgeType, ElementKind, ExecRecord, NodeId, NodeStatus, UnknownValue, WorkGraph,
};

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("edge not found: {0}")]
    EdgeNotFound(String),

    #[error("both source and target must exist")]
    EndpointMissing,

    #[error(transparent)]
    BadValue(#[from] UnknownValue),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One entry of a batch status edit.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StatusUpdate {
    pub kind: ElementKind,
    pub element_id: String,
    pub value: String,
}

/// One entry of a batch position edit.
#[derive(Debug, Clone, serde::Serialize)]
pub struct NodePosition {
    pub node_id: NodeId,
    pub x: f64,
    pub y: f64,
}

/// What a status edit resolved to, for the scheduler's reactions.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusApplied {
    Node(NodeId, NodeStatus),
    Edge(EdgeId, wf_core::EdgeStatus),
}

/// Load/save plus every mutation operation over one workfile path.
///
/// Each operation performs exactly one load and one save.
pub struct GraphStore<C = GraphmlCodec> {
    path: PathBuf,
    codec: C,
}

impl GraphStore<GraphmlCodec> {
    /// Store over the canonical GraphML codec.
    pub fn graphml(path: impl Into<PathBuf>) -> Self {
        Self::new(path, GraphmlCodec)
    }
}

impl<C: GraphCodec> GraphStore<C> {
    pub fn new(path: impl Into<PathBuf>, codec: C) -> Self {
        Self { path: path.into(), codec }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the graph; a missing workfile yields a fresh empty graph that
    /// is written out so subsequent reads succeed.
    pub fn load(&self) -> Result<WorkGraph, StoreError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(self.codec.decode(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let graph = WorkGraph::new();
                self.save(&graph)?;
                info!(path = %self.path.display(), "created empty workfile");
                Ok(graph)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Serialize to a sibling temp file, then rename over the target.
    pub fn save(&self, graph: &WorkGraph) -> Result<(), StoreError> {
        self.save_to(graph, &self.path)
    }

    /// Save a copy of the graph to another path with the same codec
    /// (save-as), atomically as well.
    pub fn save_to(&self, graph: &WorkGraph, path: &Path) -> Result<(), StoreError> {
        let bytes = self.codec.encode(graph)?;
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
        let mut tmp = NamedTempFile::new_in(dir.unwrap_or(Path::new(".")))?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    // -- operations --

    pub fn add_node(
        &self,
        label: &str,
        x: f64,
        y: f64,
        status: NodeStatus,
    ) -> Result<NodeId, StoreError> {
        let mut graph = self.load()?;
        let id = graph.add_node(label, x, y, status);
        self.save(&graph)?;
        info!(node = %id, "added node");
        Ok(id)
    }

    pub fn remove_node(&self, node_id: &NodeId) -> Result<(), StoreError> {
        let mut graph = self.load()?;
        if !graph.remove_node(node_id) {
            return Err(StoreError::NodeNotFound(node_id.to_string()));
        }
        self.save(&graph)?;
        info!(node = %node_id, "removed node");
        Ok(())
    }

    pub fn add_edge(
        &self,
        source: &NodeId,
        target: &NodeId,
        edge_type: EdgeType,
    ) -> Result<EdgeId, StoreError> {
        let mut graph = self.load()?;
        let id = graph.add_edge(source, target, edge_type).ok_or(StoreError::EndpointMissing)?;
        self.save(&graph)?;
        info!(edge = %id, source = %source, target = %target, "added edge");
        Ok(id)
    }

    pub fn remove_edge(&self, source: &NodeId, target: &NodeId) -> Result<(), StoreError> {
        let mut graph = self.load()?;
        if !graph.remove_edge_between(source, target) {
            return Err(StoreError::EdgeNotFound(format!("{source} -> {target}")));
        }
        self.save(&graph)?;
        info!(source = %source, target = %target, "removed edge");
        Ok(())
    }

    pub fn edit_edge_type(
        &self,
        source: &NodeId,
        target: &NodeId,
        edge_type: EdgeType,
    ) -> Result<(), StoreError> {
        let mut graph = self.load()?;
        let edge = graph
            .edge_between_mut(source, target)
            .ok_or_else(|| StoreError::EdgeNotFound(format!("{source} -> {target}")))?;
        edge.edge_type = edge_type;
        self.save(&graph)?;
        Ok(())
    }

    /// Set the status of a node or edge. The value string is parsed
    /// against the closed enum for the element kind.
    pub fn edit_status(
        &self,
        kind: ElementKind,
        element_id: &str,
        value: &str,
    ) -> Result<StatusApplied, StoreError> {
        let mut graph = self.load()?;
        let applied = apply_status(&mut graph, kind, element_id, value)?;
        self.save(&graph)?;
        Ok(applied)
    }

    /// Batch status edit: fail-fast with zero side effects if any entry
    /// is invalid; otherwise all apply under a single save.
    pub fn edit_statuses(&self, updates: &[StatusUpdate]) -> Result<usize, StoreError> {
        let mut graph = self.load()?;
        // Validate everything against the loaded graph before mutating.
        for update in updates {
            validate_status(&graph, update)?;
        }
        for update in updates {
            apply_status(&mut graph, update.kind, &update.element_id, &update.value)?;
        }
        self.save(&graph)?;
        Ok(updates.len())
    }

    pub fn edit_node_position(&self, node_id: &NodeId, x: f64, y: f64) -> Result<(), StoreError> {
        let mut graph = self.load()?;
        let node =
            graph.node_mut(node_id).ok_or_else(|| StoreError::NodeNotFound(node_id.to_string()))?;
        node.x = x;
        node.y = y;
        self.save(&graph)?;
        Ok(())
    }

    /// Batch position edit: valid entries apply, missing node ids are
    /// reported back rather than failing the batch.
    pub fn edit_node_positions(
        &self,
        positions: &[NodePosition],
    ) -> Result<(usize, Vec<NodeId>), StoreError> {
        let mut graph = self.load()?;
        let mut updated = 0;
        let mut missing = Vec::new();
        for position in positions {
            match graph.node_mut(&position.node_id) {
                Some(node) => {
                    node.x = position.x;
                    node.y = position.y;
                    updated += 1;
                }
                None => missing.push(position.node_id.clone()),
            }
        }
        self.save(&graph)?;
        Ok((updated, missing))
    }

    pub fn edit_wrapper(&self, wrapper: &str) -> Result<(), StoreError> {
        let mut graph = self.load()?;
        graph.wrapper = wrapper.to_string();
        self.save(&graph)?;
        Ok(())
    }

    pub fn edit_node_label(&self, node_id: &NodeId, label: &str) -> Result<(), StoreError> {
        let mut graph = self.load()?;
        let node =
            graph.node_mut(node_id).ok_or_else(|| StoreError::NodeNotFound(node_id.to_string()))?;
        node.label = label.to_string();
        self.save(&graph)?;
        Ok(())
    }

    /// Overwrite the node's execution record; all five fields replace the
    /// previous record as one unit.
    pub fn save_node_execution_data(
        &self,
        node_id: &NodeId,
        record: ExecRecord,
    ) -> Result<(), StoreError> {
        let mut graph = self.load()?;
        let node =
            graph.node_mut(node_id).ok_or_else(|| StoreError::NodeNotFound(node_id.to_string()))?;
        node.exec = Some(record);
        self.save(&graph)?;
        Ok(())
    }

    /// Legacy single-field log write.
    pub fn save_node_log(&self, node_id: &NodeId, log: &str) -> Result<(), StoreError> {
        let mut graph = self.load()?;
        let node =
            graph.node_mut(node_id).ok_or_else(|| StoreError::NodeNotFound(node_id.to_string()))?;
        node.log = Some(log.to_string());
        self.save(&graph)?;
        Ok(())
    }

    /// Clear execution records from a batch of nodes; fail-fast if any id
    /// is unknown.
    pub fn remove_node_logs(&self, node_ids: &[NodeId]) -> Result<usize, StoreError> {
        let mut graph = self.load()?;
        for node_id in node_ids {
            if !graph.contains_node(node_id) {
                return Err(StoreError::NodeNotFound(node_id.to_string()));
            }
        }
        for node_id in node_ids {
            if let Some(node) = graph.node_mut(node_id) {
                node.exec = None;
                node.log = None;
            }
        }
        self.save(&graph)?;
        Ok(node_ids.len())
    }

    pub fn has_blocking_cycle(&self) -> Result<bool, StoreError> {
        Ok(self.load()?.has_blocking_cycle())
    }
}

fn validate_status(graph: &WorkGraph, update: &StatusUpdate) -> Result<(), StoreError> {
    match update.kind {
        ElementKind::Node => {
            update.value.parse::<NodeStatus>()?;
            if !graph.contains_node(&NodeId::from_string(&update.element_id)) {
                return Err(StoreError::NodeNotFound(update.element_id.clone()));
            }
        }
        ElementKind::Edge => {
            update.value.parse::<wf_core::EdgeStatus>()?;
            if graph.edge_by_id(&EdgeId::from_string(&update.element_id)).is_none() {
                return Err(StoreError::EdgeNotFound(update.element_id.clone()));
            }
        }
    }
    Ok(())
}

fn apply_status(
    graph: &mut WorkGraph,
    kind: ElementKind,
    element_id: &str,
    value: &str,
) -> Result<StatusApplied, StoreError> {
    match kind {
        ElementKind::Node => {
            let status: NodeStatus = value.parse()?;
            let node_id = NodeId::from_string(element_id);
            let node = graph
                .node_mut(&node_id)
                .ok_or_else(|| StoreError::NodeNotFound(element_id.to_string()))?;
            node.status = status;
            Ok(StatusApplied::Node(node_id, status))
        }
        ElementKind::Edge => {
            let status: wf_core::EdgeStatus = value.parse()?;
            let edge_id = EdgeId::from_string(element_id);
            let edge = graph
                .edge_by_id_mut(&edge_id)
                .ok_or_else(|| StoreError::EdgeNotFound(element_id.to_string()))?;
            edge.status = status;
            Ok(StatusApplied::Edge(edge_id, status))
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
