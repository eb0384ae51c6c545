// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Closed status and kind enumerations for graph elements.
//!
//! The empty string is a real value ("no status") everywhere these appear
//! on the wire or in a workfile, so every enum here maps `""` to its
//! `Empty`/default variant. Unknown strings are rejected at ingress with
//! [`UnknownValue`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error for a string that is not a member of a closed enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value:?}")]
pub struct UnknownValue {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownValue {
    fn new(kind: &'static str, value: &str) -> Self {
        Self { kind, value: value.to_string() }
    }
}

/// Execution status of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeStatus {
    /// No status set (stored as the empty string).
    #[default]
    #[serde(rename = "")]
    Empty,
    /// Queued for execution; runners pick these up.
    #[serde(rename = "run")]
    Run,
    /// A runner has a live process for this node.
    #[serde(rename = "running")]
    Running,
    /// Process exited zero.
    #[serde(rename = "ran")]
    Ran,
    /// Process exited nonzero (or was killed).
    #[serde(rename = "fail")]
    Fail,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Empty => "",
            NodeStatus::Run => "run",
            NodeStatus::Running => "running",
            NodeStatus::Ran => "ran",
            NodeStatus::Fail => "fail",
        }
    }

    /// Queued or live: the node counts against run completion.
    pub fn is_active(&self) -> bool {
        matches!(self, NodeStatus::Run | NodeStatus::Running)
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NodeStatus {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(NodeStatus::Empty),
            "run" => Ok(NodeStatus::Run),
            "running" => Ok(NodeStatus::Running),
            "ran" => Ok(NodeStatus::Ran),
            "fail" => Ok(NodeStatus::Fail),
            other => Err(UnknownValue::new("node status", other)),
        }
    }
}

/// Readiness status of an edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeStatus {
    /// No status set (stored as the empty string).
    #[default]
    #[serde(rename = "")]
    Empty,
    /// The source has completed since the target last ran.
    #[serde(rename = "to_run")]
    ToRun,
}

impl EdgeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeStatus::Empty => "",
            EdgeStatus::ToRun => "to_run",
        }
    }
}

impl fmt::Display for EdgeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EdgeStatus {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(EdgeStatus::Empty),
            "to_run" => Ok(EdgeStatus::ToRun),
            other => Err(UnknownValue::new("edge status", other)),
        }
    }
}

/// Gating semantics of an edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeType {
    /// The target fires only when every blocking in-edge is satisfied.
    #[default]
    #[serde(rename = "blocking")]
    Blocking,
    /// Any single completion over this edge may fire the target.
    #[serde(rename = "non-blocking")]
    NonBlocking,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Blocking => "blocking",
            EdgeType::NonBlocking => "non-blocking",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EdgeType {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            // Missing attribute defaults to blocking.
            "" | "blocking" => Ok(EdgeType::Blocking),
            "non-blocking" => Ok(EdgeType::NonBlocking),
            other => Err(UnknownValue::new("edge type", other)),
        }
    }
}

/// Which table a status edit addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    #[serde(rename = "node")]
    Node,
    #[serde(rename = "edge")]
    Edge,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Node => "node",
            ElementKind::Edge => "edge",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ElementKind {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "node" => Ok(ElementKind::Node),
            "edge" => Ok(ElementKind::Edge),
            other => Err(UnknownValue::new("element type", other)),
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
