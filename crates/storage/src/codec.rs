// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The codec seam between the store and the on-disk workfile format.

use thiserror::Error;
use wf_core::{UnknownValue, WorkGraph};

/// Errors from encoding or decoding a workfile.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("xml attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),

    #[error("xml escape error: {0}")]
    Escape(#[from] quick_xml::escape::EscapeError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed workfile: {0}")]
    Malformed(String),

    #[error(transparent)]
    BadValue(#[from] UnknownValue),
}

/// Serializes a [`WorkGraph`] to and from workfile bytes.
///
/// Implementations must be self-describing: a graph decoded from its own
/// encoding compares equal to the original (modulo attribute defaults).
pub trait GraphCodec: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<WorkGraph, CodecError>;
    fn encode(&self, graph: &WorkGraph) -> Result<Vec<u8>, CodecError>;
}
