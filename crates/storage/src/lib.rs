// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wf-storage: workfile persistence for Workforce.
//!
//! A [`GraphStore`] owns one workfile path and applies every mutation as
//! load-modify-save with an atomic rename, so readers never observe a
//! half-written file. The on-disk format is pluggable through
//! [`GraphCodec`]; the canonical codec is GraphML.

mod codec;
mod graphml;
mod store;

pub use codec::{CodecError, GraphCodec};
pub use graphml::GraphmlCodec;
pub use store::{GraphStore, NodePosition, StatusApplied, StatusUpdate, StoreError};
