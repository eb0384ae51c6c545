// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wrapper templates: composing the shell command for a node.
//!
//! A wrapper is a graph-level template like `bash -c '{}'`. Executing a
//! node substitutes its label for the `{}` sigil; a wrapper without the
//! sigil has the label appended after a space.

/// The substitution sigil.
pub const SIGIL: &str = "{}";

/// Escape a (possibly multi-line) script for embedding inside single
/// quotes in `sh -c '...'`.
pub fn quote_multiline(script: &str) -> String {
    script.replace('\'', "'\\''")
}

/// Compose the command line for a node label under the given wrapper.
pub fn compose(wrapper: &str, label: &str) -> String {
    if wrapper.trim().is_empty() || wrapper == SIGIL {
        return label.to_string();
    }
    let quoted = quote_multiline(label);
    if wrapper.contains(SIGIL) {
        wrapper.replace(SIGIL, &quoted)
    } else {
        format!("{} {}", wrapper, quoted)
    }
}

#[cfg(test)]
#[path = "wrapper_tests.rs"]
mod tests;
