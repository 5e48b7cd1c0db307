//! Capability Flattening
//!
//! Converts a pool's nested capability tree into a flat, dot-addressed
//! mapping of scalar values so requirement keys such as
//! `extras.ioConnectivity.maxIOPS` can be looked up directly.

use crate::domain::ports::{CapabilityTree, CapabilityValue, Scalar};
use crate::error::Result;
use std::collections::BTreeMap;
use tracing::trace;

/// Maximum number of flattening passes; deeper nesting is dropped
pub const MAX_FLATTEN_PASSES: usize = 8;

/// Dot-joined capability path to scalar value
pub type FlatCapabilities = BTreeMap<String, Scalar>;

/// Flatten a capability tree.
///
/// Each pass moves the scalar entries of the working set into the result
/// under their accumulated path and feeds nested entries into the next
/// pass. When a path is produced twice, the later pass wins.
pub fn flatten(tree: &CapabilityTree) -> FlatCapabilities {
    let mut flat = FlatCapabilities::new();
    let mut working: Vec<(String, &CapabilityTree)> = vec![(String::new(), tree)];

    for _ in 0..MAX_FLATTEN_PASSES {
        if working.is_empty() {
            break;
        }

        let mut nested = Vec::new();
        for (prefix, map) in working {
            for (name, value) in map {
                let path = join_path(&prefix, name);
                match value {
                    CapabilityValue::Scalar(scalar) => {
                        flat.insert(path, scalar.clone());
                    }
                    CapabilityValue::Map(inner) => nested.push((path, inner)),
                }
            }
        }
        working = nested;
    }

    if !working.is_empty() {
        trace!(
            dropped_subtrees = working.len(),
            max_passes = MAX_FLATTEN_PASSES,
            "Capability nesting exceeds flatten bound, dropping"
        );
    }

    flat
}

/// Flatten a generic structured document.
///
/// Fails only when the document is not a nested key-value document.
pub fn flatten_document(doc: &serde_json::Value) -> Result<FlatCapabilities> {
    let tree = CapabilityValue::tree_from_document(doc)?;
    Ok(flatten(&tree))
}

#[inline]
fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}
