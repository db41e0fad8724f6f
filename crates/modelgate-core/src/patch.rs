//! Patch model and the cumulative update result
//!
//! A patch is an ordered list of JSON-patch-style operations describing a
//! diff against a model. Patches are immutable once created; aggregation
//! across nested transaction scopes happens by concatenation only, never
//! by reordering.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-patch operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOpKind {
    Add,
    Remove,
    Replace,
    Move,
    Copy,
    Test,
}

/// One JSON-patch-style diff unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOpKind,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Source path for `move` and `copy` operations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

impl PatchOperation {
    /// An `add` operation inserting `value` at `path`
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchOpKind::Add,
            path: path.into(),
            value: Some(value),
            from: None,
        }
    }

    /// A `remove` operation deleting the value at `path`
    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: PatchOpKind::Remove,
            path: path.into(),
            value: None,
            from: None,
        }
    }

    /// A `replace` operation overwriting the value at `path`
    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchOpKind::Replace,
            path: path.into(),
            value: Some(value),
            from: None,
        }
    }
}

/// Cumulative outcome of an edit
///
/// Results are merged as nested transaction scopes pop: the patch lists
/// are concatenated in call order, and `success` is the AND of every
/// merged sub-result. An aggregate that absorbed one unsuccessful
/// sub-result therefore reports unsuccessful, while still carrying every
/// merged operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelUpdateResult {
    pub success: bool,
    #[serde(default)]
    pub patch: Vec<PatchOperation>,
}

impl ModelUpdateResult {
    /// A successful result carrying the given patch
    pub fn successful(patch: Vec<PatchOperation>) -> Self {
        Self {
            success: true,
            patch,
        }
    }

    /// An unsuccessful, empty result
    ///
    /// Used for edits that were never sent (empty patch) and as the fixed
    /// result of operations on an already-closed transaction.
    pub fn unsuccessful() -> Self {
        Self {
            success: false,
            patch: Vec::new(),
        }
    }

    /// Merge another result into this one
    ///
    /// Appends `other`'s patch (preserving its order) and ANDs the
    /// success flags.
    pub fn merge_from(&mut self, other: ModelUpdateResult) {
        self.success = self.success && other.success;
        self.patch.extend(other.patch);
    }
}

impl Default for ModelUpdateResult {
    fn default() -> Self {
        Self::successful(Vec::new())
    }
}
