//! Command model
//!
//! A command is a structured, non-patch edit request. The primitive kinds
//! (`add`, `remove`, `set`) belong to the upstream server and are always
//! forwarded unchanged; custom kinds are the extension point command
//! providers register against.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Primitive command kind: insert an element
pub const COMMAND_KIND_ADD: &str = "add";
/// Primitive command kind: delete an element
pub const COMMAND_KIND_REMOVE: &str = "remove";
/// Primitive command kind: set a feature value
pub const COMMAND_KIND_SET: &str = "set";

/// Command kinds handled by the upstream server itself
///
/// Providers may not register against these; registration attempts fail
/// with `InvalidRegistration`.
pub const RESERVED_COMMAND_KINDS: [&str; 3] =
    [COMMAND_KIND_ADD, COMMAND_KIND_REMOVE, COMMAND_KIND_SET];

/// Check whether a command kind is reserved for the upstream server
pub fn is_reserved_kind(kind: &str) -> bool {
    RESERVED_COMMAND_KINDS.contains(&kind)
}

/// A structured edit request
///
/// The payload is deliberately opaque to the orchestrator: only the kind
/// participates in routing, the data travels to whichever provider claims
/// the command (or to the upstream server unchanged).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCommand {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

impl ModelCommand {
    /// Create a command with the given kind and payload
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reserved_kinds() {
        assert!(is_reserved_kind("add"));
        assert!(is_reserved_kind("remove"));
        assert!(is_reserved_kind("set"));
        assert!(!is_reserved_kind("increment-counter"));
        assert!(!is_reserved_kind(""));
    }

    #[test]
    fn test_command_wire_shape() {
        let cmd = ModelCommand::new("increment-counter", json!({"step": 2}));
        let json = serde_json::to_value(&cmd).unwrap();

        assert_eq!(json, json!({"type": "increment-counter", "data": {"step": 2}}));
    }

    #[test]
    fn test_command_parses_without_data() {
        let cmd: ModelCommand = serde_json::from_value(json!({"type": "undo"})).unwrap();
        assert_eq!(cmd.kind, "undo");
        assert_eq!(cmd.data, Value::Null);
    }
}
