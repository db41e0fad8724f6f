//! Correlation types for request tracking and tracing
//!
//! These types enable correlation of edit operations across async
//! boundaries. The upstream wire protocol itself carries no request id,
//! so these ids exist purely for logging and diagnostics on this side.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::uri::ModelUri;

/// Unique identifier for a single edit request or operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a new random RequestId using UUIDv7
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Create from an existing string (for deserialization)
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Context carried through operation boundaries for correlation
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: RequestId,
    pub model_uri: Option<ModelUri>,
}

impl RequestContext {
    /// Create a new context with a fresh RequestId
    pub fn new() -> Self {
        Self {
            request_id: RequestId::new(),
            model_uri: None,
        }
    }

    /// Add the model URI the operation targets
    pub fn with_model_uri(mut self, model_uri: ModelUri) -> Self {
        self.model_uri = Some(model_uri);
        self
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_generation() {
        let id1 = RequestId::new();
        let id2 = RequestId::new();

        // Should generate different IDs
        assert_ne!(id1, id2);
        assert!(!id1.as_str().is_empty());
    }

    #[test]
    fn test_request_id_display() {
        let id = RequestId::new();
        let display_str = format!("{}", id);
        assert_eq!(display_str, id.as_str());
    }

    #[test]
    fn test_request_context_creation() {
        let ctx = RequestContext::new();
        assert!(!ctx.request_id.as_str().is_empty());
        assert!(ctx.model_uri.is_none());
    }

    #[test]
    fn test_request_context_with_model_uri() {
        let uri = ModelUri::new("test:a");
        let ctx = RequestContext::new().with_model_uri(uri.clone());

        assert_eq!(ctx.model_uri, Some(uri));
    }
}
