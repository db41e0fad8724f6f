//! Identifier types for upstream resources
//!
//! Model URIs identify persisted model resources on the upstream server.
//! Session URIs identify transactional edit sessions and carry both an
//! HTTP-scheme form (as returned by session creation) and a
//! websocket-scheme variant (used to open the session socket).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a persisted model resource on the upstream server
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelUri(String);

impl ModelUri {
    /// Create a model URI from any string-like value
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the wrapper and return the inner string
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for ModelUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ModelUri {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// URI of a transactional edit session, as returned by session creation
///
/// The upstream server returns an HTTP-scheme URI; the session socket is
/// opened against the websocket-scheme variant of the same URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionUri(String);

impl SessionUri {
    /// Create a session URI from any string-like value
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The websocket-scheme variant of this URI
    ///
    /// `http://` becomes `ws://` and `https://` becomes `wss://`. A URI
    /// that already carries a websocket scheme is returned unchanged.
    pub fn websocket_variant(&self) -> String {
        if let Some(rest) = self.0.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.0.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.0.clone()
        }
    }
}

impl std::fmt::Display for SessionUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client identifier sent with session-creation requests
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(String);

impl ClientId {
    /// Generate a new random ClientId using UUIDv7
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Create from an existing string (for deserialization)
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
