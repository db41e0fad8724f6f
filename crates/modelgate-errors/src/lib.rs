//! Canonical error facility for Modelgate
//!
//! This crate provides a stable, structured classification of all errors
//! in the system. Each kind maps to a stable error code that can be used
//! for programmatic error handling, testing, and surfaced API responses.

use modelgate_core_types::{ModelUri, RequestId};
use thiserror::Error;

/// Result type alias using GateError
pub type Result<T> = std::result::Result<T, GateError>;

/// Canonical error kind taxonomy
///
/// The first four kinds are the coordination-protocol taxonomy; the rest
/// classify ambient integration failures (I/O, serialization, upstream
/// HTTP calls).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GateErrorKind {
    // Coordination protocol
    /// Operation attempted on a transaction with no live socket
    #[error("socket closed")]
    SocketClosed,
    /// Handshake or correlated reply never arrived, or the socket errored first
    #[error("transaction rejected")]
    TransactionRejected,
    /// A command/trigger provider failed or returned a failing transaction
    #[error("provider failure")]
    ProviderFailure,
    /// Registration against a reserved primitive command kind
    #[error("invalid registration")]
    InvalidRegistration,

    // Integration/IO
    /// A correlated await exceeded its configured deadline
    #[error("timeout")]
    Timeout,
    #[error("io")]
    Io,
    #[error("serialization")]
    Serialization,
    /// Upstream REST call failed
    #[error("external service")]
    ExternalService,

    // Internal
    #[error("internal")]
    Internal,
}

impl GateErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            GateErrorKind::SocketClosed => "ERR_SOCKET_CLOSED",
            GateErrorKind::TransactionRejected => "ERR_TRANSACTION_REJECTED",
            GateErrorKind::ProviderFailure => "ERR_PROVIDER_FAILURE",
            GateErrorKind::InvalidRegistration => "ERR_INVALID_REGISTRATION",
            GateErrorKind::Timeout => "ERR_TIMEOUT",
            GateErrorKind::Io => "ERR_IO",
            GateErrorKind::Serialization => "ERR_SERIALIZATION",
            GateErrorKind::ExternalService => "ERR_EXTERNAL_SERVICE",
            GateErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Provides classification fields for programmatic handling and rich
/// context for debugging. Context is attached builder-style at the point
/// where an error is raised.
#[derive(Debug, Clone)]
pub struct GateError {
    kind: GateErrorKind,
    op: Option<String>,
    model_uri: Option<ModelUri>,
    request_id: Option<RequestId>,
    message: String,
    source: Option<Box<GateError>>,
}

impl GateError {
    /// Create a new error with the specified kind
    pub fn new(kind: GateErrorKind) -> Self {
        Self {
            kind,
            op: None,
            model_uri: None,
            request_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Shorthand for a SocketClosed error
    pub fn socket_closed() -> Self {
        Self::new(GateErrorKind::SocketClosed)
    }

    /// Shorthand for a TransactionRejected error with a message
    pub fn transaction_rejected(message: impl Into<String>) -> Self {
        Self::new(GateErrorKind::TransactionRejected).with_message(message)
    }

    /// Shorthand for a ProviderFailure error with a message
    pub fn provider_failure(message: impl Into<String>) -> Self {
        Self::new(GateErrorKind::ProviderFailure).with_message(message)
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add model URI context
    pub fn with_model_uri(mut self, model_uri: ModelUri) -> Self {
        self.model_uri = Some(model_uri);
        self
    }

    /// Add request ID context
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: GateError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> GateErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the model URI context, if any
    pub fn model_uri(&self) -> Option<&ModelUri> {
        self.model_uri.as_ref()
    }

    /// Get the request ID context, if any
    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&GateError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for GateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.kind)?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(model_uri) = &self.model_uri {
            write!(f, " (model_uri: {})", model_uri)?;
        }
        Ok(())
    }
}

impl std::error::Error for GateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|s| s.as_ref() as _)
    }
}

/// Conversion from serde_json::Error to GateError
impl From<serde_json::Error> for GateError {
    fn from(err: serde_json::Error) -> Self {
        GateError::new(GateErrorKind::Serialization).with_message(err.to_string())
    }
}

/// Conversion from std::io::Error to GateError
impl From<std::io::Error> for GateError {
    fn from(err: std::io::Error) -> Self {
        GateError::new(GateErrorKind::Io).with_message(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_kind_codes() {
        let cases = [
            (GateErrorKind::SocketClosed, "ERR_SOCKET_CLOSED"),
            (GateErrorKind::TransactionRejected, "ERR_TRANSACTION_REJECTED"),
            (GateErrorKind::ProviderFailure, "ERR_PROVIDER_FAILURE"),
            (GateErrorKind::InvalidRegistration, "ERR_INVALID_REGISTRATION"),
            (GateErrorKind::Timeout, "ERR_TIMEOUT"),
        ];
        for (kind, expected_code) in cases {
            assert_eq!(kind.code(), expected_code, "Wrong code for {:?}", kind);
        }
    }

    #[test]
    fn test_error_context_builders() {
        let err = GateError::provider_failure("trigger panicked")
            .with_op("close")
            .with_model_uri(ModelUri::new("test:a"));

        assert_eq!(err.kind(), GateErrorKind::ProviderFailure);
        assert_eq!(err.op(), Some("close"));
        assert_eq!(err.model_uri().map(ModelUri::as_str), Some("test:a"));
        assert_eq!(err.message(), "trigger panicked");
    }

    #[test]
    fn test_display_includes_code_and_context() {
        let err = GateError::socket_closed().with_op("apply_patch");
        let rendered = err.to_string();
        assert!(rendered.contains("ERR_SOCKET_CLOSED"));
        assert!(rendered.contains("apply_patch"));
    }

    #[test]
    fn test_source_chain() {
        let inner = GateError::new(GateErrorKind::Io).with_message("broken pipe");
        let outer = GateError::transaction_rejected("handshake failed").with_source(inner);

        let source = outer.source_error().expect("source should be Some");
        assert_eq!(source.kind(), GateErrorKind::Io);
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: GateError = json_err.into();
        assert_eq!(err.kind(), GateErrorKind::Serialization);
    }
}
