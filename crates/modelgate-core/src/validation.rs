//! Validation boundary
//!
//! Validation runs after successful edits as a best-effort follow-up: its
//! failures are logged, never folded into the edit's own outcome. The
//! content-specific rule semantics live behind this trait, outside the
//! orchestrator.

use async_trait::async_trait;
use modelgate_core_types::ModelUri;
use modelgate_errors::Result;
use serde_json::Value;

/// Validates a model after a successful edit
#[async_trait]
pub trait ModelValidator: Send + Sync {
    /// Validate the model and return the upstream diagnostic payload
    async fn validate(&self, model_uri: &ModelUri) -> Result<Value>;
}

/// Validator that accepts every model
///
/// Useful as a default when no validation collaborator is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopValidator;

#[async_trait]
impl ModelValidator for NoopValidator {
    async fn validate(&self, _model_uri: &ModelUri) -> Result<Value> {
        Ok(Value::Null)
    }
}
