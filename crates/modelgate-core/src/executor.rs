//! Capability surfaces for performing edits
//!
//! `Executor` is the narrow surface handed to commands, transactions, and
//! triggers for further edits within the current scope. `EditTransaction`
//! is the wider surface other server-side code drives a transaction with,
//! whether or not one is already open.
//!
//! Both take `&mut self` on edit operations: the upstream wire protocol
//! has no request id, so send/await pairs on one transaction must never
//! overlap. Exclusive borrows make an overlapping in-flight call on the
//! same context unrepresentable rather than merely disallowed.

use async_trait::async_trait;
use modelgate_core_types::ModelUri;
use modelgate_errors::Result;

use crate::command::ModelCommand;
use crate::edit::Edit;
use crate::patch::{ModelUpdateResult, PatchOperation};

/// Capability surface given to commands, transactions, and triggers
#[async_trait]
pub trait Executor: Send {
    /// Execute a primitive or custom command within the current scope
    async fn execute(
        &mut self,
        model_uri: &ModelUri,
        command: ModelCommand,
    ) -> Result<ModelUpdateResult>;

    /// Apply a patch within the current scope
    async fn apply_patch(&mut self, patch: Vec<PatchOperation>) -> Result<ModelUpdateResult>;
}

/// Uniform surface over an open transactional edit span
#[async_trait]
pub trait EditTransaction: Executor {
    /// Whether the transaction can still accept edits
    fn is_open(&self) -> bool;

    /// The model resource this transaction edits
    fn model_uri(&self) -> &ModelUri;

    /// Perform one edit of any kind within this transaction
    async fn edit(&mut self, edit: Edit) -> Result<ModelUpdateResult>;

    /// Commit: run the close-time trigger cascade and return the aggregate
    async fn commit(&mut self) -> Result<ModelUpdateResult>;

    /// Roll back all work in this transaction
    async fn rollback(&mut self, reason: &str) -> Result<ModelUpdateResult>;
}
