//! Provider traits: the extension points of the façade
//!
//! Command providers translate custom commands into something the
//! upstream server understands (a substitute command, a patch, or a whole
//! transaction). Trigger providers react to completed edits with
//! follow-up edits that maintain derived invariants.

use async_trait::async_trait;
use modelgate_core_types::ModelUri;
use modelgate_errors::Result;

use crate::command::ModelCommand;
use crate::edit::{Edit, TransactionFn};
use crate::patch::PatchOperation;

/// Translates custom commands during execution
///
/// Multiple providers may register for the same command kind; the first
/// whose `can_handle` holds wins.
#[async_trait]
pub trait CommandProvider: Send + Sync {
    /// Whether this provider claims the given command
    fn can_handle(&self, command: &ModelCommand) -> bool;

    /// Translate the command into the edit to perform in its place
    ///
    /// Returning `Edit::Command` substitutes another command (or the
    /// original), `Edit::Patch` replaces it with a direct diff, and
    /// `Edit::Transaction` expands it into a nested scope of edits.
    async fn get_commands(&self, model_uri: &ModelUri, command: ModelCommand) -> Result<Edit>;
}

/// A follow-up edit produced in response to a completed edit
pub enum Trigger {
    /// Apply this patch as the follow-up
    Patch(Vec<PatchOperation>),
    /// Run this transaction function as the follow-up
    Transaction(TransactionFn),
}

impl std::fmt::Debug for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Patch(ops) => f.debug_tuple("Patch").field(ops).finish(),
            Trigger::Transaction(_) => f.write_str("Transaction(..)"),
        }
    }
}

/// Produces consistency-maintaining triggers after edits
#[async_trait]
pub trait TriggerProvider: Send + Sync {
    /// Whether this provider wants to react to the given patch
    fn can_trigger(&self, model_uri: &ModelUri, patch: &[PatchOperation]) -> bool;

    /// Produce the follow-up edit for the given patch
    ///
    /// `None` means the provider decided no follow-up is needed after
    /// all; the cascade treats it like a non-match.
    async fn get_triggers(
        &self,
        model_uri: &ModelUri,
        patch: &[PatchOperation],
    ) -> Result<Option<Trigger>>;
}
