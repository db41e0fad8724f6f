//! The tagged edit union
//!
//! An edit is a patch, a command, or a transaction function. Modeling the
//! union as an enum (rather than duck-typing on shape) lets every
//! dispatch site match exhaustively.

use futures::future::BoxFuture;
use modelgate_errors::Result;

use crate::command::ModelCommand;
use crate::executor::Executor;
use crate::patch::PatchOperation;

/// Future returned by a transaction function
pub type TransactionFuture<'a> = BoxFuture<'a, Result<bool>>;

/// A transaction function: a callback receiving an Executor, performing a
/// sequence of edits within the current scope, and returning whether to
/// commit its frame
pub type TransactionFn =
    Box<dyn for<'a> FnOnce(&'a mut dyn Executor) -> TransactionFuture<'a> + Send>;

/// Box a closure as a [`TransactionFn`]
///
/// The helper pins down the higher-ranked lifetime so call sites can pass
/// ordinary closures:
///
/// ```ignore
/// let tx = transaction_fn(|exec: &mut dyn Executor| {
///     Box::pin(async move {
///         let result = exec.apply_patch(vec![op]).await?;
///         Ok(result.success)
///     })
/// });
/// ```
pub fn transaction_fn<F>(f: F) -> TransactionFn
where
    F: for<'a> FnOnce(&'a mut dyn Executor) -> TransactionFuture<'a> + Send + 'static,
{
    Box::new(f)
}

/// One unit of editing work
pub enum Edit {
    /// Apply a JSON-patch-style diff directly
    Patch(Vec<PatchOperation>),
    /// Execute a primitive or custom command
    Command(ModelCommand),
    /// Run a transaction function against the current scope
    Transaction(TransactionFn),
}

impl Edit {
    /// Short tag for logging
    pub fn kind_name(&self) -> &'static str {
        match self {
            Edit::Patch(_) => "patch",
            Edit::Command(_) => "command",
            Edit::Transaction(_) => "transaction",
        }
    }
}

impl std::fmt::Debug for Edit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Edit::Patch(ops) => f.debug_tuple("Patch").field(ops).finish(),
            Edit::Command(cmd) => f.debug_tuple("Command").field(cmd).finish(),
            Edit::Transaction(_) => f.write_str("Transaction(..)"),
        }
    }
}
