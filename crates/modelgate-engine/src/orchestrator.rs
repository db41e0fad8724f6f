//! Top-level edit orchestration
//!
//! The orchestrator is the entry point other server-side code calls with
//! one edit. It opens a transactional session, performs the edit (wrapped
//! as a transaction function when trigger providers exist, so the
//! close-time cascade applies to the whole edit), commits or rolls back
//! atomically, and kicks off best-effort validation after a successful
//! commit. Every context it creates is driven to Closed; none leaks
//! open.

use std::sync::Arc;

use modelgate_core::{
    transaction_fn, CommandProviderRegistry, Edit, EditTransaction, Executor, ModelUpdateResult,
    ModelValidator, TransactionFn, TriggerProviderRegistry,
};
use modelgate_client::SessionChannel;
use modelgate_core_types::{ModelUri, RequestContext};
use modelgate_errors::{GateError, Result};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::transaction::TransactionContext;

/// Classifies, dispatches, and completes edits against the upstream server
pub struct EditOrchestrator {
    channel: Arc<dyn SessionChannel>,
    commands: Arc<CommandProviderRegistry>,
    triggers: Arc<TriggerProviderRegistry>,
    validator: Arc<dyn ModelValidator>,
    config: EngineConfig,
}

impl EditOrchestrator {
    /// Wire the orchestrator from its explicitly constructed collaborators
    pub fn new(
        channel: Arc<dyn SessionChannel>,
        commands: Arc<CommandProviderRegistry>,
        triggers: Arc<TriggerProviderRegistry>,
        validator: Arc<dyn ModelValidator>,
    ) -> Self {
        Self {
            channel,
            commands,
            triggers,
            validator,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Perform one edit transactionally
    ///
    /// Returns the committed aggregate (`success: true` with the full
    /// ordered patch) or an error after rolling the transaction back. No
    /// partial application is ever visible: any failure along the way
    /// (provider failure, upstream rejection, cascade failure) rolls the
    /// whole transaction back before the error surfaces. Validation runs
    /// afterwards as a non-blocking follow-up and never changes the
    /// reported outcome.
    pub async fn edit(&self, model_uri: ModelUri, edit: Edit) -> Result<ModelUpdateResult> {
        let request = RequestContext::new().with_model_uri(model_uri.clone());
        debug!(
            target: "modelgate::orchestrator",
            request_id = %request.request_id,
            model_uri = %model_uri,
            edit_kind = edit.kind_name(),
            "edit started"
        );

        let mut context = TransactionContext::open(
            self.channel.as_ref(),
            model_uri.clone(),
            Arc::clone(&self.commands),
            Arc::clone(&self.triggers),
            self.config.clone(),
            None,
        )
        .await?;

        let performed = if self.triggers.is_empty() {
            context.edit(edit).await
        } else {
            context
                .edit(Edit::Transaction(wrap_edit(model_uri.clone(), edit)))
                .await
        };

        let performed = match performed {
            Ok(result) if result.success => result,
            Ok(_) => {
                let _ = context.rollback("edit was not successful").await;
                return Err(GateError::transaction_rejected("edit rejected by upstream")
                    .with_model_uri(model_uri));
            }
            Err(error) => {
                let _ = context.rollback(&error.to_string()).await;
                return Err(error);
            }
        };

        let aggregate = match context.close().await {
            Ok(aggregate) => aggregate,
            Err(error) => {
                let _ = context.rollback(&error.to_string()).await;
                return Err(error);
            }
        };

        if !aggregate.success {
            warn!(
                target: "modelgate::orchestrator",
                request_id = %request.request_id,
                model_uri = %model_uri,
                "commit aggregate carried an unsuccessful sub-result"
            );
            return Err(GateError::transaction_rejected(
                "aggregate carried an unsuccessful sub-result",
            )
            .with_model_uri(model_uri));
        }

        debug!(
            target: "modelgate::orchestrator",
            request_id = %request.request_id,
            model_uri = %model_uri,
            patch_len = aggregate.patch.len(),
            edit_patch_len = performed.patch.len(),
            "edit committed"
        );
        self.spawn_validation(model_uri);
        Ok(aggregate)
    }

    /// Kick off validation without blocking or affecting the edit outcome
    fn spawn_validation(&self, model_uri: ModelUri) {
        let validator = Arc::clone(&self.validator);
        tokio::spawn(async move {
            match validator.validate(&model_uri).await {
                Ok(_) => {
                    debug!(
                        target: "modelgate::orchestrator",
                        model_uri = %model_uri,
                        "validation completed"
                    );
                }
                Err(error) => {
                    warn!(
                        target: "modelgate::orchestrator",
                        model_uri = %model_uri,
                        error = %error,
                        "validation failed"
                    );
                }
            }
        });
    }
}

/// Wrap an edit as a transaction function
///
/// Used when trigger providers exist so the context's own close-time
/// cascade naturally applies to the edit's whole effect.
fn wrap_edit(model_uri: ModelUri, edit: Edit) -> TransactionFn {
    transaction_fn(move |executor: &mut dyn Executor| {
        Box::pin(async move {
            let result = match edit {
                Edit::Patch(ops) => executor.apply_patch(ops).await?,
                Edit::Command(command) => executor.execute(&model_uri, command).await?,
                Edit::Transaction(transaction) => return transaction(executor).await,
            };
            Ok(result.success)
        })
    })
}
