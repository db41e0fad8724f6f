//! Transactional edit session state machine
//!
//! One `TransactionContext` per open transactional edit span. The context
//! owns its session socket (through a `MessageCorrelator`), a stack of
//! nested edit contexts, and the close-time trigger fixpoint loop.
//!
//! States: Opening → Open → {Committing, RollingBack} → Closed. A
//! socket-level close forces Closed regardless of pending operations,
//! which then fail with `SocketClosed`.
//!
//! ## Aggregation contract
//!
//! The nested-context stack is non-empty for the lifetime of an open
//! transaction; the root frame is pushed on open. Popping a frame merges
//! its patch list, by concatenation in call order, into the new top
//! frame, except when a transaction function declined to commit: then
//! the popped frame is discarded and the call fails. Merged `success` is
//! the AND of every merged sub-result.

use std::sync::Arc;

use async_trait::async_trait;
use modelgate_client::{MessageCorrelator, MessageEnvelope, SessionChannel};
use modelgate_core::{
    CommandProviderRegistry, Edit, EditTransaction, Executor, ModelCommand, ModelUpdateResult,
    PatchOperation, Trigger, TriggerProviderRegistry, TransactionFn,
};
use modelgate_core_types::ModelUri;
use modelgate_errors::{GateError, GateErrorKind, Result};
use tracing::{debug, warn};

use crate::config::EngineConfig;

/// Callback invoked once when the session socket drops
pub type OnClose = Box<dyn FnOnce() + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransactionState {
    Opening,
    Open,
    Committing,
    RollingBack,
    Closed,
}

/// One stack frame of an open transaction
///
/// Owned exclusively by its `TransactionContext`; pushed and popped in
/// strict LIFO order.
#[derive(Debug)]
pub struct NestedEditContext {
    aggregated: ModelUpdateResult,
}

impl NestedEditContext {
    fn new() -> Self {
        Self {
            aggregated: ModelUpdateResult::successful(Vec::new()),
        }
    }

    /// The result accumulated in this frame so far
    pub fn aggregated(&self) -> &ModelUpdateResult {
        &self.aggregated
    }

    fn into_aggregated(self) -> ModelUpdateResult {
        self.aggregated
    }
}

/// One open transactional session against the upstream server
pub struct TransactionContext {
    model_uri: ModelUri,
    state: TransactionState,
    correlator: Option<MessageCorrelator>,
    stack: Vec<NestedEditContext>,
    commands: Arc<CommandProviderRegistry>,
    triggers: Arc<TriggerProviderRegistry>,
    config: EngineConfig,
}

impl TransactionContext {
    /// Open a transactional session for `model_uri`
    ///
    /// Issues session creation through `channel`, pushes the root nested
    /// context, and resolves once the handshake reply (the first
    /// `success` envelope on the new socket) is observed within the
    /// handshake deadline. Any socket error or deadline expiry before
    /// that rejects with `TransactionRejected`. `on_close` is invoked
    /// once when the session socket drops, however that happens.
    pub async fn open(
        channel: &dyn SessionChannel,
        model_uri: ModelUri,
        commands: Arc<CommandProviderRegistry>,
        triggers: Arc<TriggerProviderRegistry>,
        config: EngineConfig,
        on_close: Option<OnClose>,
    ) -> Result<Self> {
        let mut context = Self {
            model_uri,
            state: TransactionState::Opening,
            correlator: None,
            stack: Vec::new(),
            commands,
            triggers,
            config,
        };

        let correlator = channel
            .open_session(&context.model_uri)
            .await
            .map_err(|error| {
                GateError::transaction_rejected("session could not be created")
                    .with_op("open")
                    .with_model_uri(context.model_uri.clone())
                    .with_source(error)
            })?;

        correlator
            .await_reply(MessageEnvelope::is_success, context.config.handshake_timeout)
            .await
            .map_err(|error| {
                GateError::transaction_rejected("handshake reply never arrived")
                    .with_op("open")
                    .with_model_uri(context.model_uri.clone())
                    .with_source(error)
            })?;

        if let Some(callback) = on_close {
            let mut closed = correlator.closed_signal();
            tokio::spawn(async move {
                while !*closed.borrow() {
                    if closed.changed().await.is_err() {
                        break;
                    }
                }
                callback();
            });
        }

        debug!(
            target: "modelgate::transaction",
            model_uri = %context.model_uri,
            "transaction opened"
        );

        context.correlator = Some(correlator);
        context.stack.push(NestedEditContext::new());
        context.state = TransactionState::Open;
        Ok(context)
    }

    /// Whether the context can still accept edits
    pub fn is_open(&self) -> bool {
        self.state == TransactionState::Open && self.has_live_socket()
    }

    /// The model resource this transaction edits
    pub fn model_uri(&self) -> &ModelUri {
        &self.model_uri
    }

    /// Commit: run the trigger fixpoint, send `close`, return the aggregate
    ///
    /// Pops the current frame to obtain the edit result so far, then
    /// repeatedly queries the trigger registry: each produced trigger
    /// runs in its own nested frame and is merged into the aggregate, and
    /// the frame's patch becomes the next round's query input. The loop
    /// stops when a round yields no trigger (or no new change). Provider
    /// failures propagate to the caller, which is responsible for rolling
    /// back.
    ///
    /// On an already-closed transaction this resolves to the fixed
    /// unsuccessful result instead of failing.
    pub async fn close(&mut self) -> Result<ModelUpdateResult> {
        if self.state != TransactionState::Open || !self.has_live_socket() {
            return Ok(ModelUpdateResult::unsuccessful());
        }

        self.state = TransactionState::Committing;
        let frame = self.pop_frame("close")?;
        let mut aggregate = frame.into_aggregated();

        let mut round_patch = aggregate.patch.clone();
        let mut round = 0u32;
        while !round_patch.is_empty() {
            let Some(provider) = self.triggers.get_provider(&self.model_uri, &round_patch)
            else {
                break;
            };
            let trigger = provider
                .get_triggers(&self.model_uri, &round_patch)
                .await
                .map_err(|error| provider_failure("trigger provider failed", error))?;
            let Some(trigger) = trigger else {
                break;
            };

            round += 1;
            debug!(
                target: "modelgate::transaction",
                model_uri = %self.model_uri,
                trigger_round = round,
                "running trigger"
            );

            let produced = self.run_trigger(trigger).await?;
            round_patch = produced.patch.clone();
            aggregate.merge_from(produced);
        }

        let correlator = self.live_correlator()?;
        correlator.send(&MessageEnvelope::close(&self.model_uri)).await?;
        correlator.close().await;
        self.state = TransactionState::Closed;

        debug!(
            target: "modelgate::transaction",
            model_uri = %self.model_uri,
            patch_len = aggregate.patch.len(),
            trigger_rounds = round,
            "transaction committed"
        );
        Ok(aggregate)
    }

    /// Roll back the transaction
    ///
    /// Sends `roll-back` if a live socket exists and returns the fixed
    /// unsuccessful result; the transaction is Closed thereafter.
    pub async fn rollback(&mut self, reason: &str) -> Result<ModelUpdateResult> {
        if self.state == TransactionState::Closed {
            return Ok(ModelUpdateResult::unsuccessful());
        }

        self.state = TransactionState::RollingBack;
        if let Some(correlator) = &self.correlator {
            if !correlator.is_closed() {
                let envelope = MessageEnvelope::roll_back(&self.model_uri, reason);
                if let Err(error) = correlator.send(&envelope).await {
                    warn!(
                        target: "modelgate::transaction",
                        model_uri = %self.model_uri,
                        error = %error,
                        "roll-back message could not be sent"
                    );
                }
                correlator.close().await;
            }
        }

        debug!(
            target: "modelgate::transaction",
            model_uri = %self.model_uri,
            reason,
            "transaction rolled back"
        );
        self.state = TransactionState::Closed;
        self.stack.clear();
        Ok(ModelUpdateResult::unsuccessful())
    }

    /// Run a transaction function in its own nested frame
    ///
    /// A true result pops and merges the frame into the enclosing one and
    /// returns the frame's aggregate. A false or erroring result discards
    /// the popped frame's accumulated patch and fails the call.
    async fn run_transaction(&mut self, transaction: TransactionFn) -> Result<ModelUpdateResult> {
        self.stack.push(NestedEditContext::new());
        let outcome = transaction(&mut *self).await;
        let frame = self.pop_frame("run_transaction")?;

        match outcome {
            Ok(true) => {
                let aggregate = frame.into_aggregated();
                self.merge_into_current(aggregate.clone())?;
                Ok(aggregate)
            }
            Ok(false) => Err(GateError::provider_failure(
                "transaction function declined to commit",
            )
            .with_model_uri(self.model_uri.clone())),
            Err(error) => Err(error),
        }
    }

    /// Run one trigger in its own nested frame, returning the frame result
    async fn run_trigger(&mut self, trigger: Trigger) -> Result<ModelUpdateResult> {
        self.stack.push(NestedEditContext::new());
        let outcome = match trigger {
            Trigger::Patch(ops) => {
                if ops.is_empty() {
                    Ok(true)
                } else {
                    self.apply_patch(ops).await.map(|result| result.success)
                }
            }
            Trigger::Transaction(transaction) => transaction(&mut *self).await,
        };
        let frame = self.pop_frame("run_trigger")?;

        match outcome {
            Ok(true) => Ok(frame.into_aggregated()),
            Ok(false) => Err(GateError::provider_failure("trigger transaction failed")
                .with_op("close")
                .with_model_uri(self.model_uri.clone())),
            Err(error) => Err(error),
        }
    }

    async fn send_and_correlate(
        &self,
        envelope: MessageEnvelope,
        op: &'static str,
    ) -> Result<ModelUpdateResult> {
        let correlator = self.live_correlator()?;
        correlator.send(&envelope).await?;
        let reply = correlator
            .await_reply(MessageEnvelope::is_success, self.config.reply_timeout)
            .await
            .map_err(|error| match error.kind() {
                GateErrorKind::Timeout => {
                    GateError::transaction_rejected("correlated reply never arrived")
                        .with_op(op)
                        .with_model_uri(self.model_uri.clone())
                        .with_source(error)
                }
                _ => error,
            })?;
        reply.update_result()
    }

    fn has_live_socket(&self) -> bool {
        self.correlator
            .as_ref()
            .is_some_and(|correlator| !correlator.is_closed())
    }

    fn live_correlator(&self) -> Result<&MessageCorrelator> {
        match &self.correlator {
            Some(correlator) if !correlator.is_closed() => Ok(correlator),
            _ => Err(GateError::socket_closed().with_model_uri(self.model_uri.clone())),
        }
    }

    fn ensure_editable(&self) -> Result<()> {
        match self.state {
            TransactionState::Open | TransactionState::Committing => {
                self.live_correlator().map(|_| ())
            }
            _ => Err(GateError::socket_closed().with_model_uri(self.model_uri.clone())),
        }
    }

    fn merge_into_current(&mut self, result: ModelUpdateResult) -> Result<()> {
        let top = self.stack.last_mut().ok_or_else(|| {
            GateError::new(GateErrorKind::Internal)
                .with_op("merge")
                .with_message("nested context stack is empty")
        })?;
        top.aggregated.merge_from(result);
        Ok(())
    }

    fn pop_frame(&mut self, op: &'static str) -> Result<NestedEditContext> {
        self.stack.pop().ok_or_else(|| {
            GateError::new(GateErrorKind::Internal)
                .with_op(op)
                .with_message("nested context stack is empty")
        })
    }
}

#[async_trait]
impl Executor for TransactionContext {
    /// Execute a command within the current scope
    ///
    /// Unclaimed command kinds are forwarded to the upstream unchanged.
    /// A claiming provider may substitute a command or patch (dispatched
    /// through the same paths) or expand the command into a transaction
    /// function run in a nested frame.
    async fn execute(
        &mut self,
        model_uri: &ModelUri,
        command: ModelCommand,
    ) -> Result<ModelUpdateResult> {
        self.ensure_editable()?;

        let commands = Arc::clone(&self.commands);
        let edit = commands
            .get_commands(model_uri, command)
            .await
            .map_err(|error| match error.kind() {
                GateErrorKind::ProviderFailure => error,
                _ => provider_failure("command provider failed", error),
            })?;

        match edit {
            Edit::Command(command) => {
                let envelope = MessageEnvelope::execute_command(model_uri, &command)?;
                let result = self.send_and_correlate(envelope, "execute").await?;
                self.merge_into_current(result.clone())?;
                Ok(result)
            }
            Edit::Patch(ops) => self.apply_patch(ops).await,
            Edit::Transaction(transaction) => self.run_transaction(transaction).await,
        }
    }

    /// Apply a patch within the current scope
    ///
    /// An empty patch is never sent and yields an unsuccessful result.
    /// Otherwise the correlated reply is merged into the current
    /// (innermost) nested context, preserving call order.
    async fn apply_patch(&mut self, patch: Vec<PatchOperation>) -> Result<ModelUpdateResult> {
        if patch.is_empty() {
            return Ok(ModelUpdateResult::unsuccessful());
        }
        self.ensure_editable()?;

        let envelope = MessageEnvelope::execute_patch(&self.model_uri, &patch)?;
        let result = self.send_and_correlate(envelope, "apply_patch").await?;
        self.merge_into_current(result.clone())?;
        Ok(result)
    }
}

#[async_trait]
impl EditTransaction for TransactionContext {
    fn is_open(&self) -> bool {
        TransactionContext::is_open(self)
    }

    fn model_uri(&self) -> &ModelUri {
        &self.model_uri
    }

    async fn edit(&mut self, edit: Edit) -> Result<ModelUpdateResult> {
        match edit {
            Edit::Patch(ops) => self.apply_patch(ops).await,
            Edit::Command(command) => {
                let model_uri = self.model_uri.clone();
                self.execute(&model_uri, command).await
            }
            Edit::Transaction(transaction) => self.run_transaction(transaction).await,
        }
    }

    async fn commit(&mut self) -> Result<ModelUpdateResult> {
        self.close().await
    }

    async fn rollback(&mut self, reason: &str) -> Result<ModelUpdateResult> {
        TransactionContext::rollback(self, reason).await
    }
}

impl std::fmt::Debug for TransactionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionContext")
            .field("model_uri", &self.model_uri)
            .field("state", &self.state)
            .field("stack_depth", &self.stack.len())
            .finish()
    }
}

fn provider_failure(message: &str, source: GateError) -> GateError {
    GateError::provider_failure(message).with_source(source)
}
