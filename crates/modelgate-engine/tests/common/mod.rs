//! Shared test harness: an in-memory stand-in for the upstream server
//!
//! The fake speaks the real envelope protocol over in-memory channels:
//! it sends the session handshake on connect, replies to `execute`
//! messages according to its configured behavior, and records every
//! envelope it receives for assertions.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::channel::mpsc as futures_mpsc;
use futures_util::{SinkExt, StreamExt};
use modelgate_client::{
    BoxMessageSink, BoxMessageStream, ExecutePayload, ExecutePayloadKind, MessageCorrelator,
    MessageEnvelope, MessageKind, SessionChannel,
};
use modelgate_core::{CommandProviderRegistry, TriggerProviderRegistry};
use modelgate_core_types::ModelUri;
use modelgate_engine::{EngineConfig, TransactionContext};
use modelgate_errors::Result;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

/// How the fake upstream responds to `execute` messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Reply success, echoing patch payloads; commands produce a fixed patch
    Echo,
    /// Reply `success: false` to every execute
    RejectEdits,
    /// Never reply to execute messages
    Silent,
    /// Drop the socket on the first execute message, without replying
    DropOnExecute,
}

/// In-memory stand-in for the upstream model server
pub struct FakeUpstream {
    behavior: Behavior,
    log: Arc<Mutex<Vec<MessageEnvelope>>>,
}

impl FakeUpstream {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every envelope the server received, in arrival order
    pub fn received(&self) -> Vec<MessageEnvelope> {
        self.log.lock().unwrap().clone()
    }

    pub fn received_kinds(&self) -> Vec<MessageKind> {
        self.received().iter().map(|envelope| envelope.kind).collect()
    }

    pub fn execute_count(&self) -> usize {
        self.received()
            .iter()
            .filter(|envelope| envelope.kind == MessageKind::Execute)
            .count()
    }

    /// Wait until the server has logged a message of the given kind.
    ///
    /// Sends complete once a frame enters the in-memory channel, before
    /// the server task has processed it; assertions on the log must wait
    /// for processing to catch up.
    pub async fn wait_for_kind(&self, kind: MessageKind) {
        for _ in 0..200 {
            if self.received_kinds().contains(&kind) {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("server never received a {kind:?} message");
    }
}

#[async_trait]
impl SessionChannel for FakeUpstream {
    async fn open_session(&self, model_uri: &ModelUri) -> Result<MessageCorrelator> {
        let (to_server_tx, to_server_rx) = futures_mpsc::unbounded::<Message>();
        let (to_client_tx, to_client_rx) =
            futures_mpsc::unbounded::<std::result::Result<Message, WsError>>();

        tokio::spawn(serve(
            to_server_rx,
            to_client_tx,
            model_uri.clone(),
            self.behavior,
            Arc::clone(&self.log),
        ));

        let sink: BoxMessageSink =
            Box::pin(to_server_tx.sink_map_err(|_| WsError::ConnectionClosed));
        let stream: BoxMessageStream = Box::pin(to_client_rx);
        Ok(MessageCorrelator::new(sink, stream))
    }
}

fn success_frame(model_uri: &ModelUri, success: bool, patch: Value) -> Message {
    let envelope = json!({
        "type": "success",
        "modelUri": model_uri.as_str(),
        "data": {"success": success, "patch": patch},
    });
    Message::Text(envelope.to_string())
}

async fn serve(
    mut from_client: futures_mpsc::UnboundedReceiver<Message>,
    to_client: futures_mpsc::UnboundedSender<std::result::Result<Message, WsError>>,
    model_uri: ModelUri,
    behavior: Behavior,
    log: Arc<Mutex<Vec<MessageEnvelope>>>,
) {
    // Session handshake
    let _ = to_client.unbounded_send(Ok(success_frame(&model_uri, true, json!([]))));

    while let Some(message) = from_client.next().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        let envelope: MessageEnvelope = match serde_json::from_str(&text) {
            Ok(envelope) => envelope,
            Err(_) => continue,
        };
        log.lock().unwrap().push(envelope.clone());

        if envelope.kind != MessageKind::Execute {
            continue;
        }
        match behavior {
            Behavior::Silent => {}
            Behavior::DropOnExecute => return,
            Behavior::RejectEdits => {
                let _ = to_client.unbounded_send(Ok(success_frame(&model_uri, false, json!([]))));
            }
            Behavior::Echo => {
                let payload: ExecutePayload =
                    serde_json::from_value(envelope.data.clone().unwrap_or(Value::Null))
                        .expect("execute payload should parse");
                let patch = match payload.kind {
                    ExecutePayloadKind::Patch => payload.data,
                    ExecutePayloadKind::Command => json!([
                        {"op": "replace", "path": "/from-command", "value": payload.data["type"]}
                    ]),
                };
                let _ = to_client.unbounded_send(Ok(success_frame(&model_uri, true, patch)));
            }
        }
    }
}

pub fn empty_registries() -> (Arc<CommandProviderRegistry>, Arc<TriggerProviderRegistry>) {
    (
        Arc::new(CommandProviderRegistry::new()),
        Arc::new(TriggerProviderRegistry::new()),
    )
}

pub async fn open_context(
    upstream: &FakeUpstream,
    model_uri: &ModelUri,
    commands: Arc<CommandProviderRegistry>,
    triggers: Arc<TriggerProviderRegistry>,
) -> TransactionContext {
    open_context_with_config(upstream, model_uri, commands, triggers, EngineConfig::default())
        .await
}

pub async fn open_context_with_config(
    upstream: &FakeUpstream,
    model_uri: &ModelUri,
    commands: Arc<CommandProviderRegistry>,
    triggers: Arc<TriggerProviderRegistry>,
    config: EngineConfig,
) -> TransactionContext {
    TransactionContext::open(upstream, model_uri.clone(), commands, triggers, config, None)
        .await
        .expect("transaction should open")
}
