//! Session channel: the seam for opening transactional sessions
//!
//! A transaction is born from a REST session-creation request followed by
//! a websocket connect against the returned URI. That two-step dance
//! lives behind `SessionChannel` so the engine can be driven by an
//! in-memory fake in tests.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use modelgate_core_types::ModelUri;
use modelgate_errors::{GateError, GateErrorKind, Result};
use tracing::debug;

use crate::correlator::MessageCorrelator;
use crate::rest::UpstreamRestClient;

/// Opens transactional edit sessions against the upstream server
#[async_trait]
pub trait SessionChannel: Send + Sync {
    /// Create a session for `model_uri` and return its message channel
    async fn open_session(&self, model_uri: &ModelUri) -> Result<MessageCorrelator>;
}

/// Websocket-backed session channel
pub struct WsSessionChannel {
    rest: UpstreamRestClient,
    connect_timeout: Duration,
}

impl WsSessionChannel {
    pub fn new(rest: UpstreamRestClient) -> Self {
        Self {
            rest,
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
}

impl WsSessionChannel {
    /// Open the update-subscription socket for a model
    ///
    /// Unlike a transactional session this socket carries no handshake;
    /// callers `subscribe` on the returned correlator for
    /// `incrementalUpdate` envelopes.
    pub async fn subscribe_updates(&self, model_uri: &ModelUri) -> Result<MessageCorrelator> {
        let endpoint = self.rest.subscription_endpoint(model_uri)?;
        self.connect_socket(&endpoint.websocket_variant(), model_uri, "subscribe_updates")
            .await
    }

    async fn connect_socket(
        &self,
        ws_url: &str,
        model_uri: &ModelUri,
        op: &'static str,
    ) -> Result<MessageCorrelator> {
        let (ws_stream, _response) = tokio::time::timeout(
            self.connect_timeout,
            tokio_tungstenite::connect_async(ws_url),
        )
        .await
        .map_err(|_| {
            GateError::new(GateErrorKind::Timeout)
                .with_op(op)
                .with_model_uri(model_uri.clone())
                .with_message("websocket connect timeout")
        })?
        .map_err(|error| {
            GateError::new(GateErrorKind::ExternalService)
                .with_op(op)
                .with_model_uri(model_uri.clone())
                .with_message(format!("websocket connect failed: {error}"))
        })?;

        let (sink, stream) = ws_stream.split();
        Ok(MessageCorrelator::new(Box::pin(sink), Box::pin(stream)))
    }
}

#[async_trait]
impl SessionChannel for WsSessionChannel {
    async fn open_session(&self, model_uri: &ModelUri) -> Result<MessageCorrelator> {
        let session_uri = self.rest.create_session(model_uri).await?;
        let ws_url = session_uri.websocket_variant();
        debug!(
            target: "modelgate::channel",
            model_uri = %model_uri,
            session_uri = %session_uri,
            "opening session socket"
        );
        self.connect_socket(&ws_url, model_uri, "open_session").await
    }
}
