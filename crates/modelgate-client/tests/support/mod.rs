//! In-memory socket plumbing for correlator tests

#![allow(dead_code)]

use std::sync::Mutex;

use futures::channel::mpsc as futures_mpsc;
use futures_util::SinkExt;
use modelgate_client::{BoxMessageSink, BoxMessageStream, MessageCorrelator};
use serde_json::Value;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

/// Test handle onto both halves of the in-memory socket
pub struct TestSocket {
    inbound: Mutex<Option<futures_mpsc::UnboundedSender<Result<Message, WsError>>>>,
    pub outbound: futures_mpsc::UnboundedReceiver<Message>,
}

impl TestSocket {
    /// Feed one frame to the correlator's read side
    pub fn push(&self, message: Message) {
        let inbound = self.inbound.lock().unwrap();
        inbound
            .as_ref()
            .expect("socket already disconnected")
            .unbounded_send(Ok(message))
            .expect("inbound channel should be open");
    }

    /// Drop the read side, simulating socket loss
    pub fn disconnect(&self) {
        self.inbound.lock().unwrap().take();
    }
}

/// A correlator wired to in-memory channels instead of a websocket
pub fn memory_correlator() -> (MessageCorrelator, TestSocket) {
    let (in_tx, in_rx) = futures_mpsc::unbounded::<Result<Message, WsError>>();
    let (out_tx, out_rx) = futures_mpsc::unbounded::<Message>();

    let sink: BoxMessageSink = Box::pin(out_tx.sink_map_err(|_| WsError::ConnectionClosed));
    let stream: BoxMessageStream = Box::pin(in_rx);

    (
        MessageCorrelator::new(sink, stream),
        TestSocket {
            inbound: Mutex::new(Some(in_tx)),
            outbound: out_rx,
        },
    )
}

/// A text frame holding the given envelope JSON
pub fn envelope_frame(envelope: Value) -> Message {
    Message::Text(envelope.to_string())
}
