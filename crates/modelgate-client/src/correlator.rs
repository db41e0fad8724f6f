//! Message correlation over a raw duplex socket
//!
//! The correlator turns a websocket's frame stream into a typed envelope
//! channel. Inbound text frames that parse as envelopes are fanned out to
//! every live subscription whose guard admits them and resolve the
//! pending one-shot waiters whose predicates match; binary frames and
//! unparseable text are dropped. The wire protocol carries no request
//! id, so correlation is strictly first-match and callers keep at most
//! one await in flight per socket.
//!
//! When the underlying stream ends (close frame, error, or peer drop),
//! the correlator transitions to closed: pending waiters resolve to
//! `SocketClosed` rejections and all subsequent operations fail the same
//! way. Writes never fail synchronously; `send` is async and reports
//! errors through its `Result`.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use modelgate_errors::{GateError, GateErrorKind, Result};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, warn};

use crate::envelope::MessageEnvelope;

/// Boxed write half of a session socket
pub type BoxMessageSink = Pin<Box<dyn Sink<Message, Error = tungstenite::Error> + Send>>;

/// Boxed read half of a session socket
pub type BoxMessageStream =
    Pin<Box<dyn Stream<Item = std::result::Result<Message, tungstenite::Error>> + Send>>;

type EnvelopePredicate = Box<dyn Fn(&MessageEnvelope) -> bool + Send>;

struct Waiter {
    id: u64,
    predicate: EnvelopePredicate,
    tx: oneshot::Sender<MessageEnvelope>,
}

struct Subscription {
    guard: EnvelopePredicate,
    tx: mpsc::UnboundedSender<MessageEnvelope>,
}

struct Shared {
    waiters: Mutex<Vec<Waiter>>,
    subscriptions: Mutex<Vec<Subscription>>,
    /// Envelopes that arrived before the first waiter or subscription
    /// registered. The session handshake can land on the socket before
    /// the opener starts listening; holding such frames until delivery
    /// starts keeps first-match correlation lossless.
    pending: Mutex<Option<Vec<MessageEnvelope>>>,
}

impl Default for Shared {
    fn default() -> Self {
        Self {
            waiters: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(Vec::new()),
            pending: Mutex::new(Some(Vec::new())),
        }
    }
}

/// Typed message channel over one session socket
pub struct MessageCorrelator {
    shared: Arc<Shared>,
    sink: tokio::sync::Mutex<BoxMessageSink>,
    closed_tx: Arc<watch::Sender<bool>>,
    closed_rx: watch::Receiver<bool>,
    next_waiter_id: AtomicU64,
    reader: JoinHandle<()>,
}

impl MessageCorrelator {
    /// Wrap the two halves of a session socket
    ///
    /// Spawns the reader task that owns the stream until it ends.
    pub fn new(sink: BoxMessageSink, stream: BoxMessageStream) -> Self {
        let shared = Arc::new(Shared::default());
        let (closed_tx, closed_rx) = watch::channel(false);
        let closed_tx = Arc::new(closed_tx);

        let reader = tokio::spawn(read_loop(
            stream,
            Arc::clone(&shared),
            Arc::clone(&closed_tx),
        ));

        Self {
            shared,
            sink: tokio::sync::Mutex::new(sink),
            closed_tx,
            closed_rx,
            next_waiter_id: AtomicU64::new(0),
            reader,
        }
    }

    /// Whether the socket is gone
    pub fn is_closed(&self) -> bool {
        *self.closed_rx.borrow()
    }

    /// A signal that flips to `true` when the socket closes
    pub fn closed_signal(&self) -> watch::Receiver<bool> {
        self.closed_rx.clone()
    }

    /// Wait until the socket closes
    pub async fn wait_closed(&self) {
        let mut rx = self.closed_rx.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    /// Serialize and send one envelope
    pub async fn send(&self, envelope: &MessageEnvelope) -> Result<()> {
        if self.is_closed() {
            return Err(GateError::socket_closed().with_op("send"));
        }
        let text = serde_json::to_string(envelope)?;
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(text)).await.map_err(|error| {
            GateError::new(GateErrorKind::Io)
                .with_op("send")
                .with_message(error.to_string())
        })
    }

    /// Await the first inbound envelope matching `predicate`
    ///
    /// Resolves with the envelope and self-unsubscribes. Fails with
    /// `SocketClosed` if the socket closes first, or `Timeout` if no
    /// match arrives within `deadline`.
    pub async fn await_reply<P>(&self, predicate: P, deadline: Duration) -> Result<MessageEnvelope>
    where
        P: Fn(&MessageEnvelope) -> bool + Send + 'static,
    {
        if self.is_closed() {
            return Err(GateError::socket_closed().with_op("await_reply"));
        }

        let id = self.next_waiter_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        {
            let mut waiters = self.shared.waiters.lock().expect("correlator lock poisoned");
            waiters.push(Waiter {
                id,
                predicate: Box::new(predicate),
                tx,
            });
        }
        start_delivery(&self.shared);

        // The socket may have closed between the check above and the
        // registration; the reader clears waiters exactly once, so a
        // late registration must fail itself.
        if self.is_closed() {
            self.remove_waiter(id);
            return Err(GateError::socket_closed().with_op("await_reply"));
        }

        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(envelope)) => Ok(envelope),
            Ok(Err(_)) => Err(GateError::socket_closed().with_op("await_reply")),
            Err(_) => {
                self.remove_waiter(id);
                Err(GateError::new(GateErrorKind::Timeout)
                    .with_op("await_reply")
                    .with_message(format!("no matching reply within {deadline:?}")))
            }
        }
    }

    /// Open a persistent subscription filtered by `guard`
    ///
    /// The receiver yields every inbound envelope the guard admits, until
    /// the socket closes or the receiver is dropped.
    pub fn subscribe<G>(&self, guard: G) -> mpsc::UnboundedReceiver<MessageEnvelope>
    where
        G: Fn(&MessageEnvelope) -> bool + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subscriptions = self
            .shared
            .subscriptions
            .lock()
            .expect("correlator lock poisoned");
        subscriptions.push(Subscription {
            guard: Box::new(guard),
            tx,
        });
        drop(subscriptions);
        start_delivery(&self.shared);
        rx
    }

    /// Close the socket gracefully
    ///
    /// Sends a close frame (best effort) and marks the correlator
    /// closed. Idempotent.
    pub async fn close(&self) {
        if self.is_closed() {
            return;
        }
        let mut sink = self.sink.lock().await;
        if let Err(error) = sink.send(Message::Close(None)).await {
            debug!(
                target: "modelgate::correlator",
                error = %error,
                "close frame could not be sent"
            );
        }
        let _ = self.closed_tx.send(true);
        fail_pending(&self.shared);
    }

    fn remove_waiter(&self, id: u64) {
        let mut waiters = self.shared.waiters.lock().expect("correlator lock poisoned");
        waiters.retain(|waiter| waiter.id != id);
    }
}

impl Drop for MessageCorrelator {
    fn drop(&mut self) {
        self.reader.abort();
        let _ = self.closed_tx.send(true);
    }
}

impl std::fmt::Debug for MessageCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageCorrelator")
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn read_loop(
    mut stream: BoxMessageStream,
    shared: Arc<Shared>,
    closed_tx: Arc<watch::Sender<bool>>,
) {
    while let Some(item) = stream.next().await {
        match item {
            Ok(Message::Text(text)) => match serde_json::from_str::<MessageEnvelope>(&text) {
                Ok(envelope) => dispatch(&shared, envelope),
                Err(error) => {
                    debug!(
                        target: "modelgate::correlator",
                        error = %error,
                        "dropping unparseable text frame"
                    );
                }
            },
            Ok(Message::Binary(payload)) => {
                debug!(
                    target: "modelgate::correlator",
                    len = payload.len(),
                    "dropping binary frame"
                );
            }
            Ok(Message::Close(_)) => break,
            // Ping/pong are handled by the transport layer
            Ok(_) => {}
            Err(error) => {
                warn!(
                    target: "modelgate::correlator",
                    error = %error,
                    "socket read failed"
                );
                break;
            }
        }
    }

    let _ = closed_tx.send(true);
    fail_pending(&shared);
}

fn dispatch(shared: &Shared, envelope: MessageEnvelope) {
    {
        let mut pending = shared.pending.lock().expect("correlator lock poisoned");
        if let Some(buffer) = pending.as_mut() {
            buffer.push(envelope);
            return;
        }
    }
    deliver(shared, envelope);
}

/// Switch from buffering to live delivery, replaying held envelopes.
///
/// The pending lock is held across the replay so a concurrent reader
/// dispatch cannot overtake buffered envelopes.
fn start_delivery(shared: &Shared) {
    let mut pending = shared.pending.lock().expect("correlator lock poisoned");
    if let Some(buffer) = pending.take() {
        for envelope in buffer {
            deliver(shared, envelope);
        }
    }
}

fn deliver(shared: &Shared, envelope: MessageEnvelope) {
    {
        let mut waiters = shared.waiters.lock().expect("correlator lock poisoned");
        let mut index = 0;
        while index < waiters.len() {
            if (waiters[index].predicate)(&envelope) {
                let waiter = waiters.remove(index);
                let _ = waiter.tx.send(envelope.clone());
            } else {
                index += 1;
            }
        }
    }

    let mut subscriptions = shared
        .subscriptions
        .lock()
        .expect("correlator lock poisoned");
    subscriptions.retain(|subscription| {
        if (subscription.guard)(&envelope) {
            subscription.tx.send(envelope.clone()).is_ok()
        } else {
            !subscription.tx.is_closed()
        }
    });
}

/// Drop pending waiters and subscriptions so their receivers observe the
/// socket loss.
fn fail_pending(shared: &Shared) {
    shared
        .waiters
        .lock()
        .expect("correlator lock poisoned")
        .clear();
    shared
        .subscriptions
        .lock()
        .expect("correlator lock poisoned")
        .clear();
    shared
        .pending
        .lock()
        .expect("correlator lock poisoned")
        .take();
}
