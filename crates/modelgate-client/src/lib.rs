//! Modelgate Client - Upstream collaborators
//!
//! This crate owns everything that talks to the upstream model server:
//! - The JSON message envelope the session socket speaks
//! - `MessageCorrelator`: a typed message channel over a raw duplex
//!   socket, with guarded subscriptions and one-shot correlated awaits
//! - `SessionChannel`: the seam behind which session creation and socket
//!   opening live (websocket implementation provided, in-memory fakes in
//!   tests)
//! - `UpstreamRestClient`: thin JSON-over-HTTP wrappers for the model
//!   CRUD/undo/redo/validation surface callers use around the core

pub mod channel;
pub mod correlator;
pub mod envelope;
pub mod rest;

pub use channel::{SessionChannel, WsSessionChannel};
pub use correlator::{BoxMessageSink, BoxMessageStream, MessageCorrelator};
pub use envelope::{ExecutePayload, ExecutePayloadKind, MessageEnvelope, MessageKind};
pub use rest::{RestModelValidator, UpstreamRestClient};
