//! Core types shared across Modelgate facilities
//!
//! This crate provides foundational types used by the error handling,
//! logging, and orchestration facilities:
//!
//! - **URI types**: ModelUri, SessionUri, ClientId
//! - **Correlation types**: RequestId, RequestContext
//! - **Schema constants**: Canonical field keys and event names

pub mod correlation;
pub mod schema;
pub mod uri;

pub use correlation::{RequestContext, RequestId};
pub use uri::{ClientId, ModelUri, SessionUri};
