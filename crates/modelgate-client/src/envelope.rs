//! JSON message envelope for the session socket
//!
//! Every frame on the session socket is a JSON envelope
//! `{type, modelUri, data}`. Outbound `execute` frames nest a payload
//! `{type: "emfcommand"|"patch", data}`; inbound correlated replies are
//! `type = "success"` envelopes carrying a patch-shaped update. The
//! protocol has no request-id field, so correlation is strictly
//! first-match (see `MessageCorrelator`).

use modelgate_core::{ModelCommand, ModelUpdateResult, PatchOperation};
use modelgate_core_types::ModelUri;
use modelgate_errors::{GateError, GateErrorKind, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Envelope message types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    #[serde(rename = "execute")]
    Execute,
    #[serde(rename = "close")]
    Close,
    #[serde(rename = "roll-back")]
    RollBack,
    #[serde(rename = "incrementalUpdate")]
    IncrementalUpdate,
    #[serde(rename = "success")]
    Success,
    /// Forward-compatible catch-all for message types this client does
    /// not interpret
    #[serde(other, rename = "unknown")]
    Unknown,
}

/// One frame on the session socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(rename = "modelUri", skip_serializing_if = "Option::is_none")]
    pub model_uri: Option<ModelUri>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Payload kind of an outbound `execute` envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutePayloadKind {
    #[serde(rename = "emfcommand")]
    Command,
    #[serde(rename = "patch")]
    Patch,
}

/// Payload of an outbound `execute` envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutePayload {
    #[serde(rename = "type")]
    pub kind: ExecutePayloadKind,
    pub data: Value,
}

impl MessageEnvelope {
    /// An `execute` envelope carrying a patch payload
    pub fn execute_patch(model_uri: &ModelUri, patch: &[PatchOperation]) -> Result<Self> {
        let payload = ExecutePayload {
            kind: ExecutePayloadKind::Patch,
            data: serde_json::to_value(patch)?,
        };
        Ok(Self {
            kind: MessageKind::Execute,
            model_uri: Some(model_uri.clone()),
            data: Some(serde_json::to_value(payload)?),
        })
    }

    /// An `execute` envelope carrying a command payload
    pub fn execute_command(model_uri: &ModelUri, command: &ModelCommand) -> Result<Self> {
        let payload = ExecutePayload {
            kind: ExecutePayloadKind::Command,
            data: serde_json::to_value(command)?,
        };
        Ok(Self {
            kind: MessageKind::Execute,
            model_uri: Some(model_uri.clone()),
            data: Some(serde_json::to_value(payload)?),
        })
    }

    /// The `close` envelope ending a session
    pub fn close(model_uri: &ModelUri) -> Self {
        Self {
            kind: MessageKind::Close,
            model_uri: Some(model_uri.clone()),
            data: None,
        }
    }

    /// The `roll-back` envelope discarding a session's work
    pub fn roll_back(model_uri: &ModelUri, reason: &str) -> Self {
        Self {
            kind: MessageKind::RollBack,
            model_uri: Some(model_uri.clone()),
            data: Some(json!({ "reason": reason })),
        }
    }

    /// Whether this is a correlated `success` reply
    pub fn is_success(&self) -> bool {
        self.kind == MessageKind::Success
    }

    /// Parse the patch-shaped update carried by a `success` reply
    ///
    /// The upstream sends either a full `{success, patch}` object or a
    /// bare patch array; both parse. A missing `data` field reads as a
    /// successful empty update.
    pub fn update_result(&self) -> Result<ModelUpdateResult> {
        match &self.data {
            None => Ok(ModelUpdateResult::successful(Vec::new())),
            Some(array @ Value::Array(_)) => {
                let patch: Vec<PatchOperation> = serde_json::from_value(array.clone())?;
                Ok(ModelUpdateResult::successful(patch))
            }
            Some(value @ Value::Object(_)) => Ok(serde_json::from_value(value.clone())?),
            Some(other) => Err(GateError::new(GateErrorKind::Serialization)
                .with_op("update_result")
                .with_message(format!("unexpected update shape: {other}"))),
        }
    }
}
