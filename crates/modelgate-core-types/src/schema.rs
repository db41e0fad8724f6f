//! Canonical schema constants for structured logging and events
//!
//! These constants ensure consistency across all logging and error reporting.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_REQUEST_ID: &str = "request_id";

// Entity identifiers
pub const FIELD_MODEL_URI: &str = "model_uri";
pub const FIELD_SESSION_URI: &str = "session_uri";
pub const FIELD_COMMAND_KIND: &str = "command_kind";

// Collection sizes
pub const FIELD_PATCH_LEN: &str = "patch_len";
pub const FIELD_STACK_DEPTH: &str = "stack_depth";
pub const FIELD_TRIGGER_ROUND: &str = "trigger_round";

// Error fields
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
