//! Engine configuration
//!
//! The upstream protocol never times out on its own; every correlated
//! await in this implementation carries a deadline from here instead of
//! risking an indefinite hang when the upstream stops replying.

use std::time::Duration;

/// Deadlines for the transactional engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long `open` waits for the session handshake reply
    pub handshake_timeout: Duration,
    /// How long each correlated send/await pair waits for its reply
    pub reply_timeout: Duration,
}

impl EngineConfig {
    pub fn with_handshake_timeout(mut self, handshake_timeout: Duration) -> Self {
        self.handshake_timeout = handshake_timeout;
        self
    }

    pub fn with_reply_timeout(mut self, reply_timeout: Duration) -> Self {
        self.reply_timeout = reply_timeout;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
            reply_timeout: Duration::from_secs(10),
        }
    }
}
