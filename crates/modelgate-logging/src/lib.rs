//! Structured logging facility for Modelgate
//!
//! Provides a single initialization point for the logging facility. All
//! components log through `tracing` with the canonical field keys from
//! `modelgate_core_types::schema`; this crate only selects and installs
//! the subscriber.
//!
//! # Usage
//!
//! ```
//! use modelgate_logging::{init, Profile};
//!
//! // Initialize once at application startup
//! init(Profile::Development);
//! ```

use modelgate_core_types::schema;
use std::sync::Once;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

/// Logging profile configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Human-readable output for development
    Development,
    /// JSON structured output for production
    Production,
    /// No default subscriber; tests install their own if they need one
    Test,
}

static INIT_ONCE: Once = Once::new();

/// Initialize the logging facility
///
/// This function should be called once at application startup. Repeated
/// calls are no-ops.
///
/// # Profiles
///
/// - **Development**: Human-readable logs with debug level
/// - **Production**: JSON structured logs with info level
/// - **Test**: No-op registry; test harnesses attach their own layers
pub fn init(profile: Profile) {
    INIT_ONCE.call_once(|| {
        match profile {
            Profile::Development => {
                tracing_subscriber::fmt()
                    .with_env_filter(
                        EnvFilter::try_from_default_env()
                            .unwrap_or_else(|_| EnvFilter::new("modelgate=debug")),
                    )
                    .init();
            }
            Profile::Production => {
                tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(
                        EnvFilter::try_from_default_env()
                            .unwrap_or_else(|_| EnvFilter::new("modelgate=info")),
                    )
                    .init();
            }
            Profile::Test => {
                tracing_subscriber::registry().init();
            }
        }
        tracing::debug!(
            component = module_path!(),
            event = schema::EVENT_START,
            profile = ?profile,
            "logging initialized"
        );
    });
}
