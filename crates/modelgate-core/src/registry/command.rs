//! Command provider registry
//!
//! Maps command kind → ordered provider list. Reserved primitive kinds
//! (`add`, `remove`, `set`) belong to the upstream server and cannot be
//! registered against.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use modelgate_core_types::ModelUri;
use modelgate_errors::{GateError, GateErrorKind, Result};
use tracing::debug;

use crate::command::{is_reserved_kind, ModelCommand};
use crate::edit::Edit;
use crate::provider::CommandProvider;
use crate::registry::Registration;

struct CommandEntry {
    handle: Registration,
    provider: Arc<dyn CommandProvider>,
}

/// Lookup table mapping command kind → ordered providers
///
/// Multiple providers may register for one kind; dispatch goes to the
/// first, in registration order, whose `can_handle` holds.
#[derive(Default)]
pub struct CommandProviderRegistry {
    providers: RwLock<HashMap<String, Vec<CommandEntry>>>,
    next_id: AtomicU64,
}

impl CommandProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider for a custom command kind
    ///
    /// Fails with `InvalidRegistration` if `kind` is one of the reserved
    /// primitive kinds.
    pub fn register(
        &self,
        kind: &str,
        provider: Arc<dyn CommandProvider>,
    ) -> Result<Registration> {
        if is_reserved_kind(kind) {
            return Err(GateError::new(GateErrorKind::InvalidRegistration)
                .with_op("register")
                .with_message(format!("'{kind}' is a reserved primitive command kind")));
        }

        let handle = Registration::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut providers = self.providers.write().expect("registry lock poisoned");
        providers
            .entry(kind.to_string())
            .or_default()
            .push(CommandEntry { handle, provider });
        debug!(target: "modelgate::registry", command_kind = kind, "command provider registered");
        Ok(handle)
    }

    /// Remove a registration; a no-op if the handle is unknown
    pub fn unregister(&self, handle: Registration) {
        let mut providers = self.providers.write().expect("registry lock poisoned");
        for entries in providers.values_mut() {
            entries.retain(|entry| entry.handle.id() != handle.id());
        }
        providers.retain(|_, entries| !entries.is_empty());
    }

    /// Number of live registrations across all kinds
    pub fn len(&self) -> usize {
        let providers = self.providers.read().expect("registry lock poisoned");
        providers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Translate a command through the first claiming provider
    ///
    /// When no registered provider claims the command, the original
    /// command is returned unchanged as `Edit::Command` (identity
    /// fallback), so callers treat the result uniformly.
    pub async fn get_commands(
        &self,
        model_uri: &ModelUri,
        command: ModelCommand,
    ) -> Result<Edit> {
        let provider = {
            let providers = self.providers.read().expect("registry lock poisoned");
            providers.get(&command.kind).and_then(|entries| {
                entries
                    .iter()
                    .find(|entry| entry.provider.can_handle(&command))
                    .map(|entry| Arc::clone(&entry.provider))
            })
        };

        match provider {
            Some(provider) => provider.get_commands(model_uri, command).await,
            None => Ok(Edit::Command(command)),
        }
    }
}
