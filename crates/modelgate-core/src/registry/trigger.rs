//! Trigger provider registry
//!
//! Unkeyed: every registration is tested against the completed edit's
//! patch via `can_trigger`. When several providers match the same patch,
//! lookup synthesizes an aggregate provider that runs them all, in
//! registration order, as one transaction.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use modelgate_core_types::ModelUri;
use modelgate_errors::Result;
use tracing::debug;

use crate::edit::transaction_fn;
use crate::executor::Executor;
use crate::patch::PatchOperation;
use crate::provider::{Trigger, TriggerProvider};
use crate::registry::Registration;

struct TriggerEntry {
    handle: Registration,
    provider: Arc<dyn TriggerProvider>,
}

/// Unkeyed table of trigger providers, queried by predicate
#[derive(Default)]
pub struct TriggerProviderRegistry {
    providers: RwLock<Vec<TriggerEntry>>,
    next_id: AtomicU64,
}

impl TriggerProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a trigger provider
    pub fn register(&self, provider: Arc<dyn TriggerProvider>) -> Registration {
        let handle = Registration::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut providers = self.providers.write().expect("registry lock poisoned");
        providers.push(TriggerEntry { handle, provider });
        debug!(target: "modelgate::registry", "trigger provider registered");
        handle
    }

    /// Remove a registration; a no-op if the handle is unknown
    pub fn unregister(&self, handle: Registration) {
        let mut providers = self.providers.write().expect("registry lock poisoned");
        providers.retain(|entry| entry.handle.id() != handle.id());
    }

    /// Number of live registrations
    pub fn len(&self) -> usize {
        self.providers.read().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the provider responsible for the given patch
    ///
    /// Zero matches → `None`. One match → that provider. Two or more →
    /// a synthesized aggregate provider running every match, in
    /// registration order, as a single transaction.
    pub fn get_provider(
        &self,
        model_uri: &ModelUri,
        patch: &[PatchOperation],
    ) -> Option<Arc<dyn TriggerProvider>> {
        let matching: Vec<Arc<dyn TriggerProvider>> = {
            let providers = self.providers.read().expect("registry lock poisoned");
            providers
                .iter()
                .filter(|entry| entry.provider.can_trigger(model_uri, patch))
                .map(|entry| Arc::clone(&entry.provider))
                .collect()
        };

        match matching.len() {
            0 => None,
            1 => matching.into_iter().next(),
            _ => Some(Arc::new(AggregateTriggerProvider { members: matching })),
        }
    }
}

/// Synthesized provider combining several matching providers
///
/// Its trigger is a transaction function that invokes each member in
/// registration order and applies the member's result through the shared
/// Executor. The first failing sub-transaction stops the run; overall
/// success is the AND of all invoked sub-results up to that point.
struct AggregateTriggerProvider {
    members: Vec<Arc<dyn TriggerProvider>>,
}

#[async_trait]
impl TriggerProvider for AggregateTriggerProvider {
    fn can_trigger(&self, model_uri: &ModelUri, patch: &[PatchOperation]) -> bool {
        self.members
            .iter()
            .any(|member| member.can_trigger(model_uri, patch))
    }

    async fn get_triggers(
        &self,
        model_uri: &ModelUri,
        patch: &[PatchOperation],
    ) -> Result<Option<Trigger>> {
        let members = self.members.clone();
        let model_uri = model_uri.clone();
        let patch = patch.to_vec();

        Ok(Some(Trigger::Transaction(transaction_fn(
            move |executor: &mut dyn Executor| {
                Box::pin(async move {
                    let mut all_succeeded = true;
                    for member in members {
                        if !member.can_trigger(&model_uri, &patch) {
                            continue;
                        }
                        let sub_result = match member.get_triggers(&model_uri, &patch).await? {
                            None => continue,
                            Some(Trigger::Patch(ops)) => {
                                if ops.is_empty() {
                                    continue;
                                }
                                executor.apply_patch(ops).await?.success
                            }
                            Some(Trigger::Transaction(f)) => f(&mut *executor).await?,
                        };
                        all_succeeded = all_succeeded && sub_result;
                        if !sub_result {
                            // First failing sub-transaction stops the run
                            break;
                        }
                    }
                    Ok(all_succeeded)
                })
            },
        ))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::command::ModelCommand;
    use crate::patch::{ModelUpdateResult, PatchOperation};

    /// Executor that records every apply_patch call and echoes it back.
    struct RecordingExecutor {
        calls: Vec<Vec<PatchOperation>>,
    }

    impl RecordingExecutor {
        fn new() -> Self {
            Self { calls: Vec::new() }
        }
    }

    #[async_trait]
    impl Executor for RecordingExecutor {
        async fn execute(
            &mut self,
            _model_uri: &ModelUri,
            _command: ModelCommand,
        ) -> Result<ModelUpdateResult> {
            Ok(ModelUpdateResult::successful(Vec::new()))
        }

        async fn apply_patch(&mut self, patch: Vec<PatchOperation>) -> Result<ModelUpdateResult> {
            self.calls.push(patch.clone());
            Ok(ModelUpdateResult::successful(patch))
        }
    }

    /// Trigger provider matching an exact model URI.
    struct ExactUriTrigger {
        uri: &'static str,
        patch_path: &'static str,
    }

    #[async_trait]
    impl TriggerProvider for ExactUriTrigger {
        fn can_trigger(&self, model_uri: &ModelUri, _patch: &[PatchOperation]) -> bool {
            model_uri.as_str() == self.uri
        }

        async fn get_triggers(
            &self,
            _model_uri: &ModelUri,
            _patch: &[PatchOperation],
        ) -> Result<Option<Trigger>> {
            Ok(Some(Trigger::Patch(vec![PatchOperation::replace(
                self.patch_path,
                json!(true),
            )])))
        }
    }

    /// Trigger provider matching a model URI prefix.
    struct PrefixUriTrigger {
        prefix: &'static str,
        patch_path: &'static str,
    }

    #[async_trait]
    impl TriggerProvider for PrefixUriTrigger {
        fn can_trigger(&self, model_uri: &ModelUri, _patch: &[PatchOperation]) -> bool {
            model_uri.as_str().starts_with(self.prefix)
        }

        async fn get_triggers(
            &self,
            _model_uri: &ModelUri,
            _patch: &[PatchOperation],
        ) -> Result<Option<Trigger>> {
            Ok(Some(Trigger::Patch(vec![PatchOperation::replace(
                self.patch_path,
                json!(true),
            )])))
        }
    }

    /// Trigger provider whose transaction always reports failure.
    struct FailingTrigger;

    #[async_trait]
    impl TriggerProvider for FailingTrigger {
        fn can_trigger(&self, _model_uri: &ModelUri, _patch: &[PatchOperation]) -> bool {
            true
        }

        async fn get_triggers(
            &self,
            _model_uri: &ModelUri,
            _patch: &[PatchOperation],
        ) -> Result<Option<Trigger>> {
            Ok(Some(Trigger::Transaction(transaction_fn(
                |_executor: &mut dyn Executor| Box::pin(async move { Ok(false) }),
            ))))
        }
    }

    fn sample_patch() -> Vec<PatchOperation> {
        vec![PatchOperation::replace("/x", json!(1))]
    }

    #[test]
    fn test_zero_matches_yields_none() {
        let registry = TriggerProviderRegistry::new();
        registry.register(Arc::new(ExactUriTrigger {
            uri: "test:a",
            patch_path: "/t1",
        }));

        let provider = registry.get_provider(&ModelUri::new("other:z"), &sample_patch());
        assert!(provider.is_none());
    }

    #[tokio::test]
    async fn test_single_match_returns_that_provider() {
        let registry = TriggerProviderRegistry::new();
        registry.register(Arc::new(ExactUriTrigger {
            uri: "test:a",
            patch_path: "/t1",
        }));

        let uri = ModelUri::new("test:a");
        let provider = registry
            .get_provider(&uri, &sample_patch())
            .expect("provider should match");

        // The single provider's own trigger comes back, not an aggregate
        let trigger = provider.get_triggers(&uri, &sample_patch()).await.unwrap();
        match trigger {
            Some(Trigger::Patch(ops)) => assert_eq!(ops[0].path, "/t1"),
            other => panic!("expected the provider's own patch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_aggregate_invokes_each_member_once() {
        // GIVEN T1 matching the exact URI and T2 matching the prefix
        let registry = TriggerProviderRegistry::new();
        registry.register(Arc::new(ExactUriTrigger {
            uri: "test:a",
            patch_path: "/t1",
        }));
        registry.register(Arc::new(PrefixUriTrigger {
            prefix: "test:",
            patch_path: "/t2",
        }));

        // WHEN querying against test:a
        let uri = ModelUri::new("test:a");
        let provider = registry
            .get_provider(&uri, &sample_patch())
            .expect("aggregate should match");

        let trigger = provider.get_triggers(&uri, &sample_patch()).await.unwrap();
        let tx = match trigger {
            Some(Trigger::Transaction(tx)) => tx,
            other => panic!("expected an aggregate transaction, got {:?}", other),
        };

        // THEN the shared executor receives exactly two apply_patch calls,
        // one per provider's own patch, in registration order
        let mut executor = RecordingExecutor::new();
        let succeeded = tx(&mut executor).await.unwrap();
        assert!(succeeded);
        assert_eq!(executor.calls.len(), 2);
        assert_eq!(executor.calls[0][0].path, "/t1");
        assert_eq!(executor.calls[1][0].path, "/t2");
    }

    #[tokio::test]
    async fn test_aggregate_stops_early_on_failing_member() {
        let registry = TriggerProviderRegistry::new();
        registry.register(Arc::new(FailingTrigger));
        registry.register(Arc::new(PrefixUriTrigger {
            prefix: "test:",
            patch_path: "/t2",
        }));

        let uri = ModelUri::new("test:a");
        let provider = registry
            .get_provider(&uri, &sample_patch())
            .expect("aggregate should match");

        let tx = match provider.get_triggers(&uri, &sample_patch()).await.unwrap() {
            Some(Trigger::Transaction(tx)) => tx,
            other => panic!("expected an aggregate transaction, got {:?}", other),
        };

        let mut executor = RecordingExecutor::new();
        let succeeded = tx(&mut executor).await.unwrap();

        // The failing first member stops the run before the second applies
        assert!(!succeeded);
        assert!(executor.calls.is_empty());
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let registry = TriggerProviderRegistry::new();
        let handle = registry.register(Arc::new(FailingTrigger));
        assert_eq!(registry.len(), 1);

        registry.unregister(handle);
        assert!(registry.is_empty());

        registry.unregister(handle);
        assert!(registry.is_empty());
    }
}
