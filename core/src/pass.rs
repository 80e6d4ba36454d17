// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::{StreamExt, stream};
use tokio::sync::watch;

use crate::config::SyncSettings;
use crate::engine::{CollectionOutcome, Engine, FailedItem};
use crate::error::SyncError;
use crate::policy::SyncPolicy;
use crate::remote::{CollectionFilter, RemoteDirectory};
use crate::store::LocalStore;
use crate::types::CollectionType;

/// Progress of a sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    /// No pass has run yet.
    Idle,
    /// Local collections are being matched against the remote ones.
    CollectionsReconciling,
    /// Item cycles are running, `done` of `total` collections finished.
    ItemsReconciling { done: usize, total: usize },
    /// The last pass converged every collection.
    Completed,
    /// The last pass finished, leaving failures or cancelled collections behind.
    PartiallyFailed,
    /// The last pass ended early on a fatal error.
    Aborted,
}

impl PassState {
    /// Whether a pass is running.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::CollectionsReconciling | Self::ItemsReconciling { .. }
        )
    }
}

/// A collection whose item cycle was aborted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedCollection {
    pub url: String,
    pub reason: String,
}

/// Aggregate result of a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassResult {
    pub account: String,
    pub kind: CollectionType,

    /// Local collections created, updated and deleted.
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,

    /// Items pushed, pulled and purged over all collections.
    pub pushed: usize,
    pub pulled: usize,
    pub purged: usize,
    pub conflicts: usize,
    /// Local changes dropped in read-only collections.
    pub reverted: usize,

    pub failed_collections: Vec<FailedCollection>,
    pub failed_items: Vec<FailedItem>,

    /// Collections skipped because the pass was cancelled.
    pub cancelled: bool,

    /// Passes requested to run after this one.
    pub follow_ups: Vec<CollectionType>,
}

impl PassResult {
    fn new(account: &str, kind: CollectionType) -> Self {
        Self {
            account: account.to_string(),
            kind,
            created: 0,
            updated: 0,
            deleted: 0,
            pushed: 0,
            pulled: 0,
            purged: 0,
            conflicts: 0,
            reverted: 0,
            failed_collections: Vec::new(),
            failed_items: Vec::new(),
            cancelled: false,
            follow_ups: Vec::new(),
        }
    }

    /// Whether every collection converged.
    pub fn is_success(&self) -> bool {
        self.failed_items.is_empty() && self.failed_collections.is_empty() && !self.cancelled
    }

    fn absorb(&mut self, url: &str, outcome: CollectionOutcome) {
        self.pushed += outcome.pushed;
        self.pulled += outcome.pulled;
        self.purged += outcome.purged;
        self.conflicts += outcome.conflicts;
        self.reverted += outcome.reverted;
        self.failed_items.extend(outcome.failed_items);
        if let Some(reason) = outcome.failure {
            self.failed_collections.push(FailedCollection {
                url: url.to_string(),
                reason,
            });
        }
    }
}

/// Requests a running pass to stop before its next collection.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Runs sync passes of one account against one remote.
///
/// Passes for the same account and collection type must not overlap; the
/// caller is responsible for running them one after another.
pub struct SyncPass {
    remote: Arc<dyn RemoteDirectory>,
    store: Arc<dyn LocalStore>,
    policy: Arc<dyn SyncPolicy>,
    settings: SyncSettings,
    state: watch::Sender<PassState>,
    cancel: CancelHandle,
}

impl SyncPass {
    pub fn new(
        remote: Arc<dyn RemoteDirectory>,
        store: Arc<dyn LocalStore>,
        policy: Arc<dyn SyncPolicy>,
        settings: SyncSettings,
    ) -> Self {
        let (state, _) = watch::channel(PassState::Idle);
        Self {
            remote,
            store,
            policy,
            settings,
            state,
            cancel: CancelHandle::default(),
        }
    }

    pub fn state(&self) -> PassState {
        *self.state.borrow()
    }

    /// Observes the state of the passes run by this controller.
    pub fn subscribe(&self) -> watch::Receiver<PassState> {
        self.state.subscribe()
    }

    /// Shares `cancel` with other controllers, one cancellation then stops all of them.
    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle to cancel the running pass.
    ///
    /// A cancellation requested while no pass runs applies to the next one.
    /// It is cleared once the pass it applied to has finished.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Runs a full pass over the collections of one type.
    pub async fn run_pass(
        &self,
        account: &str,
        kind: CollectionType,
    ) -> Result<PassResult, SyncError> {
        self.run_filtered(account, CollectionFilter::new(kind)).await
    }

    /// Runs a full pass over the collections selected by `filter`.
    #[tracing::instrument(skip(self, filter), fields(kind = %filter.kind))]
    pub async fn run_filtered(
        &self,
        account: &str,
        filter: CollectionFilter,
    ) -> Result<PassResult, SyncError> {
        let result = self.execute(account, &filter).await;
        self.cancel.reset();

        match result {
            Ok(result) => {
                let state = match result.is_success() {
                    true => PassState::Completed,
                    false => PassState::PartiallyFailed,
                };
                tracing::info!(
                    created = result.created,
                    updated = result.updated,
                    deleted = result.deleted,
                    pushed = result.pushed,
                    pulled = result.pulled,
                    purged = result.purged,
                    conflicts = result.conflicts,
                    reverted = result.reverted,
                    failed_items = result.failed_items.len(),
                    failed_collections = result.failed_collections.len(),
                    cancelled = result.cancelled,
                    "sync pass finished"
                );
                self.state.send_replace(state);
                Ok(result)
            }
            Err(e) => {
                tracing::error!(err = %e, "sync pass aborted");
                self.state.send_replace(PassState::Aborted);
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        account: &str,
        filter: &CollectionFilter,
    ) -> Result<PassResult, SyncError> {
        let engine = Engine::new(&*self.remote, &*self.store, &*self.policy);
        let mut result = PassResult::new(account, filter.kind);

        self.state.send_replace(PassState::CollectionsReconciling);
        let (changes, collections) = engine.reconcile_collections(account, filter).await?;
        result.created = changes.created;
        result.updated = changes.updated;
        result.deleted = changes.deleted;

        let total = collections.len();
        let mut done = 0;
        self.state
            .send_replace(PassState::ItemsReconciling { done, total });

        let engine = &engine;
        let cancel = &self.cancel;
        let mut cycles = stream::iter(collections)
            .map(move |collection| async move {
                // cancellation is only honored between collections
                if cancel.is_cancelled() {
                    return (collection, None);
                }
                let outcome = engine
                    .sync_collection(&collection.local, &collection.remote)
                    .await;
                (collection, Some(outcome))
            })
            .buffer_unordered(self.settings.max_concurrent_collections.max(1));

        while let Some((collection, outcome)) = cycles.next().await {
            match outcome {
                None => {
                    tracing::info!(url = %collection.remote.url, "cancelled before item cycle");
                    result.cancelled = true;
                }
                Some(outcome) => result.absorb(&collection.remote.url, outcome?),
            }

            done += 1;
            self.state
                .send_replace(PassState::ItemsReconciling { done, total });
        }

        if result.is_success() {
            result.follow_ups = self.policy.companions(filter.kind);
        }
        Ok(result)
    }
}
