// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Reconciliation of local collections and their items with the remote side.
//!
//! Collections are reconciled by URL: local ones missing remotely are deleted,
//! matching ones refreshed and the remaining remote ones created. Items of each
//! collection are then reconciled by pushing local changes before pulling remote
//! ones, unless the collection tag shows nothing changed since the last cycle.

use std::collections::{HashMap, HashSet};

use crate::error::SyncError;
use crate::policy::SyncPolicy;
use crate::remote::{CollectionFilter, RemoteDirectory, WriteCondition};
use crate::store::LocalStore;
use crate::types::{Item, LocalCollection, PutOutcome, RemoteCollection, RemoteItemRef};

/// Collection-level changes applied to the local store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionChanges {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

/// A local collection paired with its remote counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledCollection {
    pub local: LocalCollection,
    pub remote: RemoteCollection,
}

/// An item whose push or pull failed, retried on the next pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    pub collection_url: String,
    /// Remote id, or `local-<id>` for items never pushed.
    pub identifier: String,
    pub reason: String,
}

/// Result of the item cycle of one collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionOutcome {
    /// Items created, updated or deleted remotely.
    pub pushed: usize,
    /// Items downloaded.
    pub pulled: usize,
    /// Local items removed because their remote copy vanished.
    pub purged: usize,
    /// Items whose local edit lost against a remote change or deletion.
    pub conflicts: usize,
    /// Local changes dropped because the collection is read-only.
    pub reverted: usize,
    pub failed_items: Vec<FailedItem>,
    /// The collection tag was unchanged, no item was looked at.
    pub skipped: bool,
    /// Reason the cycle was aborted before completing.
    pub failure: Option<String>,
}

/// Runs the reconciliation steps of a pass.
pub struct Engine<'a> {
    remote: &'a dyn RemoteDirectory,
    store: &'a dyn LocalStore,
    policy: &'a dyn SyncPolicy,
}

impl<'a> Engine<'a> {
    pub fn new(
        remote: &'a dyn RemoteDirectory,
        store: &'a dyn LocalStore,
        policy: &'a dyn SyncPolicy,
    ) -> Self {
        Self {
            remote,
            store,
            policy,
        }
    }

    /// Makes the local collections of `account` match the remote ones selected by
    /// `filter`, returning the applied changes and the surviving collections.
    pub async fn reconcile_collections(
        &self,
        account: &str,
        filter: &CollectionFilter,
    ) -> Result<(CollectionChanges, Vec<ReconciledCollection>), SyncError> {
        let mut remotes: Vec<Option<RemoteCollection>> = Vec::new();
        let mut by_url: HashMap<String, usize> = HashMap::new();
        for mut collection in self.remote.list_collections(filter).await? {
            if collection.kind != filter.kind || !filter.allows(&collection.url) {
                continue;
            }
            collection.read_only |= filter.forces_read_only(&collection.url);
            if by_url.contains_key(&collection.url) {
                tracing::warn!(url = %collection.url, "remote collection listed twice, ignoring");
                continue;
            }
            by_url.insert(collection.url.clone(), remotes.len());
            remotes.push(Some(collection));
        }

        let mut changes = CollectionChanges::default();
        let mut reconciled = Vec::new();

        let locals = self.store.list_collections(account, filter.kind).await?;
        for mut local in locals {
            let remote = by_url
                .get(&local.url)
                .and_then(|&i| remotes.get_mut(i))
                .and_then(Option::take);

            let Some(remote) = remote else {
                tracing::info!(url = %local.url, "deleting local collection missing remotely");
                if tolerate_missing(self.store.delete_collection(local.id).await)? {
                    changes.deleted += 1;
                }
                continue;
            };

            let update_color = self.policy.update_color(&local, &remote);
            let title = remote.title();
            let color = remote.effective_color();
            if local.display_name != title || (update_color && local.color != color) {
                tracing::info!(url = %local.url, "updating local collection");
                let updated = self
                    .store
                    .update_collection(local.id, &remote, update_color)
                    .await;
                if !tolerate_missing(updated)? {
                    continue;
                }
                local.display_name = title;
                if update_color {
                    local.color = color;
                }
                changes.updated += 1;
            }
            reconciled.push(ReconciledCollection { local, remote });
        }

        for remote in remotes.into_iter().flatten() {
            tracing::info!(url = %remote.url, "creating local collection");
            let local = self.store.create_collection(account, &remote).await?;
            changes.created += 1;
            reconciled.push(ReconciledCollection { local, remote });
        }

        Ok((changes, reconciled))
    }

    /// Runs the item cycle of one collection.
    ///
    /// Item failures are collected in the outcome; only fatal errors are returned.
    #[tracing::instrument(skip_all, fields(url = %remote.url))]
    pub async fn sync_collection(
        &self,
        local: &LocalCollection,
        remote: &RemoteCollection,
    ) -> Result<CollectionOutcome, SyncError> {
        let stored = self.store.collection_tag(local.id).await?;
        if stored.is_some() && stored == remote.ctag {
            tracing::debug!("collection tag unchanged, skipping");
            return Ok(CollectionOutcome {
                skipped: true,
                ..Default::default()
            });
        }

        let mut cycle = Cycle::new(local, remote);
        if remote.read_only {
            self.revert_local_changes(&mut cycle).await?;
        } else {
            self.push_deletions(&mut cycle).await?;
            self.push_changes(&mut cycle).await?;
        }

        let remote_items = match self.remote.list_items(remote).await {
            Ok(items) => items,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(err = %e, "failed to list remote items");
                let mut outcome = cycle.finish();
                outcome.failure = Some(e.to_string());
                return Ok(outcome);
            }
        };
        let seen: HashSet<String> = remote_items.iter().map(|r| r.remote_id.clone()).collect();

        self.pull(&mut cycle, &remote_items).await?;
        let kept = self.drop_vanished(&mut cycle, &seen).await?;

        let outcome = cycle.finish();
        if outcome.failed_items.is_empty() && kept == 0 {
            self.store
                .set_collection_tag(local.id, remote.ctag.as_deref())
                .await?;
        } else {
            tracing::info!(
                failed = outcome.failed_items.len(),
                kept,
                "collection not converged, keeping previous tag"
            );
        }
        Ok(outcome)
    }

    async fn push_deletions(&self, cycle: &mut Cycle<'_>) -> Result<(), SyncError> {
        for item in self.store.list_deleted(cycle.local.id).await? {
            let Some(remote_id) = item.remote_id.as_deref() else {
                // never pushed, nothing to delete remotely
                tolerate_missing(self.store.purge_item(item.local_id).await)?;
                continue;
            };

            match self.remote.delete_item(cycle.remote, remote_id).await {
                Ok(()) => {
                    tracing::debug!(remote_id, "deleted remote item");
                    tolerate_missing(self.store.purge_item(item.local_id).await)?;
                    cycle.pushed += 1;
                }
                Err(SyncError::NotFound(_)) => {
                    tracing::debug!(remote_id, "remote item already gone");
                    tolerate_missing(self.store.purge_item(item.local_id).await)?;
                }
                Err(e) => cycle.fail(&item, e)?,
            }
        }
        Ok(())
    }

    async fn push_changes(&self, cycle: &mut Cycle<'_>) -> Result<(), SyncError> {
        let marked = self.store.mark_for_push(cycle.local.id).await?;

        for item in self.store.list_without_remote_id(cycle.local.id).await? {
            let name = match &item.pending_name {
                Some(name) => name.clone(),
                None => {
                    let name = self.remote.new_item_name(cycle.remote);
                    if !tolerate_missing(self.store.reserve_name(item.local_id, &name).await)? {
                        continue;
                    }
                    name
                }
            };

            match self.create_remote(cycle.remote, &name, &item.content).await {
                Ok(put) => {
                    tracing::debug!(remote_id = %put.remote_id, "created remote item");
                    let assigned = self
                        .store
                        .assign_remote_id(item.local_id, &put.remote_id, put.etag.as_deref())
                        .await;
                    tolerate_missing(assigned)?;
                    cycle.pushed += 1;
                }
                Err(e) => cycle.fail(&item, e)?,
            }
        }

        for item in marked {
            let Some(remote_id) = item.remote_id.as_deref() else {
                continue;
            };

            // an unknown tag means the last write didn't return one, write unconditionally
            let condition = match item.etag.as_deref() {
                Some(etag) => WriteCondition::Match(etag),
                None => WriteCondition::Always,
            };
            match self
                .remote
                .put_item(cycle.remote, remote_id, &item.content, condition)
                .await
            {
                Ok(put) => {
                    tracing::debug!(remote_id, "updated remote item");
                    let stored = self
                        .store
                        .set_item_tag(item.local_id, put.etag.as_deref())
                        .await;
                    if tolerate_missing(stored)? {
                        tolerate_missing(self.store.clear_dirty(item.local_id).await)?;
                    }
                    cycle.pushed += 1;
                }
                Err(SyncError::Conflict(_) | SyncError::NotFound(_)) => {
                    tracing::info!(remote_id, "remote item changed since last pull, remote wins");
                    cycle.conflicts.insert(item.local_id);
                }
                Err(e) => cycle.fail(&item, e)?,
            }
        }
        Ok(())
    }

    /// Uploads a new item under its reserved name.
    ///
    /// The name is only ever used by this item, so an existing resource is the
    /// upload of an earlier attempt whose response was lost and is overwritten.
    async fn create_remote(
        &self,
        remote: &RemoteCollection,
        name: &str,
        content: &str,
    ) -> Result<PutOutcome, SyncError> {
        match self
            .remote
            .put_item(remote, name, content, WriteCondition::Create)
            .await
        {
            Err(SyncError::Conflict(_)) => {
                tracing::debug!(remote_id = name, "item already uploaded, overwriting");
                self.remote
                    .put_item(remote, name, content, WriteCondition::Always)
                    .await
            }
            result => result,
        }
    }

    /// Drops the local changes of a read-only collection, the pull then restores
    /// the remote copies.
    async fn revert_local_changes(&self, cycle: &mut Cycle<'_>) -> Result<(), SyncError> {
        let deleted = self.store.list_deleted(cycle.local.id).await?;
        let edited = self.store.list_all(cycle.local.id).await?;

        for item in deleted.iter().chain(edited.iter().filter(|i| i.dirty)) {
            let reverted = match item.remote_id.as_deref() {
                Some(remote_id) => {
                    tracing::info!(remote_id, "collection is read-only, reverting local change");
                    self.store.revert_item(item.local_id).await
                }
                None => {
                    tracing::info!(
                        local_id = item.local_id,
                        "collection is read-only, dropping local item"
                    );
                    self.store.purge_item(item.local_id).await
                }
            };
            if tolerate_missing(reverted)? {
                cycle.reverted += 1;
            }
        }
        Ok(())
    }

    async fn pull(
        &self,
        cycle: &mut Cycle<'_>,
        remote_items: &[RemoteItemRef],
    ) -> Result<(), SyncError> {
        let local_items = self.store.list_all(cycle.local.id).await?;
        let by_remote_id: HashMap<&str, &Item> = local_items
            .iter()
            .filter_map(|item| item.remote_id.as_deref().map(|id| (id, item)))
            .collect();
        // uploads whose response was lost, claimed by the next push of their item
        let reserved: HashSet<&str> = local_items
            .iter()
            .filter(|item| item.remote_id.is_none())
            .filter_map(|item| item.pending_name.as_deref())
            .collect();
        let tombstones: HashSet<String> = self
            .store
            .list_deleted(cycle.local.id)
            .await?
            .into_iter()
            .filter_map(|item| item.remote_id)
            .collect();

        let mut to_fetch = Vec::new();
        for remote_item in remote_items {
            // deletion is retried next pass
            if tombstones.contains(&remote_item.remote_id)
                || reserved.contains(remote_item.remote_id.as_str())
            {
                continue;
            }
            match by_remote_id.get(remote_item.remote_id.as_str()) {
                // keep local edits whose push failed, they are retried next pass
                Some(item) if cycle.failed.contains(&item.local_id) => {}
                Some(item) if item.etag.as_deref() == Some(remote_item.etag.as_str()) => {}
                _ => to_fetch.push(remote_item.remote_id.clone()),
            }
        }

        if to_fetch.is_empty() {
            return Ok(());
        }

        let fetched = match self.remote.fetch_items(cycle.remote, &to_fetch).await {
            Ok(fetched) => fetched,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(err = %e, count = to_fetch.len(), "failed to download items");
                for remote_id in to_fetch {
                    cycle.failed_items.push(FailedItem {
                        collection_url: cycle.remote.url.clone(),
                        identifier: remote_id,
                        reason: e.to_string(),
                    });
                }
                return Ok(());
            }
        };

        let requested: HashSet<&str> = to_fetch.iter().map(String::as_str).collect();
        for remote_item in &fetched {
            if !requested.contains(remote_item.remote_id.as_str()) {
                tracing::warn!(remote_id = %remote_item.remote_id, "ignoring unrequested item");
                continue;
            }
            self.store
                .upsert_remote(cycle.local.id, remote_item)
                .await?;
            cycle.pulled += 1;
        }

        let vanished = to_fetch.len() - fetched.len().min(to_fetch.len());
        if vanished > 0 {
            tracing::debug!(vanished, "items vanished between listing and download");
        }
        Ok(())
    }

    /// Removes local items whose remote copy vanished, returning the number of
    /// local edits kept.
    async fn drop_vanished(
        &self,
        cycle: &mut Cycle<'_>,
        seen: &HashSet<String>,
    ) -> Result<usize, SyncError> {
        let mut kept = 0;
        for remote_id in self.store.list_remote_ids(cycle.local.id).await? {
            if seen.contains(&remote_id) {
                continue;
            }
            let Some(item) = self
                .store
                .find_by_remote_id(cycle.local.id, &remote_id)
                .await?
            else {
                continue;
            };

            if item.dirty && !item.deleted && self.policy.keep_orphaned_edits() {
                tracing::warn!(
                    remote_id = %remote_id,
                    local_id = item.local_id,
                    "conflict: remote copy vanished while edited locally, keeping local edit"
                );
                // without a tag the next push writes the item again
                tolerate_missing(self.store.set_item_tag(item.local_id, None).await)?;
                cycle.conflicts.insert(item.local_id);
                kept += 1;
            } else {
                tracing::debug!(remote_id = %remote_id, "purging local item missing remotely");
                if tolerate_missing(self.store.purge_item(item.local_id).await)? {
                    cycle.purged += 1;
                }
            }
        }
        Ok(kept)
    }
}

/// Bookkeeping of one item cycle.
struct Cycle<'c> {
    local: &'c LocalCollection,
    remote: &'c RemoteCollection,
    pushed: usize,
    pulled: usize,
    purged: usize,
    conflicts: HashSet<i64>,
    reverted: usize,
    failed: HashSet<i64>,
    failed_items: Vec<FailedItem>,
}

impl<'c> Cycle<'c> {
    fn new(local: &'c LocalCollection, remote: &'c RemoteCollection) -> Self {
        Self {
            local,
            remote,
            pushed: 0,
            pulled: 0,
            purged: 0,
            conflicts: HashSet::new(),
            reverted: 0,
            failed: HashSet::new(),
            failed_items: Vec::new(),
        }
    }

    /// Records a failed push, unless the error is fatal to the pass.
    fn fail(&mut self, item: &Item, e: SyncError) -> Result<(), SyncError> {
        if e.is_fatal() {
            return Err(e);
        }

        let identifier = match &item.remote_id {
            Some(id) => id.clone(),
            None => format!("local-{}", item.local_id),
        };
        tracing::warn!(item = %identifier, err = %e, "failed to push item");
        self.failed.insert(item.local_id);
        self.failed_items.push(FailedItem {
            collection_url: self.remote.url.clone(),
            identifier,
            reason: e.to_string(),
        });
        Ok(())
    }

    fn finish(self) -> CollectionOutcome {
        CollectionOutcome {
            pushed: self.pushed,
            pulled: self.pulled,
            purged: self.purged,
            conflicts: self.conflicts.len(),
            reverted: self.reverted,
            failed_items: self.failed_items,
            skipped: false,
            failure: None,
        }
    }
}

/// Turns a missing row into `false`, it was removed concurrently and is skipped.
fn tolerate_missing(result: Result<(), SyncError>) -> Result<bool, SyncError> {
    match result {
        Ok(()) => Ok(true),
        Err(SyncError::NotFound(what)) => {
            tracing::warn!(what = %what, "local row vanished, skipping");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}
