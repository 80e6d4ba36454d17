// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;

use crate::error::SyncError;
use crate::types::{CollectionType, Item, LocalCollection, RemoteCollection, RemoteItem};

/// Last-known change tokens of collections and items.
///
/// A write returns only once it is durable.
#[async_trait]
pub trait TagStore: Send + Sync {
    async fn collection_tag(&self, collection_id: i64) -> Result<Option<String>, SyncError>;

    async fn set_collection_tag(
        &self,
        collection_id: i64,
        ctag: Option<&str>,
    ) -> Result<(), SyncError>;

    async fn item_tag(&self, local_id: i64) -> Result<Option<String>, SyncError>;

    async fn set_item_tag(&self, local_id: i64, etag: Option<&str>) -> Result<(), SyncError>;
}

/// Local collections and their items.
///
/// Item views used by the reconciliation:
/// - [`list_all`](Self::list_all): every item that is not a tombstone,
/// - [`list_deleted`](Self::list_deleted): tombstones awaiting remote deletion,
/// - [`mark_for_push`](Self::mark_for_push): dirty items, advancing their sequence,
/// - [`list_without_remote_id`](Self::list_without_remote_id): items never pushed.
#[async_trait]
pub trait LocalStore: TagStore {
    async fn list_collections(
        &self,
        account: &str,
        kind: CollectionType,
    ) -> Result<Vec<LocalCollection>, SyncError>;

    /// Materializes a remote collection, without a collection tag.
    async fn create_collection(
        &self,
        account: &str,
        remote: &RemoteCollection,
    ) -> Result<LocalCollection, SyncError>;

    /// Refreshes the metadata of a collection; the color only if `update_color`.
    async fn update_collection(
        &self,
        id: i64,
        remote: &RemoteCollection,
        update_color: bool,
    ) -> Result<(), SyncError>;

    /// Deletes a collection together with its items.
    async fn delete_collection(&self, id: i64) -> Result<(), SyncError>;

    async fn list_all(&self, collection_id: i64) -> Result<Vec<Item>, SyncError>;

    async fn list_deleted(&self, collection_id: i64) -> Result<Vec<Item>, SyncError>;

    /// Returns the dirty items that are no tombstones, advancing the sequence of
    /// each returned item once (unset becomes 0).
    ///
    /// This is the intent to push them: calling it twice without a push in
    /// between advances the sequence twice.
    async fn mark_for_push(&self, collection_id: i64) -> Result<Vec<Item>, SyncError>;

    async fn list_without_remote_id(&self, collection_id: i64) -> Result<Vec<Item>, SyncError>;

    async fn find_by_remote_id(
        &self,
        collection_id: i64,
        remote_id: &str,
    ) -> Result<Option<Item>, SyncError>;

    /// Remote ids of all items of a collection, tombstones included.
    async fn list_remote_ids(&self, collection_id: i64) -> Result<Vec<String>, SyncError>;

    /// Stores a downloaded item, overwriting the local copy and clearing its
    /// dirty flag.
    async fn upsert_remote(
        &self,
        collection_id: i64,
        item: &RemoteItem,
    ) -> Result<Item, SyncError>;

    /// Remembers the file name the first push of an item uses, so that a retry
    /// after a lost response writes the same remote item.
    async fn reserve_name(&self, local_id: i64, name: &str) -> Result<(), SyncError>;

    /// Records the remote id of a freshly created item and marks it clean.
    /// The remote id of an item is never changed once assigned.
    async fn assign_remote_id(
        &self,
        local_id: i64,
        remote_id: &str,
        etag: Option<&str>,
    ) -> Result<(), SyncError>;

    async fn clear_dirty(&self, local_id: i64) -> Result<(), SyncError>;

    /// Drops the local changes of a pushed item, including its deletion, and
    /// forgets its tag so that the next pull restores the remote copy.
    async fn revert_item(&self, local_id: i64) -> Result<(), SyncError>;

    /// Removes an item for good.
    async fn purge_item(&self, local_id: i64) -> Result<(), SyncError>;

    /// Creates an item as a local user edit.
    async fn create_item(&self, collection_id: i64, content: &str) -> Result<Item, SyncError>;

    /// Changes the content of an item as a local user edit.
    async fn edit_item(&self, local_id: i64, content: &str) -> Result<(), SyncError>;

    /// Deletes an item as a local user edit, leaving a tombstone if it was pushed before.
    async fn delete_item(&self, local_id: i64) -> Result<(), SyncError>;
}
