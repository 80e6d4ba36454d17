// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

mod collections;
mod items;

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::error::SyncError;
use crate::localdb::collections::Collections;
use crate::localdb::items::Items;
use crate::store::{LocalStore, TagStore};
use crate::types::{CollectionType, Item, LocalCollection, RemoteCollection, RemoteItem};

/// `SQLite` backed local store.
#[derive(Debug, Clone)]
pub struct LocalDb {
    pool: SqlitePool,

    collections: Collections,
    items: Items,
}

/// Local changes of a collection not pushed yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingCounts {
    pub dirty: i64,
    pub deleted: i64,
}

impl LocalDb {
    /// Opens a sqlite database connection.
    /// If `filename` is `None`, it opens an in-memory database.
    pub async fn open(filename: Option<&Path>) -> Result<Self, SyncError> {
        let pool = if let Some(filename) = filename {
            tracing::info!(path = %filename.display(), "connecting to SQLite database");
            let options = SqliteConnectOptions::new()
                .filename(filename)
                .create_if_missing(true);
            SqlitePoolOptions::new().connect_with(options).await?
        } else {
            tracing::info!("connecting to in-memory SQLite database");
            // every connection would get its own in-memory database, keep exactly one
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(SqliteConnectOptions::new().in_memory(true))
                .await?
        };

        sqlx::migrate!("src/localdb/migrations") // relative path from the crate root
            .run(&pool)
            .await?;

        let collections = Collections::new(pool.clone());
        let items = Items::new(pool.clone());
        Ok(LocalDb {
            pool,
            collections,
            items,
        })
    }

    /// All materialized collections of all accounts.
    pub async fn all_collections(&self) -> Result<Vec<LocalCollection>, SyncError> {
        self.collections
            .list_every()
            .await?
            .into_iter()
            .map(LocalCollection::try_from)
            .collect()
    }

    pub async fn pending(&self, collection_id: i64) -> Result<PendingCounts, SyncError> {
        let (dirty, deleted) = self.items.count_pending(collection_id).await?;
        Ok(PendingCounts { dirty, deleted })
    }

    /// Looks up one item, tombstones included.
    pub async fn item(&self, local_id: i64) -> Result<Option<Item>, SyncError> {
        Ok(self.items.get(local_id).await?.map(Item::from))
    }

    pub async fn close(self) {
        tracing::debug!("closing database connection");
        self.pool.close().await;
    }
}

fn found(exists: bool, what: impl FnOnce() -> String) -> Result<(), SyncError> {
    match exists {
        true => Ok(()),
        false => Err(SyncError::NotFound(what())),
    }
}

fn into_items(records: Vec<items::ItemRecord>) -> Vec<Item> {
    records.into_iter().map(Item::from).collect()
}

#[async_trait]
impl TagStore for LocalDb {
    async fn collection_tag(&self, collection_id: i64) -> Result<Option<String>, SyncError> {
        self.collections
            .ctag(collection_id)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("collection {collection_id}")))
    }

    async fn set_collection_tag(
        &self,
        collection_id: i64,
        ctag: Option<&str>,
    ) -> Result<(), SyncError> {
        let exists = self.collections.set_ctag(collection_id, ctag).await?;
        found(exists, || format!("collection {collection_id}"))
    }

    async fn item_tag(&self, local_id: i64) -> Result<Option<String>, SyncError> {
        self.items
            .etag(local_id)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("item {local_id}")))
    }

    async fn set_item_tag(&self, local_id: i64, etag: Option<&str>) -> Result<(), SyncError> {
        let exists = self.items.set_etag(local_id, etag).await?;
        found(exists, || format!("item {local_id}"))
    }
}

#[async_trait]
impl LocalStore for LocalDb {
    async fn list_collections(
        &self,
        account: &str,
        kind: CollectionType,
    ) -> Result<Vec<LocalCollection>, SyncError> {
        self.collections
            .list(account, kind.as_str())
            .await?
            .into_iter()
            .map(LocalCollection::try_from)
            .collect()
    }

    async fn create_collection(
        &self,
        account: &str,
        remote: &RemoteCollection,
    ) -> Result<LocalCollection, SyncError> {
        let record = self
            .collections
            .insert(
                account,
                remote.kind.as_str(),
                &remote.url,
                &remote.title(),
                remote.effective_color().map(i64::from),
            )
            .await?;
        LocalCollection::try_from(record)
    }

    async fn update_collection(
        &self,
        id: i64,
        remote: &RemoteCollection,
        update_color: bool,
    ) -> Result<(), SyncError> {
        let color = update_color.then(|| remote.effective_color().map(i64::from));
        let exists = self.collections.update(id, &remote.title(), color).await?;
        found(exists, || format!("collection {id}"))
    }

    async fn delete_collection(&self, id: i64) -> Result<(), SyncError> {
        let exists = self.collections.delete(id).await?;
        found(exists, || format!("collection {id}"))
    }

    async fn list_all(&self, collection_id: i64) -> Result<Vec<Item>, SyncError> {
        Ok(into_items(self.items.list_all(collection_id).await?))
    }

    async fn list_deleted(&self, collection_id: i64) -> Result<Vec<Item>, SyncError> {
        Ok(into_items(self.items.list_deleted(collection_id).await?))
    }

    async fn mark_for_push(&self, collection_id: i64) -> Result<Vec<Item>, SyncError> {
        Ok(into_items(self.items.mark_for_push(collection_id).await?))
    }

    async fn list_without_remote_id(&self, collection_id: i64) -> Result<Vec<Item>, SyncError> {
        Ok(into_items(
            self.items.list_without_remote_id(collection_id).await?,
        ))
    }

    async fn find_by_remote_id(
        &self,
        collection_id: i64,
        remote_id: &str,
    ) -> Result<Option<Item>, SyncError> {
        let record = self.items.find_by_remote_id(collection_id, remote_id).await?;
        Ok(record.map(Item::from))
    }

    async fn list_remote_ids(&self, collection_id: i64) -> Result<Vec<String>, SyncError> {
        Ok(self.items.remote_ids(collection_id).await?)
    }

    async fn upsert_remote(
        &self,
        collection_id: i64,
        item: &RemoteItem,
    ) -> Result<Item, SyncError> {
        let record = self
            .items
            .upsert_remote(collection_id, &item.remote_id, &item.etag, &item.content)
            .await?;
        Ok(record.into())
    }

    async fn assign_remote_id(
        &self,
        local_id: i64,
        remote_id: &str,
        etag: Option<&str>,
    ) -> Result<(), SyncError> {
        let assigned = self.items.assign_remote_id(local_id, remote_id, etag).await?;
        found(assigned, || format!("item {local_id} without remote id"))
    }

    async fn reserve_name(&self, local_id: i64, name: &str) -> Result<(), SyncError> {
        let reserved = self.items.reserve_name(local_id, name).await?;
        found(reserved, || format!("item {local_id} without remote id"))
    }

    async fn revert_item(&self, local_id: i64) -> Result<(), SyncError> {
        let reverted = self.items.revert(local_id).await?;
        found(reverted, || format!("item {local_id} with remote id"))
    }

    async fn clear_dirty(&self, local_id: i64) -> Result<(), SyncError> {
        let exists = self.items.clear_dirty(local_id).await?;
        found(exists, || format!("item {local_id}"))
    }

    async fn purge_item(&self, local_id: i64) -> Result<(), SyncError> {
        let exists = self.items.purge(local_id).await?;
        found(exists, || format!("item {local_id}"))
    }

    async fn create_item(&self, collection_id: i64, content: &str) -> Result<Item, SyncError> {
        Ok(self.items.create(collection_id, content).await?.into())
    }

    async fn edit_item(&self, local_id: i64, content: &str) -> Result<(), SyncError> {
        let exists = self.items.edit(local_id, content).await?;
        found(exists, || format!("item {local_id}"))
    }

    async fn delete_item(&self, local_id: i64) -> Result<(), SyncError> {
        let exists = self.items.delete(local_id).await?;
        found(exists, || format!("item {local_id}"))
    }
}
