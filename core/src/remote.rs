// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use davsync_dav::{DavClient, DavCollection, DavConfig, Href, Precondition};

use crate::error::SyncError;
use crate::types::{
    CollectionType, PutOutcome, RemoteCollection, RemoteItem, RemoteItemRef, parse_color,
};

/// Selects the remote collections a pass reconciles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionFilter {
    pub kind: CollectionType,
    /// URLs not selected for synchronization, treated as absent remotely.
    pub exclude: Vec<String>,
    /// URLs synchronized read-only, whatever the server allows.
    pub read_only: Vec<String>,
}

impl CollectionFilter {
    pub fn new(kind: CollectionType) -> Self {
        Self {
            kind,
            exclude: Vec::new(),
            read_only: Vec::new(),
        }
    }

    #[must_use]
    pub fn exclude(mut self, urls: impl IntoIterator<Item = String>) -> Self {
        self.exclude.extend(urls);
        self
    }

    #[must_use]
    pub fn force_read_only(mut self, urls: impl IntoIterator<Item = String>) -> Self {
        self.read_only.extend(urls);
        self
    }

    /// Whether a collection at `url` is selected.
    pub fn allows(&self, url: &str) -> bool {
        !contains_url(&self.exclude, url)
    }

    /// Whether the collection at `url` is forced read-only.
    pub fn forces_read_only(&self, url: &str) -> bool {
        contains_url(&self.read_only, url)
    }
}

fn contains_url(urls: &[String], url: &str) -> bool {
    let url = url.trim_end_matches('/');
    urls.iter().any(|a| a.trim_end_matches('/') == url)
}

/// Precondition of a remote write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteCondition<'a> {
    /// Only write if no item exists under the name yet.
    Create,
    /// Only write if the remote copy still has this entity tag.
    Match(&'a str),
    /// Write whatever the remote state.
    Always,
}

/// The remote side of the replica, one account on one server.
#[async_trait]
pub trait RemoteDirectory: Send + Sync {
    /// Lists the remote collections matching the filter.
    async fn list_collections(
        &self,
        filter: &CollectionFilter,
    ) -> Result<Vec<RemoteCollection>, SyncError>;

    /// Lists the items of a collection with their current entity tags.
    async fn list_items(
        &self,
        collection: &RemoteCollection,
    ) -> Result<Vec<RemoteItemRef>, SyncError>;

    /// Downloads one item.
    async fn fetch_item(
        &self,
        collection: &RemoteCollection,
        remote_id: &str,
    ) -> Result<RemoteItem, SyncError>;

    /// Downloads several items. Items that vanished are left out of the result.
    async fn fetch_items(
        &self,
        collection: &RemoteCollection,
        remote_ids: &[String],
    ) -> Result<Vec<RemoteItem>, SyncError> {
        let mut items = Vec::with_capacity(remote_ids.len());
        for remote_id in remote_ids {
            match self.fetch_item(collection, remote_id).await {
                Ok(item) => items.push(item),
                Err(SyncError::NotFound(_)) => {
                    tracing::debug!(remote_id = %remote_id, "item vanished before download");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(items)
    }

    /// Picks the file name of an item that was never pushed.
    fn new_item_name(&self, collection: &RemoteCollection) -> String {
        format!("{}{}", uuid::Uuid::new_v4(), collection.kind.extension())
    }

    /// Writes an item under `remote_id`.
    ///
    /// Fails with [`SyncError::Conflict`] when the condition doesn't hold.
    async fn put_item(
        &self,
        collection: &RemoteCollection,
        remote_id: &str,
        content: &str,
        condition: WriteCondition<'_>,
    ) -> Result<PutOutcome, SyncError>;

    /// Deletes an item, failing with [`SyncError::NotFound`] if it is already gone.
    async fn delete_item(
        &self,
        collection: &RemoteCollection,
        remote_id: &str,
    ) -> Result<(), SyncError>;
}

/// [`RemoteDirectory`] backed by a `CalDAV`/`CardDAV` server.
#[derive(Debug, Clone)]
pub struct DavRemote {
    client: DavClient,
    batch_size: usize,
}

impl DavRemote {
    pub fn new(config: DavConfig, batch_size: usize) -> Result<Self, SyncError> {
        Ok(Self::with_client(DavClient::new(config)?, batch_size))
    }

    pub fn with_client(client: DavClient, batch_size: usize) -> Self {
        Self {
            client,
            batch_size: batch_size.max(1),
        }
    }

    fn to_remote_collection(collection: DavCollection, kind: CollectionType) -> RemoteCollection {
        RemoteCollection {
            url: collection.href.to_string(),
            display_name: collection.display_name,
            color: collection.color.as_deref().and_then(parse_color),
            kind,
            // servers without getctag still change the sync token on every modification
            ctag: collection
                .ctag
                .map(|a| a.as_str().to_string())
                .or(collection.sync_token),
            read_only: collection.read_only,
        }
    }
}

fn item_href(collection: &RemoteCollection, remote_id: &str) -> Href {
    Href::from(collection.url.as_str()).join(remote_id)
}

#[async_trait]
impl RemoteDirectory for DavRemote {
    #[tracing::instrument(skip(self))]
    async fn list_collections(
        &self,
        filter: &CollectionFilter,
    ) -> Result<Vec<RemoteCollection>, SyncError> {
        let collections = match filter.kind {
            CollectionType::Events | CollectionType::Tasks => self.client.list_calendars().await?,
            CollectionType::Contacts => self.client.list_address_books().await?,
        };

        let collections: Vec<_> = collections
            .into_iter()
            .filter(|c| match filter.kind.component() {
                Some(component) => c.supports_component(component),
                None => true,
            })
            .filter(|c| filter.allows(c.href.as_str()))
            .map(|c| Self::to_remote_collection(c, filter.kind))
            .collect();

        tracing::debug!(count = collections.len(), "listed remote collections");
        Ok(collections)
    }

    async fn list_items(
        &self,
        collection: &RemoteCollection,
    ) -> Result<Vec<RemoteItemRef>, SyncError> {
        let href = Href::from(collection.url.as_str());
        let refs = self
            .client
            .list_resources(&href, collection.kind.component())
            .await?;

        Ok(refs
            .into_iter()
            .map(|r| RemoteItemRef {
                remote_id: r.href.last_segment().to_string(),
                etag: r.etag.to_string(),
            })
            .collect())
    }

    async fn fetch_item(
        &self,
        collection: &RemoteCollection,
        remote_id: &str,
    ) -> Result<RemoteItem, SyncError> {
        let resource = self.client.get(&item_href(collection, remote_id)).await?;
        Ok(RemoteItem {
            remote_id: remote_id.to_string(),
            etag: resource.etag.to_string(),
            content: resource.data,
        })
    }

    async fn fetch_items(
        &self,
        collection: &RemoteCollection,
        remote_ids: &[String],
    ) -> Result<Vec<RemoteItem>, SyncError> {
        let collection_href = Href::from(collection.url.as_str());
        let mut items = Vec::with_capacity(remote_ids.len());

        for batch in remote_ids.chunks(self.batch_size) {
            if let [remote_id] = batch {
                // a plain GET is understood by every server
                match self.fetch_item(collection, remote_id).await {
                    Ok(item) => items.push(item),
                    Err(SyncError::NotFound(_)) => {
                        tracing::debug!(remote_id = %remote_id, "item vanished before download");
                    }
                    Err(e) => return Err(e),
                }
                continue;
            }

            let hrefs: Vec<_> = batch.iter().map(|id| item_href(collection, id)).collect();
            let resources = self
                .client
                .multiget(&collection_href, collection.kind.dav_kind(), &hrefs)
                .await?;

            tracing::debug!(
                requested = batch.len(),
                received = resources.len(),
                "downloaded batch"
            );
            items.extend(resources.into_iter().map(|r| RemoteItem {
                remote_id: r.href.last_segment().to_string(),
                etag: r.etag.to_string(),
                content: r.data,
            }));
        }

        Ok(items)
    }

    async fn put_item(
        &self,
        collection: &RemoteCollection,
        remote_id: &str,
        content: &str,
        condition: WriteCondition<'_>,
    ) -> Result<PutOutcome, SyncError> {
        let precondition = match condition {
            WriteCondition::Create => Precondition::IfNoneMatchAny,
            WriteCondition::Match(etag) => Precondition::IfMatch(etag.into()),
            WriteCondition::Always => Precondition::None,
        };

        let etag = self
            .client
            .put(
                &item_href(collection, remote_id),
                content.to_string(),
                collection.kind.mime_type(),
                &precondition,
            )
            .await?;

        Ok(PutOutcome {
            remote_id: remote_id.to_string(),
            etag: etag.map(|a| a.to_string()),
        })
    }

    async fn delete_item(
        &self,
        collection: &RemoteCollection,
        remote_id: &str,
    ) -> Result<(), SyncError> {
        self.client
            .delete(&item_href(collection, remote_id), &Precondition::None)
            .await?;
        Ok(())
    }
}
