// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! In-memory remote directory with scripted failures and call counters.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use davsync_core::{
    CancelHandle, CollectionFilter, CollectionType, PutOutcome, RemoteCollection, RemoteDirectory,
    RemoteItem, RemoteItemRef, SyncError, WriteCondition,
};

/// Number of remote calls made, per operation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Calls {
    pub list_collections: usize,
    pub list_items: usize,
    pub fetch: usize,
    pub put: usize,
    pub delete: usize,
}

impl Calls {
    /// Calls touching the items of a collection.
    pub fn item_calls(&self) -> usize {
        self.list_items + self.fetch + self.put + self.delete
    }
}

#[derive(Debug, Clone)]
struct StoredItem {
    etag: String,
    content: String,
}

#[derive(Debug, Clone)]
struct Collection {
    meta: RemoteCollection,
    items: BTreeMap<String, StoredItem>,
}

#[derive(Debug, Default)]
struct State {
    collections: Vec<Collection>,
    counter: u64,
    next_ids: VecDeque<String>,
    calls: Calls,
    fail_writes: HashSet<String>,
    fail_create: bool,
    lose_create_responses: usize,
    forbidden: HashSet<String>,
    fail_list_items: HashSet<String>,
    fail_auth: bool,
    vanish_on_fetch: HashSet<String>,
    omit_etags: bool,
    cancel_on_list_items: Option<CancelHandle>,
}

impl State {
    fn collection(&self, url: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.meta.url == url)
    }

    fn collection_mut(&mut self, url: &str) -> Option<&mut Collection> {
        self.collections.iter_mut().find(|c| c.meta.url == url)
    }

    fn next_etag(&mut self) -> String {
        self.counter += 1;
        format!("e{}", self.counter)
    }

    /// Servers change the collection tag on every modification.
    fn touch(&mut self, url: &str) {
        self.counter += 1;
        let ctag = format!("c{}", self.counter);
        if let Some(collection) = self.collection_mut(url) {
            collection.meta.ctag = Some(ctag);
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeRemote {
    state: Mutex<State>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn add_collection(&self, url: &str, kind: CollectionType, ctag: &str) {
        let mut meta = RemoteCollection::new(url, kind);
        meta.ctag = Some(ctag.to_string());
        self.add_remote_collection(meta);
    }

    pub fn add_remote_collection(&self, meta: RemoteCollection) {
        self.lock().collections.push(Collection {
            meta,
            items: BTreeMap::new(),
        });
    }

    pub fn remove_collection(&self, url: &str) {
        self.lock().collections.retain(|c| c.meta.url != url);
    }

    pub fn update_collection(&self, url: &str, f: impl FnOnce(&mut RemoteCollection)) {
        let mut state = self.lock();
        let collection = state.collection_mut(url).unwrap();
        f(&mut collection.meta);
    }

    pub fn set_ctag(&self, url: &str, ctag: &str) {
        self.update_collection(url, |meta| meta.ctag = Some(ctag.to_string()));
    }

    pub fn ctag(&self, url: &str) -> Option<String> {
        self.lock().collection(url).unwrap().meta.ctag.clone()
    }

    /// Writes an item as another client would, returning its new tag.
    pub fn put(&self, url: &str, remote_id: &str, content: &str) -> String {
        let mut state = self.lock();
        let etag = state.next_etag();
        state.collection_mut(url).unwrap().items.insert(
            remote_id.to_string(),
            StoredItem {
                etag: etag.clone(),
                content: content.to_string(),
            },
        );
        state.touch(url);
        etag
    }

    /// Deletes an item as another client would.
    pub fn remove(&self, url: &str, remote_id: &str) {
        let mut state = self.lock();
        state.collection_mut(url).unwrap().items.remove(remote_id);
        state.touch(url);
    }

    /// Content and tag of an item.
    pub fn item(&self, url: &str, remote_id: &str) -> Option<(String, String)> {
        let state = self.lock();
        let item = state.collection(url)?.items.get(remote_id)?;
        Some((item.etag.clone(), item.content.clone()))
    }

    pub fn item_ids(&self, url: &str) -> Vec<String> {
        let state = self.lock();
        state.collection(url).unwrap().items.keys().cloned().collect()
    }

    pub fn calls(&self) -> Calls {
        self.lock().calls
    }

    pub fn reset_calls(&self) {
        self.lock().calls = Calls::default();
    }

    /// Names the next created item, instead of a generated name.
    pub fn next_id(&self, remote_id: &str) {
        self.lock().next_ids.push_back(remote_id.to_string());
    }

    /// Makes updates and deletions of an item fail with a transport error.
    pub fn fail_writes(&self, remote_id: &str, fail: bool) {
        let mut state = self.lock();
        match fail {
            true => state.fail_writes.insert(remote_id.to_string()),
            false => state.fail_writes.remove(remote_id),
        };
    }

    pub fn fail_create(&self, fail: bool) {
        self.lock().fail_create = fail;
    }

    /// Stores the next `count` created items but answers with a transport
    /// error, as if the connection dropped before the response arrived.
    pub fn lose_create_responses(&self, count: usize) {
        self.lock().lose_create_responses = count;
    }

    /// Refuses writes to a collection, as servers do for shared read-only calendars.
    pub fn forbid_writes(&self, url: &str) {
        self.lock().forbidden.insert(url.to_string());
    }

    pub fn fail_list_items(&self, url: &str) {
        self.lock().fail_list_items.insert(url.to_string());
    }

    pub fn fail_auth(&self) {
        self.lock().fail_auth = true;
    }

    /// Makes an item disappear between listing and download.
    pub fn vanish_on_fetch(&self, remote_id: &str) {
        self.lock().vanish_on_fetch.insert(remote_id.to_string());
    }

    /// Answers writes without an entity tag.
    pub fn omit_etags(&self) {
        self.lock().omit_etags = true;
    }

    /// Cancels the pass once the first collection lists its items.
    pub fn cancel_on_list_items(&self, handle: CancelHandle) {
        self.lock().cancel_on_list_items = Some(handle);
    }

    fn check_auth(state: &State) -> Result<(), SyncError> {
        match state.fail_auth {
            true => Err(SyncError::Authentication("401 Unauthorized".to_string())),
            false => Ok(()),
        }
    }
}

fn missing(url: &str) -> SyncError {
    SyncError::NotFound(url.to_string())
}

#[async_trait]
impl RemoteDirectory for FakeRemote {
    async fn list_collections(
        &self,
        filter: &CollectionFilter,
    ) -> Result<Vec<RemoteCollection>, SyncError> {
        let mut state = self.lock();
        state.calls.list_collections += 1;
        Self::check_auth(&state)?;
        Ok(state
            .collections
            .iter()
            .filter(|c| c.meta.kind == filter.kind)
            .map(|c| c.meta.clone())
            .collect())
    }

    async fn list_items(
        &self,
        collection: &RemoteCollection,
    ) -> Result<Vec<RemoteItemRef>, SyncError> {
        let mut state = self.lock();
        state.calls.list_items += 1;
        Self::check_auth(&state)?;
        if let Some(handle) = state.cancel_on_list_items.take() {
            handle.cancel();
        }
        if state.fail_list_items.contains(&collection.url) {
            return Err(SyncError::Network("connection reset".to_string()));
        }

        let stored = state
            .collection(&collection.url)
            .ok_or_else(|| missing(&collection.url))?;
        Ok(stored
            .items
            .iter()
            .map(|(id, item)| RemoteItemRef {
                remote_id: id.clone(),
                etag: item.etag.clone(),
            })
            .collect())
    }

    async fn fetch_item(
        &self,
        collection: &RemoteCollection,
        remote_id: &str,
    ) -> Result<RemoteItem, SyncError> {
        let mut state = self.lock();
        state.calls.fetch += 1;
        Self::check_auth(&state)?;
        if state.vanish_on_fetch.contains(remote_id) {
            return Err(missing(remote_id));
        }

        let item = state
            .collection(&collection.url)
            .and_then(|c| c.items.get(remote_id))
            .ok_or_else(|| missing(remote_id))?;
        Ok(RemoteItem {
            remote_id: remote_id.to_string(),
            etag: item.etag.clone(),
            content: item.content.clone(),
        })
    }

    fn new_item_name(&self, collection: &RemoteCollection) -> String {
        let mut state = self.lock();
        match state.next_ids.pop_front() {
            Some(id) => id,
            None => {
                state.counter += 1;
                format!("item-{}{}", state.counter, collection.kind.extension())
            }
        }
    }

    async fn put_item(
        &self,
        collection: &RemoteCollection,
        remote_id: &str,
        content: &str,
        condition: WriteCondition<'_>,
    ) -> Result<PutOutcome, SyncError> {
        let mut state = self.lock();
        state.calls.put += 1;
        Self::check_auth(&state)?;
        if state.forbidden.contains(&collection.url) {
            return Err(SyncError::Forbidden(remote_id.to_string()));
        }
        if state.fail_writes.contains(remote_id) {
            return Err(SyncError::Network("503 Service Unavailable".to_string()));
        }

        let stored = state
            .collection(&collection.url)
            .ok_or_else(|| missing(&collection.url))?;
        let current = stored.items.get(remote_id);
        match condition {
            WriteCondition::Create => {
                if state.fail_create {
                    return Err(SyncError::Network("503 Service Unavailable".to_string()));
                }
                if current.is_some() {
                    return Err(SyncError::Conflict(remote_id.to_string()));
                }
            }
            WriteCondition::Match(expected) => {
                let current = current.ok_or_else(|| missing(remote_id))?;
                if current.etag != expected {
                    return Err(SyncError::Conflict(remote_id.to_string()));
                }
            }
            WriteCondition::Always => {}
        }

        let etag = state.next_etag();
        let stored = state
            .collection_mut(&collection.url)
            .ok_or_else(|| missing(&collection.url))?;
        stored.items.insert(
            remote_id.to_string(),
            StoredItem {
                etag: etag.clone(),
                content: content.to_string(),
            },
        );
        state.touch(&collection.url);

        if matches!(condition, WriteCondition::Create) && state.lose_create_responses > 0 {
            state.lose_create_responses -= 1;
            return Err(SyncError::Network("connection reset".to_string()));
        }

        let etag = match state.omit_etags {
            true => None,
            false => Some(etag),
        };
        Ok(PutOutcome {
            remote_id: remote_id.to_string(),
            etag,
        })
    }

    async fn delete_item(
        &self,
        collection: &RemoteCollection,
        remote_id: &str,
    ) -> Result<(), SyncError> {
        let mut state = self.lock();
        state.calls.delete += 1;
        Self::check_auth(&state)?;
        if state.forbidden.contains(&collection.url) {
            return Err(SyncError::Forbidden(remote_id.to_string()));
        }
        if state.fail_writes.contains(remote_id) {
            return Err(SyncError::Network("503 Service Unavailable".to_string()));
        }

        let stored = state
            .collection_mut(&collection.url)
            .ok_or_else(|| missing(&collection.url))?;
        stored.items.remove(remote_id).ok_or_else(|| missing(remote_id))?;
        state.touch(&collection.url);
        Ok(())
    }
}
