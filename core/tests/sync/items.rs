// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Tests for the item cycle: pushing local changes and pulling remote ones.

use davsync_core::{
    CollectionFilter, CollectionType, LocalCollection, LocalStore, RemoteCollection, SyncSettings,
    TagStore,
};

use crate::common::{ACCOUNT, FakeRemote, Harness, setup, setup_with, test_event};

const CAL: &str = "/calendars/alice/home/";

/// Runs an events pass, failing the test on a fatal error.
async fn sync(harness: &Harness) -> davsync_core::PassResult {
    harness
        .pass
        .run_pass(ACCOUNT, CollectionType::Events)
        .await
        .unwrap()
}

/// Sets up a harness with one calendar and materializes it locally.
async fn calendar(remote: FakeRemote) -> (Harness, LocalCollection) {
    calendar_with(remote, SyncSettings::default()).await
}

async fn calendar_with(remote: FakeRemote, settings: SyncSettings) -> (Harness, LocalCollection) {
    remote.add_collection(CAL, CollectionType::Events, "c0");
    let harness = setup_with(remote, settings).await;
    sync(&harness).await;
    let local = harness.collection(CollectionType::Events, CAL).await;
    (harness, local)
}

#[tokio::test]
async fn test_unchanged_collection_tag_skips_item_cycle() {
    // Arrange
    let remote = FakeRemote::new();
    remote.add_collection(CAL, CollectionType::Events, "abc");
    let harness = setup(remote).await;
    sync(&harness).await;
    let local = harness.collection(CollectionType::Events, CAL).await;
    assert_eq!(
        harness.store.collection_tag(local.id).await.unwrap().as_deref(),
        Some("abc")
    );

    // Act
    harness.remote.reset_calls();
    let result = sync(&harness).await;

    // Assert
    assert_eq!(harness.remote.calls().item_calls(), 0);
    assert_eq!((result.pushed, result.pulled, result.purged), (0, 0, 0));
    assert!(result.is_success());
}

#[tokio::test]
async fn test_new_local_item_is_created_remotely() {
    // Arrange
    let remote = FakeRemote::new();
    remote.next_id("42");
    let (harness, local) = calendar(remote).await;
    let content = test_event("1", "Lunch");
    let created = harness.store.create_item(local.id, &content).await.unwrap();

    // Act
    let result = sync(&harness).await;

    // Assert
    assert_eq!(result.pushed, 1);
    assert_eq!(result.pulled, 0, "the item just written is not downloaded again");

    let item = harness.item(local.id, "42").await.unwrap();
    assert_eq!(item.local_id, created.local_id);
    assert_eq!(item.etag.as_deref(), Some("e1"));
    assert!(!item.dirty);
    assert_eq!(
        harness.remote.item(CAL, "42"),
        Some(("e1".to_string(), content))
    );
}

#[tokio::test]
async fn test_remote_items_are_downloaded() {
    // Arrange
    let remote = FakeRemote::new();
    let (harness, local) = calendar(remote).await;
    harness.remote.put(CAL, "a.ics", &test_event("a", "A"));
    harness.remote.put(CAL, "b.ics", &test_event("b", "B"));

    // Act
    let result = sync(&harness).await;

    // Assert
    assert_eq!(result.pulled, 2);
    let a = harness.item(local.id, "a.ics").await.unwrap();
    assert_eq!(a.content, test_event("a", "A"));
    assert_eq!(a.etag.as_deref(), Some("e1"));
    assert!(!a.dirty);
    assert_eq!(harness.store.list_all(local.id).await.unwrap().len(), 2);
    assert_eq!(
        harness.store.collection_tag(local.id).await.unwrap(),
        harness.remote.ctag(CAL)
    );
}

#[tokio::test]
async fn test_unchanged_items_are_not_downloaded_again() {
    // Arrange
    let remote = FakeRemote::new();
    let (harness, local) = calendar(remote).await;
    harness.remote.put(CAL, "a.ics", &test_event("a", "A"));
    harness.remote.put(CAL, "b.ics", &test_event("b", "B"));
    sync(&harness).await;

    // Act
    harness.remote.put(CAL, "b.ics", &test_event("b", "B changed"));
    harness.remote.reset_calls();
    let result = sync(&harness).await;

    // Assert
    assert_eq!(result.pulled, 1);
    assert_eq!(harness.remote.calls().fetch, 1);
    let b = harness.item(local.id, "b.ics").await.unwrap();
    assert_eq!(b.content, test_event("b", "B changed"));
}

#[tokio::test]
async fn test_concurrent_edit_loses_against_remote_change() {
    // Arrange
    let remote = FakeRemote::new();
    let (harness, local) = calendar(remote).await;
    harness.remote.put(CAL, "a.ics", &test_event("a", "v1"));
    sync(&harness).await;
    let item = harness.item(local.id, "a.ics").await.unwrap();

    let etag = harness.remote.put(CAL, "a.ics", &test_event("a", "v2"));
    harness
        .store
        .edit_item(item.local_id, &test_event("a", "local"))
        .await
        .unwrap();

    // Act
    let result = sync(&harness).await;

    // Assert
    assert_eq!(result.conflicts, 1);
    assert_eq!(result.pulled, 1);
    assert!(result.is_success(), "a lost conflict is not a failure");

    let item = harness.item(local.id, "a.ics").await.unwrap();
    assert_eq!(item.content, test_event("a", "v2"));
    assert_eq!(item.etag.as_deref(), Some(etag.as_str()));
    assert!(!item.dirty);
    assert_eq!(
        harness.remote.item(CAL, "a.ics"),
        Some((etag, test_event("a", "v2")))
    );
}

#[tokio::test]
async fn test_local_edit_is_pushed_with_its_tag() {
    // Arrange
    let remote = FakeRemote::new();
    let (harness, local) = calendar(remote).await;
    harness.remote.put(CAL, "a.ics", &test_event("a", "v1"));
    sync(&harness).await;
    let item = harness.item(local.id, "a.ics").await.unwrap();

    // Act
    harness
        .store
        .edit_item(item.local_id, &test_event("a", "edited"))
        .await
        .unwrap();
    let result = sync(&harness).await;

    // Assert
    assert_eq!(result.pushed, 1);
    assert_eq!(result.conflicts, 0);
    let (etag, content) = harness.remote.item(CAL, "a.ics").unwrap();
    assert_eq!(content, test_event("a", "edited"));

    let item = harness.item(local.id, "a.ics").await.unwrap();
    assert_eq!(item.etag, Some(etag));
    assert!(!item.dirty);
}

#[tokio::test]
async fn test_remote_deletion_purges_local_copy() {
    // Arrange
    let remote = FakeRemote::new();
    let (harness, local) = calendar(remote).await;
    harness.remote.put(CAL, "a.ics", &test_event("a", "A"));
    sync(&harness).await;

    // Act
    harness.remote.remove(CAL, "a.ics");
    let result = sync(&harness).await;

    // Assert
    assert_eq!(result.purged, 1);
    assert!(harness.item(local.id, "a.ics").await.is_none());
}

#[tokio::test]
async fn test_local_deletion_is_pushed() {
    // Arrange
    let remote = FakeRemote::new();
    let (harness, local) = calendar(remote).await;
    harness.remote.put(CAL, "a.ics", &test_event("a", "A"));
    sync(&harness).await;
    let item = harness.item(local.id, "a.ics").await.unwrap();

    // Act
    harness.store.delete_item(item.local_id).await.unwrap();
    let result = sync(&harness).await;

    // Assert
    assert_eq!(result.pushed, 1);
    assert!(harness.remote.item(CAL, "a.ics").is_none());
    assert!(harness.store.item(item.local_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_deleting_item_already_gone_remotely_succeeds() {
    // Arrange
    let remote = FakeRemote::new();
    let (harness, local) = calendar(remote).await;
    harness.remote.put(CAL, "a.ics", &test_event("a", "A"));
    sync(&harness).await;
    let item = harness.item(local.id, "a.ics").await.unwrap();

    // Act
    harness.store.delete_item(item.local_id).await.unwrap();
    harness.remote.remove(CAL, "a.ics");
    let result = sync(&harness).await;

    // Assert
    assert!(result.is_success());
    assert_eq!(result.pushed, 0);
    assert!(harness.store.item(item.local_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_failed_deletion_is_not_undone_by_pull() {
    // Arrange
    let remote = FakeRemote::new();
    let (harness, local) = calendar(remote).await;
    harness.remote.put(CAL, "a.ics", &test_event("a", "A"));
    sync(&harness).await;
    let item = harness.item(local.id, "a.ics").await.unwrap();
    harness.store.delete_item(item.local_id).await.unwrap();
    harness.remote.fail_writes("a.ics", true);

    // Act
    let result = sync(&harness).await;

    // Assert
    assert_eq!(result.failed_items.len(), 1);
    assert_eq!(result.failed_items[0].identifier, "a.ics");
    assert!(harness.store.list_all(local.id).await.unwrap().is_empty());
    assert_eq!(harness.store.list_deleted(local.id).await.unwrap().len(), 1);

    // Act
    harness.remote.fail_writes("a.ics", false);
    let result = sync(&harness).await;

    // Assert
    assert!(result.is_success());
    assert!(harness.remote.item_ids(CAL).is_empty());
    assert!(harness.store.list_deleted(local.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_push_keeps_local_edit_and_collection_tag() {
    // Arrange
    let remote = FakeRemote::new();
    let (harness, local) = calendar(remote).await;
    harness.remote.put(CAL, "a.ics", &test_event("a", "v1"));
    sync(&harness).await;
    let item = harness.item(local.id, "a.ics").await.unwrap();
    harness.remote.put(CAL, "a.ics", &test_event("a", "v2"));
    harness
        .store
        .edit_item(item.local_id, &test_event("a", "local"))
        .await
        .unwrap();
    harness.remote.fail_writes("a.ics", true);

    // Act
    let result = sync(&harness).await;

    // Assert
    assert!(!result.is_success());
    assert_eq!(result.failed_items.len(), 1);
    assert_eq!(result.failed_items[0].collection_url, CAL);

    let item = harness.item(local.id, "a.ics").await.unwrap();
    assert!(item.dirty);
    assert_eq!(item.content, test_event("a", "local"));
    assert_ne!(
        harness.store.collection_tag(local.id).await.unwrap(),
        harness.remote.ctag(CAL),
        "the collection tag is only advanced once converged"
    );
}

#[tokio::test]
async fn test_failed_create_is_retried_with_advancing_sequence() {
    // Arrange
    let remote = FakeRemote::new();
    remote.fail_create(true);
    let (harness, local) = calendar(remote).await;
    let created = harness
        .store
        .create_item(local.id, &test_event("1", "Lunch"))
        .await
        .unwrap();
    assert_eq!(created.sequence, None);

    // Act
    let first = sync(&harness).await;
    let after_first = harness.store.item(created.local_id).await.unwrap().unwrap();
    let second = sync(&harness).await;
    let after_second = harness.store.item(created.local_id).await.unwrap().unwrap();
    harness.remote.fail_create(false);
    let third = sync(&harness).await;
    let after_third = harness.store.item(created.local_id).await.unwrap().unwrap();

    // Assert
    assert_eq!(
        first.failed_items[0].identifier,
        format!("local-{}", created.local_id)
    );
    assert_eq!(after_first.sequence, Some(0));
    assert!(after_first.remote_id.is_none());

    assert_eq!(second.failed_items.len(), 1);
    assert_eq!(after_second.sequence, Some(1));

    assert!(third.is_success());
    assert_eq!(after_third.sequence, Some(2));
    assert!(after_third.remote_id.is_some());
    assert!(!after_third.dirty);
}

#[tokio::test]
async fn test_orphaned_edit_is_kept_and_recreated() {
    // Arrange
    let remote = FakeRemote::new();
    let (harness, local) = calendar(remote).await;
    harness.remote.put(CAL, "a.ics", &test_event("a", "v1"));
    sync(&harness).await;
    let item = harness.item(local.id, "a.ics").await.unwrap();
    harness
        .store
        .edit_item(item.local_id, &test_event("a", "local"))
        .await
        .unwrap();
    harness.remote.remove(CAL, "a.ics");

    // Act
    let result = sync(&harness).await;

    // Assert
    assert_eq!(result.conflicts, 1);
    assert_eq!(result.purged, 0);
    let kept = harness.item(local.id, "a.ics").await.unwrap();
    assert!(kept.dirty);
    assert_eq!(kept.etag, None);
    assert_ne!(
        harness.store.collection_tag(local.id).await.unwrap(),
        harness.remote.ctag(CAL)
    );

    // Act
    let result = sync(&harness).await;

    // Assert
    assert_eq!(result.pushed, 1);
    assert_eq!(result.conflicts, 0);
    let (_, content) = harness.remote.item(CAL, "a.ics").unwrap();
    assert_eq!(content, test_event("a", "local"));
    let item = harness.item(local.id, "a.ics").await.unwrap();
    assert!(!item.dirty);
    assert_eq!(
        harness.store.collection_tag(local.id).await.unwrap(),
        harness.remote.ctag(CAL)
    );
}

#[tokio::test]
async fn test_orphaned_edit_is_purged_when_not_kept() {
    // Arrange
    let settings = SyncSettings {
        keep_orphaned_edits: false,
        ..Default::default()
    };
    let (harness, local) = calendar_with(FakeRemote::new(), settings).await;
    harness.remote.put(CAL, "a.ics", &test_event("a", "v1"));
    sync(&harness).await;
    let item = harness.item(local.id, "a.ics").await.unwrap();
    harness
        .store
        .edit_item(item.local_id, &test_event("a", "local"))
        .await
        .unwrap();
    harness.remote.remove(CAL, "a.ics");

    // Act
    let result = sync(&harness).await;

    // Assert
    assert_eq!(result.purged, 1);
    assert!(harness.item(local.id, "a.ics").await.is_none());
    assert!(result.is_success());
}

#[tokio::test]
async fn test_item_vanishing_before_download_is_skipped() {
    // Arrange
    let remote = FakeRemote::new();
    let (harness, local) = calendar(remote).await;
    harness.remote.put(CAL, "a.ics", &test_event("a", "A"));
    harness.remote.put(CAL, "b.ics", &test_event("b", "B"));
    harness.remote.vanish_on_fetch("b.ics");

    // Act
    let result = sync(&harness).await;

    // Assert
    assert!(result.is_success());
    assert_eq!(result.pulled, 1);
    assert!(harness.item(local.id, "a.ics").await.is_some());
    assert!(harness.item(local.id, "b.ics").await.is_none());
}

#[tokio::test]
async fn test_write_without_returned_tag_is_downloaded() {
    // Arrange
    let remote = FakeRemote::new();
    remote.omit_etags();
    remote.next_id("new.ics");
    let (harness, local) = calendar(remote).await;
    harness
        .store
        .create_item(local.id, &test_event("n", "New"))
        .await
        .unwrap();

    // Act
    let result = sync(&harness).await;

    // Assert
    assert_eq!(result.pushed, 1);
    assert_eq!(result.pulled, 1);
    let (etag, _) = harness.remote.item(CAL, "new.ics").unwrap();
    let item = harness.item(local.id, "new.ics").await.unwrap();
    assert_eq!(item.etag, Some(etag));
}

#[tokio::test]
async fn test_local_and_remote_changes_converge() {
    // Arrange
    let remote = FakeRemote::new();
    let (harness, local) = calendar(remote).await;
    harness.remote.put(CAL, "keep.ics", &test_event("k", "Keep"));
    harness.remote.put(CAL, "gone.ics", &test_event("g", "Gone"));
    harness.remote.put(CAL, "edit.ics", &test_event("e", "Edit"));
    sync(&harness).await;

    let gone = harness.item(local.id, "gone.ics").await.unwrap();
    let edit = harness.item(local.id, "edit.ics").await.unwrap();
    harness.store.delete_item(gone.local_id).await.unwrap();
    harness
        .store
        .edit_item(edit.local_id, &test_event("e", "Edited"))
        .await
        .unwrap();
    harness
        .store
        .create_item(local.id, &test_event("n", "New"))
        .await
        .unwrap();
    harness.remote.put(CAL, "remote.ics", &test_event("r", "Remote"));

    // Act
    let first = sync(&harness).await;
    harness.remote.reset_calls();
    let second = sync(&harness).await;

    // Assert
    assert!(first.is_success());
    assert_eq!(first.pushed, 3);
    assert_eq!(first.pulled, 1);
    assert_eq!(harness.remote.calls().item_calls(), 0);
    assert_eq!((second.pushed, second.pulled), (0, 0));

    let mut remote_items: Vec<_> = harness
        .remote
        .item_ids(CAL)
        .into_iter()
        .map(|id| {
            let (etag, content) = harness.remote.item(CAL, &id).unwrap();
            (id, etag, content)
        })
        .collect();
    let mut local_items: Vec<_> = harness
        .store
        .list_all(local.id)
        .await
        .unwrap()
        .into_iter()
        .map(|item| (item.remote_id.unwrap(), item.etag.unwrap(), item.content))
        .collect();
    remote_items.sort();
    local_items.sort();
    assert_eq!(remote_items, local_items);
    assert_eq!(local_items.len(), 4);
}

#[tokio::test]
async fn test_lost_create_response_does_not_duplicate_item() {
    // Arrange
    let remote = FakeRemote::new();
    let (harness, local) = calendar(remote).await;
    let content = test_event("1", "Lunch");
    let created = harness.store.create_item(local.id, &content).await.unwrap();
    harness.remote.lose_create_responses(1);

    // Act
    let first = sync(&harness).await;
    let pending = harness.store.item(created.local_id).await.unwrap().unwrap();
    let second = sync(&harness).await;

    // Assert
    assert_eq!(first.failed_items.len(), 1);
    assert_eq!(first.pulled, 0, "the unanswered upload is not downloaded as a new item");
    assert!(pending.remote_id.is_none());
    let name = pending.pending_name.expect("name reserved before the upload");
    assert_eq!(harness.remote.item_ids(CAL), [name.clone()]);

    assert!(second.is_success());
    assert_eq!(harness.remote.item_ids(CAL), [name.clone()]);
    assert_eq!(harness.store.list_all(local.id).await.unwrap().len(), 1);
    let item = harness.item(local.id, &name).await.unwrap();
    assert_eq!(item.local_id, created.local_id);
    assert!(item.pending_name.is_none());
    assert!(!item.dirty);
    assert_eq!(harness.remote.item(CAL, &name).unwrap().1, content);
}

#[tokio::test]
async fn test_read_only_collection_reverts_local_changes() {
    // Arrange
    let remote = FakeRemote::new();
    let mut shared = RemoteCollection::new(CAL, CollectionType::Events);
    shared.ctag = Some("c0".to_string());
    shared.read_only = true;
    remote.add_remote_collection(shared);
    let harness = setup(remote).await;
    harness.remote.put(CAL, "a.ics", &test_event("a", "A"));
    harness.remote.put(CAL, "b.ics", &test_event("b", "B"));
    sync(&harness).await;
    let local = harness.collection(CollectionType::Events, CAL).await;

    let a = harness.item(local.id, "a.ics").await.unwrap();
    let b = harness.item(local.id, "b.ics").await.unwrap();
    harness
        .store
        .edit_item(a.local_id, &test_event("a", "local"))
        .await
        .unwrap();
    harness.store.delete_item(b.local_id).await.unwrap();
    harness
        .store
        .create_item(local.id, &test_event("c", "C"))
        .await
        .unwrap();

    // Act
    harness.remote.reset_calls();
    let result = sync(&harness).await;

    // Assert
    assert!(result.is_success());
    assert_eq!(result.reverted, 3);
    assert_eq!(result.pushed, 0);
    assert_eq!((harness.remote.calls().put, harness.remote.calls().delete), (0, 0));

    let a = harness.item(local.id, "a.ics").await.unwrap();
    assert_eq!(a.content, test_event("a", "A"));
    assert!(!a.dirty);
    let b = harness.item(local.id, "b.ics").await.unwrap();
    assert!(!b.deleted);
    assert_eq!(harness.store.list_all(local.id).await.unwrap().len(), 2);
    assert_eq!(harness.remote.item_ids(CAL), ["a.ics", "b.ics"]);
}

#[tokio::test]
async fn test_collection_forced_read_only_is_not_pushed() {
    // Arrange
    let remote = FakeRemote::new();
    let (harness, local) = calendar(remote).await;
    harness.remote.put(CAL, "a.ics", &test_event("a", "A"));
    sync(&harness).await;
    let a = harness.item(local.id, "a.ics").await.unwrap();
    harness
        .store
        .edit_item(a.local_id, &test_event("a", "local"))
        .await
        .unwrap();
    let filter =
        CollectionFilter::new(CollectionType::Events).force_read_only([CAL.to_string()]);

    // Act
    harness.remote.reset_calls();
    let result = harness.pass.run_filtered(ACCOUNT, filter).await.unwrap();

    // Assert
    assert_eq!(result.reverted, 1);
    assert_eq!(harness.remote.calls().put, 0);
    let a = harness.item(local.id, "a.ics").await.unwrap();
    assert_eq!(a.content, test_event("a", "A"));
}
