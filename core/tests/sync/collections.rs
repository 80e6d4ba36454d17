// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Tests for the reconciliation of local collections with remote ones.

use davsync_core::{
    CollectionFilter, CollectionType, DefaultPolicy, Engine, LocalStore, RemoteCollection,
    SyncSettings,
};

use crate::common::{ACCOUNT, FakeRemote, setup, setup_with};

const HOME: &str = "/calendars/alice/";

fn url(name: &str) -> String {
    format!("{HOME}{name}/")
}

fn named(name: &str, display_name: &str, kind: CollectionType) -> RemoteCollection {
    let mut collection = RemoteCollection::new(url(name), kind);
    collection.display_name = Some(display_name.to_string());
    collection.ctag = Some("c0".to_string());
    collection
}

#[tokio::test]
async fn test_missing_refreshed_and_new_collections() {
    // Arrange
    let remote = FakeRemote::new();
    let harness = setup(remote).await;
    let store = &*harness.store;
    store
        .create_collection(ACCOUNT, &named("x", "X", CollectionType::Events))
        .await
        .unwrap();
    store
        .create_collection(ACCOUNT, &named("y", "Y", CollectionType::Events))
        .await
        .unwrap();
    harness
        .remote
        .add_remote_collection(named("y", "Y renamed", CollectionType::Events));
    harness
        .remote
        .add_remote_collection(named("z", "Z", CollectionType::Events));

    // Act
    let policy = DefaultPolicy::default();
    let engine = Engine::new(&*harness.remote, store, &policy);
    let (changes, reconciled) = engine
        .reconcile_collections(ACCOUNT, &CollectionFilter::new(CollectionType::Events))
        .await
        .unwrap();

    // Assert
    assert_eq!(changes.created, 1);
    assert_eq!(changes.updated, 1);
    assert_eq!(changes.deleted, 1);

    let urls: Vec<_> = reconciled.iter().map(|c| c.local.url.clone()).collect();
    assert_eq!(urls, vec![url("y"), url("z")]);

    let locals = store
        .list_collections(ACCOUNT, CollectionType::Events)
        .await
        .unwrap();
    assert_eq!(locals.len(), 2);
    let y = locals.iter().find(|c| c.url == url("y")).unwrap();
    assert_eq!(y.display_name, "Y renamed");
    let z = locals.iter().find(|c| c.url == url("z")).unwrap();
    assert_eq!(z.display_name, "Z");
    assert_eq!(z.ctag, None, "new collections start without a tag");
}

#[tokio::test]
async fn test_reconciling_twice_changes_nothing() {
    // Arrange
    let remote = FakeRemote::new();
    remote.add_remote_collection(named("home", "Home", CollectionType::Events));
    remote.add_remote_collection(named("work", "Work", CollectionType::Events));
    let harness = setup(remote).await;

    // Act
    let first = harness
        .pass
        .run_pass(ACCOUNT, CollectionType::Events)
        .await
        .unwrap();
    let second = harness
        .pass
        .run_pass(ACCOUNT, CollectionType::Events)
        .await
        .unwrap();

    // Assert
    assert_eq!((first.created, first.updated, first.deleted), (2, 0, 0));
    assert_eq!((second.created, second.updated, second.deleted), (0, 0, 0));
    assert_eq!(harness.store.all_collections().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_title_falls_back_to_last_url_segment() {
    // Arrange
    let remote = FakeRemote::new();
    remote.add_collection(&url("personal"), CollectionType::Events, "c0");
    let harness = setup(remote).await;

    // Act
    harness
        .pass
        .run_pass(ACCOUNT, CollectionType::Events)
        .await
        .unwrap();

    // Assert
    let local = harness
        .collection(CollectionType::Events, &url("personal"))
        .await;
    assert_eq!(local.display_name, "personal");
}

#[tokio::test]
async fn test_collection_removed_remotely_is_deleted_with_items() {
    // Arrange
    let remote = FakeRemote::new();
    remote.add_collection(&url("old"), CollectionType::Events, "c0");
    remote.put(&url("old"), "a.ics", "A");
    let harness = setup(remote).await;
    harness
        .pass
        .run_pass(ACCOUNT, CollectionType::Events)
        .await
        .unwrap();
    let local = harness.collection(CollectionType::Events, &url("old")).await;
    assert!(harness.item(local.id, "a.ics").await.is_some());

    // Act
    harness.remote.remove_collection(&url("old"));
    let result = harness
        .pass
        .run_pass(ACCOUNT, CollectionType::Events)
        .await
        .unwrap();

    // Assert
    assert_eq!(result.deleted, 1);
    assert!(harness.store.all_collections().await.unwrap().is_empty());
    assert!(harness.store.list_all(local.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_excluded_collection_is_treated_as_absent() {
    // Arrange
    let remote = FakeRemote::new();
    remote.add_collection(&url("home"), CollectionType::Events, "c0");
    remote.add_collection(&url("holidays"), CollectionType::Events, "c0");
    let harness = setup(remote).await;
    harness
        .pass
        .run_pass(ACCOUNT, CollectionType::Events)
        .await
        .unwrap();
    assert_eq!(harness.store.all_collections().await.unwrap().len(), 2);

    // Act
    // exclusion ignores the trailing slash
    let filter = CollectionFilter::new(CollectionType::Events)
        .exclude([url("holidays").trim_end_matches('/').to_string()]);
    let result = harness.pass.run_filtered(ACCOUNT, filter).await.unwrap();

    // Assert
    assert_eq!(result.deleted, 1);
    let locals = harness.store.all_collections().await.unwrap();
    assert_eq!(locals.len(), 1);
    assert_eq!(locals[0].url, url("home"));
}

#[tokio::test]
async fn test_types_are_reconciled_separately() {
    // Arrange
    let remote = FakeRemote::new();
    remote.add_collection(&url("events"), CollectionType::Events, "c0");
    remote.add_collection(&url("tasks"), CollectionType::Tasks, "c0");
    let harness = setup(remote).await;
    harness
        .pass
        .run_pass(ACCOUNT, CollectionType::Tasks)
        .await
        .unwrap();

    // Act
    let result = harness
        .pass
        .run_pass(ACCOUNT, CollectionType::Events)
        .await
        .unwrap();

    // Assert
    assert_eq!(result.created, 1);
    assert_eq!(result.deleted, 0, "task lists are not touched by an events pass");
    assert_eq!(harness.store.all_collections().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_color_follows_policy() {
    for update_color in [true, false] {
        // Arrange
        let remote = FakeRemote::new();
        let mut collection = named("home", "Home", CollectionType::Events);
        collection.color = Some(0xFF00_00FF);
        remote.add_remote_collection(collection);
        let settings = SyncSettings {
            update_color,
            ..Default::default()
        };
        let harness = setup_with(remote, settings).await;
        harness
            .pass
            .run_pass(ACCOUNT, CollectionType::Events)
            .await
            .unwrap();

        // Act
        harness
            .remote
            .update_collection(&url("home"), |c| c.color = Some(0xFFFF_0000));
        let result = harness
            .pass
            .run_pass(ACCOUNT, CollectionType::Events)
            .await
            .unwrap();

        // Assert
        let local = harness.collection(CollectionType::Events, &url("home")).await;
        match update_color {
            true => {
                assert_eq!(result.updated, 1);
                assert_eq!(local.color, Some(0xFFFF_0000));
            }
            false => {
                assert_eq!(result.updated, 0);
                assert_eq!(local.color, Some(0xFF00_00FF), "color set on creation is kept");
            }
        }
    }
}
