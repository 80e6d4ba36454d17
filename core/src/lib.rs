// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Two-way reconciliation of `CalDAV`/`CardDAV` collections with a local store.

mod config;
mod engine;
mod error;
mod localdb;
mod pass;
mod policy;
mod remote;
mod store;
mod types;

pub use crate::config::{APP_NAME, AccountConfig, Config, SyncSettings, get_config_dir};
pub use crate::engine::{
    CollectionChanges, CollectionOutcome, Engine, FailedItem, ReconciledCollection,
};
pub use crate::error::SyncError;
pub use crate::localdb::{LocalDb, PendingCounts};
pub use crate::pass::{CancelHandle, FailedCollection, PassResult, PassState, SyncPass};
pub use crate::policy::{DefaultPolicy, SyncPolicy};
pub use crate::remote::{CollectionFilter, DavRemote, RemoteDirectory, WriteCondition};
pub use crate::store::{LocalStore, TagStore};
pub use crate::types::{
    CollectionType, DEFAULT_COLOR, Item, LocalCollection, PutOutcome, RemoteCollection,
    RemoteItem, RemoteItemRef, last_segment, parse_color,
};

pub use davsync_dav::{AuthMethod, DavConfig};
