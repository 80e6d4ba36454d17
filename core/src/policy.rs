// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use crate::config::SyncSettings;
use crate::types::{CollectionType, LocalCollection, RemoteCollection};

/// Decisions the reconciliation leaves to the embedding application.
pub trait SyncPolicy: Send + Sync {
    /// Whether the local color of `local` is overwritten with the color of `remote`.
    fn update_color(&self, local: &LocalCollection, remote: &RemoteCollection) -> bool;

    /// Whether a dirty item whose remote copy vanished is kept (and a conflict
    /// logged) instead of being purged.
    fn keep_orphaned_edits(&self) -> bool;

    /// Collection types whose pass is requested after a successful pass of `kind`.
    fn companions(&self, kind: CollectionType) -> Vec<CollectionType>;
}

/// Policy driven by the `[sync]` settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultPolicy {
    update_color: bool,
    keep_orphaned_edits: bool,
}

impl DefaultPolicy {
    pub fn new(settings: &SyncSettings) -> Self {
        Self {
            update_color: settings.update_color,
            keep_orphaned_edits: settings.keep_orphaned_edits,
        }
    }
}

impl Default for DefaultPolicy {
    fn default() -> Self {
        Self::new(&SyncSettings::default())
    }
}

impl SyncPolicy for DefaultPolicy {
    fn update_color(&self, _local: &LocalCollection, _remote: &RemoteCollection) -> bool {
        self.update_color
    }

    fn keep_orphaned_edits(&self) -> bool {
        self.keep_orphaned_edits
    }

    fn companions(&self, kind: CollectionType) -> Vec<CollectionType> {
        match kind {
            // task lists live in the same calendar home as events
            CollectionType::Events => vec![CollectionType::Tasks],
            CollectionType::Tasks | CollectionType::Contacts => Vec::new(),
        }
    }
}
