// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use davsync_dav::DavError;

/// Errors raised while reconciling collections.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Transport failure or unexpected server answer, retried on the next pass.
    #[error("Network error: {0}")]
    Network(String),

    /// Entity tag mismatch on a conditional write.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The addressed collection, item or row does not exist (anymore).
    #[error("Not found: {0}")]
    NotFound(String),

    /// The server refused access to a collection or item, typically because it
    /// is shared read-only. Only the affected item fails.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The local store can't be used, fatal to the whole pass.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Credentials were rejected, fatal to the whole pass.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Whether the error ends the pass instead of a single item or collection.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_) | Self::Authentication(_))
    }
}

impl From<DavError> for SyncError {
    fn from(e: DavError) -> Self {
        match e {
            DavError::PreconditionFailed(href) => Self::Conflict(href.to_string()),
            DavError::NotFound(href) => Self::NotFound(href.to_string()),
            DavError::Forbidden(href) => Self::Forbidden(href.to_string()),
            DavError::Auth(msg) => Self::Authentication(msg),
            DavError::Config(msg) => Self::Config(msg),
            other => Self::Network(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(e: sqlx::Error) -> Self {
        Self::StorageUnavailable(e.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for SyncError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        Self::StorageUnavailable(format!("Failed to run migrations: {e}"))
    }
}
