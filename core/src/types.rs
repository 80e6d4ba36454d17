// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::str::FromStr;

use davsync_dav::CollectionKind;

/// Color assigned to calendars and task lists that don't carry one, as ARGB.
pub const DEFAULT_COLOR: u32 = 0xFFC3_EA6E;

/// The type of collection a sync pass runs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionType {
    /// Calendars holding events.
    Events,
    /// Calendars holding tasks.
    Tasks,
    /// Address books holding contacts.
    Contacts,
}

impl CollectionType {
    /// All collection types, in the order passes are usually run.
    pub const ALL: [Self; 3] = [Self::Events, Self::Tasks, Self::Contacts];

    /// Stable name, used in the local store and on the command line.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Events => "events",
            Self::Tasks => "tasks",
            Self::Contacts => "contacts",
        }
    }

    /// Calendar component the items of this type are made of.
    pub const fn component(self) -> Option<&'static str> {
        match self {
            Self::Events => Some("VEVENT"),
            Self::Tasks => Some("VTODO"),
            Self::Contacts => None,
        }
    }

    /// The kind of remote collection holding items of this type.
    pub const fn dav_kind(self) -> CollectionKind {
        match self {
            Self::Events | Self::Tasks => CollectionKind::Calendar,
            Self::Contacts => CollectionKind::AddressBook,
        }
    }

    pub const fn mime_type(self) -> &'static str {
        self.dav_kind().content_type()
    }

    /// File extension of item resources, including the dot.
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Events | Self::Tasks => ".ics",
            Self::Contacts => ".vcf",
        }
    }

    /// Whether collections of this type carry a color.
    pub const fn has_color(self) -> bool {
        !matches!(self, Self::Contacts)
    }
}

impl fmt::Display for CollectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "events" => Ok(Self::Events),
            "tasks" => Ok(Self::Tasks),
            "contacts" => Ok(Self::Contacts),
            _ => Err(format!("Invalid collection type: {s}")),
        }
    }
}

/// A collection as listed by the remote side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCollection {
    /// Collection URL (path), the only identifier shared by both replicas.
    pub url: String,
    pub display_name: Option<String>,
    /// Color as ARGB.
    pub color: Option<u32>,
    pub kind: CollectionType,
    /// Current collection tag, compared for equality only.
    pub ctag: Option<String>,
    /// Local changes are not pushed, they are reverted to the remote state.
    pub read_only: bool,
}

impl RemoteCollection {
    /// Creates a remote collection with no metadata beyond its URL.
    pub fn new(url: impl Into<String>, kind: CollectionType) -> Self {
        Self {
            url: url.into(),
            display_name: None,
            color: None,
            kind,
            ctag: None,
            read_only: false,
        }
    }

    /// The display name, falling back to the last segment of the URL.
    pub fn title(&self) -> String {
        match self.display_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => last_segment(&self.url).to_string(),
        }
    }

    /// The color to store locally: the remote color, or the default one for
    /// types that carry a color.
    pub fn effective_color(&self) -> Option<u32> {
        match self.kind.has_color() {
            true => Some(self.color.unwrap_or(DEFAULT_COLOR)),
            false => None,
        }
    }
}

/// A collection materialized in the local store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalCollection {
    /// Store-assigned identifier.
    pub id: i64,
    pub account: String,
    pub kind: CollectionType,
    pub url: String,
    pub display_name: String,
    pub color: Option<u32>,
    /// Collection tag as of the last completed item cycle.
    pub ctag: Option<String>,
}

/// An item stored locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Store-assigned identifier, never reused.
    pub local_id: i64,
    pub collection_id: i64,
    /// Remote file name, absent until the item was first pushed.
    pub remote_id: Option<String>,
    /// File name chosen for the first push, kept across failed attempts.
    pub pending_name: Option<String>,
    pub etag: Option<String>,
    pub content: String,
    pub dirty: bool,
    /// Tombstone, kept until the remote deletion is confirmed.
    pub deleted: bool,
    /// Revision counter, advanced once per push attempt.
    pub sequence: Option<i64>,
}

/// A member of a remote collection without its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteItemRef {
    pub remote_id: String,
    pub etag: String,
}

/// A member of a remote collection with its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteItem {
    pub remote_id: String,
    pub etag: String,
    pub content: String,
}

/// Result of a successful write to the remote side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOutcome {
    pub remote_id: String,
    /// New entity tag; servers may omit it when they rewrote the content.
    pub etag: Option<String>,
}

/// Parses a `#RRGGBB` or `#RRGGBBAA` color into ARGB.
pub fn parse_color(color: &str) -> Option<u32> {
    let hex = color.trim().strip_prefix('#')?;
    if !hex.is_ascii() {
        return None;
    }

    match hex.len() {
        6 => u32::from_str_radix(hex, 16).ok().map(|rgb| 0xFF00_0000 | rgb),
        8 => {
            let rgba = u32::from_str_radix(hex, 16).ok()?;
            Some(rgba.rotate_right(8))
        }
        _ => None,
    }
}

/// The last non-empty path segment of a URL.
pub fn last_segment(url: &str) -> &str {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(url)
}
