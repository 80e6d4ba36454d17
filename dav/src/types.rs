// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::ops::Deref;

/// Resource href (path).
///
/// A `Href` represents the path to a resource on a `WebDAV` server,
/// such as `/calendars/user/personal/event1.ics`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Href(String);

impl Href {
    /// Creates a new `Href` from a string.
    #[must_use]
    pub const fn new(href: String) -> Self {
        Self(href)
    }

    /// Returns the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the href with exactly one trailing slash, as used for collections.
    #[must_use]
    pub fn with_trailing_slash(&self) -> Self {
        if self.0.ends_with('/') {
            self.clone()
        } else {
            Self(format!("{}/", self.0))
        }
    }

    /// Returns the last non-empty path segment, e.g. `event1.ics` for
    /// `/calendars/user/personal/event1.ics` or `personal` for `/calendars/user/personal/`.
    #[must_use]
    pub fn last_segment(&self) -> &str {
        self.0
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }

    /// Joins a member name onto this collection href.
    #[must_use]
    pub fn join(&self, name: &str) -> Self {
        let base = self.with_trailing_slash();
        Self(format!("{}{}", base.0, name.trim_start_matches('/')))
    }
}

impl Deref for Href {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for Href {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Href {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Href {
    fn from(href: String) -> Self {
        Self(href)
    }
}

impl From<&str> for Href {
    fn from(href: &str) -> Self {
        Self(href.to_string())
    }
}

/// Entity tag for change detection.
///
/// An `ETag` represents an entity tag returned by the server for one resource,
/// used for optimistic concurrency control and change detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ETag(String);

impl ETag {
    /// Creates a new `ETag` from a string.
    #[must_use]
    pub const fn new(etag: String) -> Self {
        Self(etag)
    }

    /// Returns the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for ETag {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for ETag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ETag {
    fn from(etag: String) -> Self {
        Self(etag)
    }
}

impl From<&str> for ETag {
    fn from(etag: &str) -> Self {
        Self(etag.to_string())
    }
}

/// Collection tag.
///
/// Opaque token summarizing the state of a whole collection; two equal tags
/// mean no member of the collection changed in between.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CTag(String);

impl CTag {
    /// Creates a new `CTag` from a string.
    #[must_use]
    pub const fn new(ctag: String) -> Self {
        Self(ctag)
    }

    /// Returns the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for CTag {
    fn from(ctag: String) -> Self {
        Self(ctag)
    }
}

impl From<&str> for CTag {
    fn from(ctag: &str) -> Self {
        Self(ctag.to_string())
    }
}

/// Kind of a `WebDAV` collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    /// `CalDAV` calendar collection (events, tasks).
    Calendar,
    /// `CardDAV` address book collection.
    AddressBook,
}

impl CollectionKind {
    /// Content type of the member resources.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Calendar => "text/calendar; charset=utf-8",
            Self::AddressBook => "text/vcard; charset=utf-8",
        }
    }
}

/// Collection metadata.
///
/// Represents a calendar or address book collection on the server.
#[derive(Debug, Clone)]
pub struct DavCollection {
    /// The href of the collection, always with a trailing slash.
    pub href: Href,
    /// Calendar or address book.
    pub kind: CollectionKind,
    /// The display name of the collection.
    pub display_name: Option<String>,
    /// The description of the collection.
    pub description: Option<String>,
    /// The color of the collection as sent by the server (e.g. `#FF0000FF`).
    pub color: Option<String>,
    /// Supported component types (VEVENT, VTODO, etc.), empty if not advertised.
    pub supported_components: Vec<String>,
    /// The collection tag (`CTag`) for change detection.
    pub ctag: Option<CTag>,
    /// The `WebDAV` sync token, if the server supports sync-collection.
    pub sync_token: Option<String>,
    /// The current user may not change the members of the collection.
    pub read_only: bool,
}

impl DavCollection {
    /// Creates a new `DavCollection`.
    #[must_use]
    pub fn new(href: Href, kind: CollectionKind) -> Self {
        Self {
            href: href.with_trailing_slash(),
            kind,
            display_name: None,
            description: None,
            color: None,
            supported_components: Vec::new(),
            ctag: None,
            sync_token: None,
            read_only: false,
        }
    }

    /// Whether the collection accepts the given component type. Calendars
    /// without an advertised component set accept everything.
    #[must_use]
    pub fn supports_component(&self, component: &str) -> bool {
        self.supported_components.is_empty()
            || self
                .supported_components
                .iter()
                .any(|c| c.eq_ignore_ascii_case(component))
    }
}

/// A member resource of a collection, without its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    /// The href of the resource.
    pub href: Href,
    /// The entity tag of the resource.
    pub etag: ETag,
}

/// A member resource of a collection including its content.
#[derive(Debug, Clone)]
pub struct DavResource {
    /// The href of the resource.
    pub href: Href,
    /// The entity tag of the resource.
    pub etag: ETag,
    /// The iCalendar or vCard data.
    pub data: String,
}

impl DavResource {
    /// Creates a new `DavResource`.
    #[must_use]
    pub const fn new(href: Href, etag: ETag, data: String) -> Self {
        Self { href, etag, data }
    }
}

/// Precondition attached to a write request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// Unconditional write.
    None,
    /// `If-Match`: only write if the resource still has this entity tag.
    IfMatch(ETag),
    /// `If-None-Match: *`: only write if the resource does not exist yet.
    IfNoneMatchAny,
}
