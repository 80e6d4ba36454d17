// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! `WebDAV` client for calendar (`CalDAV`, RFC 4791) and address book
//! (`CardDAV`, RFC 6352) collections.

#![warn(
    trivial_casts,
    trivial_numeric_casts,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    clippy::dbg_macro,
    clippy::indexing_slicing,
    clippy::pedantic
)]
#![allow(clippy::single_match_else, clippy::match_bool)]

mod client;
mod config;
mod error;
mod http;
mod request;
mod response;
mod types;
mod xml;

pub use crate::client::DavClient;
pub use crate::config::{AuthMethod, DavConfig};
pub use crate::error::DavError;
pub use crate::request::{CalendarQueryRequest, MultiGetRequest, Prop, PropFindRequest};
pub use crate::response::{MultiStatusResponse, Properties, PropStat, ResponseItem};
pub use crate::types::{
    CTag, CollectionKind, DavCollection, DavResource, ETag, Href, Precondition, ResourceRef,
};
