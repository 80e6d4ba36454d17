// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Response parsers for WebDAV/CalDAV/CardDAV operations.

use quick_xml::events::Event;

use crate::error::DavError;
use crate::types::{CTag, CollectionKind, DavCollection, DavResource, ETag, Href, ResourceRef};
use crate::xml::read_element_text;

/// `WebDAV` multistatus response.
#[derive(Debug, Clone)]
pub struct MultiStatusResponse {
    /// The response items.
    pub responses: Vec<ResponseItem>,
}

/// Individual response in multistatus.
#[derive(Debug, Clone)]
pub struct ResponseItem {
    /// The href the response is about, reduced to its path.
    pub href: Href,
    /// The property groups with their status.
    pub prop_stats: Vec<PropStat>,
    /// Response-level status, sent instead of property groups for missing resources.
    pub status: Option<String>,
}

/// Property stat with status and value.
#[derive(Debug, Clone)]
pub struct PropStat {
    /// The properties of this group.
    pub props: Properties,
    /// The HTTP status line of this group.
    pub status: String,
}

/// WebDAV/CalDAV/CardDAV properties.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    /// `displayname`.
    pub display_name: Option<String>,
    /// `getetag`.
    pub get_etag: Option<ETag>,
    /// `getctag`.
    pub get_ctag: Option<CTag>,
    /// `sync-token`.
    pub sync_token: Option<String>,
    /// `calendar-color`.
    pub calendar_color: Option<String>,
    /// `calendar-data`.
    pub calendar_data: Option<String>,
    /// `address-data`.
    pub address_data: Option<String>,
    /// `supported-calendar-component-set`.
    pub supported_calendar_components: Option<Vec<String>>,
    /// `calendar-description`.
    pub calendar_description: Option<String>,
    /// `addressbook-description`.
    pub addressbook_description: Option<String>,
    /// Privileges named in `current-user-privilege-set`, `None` if the server didn't send it.
    pub privileges: Option<Vec<String>>,
    /// `resourcetype` contains `collection`.
    pub is_collection: bool,
    /// `resourcetype` contains `calendar`.
    pub is_calendar: bool,
    /// `resourcetype` contains `addressbook`.
    pub is_addressbook: bool,
}

fn is_success(status: &str) -> bool {
    status.contains(" 200") || status.contains(" 207")
}

/// Reduces an absolute URL to its path, so that hrefs sent in either form compare equal.
fn normalize_href(href: &str) -> Href {
    let href = href.trim();
    for scheme in ["https://", "http://"] {
        if let Some(rest) = href.strip_prefix(scheme) {
            let path = rest.find('/').and_then(|i| rest.get(i..));
            return Href::from(path.unwrap_or("/"));
        }
    }
    Href::from(href)
}

impl Properties {
    /// Whether the current user may change the members of the collection.
    /// Servers not reporting privileges are assumed to allow it.
    #[must_use]
    pub fn may_write_content(&self) -> bool {
        self.privileges.as_ref().is_none_or(|privileges| {
            privileges
                .iter()
                .any(|p| matches!(p.as_str(), "all" | "write" | "write-content"))
        })
    }
}

impl ResponseItem {
    /// Properties of the first successful property group.
    #[must_use]
    pub fn ok_props(&self) -> Option<&Properties> {
        if self.status.as_deref().is_some_and(|s| !is_success(s)) {
            return None;
        }
        self.prop_stats
            .iter()
            .find(|p| is_success(&p.status))
            .map(|p| &p.props)
    }
}

impl MultiStatusResponse {
    /// Parses multistatus response from XML.
    ///
    /// # Errors
    ///
    /// Returns an error if XML parsing fails.
    #[expect(clippy::too_many_lines)]
    pub fn from_xml(xml: &str) -> Result<Self, DavError> {
        let mut reader = quick_xml::Reader::from_str(xml);
        // text is split around entity references, it is trimmed once it is joined
        reader.config_mut().trim_text(false);
        reader.config_mut().check_end_names = true;

        let mut responses = Vec::new();
        let mut current_response: Option<ResponseItem> = None;
        let mut current_props = Properties::default();
        let mut in_prop = false;
        let mut in_propstat = false;

        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::End(ref e) if e.name().local_name().into_inner() == b"multistatus" => break,
                Event::Eof => break,

                Event::Start(ref e) => {
                    let name = e.name().local_name().into_inner().to_vec();
                    match name.as_slice() {
                        b"response" => {
                            current_response = Some(ResponseItem {
                                href: Href::new(String::new()),
                                prop_stats: Vec::new(),
                                status: None,
                            });
                        }
                        b"href" if current_response.is_some() && !in_prop => {
                            let href = read_element_text(&mut reader)?;
                            if let Some(ref mut resp) = current_response {
                                resp.href = normalize_href(&href);
                            }
                        }
                        b"propstat" if current_response.is_some() => {
                            in_propstat = true;
                            current_props = Properties::default();
                        }
                        b"prop" if in_propstat => in_prop = true,

                        b"displayname" if in_prop => {
                            let text = read_element_text(&mut reader)?;
                            current_props.display_name = Some(text).filter(|a| !a.is_empty());
                        }
                        b"resourcetype" if in_prop => loop {
                            match reader.read_event_into(&mut buf)? {
                                Event::End(ref e)
                                    if e.name().local_name().into_inner() == b"resourcetype" =>
                                {
                                    break;
                                }
                                Event::Start(ref e) | Event::Empty(ref e) => {
                                    match e.name().local_name().into_inner() {
                                        b"collection" => current_props.is_collection = true,
                                        b"calendar" => current_props.is_calendar = true,
                                        b"addressbook" => current_props.is_addressbook = true,
                                        _ => {}
                                    }
                                }
                                Event::Eof => {
                                    return Err(DavError::Xml("Unexpected EOF".to_string()));
                                }
                                _ => {}
                            }
                        },
                        b"getetag" if in_prop => {
                            let text = read_element_text(&mut reader)?;
                            current_props.get_etag = Some(ETag::new(text)).filter(|a| !a.is_empty());
                        }
                        b"getctag" if in_prop => {
                            let text = read_element_text(&mut reader)?;
                            current_props.get_ctag =
                                Some(CTag::new(text)).filter(|a| !a.as_str().is_empty());
                        }
                        b"sync-token" if in_prop => {
                            let text = read_element_text(&mut reader)?;
                            current_props.sync_token = Some(text).filter(|a| !a.is_empty());
                        }
                        b"calendar-color" if in_prop => {
                            let text = read_element_text(&mut reader)?;
                            current_props.calendar_color = Some(text).filter(|a| !a.is_empty());
                        }
                        b"calendar-data" if in_prop => {
                            current_props.calendar_data = Some(read_element_text(&mut reader)?);
                        }
                        b"address-data" if in_prop => {
                            current_props.address_data = Some(read_element_text(&mut reader)?);
                        }
                        b"supported-calendar-component-set" if in_prop => {
                            let mut components = Vec::new();
                            loop {
                                match reader.read_event_into(&mut buf)? {
                                    Event::End(ref e)
                                        if e.name().local_name().into_inner()
                                            == b"supported-calendar-component-set" =>
                                    {
                                        break;
                                    }
                                    Event::Start(ref e) | Event::Empty(ref e)
                                        if e.name().local_name().into_inner() == b"comp" =>
                                    {
                                        if let Ok(Some(name_attr)) = e.try_get_attribute("name") {
                                            let name = std::str::from_utf8(&name_attr.value)
                                                .map_err(|e| {
                                                    DavError::Xml(format!("UTF-8 error: {e}"))
                                                })?
                                                .to_string();
                                            components.push(name);
                                        }
                                    }
                                    Event::Eof => {
                                        return Err(DavError::Xml("Unexpected EOF".to_string()));
                                    }
                                    _ => {}
                                }
                            }
                            current_props.supported_calendar_components = Some(components);
                        }
                        b"current-user-privilege-set" if in_prop => {
                            let mut privileges = Vec::new();
                            loop {
                                match reader.read_event_into(&mut buf)? {
                                    Event::End(ref e)
                                        if e.name().local_name().into_inner()
                                            == b"current-user-privilege-set" =>
                                    {
                                        break;
                                    }
                                    Event::Start(ref e) | Event::Empty(ref e) => {
                                        let name = e.name().local_name().into_inner();
                                        if name != b"privilege" {
                                            let name = String::from_utf8_lossy(name);
                                            privileges.push(name.into_owned());
                                        }
                                    }
                                    Event::Eof => {
                                        return Err(DavError::Xml("Unexpected EOF".to_string()));
                                    }
                                    _ => {}
                                }
                            }
                            current_props.privileges = Some(privileges);
                        }
                        b"calendar-description" if in_prop => {
                            let text = read_element_text(&mut reader)?;
                            current_props.calendar_description = Some(text);
                        }
                        b"addressbook-description" if in_prop => {
                            let text = read_element_text(&mut reader)?;
                            current_props.addressbook_description = Some(text);
                        }
                        b"status" if in_propstat => {
                            let status = read_element_text(&mut reader)?;
                            if let Some(ref mut resp) = current_response {
                                resp.prop_stats.push(PropStat {
                                    props: std::mem::take(&mut current_props),
                                    status,
                                });
                            }
                        }
                        b"status" if current_response.is_some() => {
                            let status = read_element_text(&mut reader)?;
                            if let Some(ref mut resp) = current_response {
                                resp.status = Some(status);
                            }
                        }
                        _ if in_prop => {
                            // unrequested or unknown property, skip its content
                            read_element_text(&mut reader)?;
                        }
                        _ => {}
                    }
                }
                Event::End(ref e) => match e.name().local_name().into_inner() {
                    b"response" => {
                        if let Some(resp) = current_response.take() {
                            responses.push(resp);
                        }
                    }
                    b"propstat" => in_propstat = false,
                    b"prop" => in_prop = false,
                    _ => {}
                },
                _ => {}
            }
            buf.clear();
        }

        Ok(Self { responses })
    }

    /// Converts multistatus response to collections of the given kind.
    #[must_use]
    pub fn into_collections(self, kind: CollectionKind) -> Vec<DavCollection> {
        let mut collections = Vec::new();

        for response in &self.responses {
            let Some(props) = response.ok_props() else {
                continue;
            };

            let matches = match kind {
                CollectionKind::Calendar => props.is_calendar,
                CollectionKind::AddressBook => props.is_addressbook,
            };
            if !matches {
                continue;
            }

            let mut collection = DavCollection::new(response.href.clone(), kind);
            collection.display_name.clone_from(&props.display_name);
            collection.description = match kind {
                CollectionKind::Calendar => props.calendar_description.clone(),
                CollectionKind::AddressBook => props.addressbook_description.clone(),
            };
            collection.color.clone_from(&props.calendar_color);
            collection.supported_components = props
                .supported_calendar_components
                .clone()
                .unwrap_or_default();
            collection.ctag.clone_from(&props.get_ctag);
            collection.sync_token.clone_from(&props.sync_token);
            collection.read_only = !props.may_write_content();
            collections.push(collection);
        }

        collections
    }

    /// Converts multistatus response to member references of the given collection,
    /// skipping the collection itself and nested collections.
    #[must_use]
    pub fn into_resource_refs(self, collection: &Href) -> Vec<ResourceRef> {
        let collection = collection.with_trailing_slash();
        self.responses
            .iter()
            .filter(|r| r.href.with_trailing_slash() != collection)
            .filter_map(|r| {
                let props = r.ok_props()?;
                if props.is_collection {
                    return None;
                }
                let etag = props.get_etag.clone()?;
                Some(ResourceRef {
                    href: r.href.clone(),
                    etag,
                })
            })
            .collect()
    }

    /// Converts multistatus response to resources carrying calendar or address data.
    ///
    /// # Errors
    ///
    /// Returns an error if a resource with data comes without an `ETag`.
    pub fn into_resources(self) -> Result<Vec<DavResource>, DavError> {
        let mut resources = Vec::new();

        for response in &self.responses {
            let Some(props) = response.ok_props() else {
                tracing::debug!(href = %response.href, "skipping unsuccessful multistatus entry");
                continue;
            };

            let Some(data) = props.calendar_data.as_ref().or(props.address_data.as_ref()) else {
                continue;
            };

            let etag = props.get_etag.clone().ok_or_else(|| {
                DavError::InvalidResponse(format!("Multiget entry without ETag: {}", response.href))
            })?;
            resources.push(DavResource::new(response.href.clone(), etag, data.clone()));
        }

        Ok(resources)
    }
}
