// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Request builders for `WebDAV` operations.

use std::io::Cursor;

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use crate::error::DavError;
use crate::types::CollectionKind;
use crate::xml::ns;

/// PROPFIND request builder.
#[derive(Debug)]
pub struct PropFindRequest {
    props: Vec<Prop>,
}

/// Properties to request in PROPFIND.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prop {
    /// Display name.
    DisplayName,
    /// Resource type.
    ResourceType,
    /// `ETag`.
    GetETag,
    /// Collection tag.
    GetCTag,
    /// `WebDAV` sync token.
    SyncToken,
    /// Calendar color.
    CalendarColor,
    /// Supported calendar components.
    SupportedCalendarComponents,
    /// Calendar description.
    CalendarDescription,
    /// Address book description.
    AddressBookDescription,
    /// Privileges of the current user.
    CurrentUserPrivilegeSet,
}

impl Prop {
    const fn name(self) -> &'static str {
        match self {
            Self::DisplayName => "displayname",
            Self::ResourceType => "resourcetype",
            Self::GetETag => "getetag",
            Self::GetCTag => "getctag",
            Self::SyncToken => "sync-token",
            Self::CalendarColor => "calendar-color",
            Self::SupportedCalendarComponents => "supported-calendar-component-set",
            Self::CalendarDescription => "calendar-description",
            Self::AddressBookDescription => "addressbook-description",
            Self::CurrentUserPrivilegeSet => "current-user-privilege-set",
        }
    }

    /// Namespace prefix used when writing the element.
    const fn prefix(self) -> &'static str {
        match self {
            Self::DisplayName
            | Self::ResourceType
            | Self::GetETag
            | Self::SyncToken
            | Self::CurrentUserPrivilegeSet => "D",
            Self::SupportedCalendarComponents | Self::CalendarDescription => "C",
            Self::AddressBookDescription => "CR",
            Self::GetCTag => "CS",
            Self::CalendarColor => "A",
        }
    }
}

/// Writes `<D:prop>` containing one empty element per requested property.
fn write_props<W: std::io::Write>(writer: &mut Writer<W>, props: &[Prop]) -> Result<(), DavError> {
    writer.write_event(Event::Start(BytesStart::new("D:prop")))?;
    for prop in props {
        let name = format!("{}:{}", prop.prefix(), prop.name());
        writer.write_event(Event::Empty(BytesStart::new(name)))?;
    }
    writer.write_event(Event::End(BytesEnd::new("D:prop")))?;
    Ok(())
}

fn into_string(writer: Writer<Cursor<Vec<u8>>>) -> Result<String, DavError> {
    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| DavError::Xml(format!("UTF-8 error: {e}")))
}

impl PropFindRequest {
    /// Creates a new PROPFIND request.
    #[must_use]
    pub fn new() -> Self {
        Self { props: Vec::new() }
    }

    /// Adds a property to the request.
    pub fn add_property(&mut self, prop: Prop) -> &mut Self {
        if !self.props.contains(&prop) {
            self.props.push(prop);
        }
        self
    }

    /// Builds the XML body for the PROPFIND request.
    ///
    /// # Errors
    ///
    /// Returns an error if XML building fails.
    pub fn build(&self) -> Result<String, DavError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        // <D:propfind xmlns:D="DAV:" ...>, only declaring the namespaces in use
        let mut propfind = BytesStart::new("D:propfind");
        propfind.push_attribute(("xmlns:D", ns::DAV));
        for (prefix, uri) in [
            ("C", ns::CALDAV),
            ("CR", ns::CARDDAV),
            ("CS", ns::CALENDARSERVER),
            ("A", ns::APPLE_ICAL),
        ] {
            if self.props.iter().any(|p| p.prefix() == prefix) {
                propfind.push_attribute((format!("xmlns:{prefix}").as_str(), uri));
            }
        }
        writer.write_event(Event::Start(propfind))?;

        write_props(&mut writer, &self.props)?;

        writer.write_event(Event::End(BytesEnd::new("D:propfind")))?;
        into_string(writer)
    }
}

impl Default for PropFindRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// Calendar query request builder, listing the `ETag`s of the members of a
/// calendar that contain a given component.
#[derive(Debug)]
pub struct CalendarQueryRequest {
    component: Option<String>,
}

impl CalendarQueryRequest {
    /// Creates a new calendar query request.
    #[must_use]
    pub const fn new() -> Self {
        Self { component: None }
    }

    /// Sets the component filter (VEVENT, VTODO, etc.).
    #[must_use]
    pub fn component(mut self, component: String) -> Self {
        self.component = Some(component);
        self
    }

    /// Builds the XML body for the calendar query request.
    ///
    /// # Errors
    ///
    /// Returns an error if XML building fails.
    pub fn build(&self) -> Result<String, DavError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        // <C:calendar-query xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
        let mut calendar_query = BytesStart::new("C:calendar-query");
        calendar_query.push_attribute(("xmlns:D", ns::DAV));
        calendar_query.push_attribute(("xmlns:C", ns::CALDAV));
        writer.write_event(Event::Start(calendar_query))?;

        write_props(&mut writer, &[Prop::GetETag])?;

        // <C:filter><C:comp-filter name="VCALENDAR">
        writer.write_event(Event::Start(BytesStart::new("C:filter")))?;
        let mut comp_filter = BytesStart::new("C:comp-filter");
        comp_filter.push_attribute(("name", "VCALENDAR"));
        writer.write_event(Event::Start(comp_filter))?;

        if let Some(component) = &self.component {
            let mut comp_filter_inner = BytesStart::new("C:comp-filter");
            comp_filter_inner.push_attribute(("name", component.as_str()));
            writer.write_event(Event::Empty(comp_filter_inner))?;
        }

        writer.write_event(Event::End(BytesEnd::new("C:comp-filter")))?;
        writer.write_event(Event::End(BytesEnd::new("C:filter")))?;
        writer.write_event(Event::End(BytesEnd::new("C:calendar-query")))?;
        into_string(writer)
    }
}

impl Default for CalendarQueryRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// Multiget request builder (`calendar-multiget` or `addressbook-multiget`).
#[derive(Debug)]
pub struct MultiGetRequest {
    kind: CollectionKind,
    hrefs: Vec<String>,
}

impl MultiGetRequest {
    /// Creates a new multiget request for the given collection kind.
    #[must_use]
    pub fn new(kind: CollectionKind) -> Self {
        Self {
            kind,
            hrefs: Vec::new(),
        }
    }

    /// Adds an href to the request.
    pub fn add_href(&mut self, href: String) -> &mut Self {
        self.hrefs.push(href);
        self
    }

    /// Builds the XML body for the multiget request.
    ///
    /// # Errors
    ///
    /// Returns an error if XML building fails.
    pub fn build(&self) -> Result<String, DavError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        let (root, prefix, uri, data) = match self.kind {
            CollectionKind::Calendar => (
                "C:calendar-multiget",
                "xmlns:C",
                ns::CALDAV,
                "C:calendar-data",
            ),
            CollectionKind::AddressBook => (
                "CR:addressbook-multiget",
                "xmlns:CR",
                ns::CARDDAV,
                "CR:address-data",
            ),
        };

        let mut multiget = BytesStart::new(root);
        multiget.push_attribute(("xmlns:D", ns::DAV));
        multiget.push_attribute((prefix, uri));
        writer.write_event(Event::Start(multiget))?;

        // <D:prop><D:getetag/><C:calendar-data/></D:prop>
        writer.write_event(Event::Start(BytesStart::new("D:prop")))?;
        writer.write_event(Event::Empty(BytesStart::new("D:getetag")))?;
        writer.write_event(Event::Empty(BytesStart::new(data)))?;
        writer.write_event(Event::End(BytesEnd::new("D:prop")))?;

        for href in &self.hrefs {
            writer.write_event(Event::Start(BytesStart::new("D:href")))?;
            writer.write_event(Event::Text(BytesText::new(href.as_str())))?;
            writer.write_event(Event::End(BytesEnd::new("D:href")))?;
        }

        writer.write_event(Event::End(BytesEnd::new(root)))?;
        into_string(writer)
    }
}
