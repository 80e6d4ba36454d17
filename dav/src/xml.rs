// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! XML utilities for WebDAV/CalDAV/CardDAV processing.

use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::Event;

use crate::error::DavError;

/// XML namespaces used in `WebDAV` requests and responses.
pub mod ns {
    /// `WebDAV` namespace.
    pub const DAV: &str = "DAV:";

    /// `CalDAV` namespace.
    pub const CALDAV: &str = "urn:ietf:params:xml:ns:caldav";

    /// `CardDAV` namespace.
    pub const CARDDAV: &str = "urn:ietf:params:xml:ns:carddav";

    /// Calendar server namespace, home of `getctag`.
    pub const CALENDARSERVER: &str = "http://calendarserver.org/ns/";

    /// Apple iCal namespace, home of `calendar-color`.
    pub const APPLE_ICAL: &str = "http://apple.com/ns/ical/";
}

/// Reads the text content of the element whose start event was just read,
/// consuming everything up to and including the matching end event.
///
/// Text of nested elements is concatenated and entity references are resolved;
/// CDATA sections are included verbatim. Surrounding whitespace is trimmed.
///
/// # Errors
///
/// Returns an error if XML parsing fails or the document ends early.
pub fn read_element_text<R: std::io::BufRead>(
    reader: &mut quick_xml::Reader<R>,
) -> Result<String, DavError> {
    let mut text = String::new();
    let mut depth = 1;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            Event::Text(e) => {
                let unescaped = e.decode().map_err(quick_xml::Error::from)?;
                text.push_str(unescaped.as_ref());
            }
            Event::GeneralRef(e) => {
                let resolved = e
                    .resolve_char_ref()
                    .map_err(|err| DavError::Xml(err.to_string()))?;
                match resolved {
                    Some(ch) => text.push(ch),
                    None => {
                        let name = e.decode().map_err(|err| DavError::Xml(err.to_string()))?;
                        let value = resolve_predefined_entity(&name)
                            .ok_or_else(|| DavError::Xml(format!("Unknown entity: &{name};")))?;
                        text.push_str(value);
                    }
                }
            }
            Event::CData(e) => {
                text.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Event::Eof => {
                return Err(DavError::Xml("Unexpected EOF".to_string()));
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(text.trim().to_string())
}
