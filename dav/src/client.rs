// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! `WebDAV` client for calendar and address book collections.

use std::sync::Arc;

use reqwest::Method;

use crate::config::DavConfig;
use crate::error::DavError;
use crate::http::HttpClient;
use crate::request::{CalendarQueryRequest, MultiGetRequest, Prop, PropFindRequest};
use crate::response::MultiStatusResponse;
use crate::types::{
    CollectionKind, DavCollection, DavResource, ETag, Href, Precondition, ResourceRef,
};

const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";

/// `WebDAV` client for accessing and managing `CalDAV` calendars and
/// `CardDAV` address books.
///
/// # Example
///
/// ```ignore
/// use davsync_dav::{AuthMethod, DavClient, DavConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = DavConfig {
///     base_url: "https://dav.example.com".to_string(),
///     calendar_home: Some("/dav/calendars/user/".to_string()),
///     auth: AuthMethod::Basic {
///         username: "user".to_string(),
///         password: "pass".to_string(),
///     },
///     ..Default::default()
/// };
///
/// let client = DavClient::new(config)?;
/// let calendars = client.list_calendars().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DavClient {
    http: Arc<HttpClient>,
    config: DavConfig,
}

impl DavClient {
    /// Creates a new `WebDAV` client.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or HTTP client initialization fails.
    pub fn new(config: DavConfig) -> Result<Self, DavError> {
        let http = HttpClient::new(config.clone())?;
        Ok(Self {
            http: Arc::new(http),
            config,
        })
    }

    /// Gets the calendar collections in the calendar home set.
    ///
    /// # Errors
    ///
    /// Returns an error if no calendar home is configured or PROPFIND fails.
    pub async fn list_calendars(&self) -> Result<Vec<DavCollection>, DavError> {
        let home = self.config.home(CollectionKind::Calendar)?;

        let mut propfind = PropFindRequest::new();
        propfind
            .add_property(Prop::ResourceType)
            .add_property(Prop::DisplayName)
            .add_property(Prop::GetCTag)
            .add_property(Prop::SyncToken)
            .add_property(Prop::CalendarColor)
            .add_property(Prop::CalendarDescription)
            .add_property(Prop::SupportedCalendarComponents)
            .add_property(Prop::CurrentUserPrivilegeSet);

        let multistatus = self.propfind(&home, &propfind, 1).await?;
        let calendars = multistatus.into_collections(CollectionKind::Calendar);
        tracing::debug!(%home, count = calendars.len(), "listed calendars");
        Ok(calendars)
    }

    /// Gets the address book collections in the address book home set.
    ///
    /// # Errors
    ///
    /// Returns an error if no address book home is configured or PROPFIND fails.
    pub async fn list_address_books(&self) -> Result<Vec<DavCollection>, DavError> {
        let home = self.config.home(CollectionKind::AddressBook)?;

        let mut propfind = PropFindRequest::new();
        propfind
            .add_property(Prop::ResourceType)
            .add_property(Prop::DisplayName)
            .add_property(Prop::GetCTag)
            .add_property(Prop::SyncToken)
            .add_property(Prop::AddressBookDescription)
            .add_property(Prop::CurrentUserPrivilegeSet);

        let multistatus = self.propfind(&home, &propfind, 1).await?;
        let address_books = multistatus.into_collections(CollectionKind::AddressBook);
        tracing::debug!(%home, count = address_books.len(), "listed address books");
        Ok(address_books)
    }

    /// Lists the members of a collection with their `ETag`s.
    ///
    /// For calendars, `component` restricts the listing to resources containing
    /// that component (e.g. `VTODO`) using a calendar-query REPORT. Otherwise a
    /// PROPFIND with depth 1 is used.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_resources(
        &self,
        collection: &Href,
        component: Option<&str>,
    ) -> Result<Vec<ResourceRef>, DavError> {
        let multistatus = match component {
            Some(component) => {
                let request = CalendarQueryRequest::new().component(component.to_string());
                self.report(collection, request.build()?).await?
            }
            None => {
                let mut propfind = PropFindRequest::new();
                propfind
                    .add_property(Prop::ResourceType)
                    .add_property(Prop::GetETag);
                self.propfind(collection, &propfind, 1).await?
            }
        };

        Ok(multistatus.into_resource_refs(collection))
    }

    /// Gets a single resource by href.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource doesn't exist or the server sends no `ETag`.
    pub async fn get(&self, href: &Href) -> Result<DavResource, DavError> {
        let url = self.config.url(href);
        let resp = self
            .http
            .execute(href, self.http.build_request(Method::GET, &url))
            .await?;

        // servers MUST return an ETag on GET, RFC 4791 §5.3.4
        let etag = HttpClient::extract_etag(&resp).ok_or_else(|| {
            DavError::InvalidResponse(format!("Received GET response without ETag: {href}"))
        })?;
        let data = resp.text().await?;

        Ok(DavResource::new(href.clone(), etag, data))
    }

    /// Retrieves multiple resources of a collection by href.
    ///
    /// Hrefs the server reports as missing are left out of the result.
    ///
    /// # Errors
    ///
    /// Returns an error if multiget fails.
    pub async fn multiget(
        &self,
        collection: &Href,
        kind: CollectionKind,
        hrefs: &[Href],
    ) -> Result<Vec<DavResource>, DavError> {
        if hrefs.is_empty() {
            return Ok(Vec::new());
        }

        let mut multiget = MultiGetRequest::new(kind);
        for href in hrefs {
            multiget.add_href(href.as_str().to_string());
        }

        let multistatus = self.report(collection, multiget.build()?).await?;
        multistatus.into_resources()
    }

    /// Writes a resource.
    ///
    /// Returns the new `ETag` if the server sent one; servers are allowed to
    /// omit it when they modified the content while storing it.
    ///
    /// # Errors
    ///
    /// Returns [`DavError::PreconditionFailed`] if the precondition doesn't hold.
    pub async fn put(
        &self,
        href: &Href,
        data: String,
        content_type: &str,
        precondition: &Precondition,
    ) -> Result<Option<ETag>, DavError> {
        let url = self.config.url(href);
        let req = self
            .http
            .build_request(Method::PUT, &url)
            .header("Content-Type", content_type)
            .body(data);

        let resp = self
            .http
            .execute(href, HttpClient::precondition(req, precondition))
            .await?;

        Ok(HttpClient::extract_etag(&resp))
    }

    /// Deletes a resource.
    ///
    /// # Errors
    ///
    /// Returns [`DavError::NotFound`] if the resource is already gone.
    pub async fn delete(&self, href: &Href, precondition: &Precondition) -> Result<(), DavError> {
        let url = self.config.url(href);
        let req = self.http.build_request(Method::DELETE, &url);

        self.http
            .execute(href, HttpClient::precondition(req, precondition))
            .await?;

        Ok(())
    }

    async fn propfind(
        &self,
        href: &Href,
        request: &PropFindRequest,
        depth: u8,
    ) -> Result<MultiStatusResponse, DavError> {
        let url = self.config.url(href);
        let req = self
            .http
            .build_dav_request("PROPFIND", &url)?
            .header("Content-Type", XML_CONTENT_TYPE)
            .header("Depth", depth.to_string())
            .body(request.build()?);

        let xml = self.http.execute(href, req).await?.text().await?;
        MultiStatusResponse::from_xml(&xml)
    }

    async fn report(&self, href: &Href, body: String) -> Result<MultiStatusResponse, DavError> {
        let url = self.config.url(href);
        let req = self
            .http
            .build_dav_request("REPORT", &url)?
            .header("Content-Type", XML_CONTENT_TYPE)
            .header("Depth", "1")
            .body(body);

        let xml = self.http.execute(href, req).await?.text().await?;
        MultiStatusResponse::from_xml(&xml)
    }
}
