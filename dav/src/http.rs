// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! HTTP client wrapper with authentication and `ETag` handling.

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};

use crate::config::{AuthMethod, DavConfig};
use crate::error::DavError;
use crate::types::{ETag, Href, Precondition};

/// HTTP client for `WebDAV` operations.
#[derive(Debug)]
pub struct HttpClient {
    client: Client,
    config: DavConfig,
}

impl HttpClient {
    /// Creates a new HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if HTTP client creation fails.
    pub fn new(config: DavConfig) -> Result<Self, DavError> {
        config.validate()?;
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .build()?;
        Ok(Self { client, config })
    }

    /// Builds a request with authentication headers.
    pub fn build_request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut req = self.client.request(method, url);

        match &self.config.auth {
            AuthMethod::Basic { username, password } => {
                req = req.basic_auth(username, Some(password));
            }
            AuthMethod::Bearer { token } => {
                req = req.bearer_auth(token);
            }
            AuthMethod::None => {}
        }

        req
    }

    /// Builds a request with a `WebDAV` extension method such as PROPFIND or REPORT.
    ///
    /// # Errors
    ///
    /// Returns an error if the method name is invalid.
    pub fn build_dav_request(&self, method: &str, url: &str) -> Result<RequestBuilder, DavError> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|e| DavError::Http(format!("Invalid method: {e}")))?;
        Ok(self.build_request(method, url))
    }

    /// Executes a request and checks for HTTP errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or returns an error status code.
    pub async fn execute(&self, href: &Href, req: RequestBuilder) -> Result<Response, DavError> {
        let resp = req.send().await?;

        match resp.status() {
            StatusCode::OK
            | StatusCode::CREATED
            | StatusCode::NO_CONTENT
            | StatusCode::MULTI_STATUS => Ok(resp),
            StatusCode::UNAUTHORIZED => {
                Err(DavError::Auth(format!("{} for {href}", resp.status())))
            }
            // credentials were accepted, the resource is off limits (e.g. a shared read-only calendar)
            StatusCode::FORBIDDEN => Err(DavError::Forbidden(href.clone())),
            StatusCode::NOT_FOUND | StatusCode::GONE => Err(DavError::NotFound(href.clone())),
            StatusCode::PRECONDITION_FAILED => Err(DavError::PreconditionFailed(href.clone())),
            status => {
                let text = resp
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unable to read response".to_string());
                Err(DavError::Http(format!("{status}: {text}")))
            }
        }
    }

    /// Adds the conditional headers of a write request.
    pub fn precondition(req: RequestBuilder, precondition: &Precondition) -> RequestBuilder {
        match precondition {
            Precondition::None => req,
            Precondition::IfMatch(etag) => req.header("If-Match", etag.as_str()),
            Precondition::IfNoneMatchAny => req.header("If-None-Match", "*"),
        }
    }

    /// Extracts `ETag` from response headers.
    ///
    /// Weak entity tags are ignored, they cannot be used for `If-Match`.
    pub fn extract_etag(resp: &Response) -> Option<ETag> {
        resp.headers()
            .get("ETag")
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.starts_with("W/"))
            .map(|s| ETag::new(s.to_string()))
    }
}
