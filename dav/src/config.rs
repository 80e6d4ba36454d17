// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use crate::error::DavError;
use crate::types::{CollectionKind, Href};

/// `WebDAV` authentication method.
///
/// Secrets are left out of the `Debug` output.
#[derive(Clone, Default, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthMethod {
    /// No authentication.
    #[default]
    None,
    /// Basic authentication (username/password).
    Basic {
        /// Username for authentication.
        username: String,
        /// Password for authentication.
        password: String,
    },
    /// Bearer token authentication (OAuth).
    Bearer {
        /// Bearer token.
        token: String,
    },
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Self::Bearer { .. } => f.debug_struct("Bearer").field("token", &"***").finish(),
        }
    }
}

/// Account on a `CalDAV`/`CardDAV` server.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct DavConfig {
    /// Base URL of the server, `http` or `https`.
    pub base_url: String,
    /// Calendar home set (e.g., /dav/calendars/user/).
    #[serde(default)]
    pub calendar_home: Option<String>,
    /// Address book home set (e.g., /dav/addressbooks/user/).
    #[serde(default)]
    pub addressbook_home: Option<String>,
    /// Authentication method.
    #[serde(default)]
    pub auth: AuthMethod,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// User agent string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

const fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("davsync/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for DavConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            calendar_home: None,
            addressbook_home: None,
            auth: AuthMethod::default(),
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl DavConfig {
    /// Checks the settings a client can't work without.
    ///
    /// # Errors
    ///
    /// Returns [`DavError::Config`] for a base URL that isn't `http(s)` or a zero timeout.
    pub fn validate(&self) -> Result<(), DavError> {
        let scheme_ok = ["http://", "https://"].iter().any(|scheme| {
            self.base_url
                .get(..scheme.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
        });
        if !scheme_ok {
            return Err(DavError::Config(format!(
                "Base URL must start with http:// or https://, got '{}'",
                self.base_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(DavError::Config("Timeout must be positive".to_string()));
        }
        Ok(())
    }

    /// The home set holding collections of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`DavError::Config`] if that home set isn't configured.
    pub fn home(&self, kind: CollectionKind) -> Result<Href, DavError> {
        let (home, name) = match kind {
            CollectionKind::Calendar => (&self.calendar_home, "calendar home"),
            CollectionKind::AddressBook => (&self.addressbook_home, "address book home"),
        };
        home.as_deref()
            .filter(|home| !home.trim().is_empty())
            .map(|home| Href::from(home).with_trailing_slash())
            .ok_or_else(|| DavError::Config(format!("No {name} configured")))
    }

    /// Absolute URL of a server path.
    pub fn url(&self, href: &Href) -> String {
        let path = href.as_str();
        match path.starts_with('/') {
            true => format!("{}{path}", self.base_url.trim_end_matches('/')),
            false => format!("{}/{path}", self.base_url.trim_end_matches('/')),
        }
    }
}
