//! Basic-auth credentials keyed by the widget's `authKey`.
//!
//! Widgets never carry secrets themselves; they name a key, and the dashboard
//! config supplies the matching username/password under `[auth.<key>]`.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::core::errors::{HcmError, Result};

/// One username/password pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// `base64(username:password)`.
    #[must_use]
    pub fn encoded(&self) -> String {
        STANDARD.encode(format!("{}:{}", self.username, self.password))
    }
}

/// Credentials looked up by auth key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialStore {
    entries: BTreeMap<String, Credentials>,
}

impl CredentialStore {
    #[must_use]
    pub fn new(entries: BTreeMap<String, Credentials>) -> Self {
        Self { entries }
    }

    pub fn insert(&mut self, key: impl Into<String>, credentials: Credentials) {
        self.entries.insert(key.into(), credentials);
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Header map carrying `Authorization: Basic <base64(user:pass)>` for `key`.
    pub fn basic_auth_header(&self, key: &str) -> Result<HeaderMap> {
        let creds = self
            .entries
            .get(key)
            .ok_or_else(|| HcmError::MissingCredentials {
                key: key.to_string(),
            })?;
        let mut value = HeaderValue::from_str(&format!("Basic {}", creds.encoded())).map_err(
            |e| HcmError::InvalidConfig {
                details: format!("auth.{key}: cannot build Authorization header: {e}"),
            },
        )?;
        value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CredentialStore {
        let mut store = CredentialStore::default();
        store.insert("elastic", Credentials::new("admin", "password123"));
        store
    }

    #[test]
    fn header_is_basic_base64_of_user_and_password() {
        let headers = store().basic_auth_header("elastic").unwrap();
        let value = headers.get(AUTHORIZATION).unwrap();
        let expected = format!("Basic {}", STANDARD.encode("admin:password123"));
        assert_eq!(value.to_str().unwrap(), expected);
        assert_eq!(expected, "Basic YWRtaW46cGFzc3dvcmQxMjM=");
        assert!(value.is_sensitive());
    }

    #[test]
    fn unknown_key_is_missing_credentials() {
        let err = store().basic_auth_header("nope").unwrap_err();
        assert_eq!(err.code(), "HCM-2004");
    }

    #[test]
    fn debug_output_redacts_password() {
        let rendered = format!("{:?}", Credentials::new("admin", "hunter2"));
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
    }
}
