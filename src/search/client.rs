//! HTTP transport for `_search` requests.
//!
//! The widget talks to a [`SearchTransport`] rather than to `reqwest`
//! directly so tests can script responses, stall a request mid-flight, or
//! count how many requests went out.

#![allow(missing_docs)]

use std::time::Duration;

use reqwest::header::HeaderMap;

use crate::core::config::HttpConfig;
use crate::core::errors::{HcmError, Result};
use crate::search::auth::CredentialStore;
use crate::search::response::parse_hit_total;
use crate::widget::props::WidgetConfig;

/// One outbound `GET`.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub url: String,
    pub headers: HeaderMap,
}

impl SearchRequest {
    /// Build the request for a widget, attaching basic auth when `authKey` is set.
    pub fn for_widget(config: &WidgetConfig, credentials: &CredentialStore) -> Result<Self> {
        let headers = match config.auth_key.as_deref() {
            Some(key) => credentials.basic_auth_header(key)?,
            None => HeaderMap::new(),
        };
        Ok(Self {
            url: config.search_url(),
            headers,
        })
    }
}

/// Raw response: status code plus body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResponse {
    pub status: u16,
    pub body: String,
}

impl SearchResponse {
    #[must_use]
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Blocking HTTP GET. Shared by every mounted widget, so it must be thread-safe.
pub trait SearchTransport: Send + Sync {
    fn get(&self, request: &SearchRequest) -> Result<SearchResponse>;
}

/// Issue the request and extract `hits.total`.
pub fn fetch_hit_total(transport: &dyn SearchTransport, request: &SearchRequest) -> Result<u64> {
    let response = transport.get(request)?;
    if !response.is_success() {
        return Err(HcmError::HttpStatus {
            url: request.url.clone(),
            status: response.status,
        });
    }
    parse_hit_total(&response.body)
}

/// `reqwest` blocking client.
#[derive(Debug, Clone)]
pub struct HttpSearchClient {
    client: reqwest::blocking::Client,
}

impl HttpSearchClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| HcmError::Runtime {
                details: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

impl SearchTransport for HttpSearchClient {
    fn get(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let transport_err = |e: reqwest::Error| HcmError::Transport {
            url: request.url.clone(),
            details: e.to_string(),
        };
        let response = self
            .client
            .get(&request.url)
            .headers(request.headers.clone())
            .send()
            .map_err(transport_err)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(transport_err)?;
        Ok(SearchResponse { status, body })
    }
}
