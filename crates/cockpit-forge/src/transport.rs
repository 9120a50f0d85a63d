//! REST transport capability.
//!
//! Gateways build [`ApiRequest`]s with paths relative to the API root and hand
//! them to a [`RestTransport`]. [`HttpTransport`] sends them with `reqwest`;
//! [`crate::fakes::ScriptedTransport`] answers from a script.

use std::fmt;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{ForgeError, Result};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const API_MEDIA_TYPE: &str = "application/vnd.github.v3+json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
        })
    }
}

/// One authenticated call against the REST API.
#[derive(Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path below the API root, starting with `/`.
    pub path: String,
    pub token: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>, token: &str) -> Self {
        Self {
            method,
            path: path.into(),
            token: token.to_string(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("token", &"***")
            .field("body", &self.body)
            .finish()
    }
}

/// Status code and raw body of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Decode the body, or fail with [`ForgeError::RemoteApi`] unless the
    /// status is `expected`.
    pub fn json<T: DeserializeOwned>(&self, expected: u16) -> Result<T> {
        self.expect_status(expected)?;
        Ok(serde_json::from_str(&self.body)?)
    }

    pub fn expect_status(&self, expected: u16) -> Result<()> {
        if self.status == expected {
            Ok(())
        } else {
            Err(ForgeError::RemoteApi {
                status: self.status,
                body: self.body.clone(),
            })
        }
    }
}

/// Anything able to execute an [`ApiRequest`].
#[async_trait]
pub trait RestTransport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse>;
}

/// Reject a missing or blank token before any request is made.
pub fn require_token(token: &str) -> Result<&str> {
    let token = token.trim();
    if token.is_empty() {
        return Err(ForgeError::Config("GITHUB_TOKEN is not set".to_string()));
    }
    Ok(token)
}

/// [`RestTransport`] over HTTPS.
pub struct HttpTransport {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("gitops-cockpit/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(HttpTransport {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl RestTransport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let url = format!("{}{}", self.base_url, request.path);
        debug!(method = %request.method, %url, "api request");

        let builder = match request.method {
            Method::Get => self.http_client.get(&url),
            Method::Post => self.http_client.post(&url),
            Method::Put => self.http_client.put(&url),
        };
        let mut builder = builder
            .bearer_auth(&request.token)
            .header(ACCEPT, API_MEDIA_TYPE);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(status, bytes = body.len(), "api response");
        Ok(ApiResponse { status, body })
    }
}
