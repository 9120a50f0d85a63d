//! Pull-request gateway.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use crate::error::Result;
use crate::transport::{require_token, ApiRequest, Method, RestTransport};

/// A pull request about to be opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestDraft {
    /// Branch carrying the changes.
    pub source: String,
    /// Branch the changes go into.
    pub target: String,
    pub title: String,
    pub body: String,
}

impl PullRequestDraft {
    pub fn new(source: &str, target: &str, title: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            title: title.to_string(),
            body: String::new(),
        }
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }
}

#[derive(Debug, Deserialize)]
struct CreatedPull {
    html_url: String,
}

/// Opens and merges pull requests.
#[derive(Clone)]
pub struct PullRequestGateway {
    transport: Arc<dyn RestTransport>,
}

impl PullRequestGateway {
    pub fn new(transport: Arc<dyn RestTransport>) -> Self {
        Self { transport }
    }

    /// Open a pull request and return its web URL.
    #[instrument(skip(self, draft, token), fields(source = %draft.source, target = %draft.target))]
    pub async fn open(
        &self,
        owner: &str,
        repo: &str,
        draft: &PullRequestDraft,
        token: &str,
    ) -> Result<String> {
        let token = require_token(token)?;
        let request = ApiRequest::new(Method::Post, format!("/repos/{owner}/{repo}/pulls"), token)
            .with_body(json!({
                "title": draft.title,
                "head": draft.source,
                "base": draft.target,
                "body": draft.body,
            }));

        let created: CreatedPull = self.transport.send(request).await?.json(201)?;
        info!(url = %created.html_url, "pull request opened");
        Ok(created.html_url)
    }

    /// Merge pull request `number`.
    #[instrument(skip(self, token))]
    pub async fn merge(&self, owner: &str, repo: &str, number: u64, token: &str) -> Result<bool> {
        let token = require_token(token)?;
        let request = ApiRequest::new(
            Method::Put,
            format!("/repos/{owner}/{repo}/pulls/{number}/merge"),
            token,
        );

        self.transport.send(request).await?.expect_status(200)?;
        info!("pull request merged");
        Ok(true)
    }
}
