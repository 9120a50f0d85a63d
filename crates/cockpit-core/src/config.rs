//! Environment-driven configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::completion::CompletionConfig;
use crate::layout::ProjectLayout;

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_TERRAFORM_BIN: &str = "terraform";

/// Commit author used for generated commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitIdentity {
    pub name: String,
    pub email: String,
}

/// Cockpit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CockpitConfig {
    /// Working-copy root; every generated file lives below it
    pub base_dir: PathBuf,
    pub completion: CompletionConfig,
    /// Hosting platform token for pull requests and pipeline runs
    pub github_token: Option<String>,
    pub github_api_url: String,
    pub terraform_bin: String,
    pub git_identity: Option<GitIdentity>,
}

impl Default for CockpitConfig {
    fn default() -> Self {
        let base_dir = std::env::var("COCKPIT_BASE_DIR")
            .map(PathBuf::from)
            .or_else(|_| std::env::current_dir())
            .unwrap_or_else(|_| PathBuf::from("."));

        let git_identity = match (
            non_blank_var("COCKPIT_GIT_NAME"),
            non_blank_var("COCKPIT_GIT_EMAIL"),
        ) {
            (Some(name), Some(email)) => Some(GitIdentity { name, email }),
            _ => None,
        };

        CockpitConfig {
            base_dir,
            completion: CompletionConfig::from_env(),
            github_token: non_blank_var("GITHUB_TOKEN"),
            github_api_url: std::env::var("GITHUB_API_URL")
                .unwrap_or_else(|_| DEFAULT_GITHUB_API_URL.to_string()),
            terraform_bin: std::env::var("TERRAFORM_BIN")
                .unwrap_or_else(|_| DEFAULT_TERRAFORM_BIN.to_string()),
            git_identity,
        }
    }
}

impl CockpitConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Config rooted at `base_dir` with built-in defaults and nothing read from the environment.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        CockpitConfig {
            base_dir: base_dir.into(),
            completion: CompletionConfig::new(
                crate::completion::DEFAULT_COMPLETION_ENDPOINT,
                crate::completion::DEFAULT_COMPLETION_MODEL,
            ),
            github_token: None,
            github_api_url: DEFAULT_GITHUB_API_URL.to_string(),
            terraform_bin: DEFAULT_TERRAFORM_BIN.to_string(),
            git_identity: None,
        }
    }

    pub fn with_github_token(mut self, token: &str) -> Self {
        self.github_token = Some(token.to_string());
        self
    }

    pub fn with_git_identity(mut self, name: &str, email: &str) -> Self {
        self.git_identity = Some(GitIdentity {
            name: name.to_string(),
            email: email.to_string(),
        });
        self
    }

    pub fn layout(&self) -> ProjectLayout {
        ProjectLayout::new(&self.base_dir)
    }
}

fn non_blank_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
