//! Pure string transforms over remote URLs.

use serde::{Deserialize, Serialize};

const HTTPS: &str = "https://";
const EN_DASH: char = '\u{2013}';
const EM_DASH: char = '\u{2014}';

/// Owner and repository of a hosted remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDescriptor {
    pub owner: String,
    pub repository: String,
    /// Scheme and host, e.g. `https://github.com`.
    pub base_url: String,
}

/// Trim and replace typographic dashes, which break URLs pasted from rich text.
pub fn clean_remote_url(url: &str) -> String {
    url.trim().replace([EN_DASH, EM_DASH], "-")
}

/// Embed `username:token` into an `https://` URL.
///
/// Any previously embedded credentials are dropped first, so repeated calls
/// never accumulate stale tokens. Other schemes are returned unchanged.
pub fn with_credentials(url: &str, username: &str, token: &str) -> String {
    match url.strip_prefix(HTTPS) {
        Some(rest) => format!("{HTTPS}{username}:{token}@{}", strip_userinfo(rest)),
        None => url.to_string(),
    }
}

/// Replace embedded credentials with `***` so the URL can be logged.
pub fn redact(url: &str) -> String {
    match url.split_once("://") {
        Some((scheme, rest)) if rest.contains('@') => {
            format!("{scheme}://***@{}", strip_userinfo(rest))
        }
        _ => url.to_string(),
    }
}

fn strip_userinfo(rest: &str) -> &str {
    match rest.split_once('@') {
        Some((_, host_and_path)) => host_and_path,
        None => rest,
    }
}

/// Derive the owner/repository pair from a remote URL.
///
/// Accepts `https://[creds@]host/owner/repo(.git)` and `git@host:owner/repo(.git)`.
pub fn parse_remote(url: &str) -> Option<RemoteDescriptor> {
    let cleaned = clean_remote_url(url);
    let trimmed = cleaned.trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);

    let (scheme, rest) = match trimmed.split_once("://") {
        Some((scheme, rest)) => (scheme.to_string(), strip_userinfo(rest).to_string()),
        None => {
            // scp-like syntax: git@host:owner/repo
            let rest = strip_userinfo(trimmed);
            ("https".to_string(), rest.replacen(':', "/", 1))
        }
    };

    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() < 3 {
        return None;
    }
    let host = segments[0];
    let owner = segments[segments.len() - 2];
    let repository = segments[segments.len() - 1];

    Some(RemoteDescriptor {
        owner: owner.to_string(),
        repository: repository.to_string(),
        base_url: format!("{scheme}://{host}"),
    })
}
