//! Version-control capability used by the repository synchronizer.
//!
//! - [`GitWorkingCopy`]: shells out to the `git` binary.
//! - [`fakes::MemoryWorkingCopy`]: in-memory double recording every call.

pub mod fakes;
mod git_cli;

pub use git_cli::{is_git_repo, GitWorkingCopy};

use std::path::Path;

use crate::error::Result;

/// Name of the only remote the synchronizer works with.
pub const ORIGIN: &str = "origin";

/// Directories under the metadata dir that mark an interrupted rebase.
pub const REBASE_MARKERS: [&str; 2] = ["rebase-merge", "rebase-apply"];

/// Result of a push as reported by the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Accepted,
    Rejected { summary: String },
}

impl PushOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, PushOutcome::Accepted)
    }
}

/// Minimal set of working-copy operations the cockpit relies on.
///
/// Command failures surface as [`crate::CockpitError::Vcs`]. A push the remote
/// refuses is not an error at this level; it comes back as
/// [`PushOutcome::Rejected`] so the caller can inspect the summary.
pub trait VersionControl: Send + Sync {
    /// Root of the working tree.
    fn root(&self) -> &Path;

    fn is_initialized(&self) -> bool;
    fn init(&self) -> Result<()>;
    /// Human-readable status text.
    fn status(&self) -> Result<String>;
    /// Whether any staged, unstaged or untracked change exists.
    fn has_changes(&self) -> Result<bool>;

    fn add_all(&self) -> Result<()>;
    fn add_paths(&self, paths: &[String]) -> Result<()>;
    fn commit(&self, message: &str) -> Result<()>;
    /// Commit reusing the prepared message without opening an editor.
    fn commit_no_edit(&self) -> Result<()>;

    fn local_branches(&self) -> Result<Vec<String>>;
    /// Branch names known for `remote`, without the `remote/` prefix.
    fn remote_branches(&self, remote: &str) -> Result<Vec<String>>;
    fn checkout(&self, branch: &str) -> Result<()>;
    /// Create `branch` tracking `upstream` (e.g. `origin/main`) and switch to it.
    fn checkout_tracking(&self, branch: &str, upstream: &str) -> Result<()>;
    /// Create `branch` from the current HEAD and switch to it.
    fn create_branch(&self, branch: &str) -> Result<()>;

    fn remote_url(&self, name: &str) -> Result<Option<String>>;
    fn add_remote(&self, name: &str, url: &str) -> Result<()>;
    fn remove_remote(&self, name: &str) -> Result<()>;
    fn set_remote_url(&self, name: &str, url: &str) -> Result<()>;

    fn pull(&self, remote: &str, branch: &str, rebase: bool) -> Result<()>;
    fn push(&self, remote: &str, branch: &str, set_upstream: bool) -> Result<PushOutcome>;

    fn rebase_in_progress(&self) -> bool;
    fn rebase_continue(&self) -> Result<()>;
}
