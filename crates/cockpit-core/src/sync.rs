//! Repository synchronization protocol.
//!
//! One call to [`RepositorySynchronizer::sync_and_push`] walks the working copy
//! through:
//!
//! ```text
//! Uninitialized -> Initialized -> Staged -> Committed | NothingToCommit
//!   -> RemoteReady -> [RebaseInProgress -> RebaseResolved]  (returns early)
//!   -> BranchSynced -> Pulled -> Pushed
//! ```
//!
//! The protocol is not transactional. A commit made before a failed push stays
//! in place; the returned [`SyncReport`] names the last stage reached.

use std::fmt;
use std::fs;

use tracing::{debug, error, info, instrument, warn};

use crate::error::{CockpitError, Result};
use crate::remote_url::{clean_remote_url, redact, with_credentials};
use crate::vcs::{PushOutcome, VersionControl, ORIGIN};

/// Selection entry meaning "stage every change".
pub const ALL_FILES: &str = "ALL";

/// Token scope the hosting platform requires for pushes touching workflow files.
pub const WORKFLOW_SCOPE: &str = "workflow";

const WORKFLOW_SCOPE_MARKERS: [&str; 2] = [
    "refusing to allow a Personal Access Token to create or update workflow",
    "refusing to allow an OAuth App to create or update workflow",
];

pub const IGNORE_FILE: &str = ".gitignore";

/// Ignore list written at the working-copy root on every sync.
pub const IGNORE_TEMPLATE: &str = "\
# ---- Virtual Environment ----
.venv/
.env
__pycache__/

# ---- Terraform ----
terraform/.terraform/
*.tfstate
*.tfstate.backup
crash.log

# ---- Python ----
*.pyc

# ---- Editor ----
.vscode/
.idea/

# ---- OS files ----
.DS_Store
Thumbs.db

# ---- Cockpit ----
.cockpit/
";

/// Protocol stages, in the order they are reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Uninitialized,
    Initialized,
    Staged,
    Committed,
    NothingToCommit,
    RemoteReady,
    RebaseInProgress,
    RebaseResolved,
    BranchSynced,
    Pulled,
    Pushed,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStage::Uninitialized => "uninitialized",
            SyncStage::Initialized => "initialized",
            SyncStage::Staged => "staged",
            SyncStage::Committed => "committed",
            SyncStage::NothingToCommit => "nothing_to_commit",
            SyncStage::RemoteReady => "remote_ready",
            SyncStage::RebaseInProgress => "rebase_in_progress",
            SyncStage::RebaseResolved => "rebase_resolved",
            SyncStage::BranchSynced => "branch_synced",
            SyncStage::Pulled => "pulled",
            SyncStage::Pushed => "pushed",
        };
        f.write_str(name)
    }
}

/// Inputs for one synchronization.
#[derive(Debug, Clone)]
pub struct SyncRequest {
    /// Paths to stage; empty or containing [`ALL_FILES`] stages everything.
    pub selected_files: Vec<String>,
    pub commit_message: String,
    pub branch: String,
    pub username: String,
    pub token: String,
    /// Used only when `origin` does not exist yet.
    pub remote_url: Option<String>,
}

impl SyncRequest {
    pub fn new(branch: &str, commit_message: &str) -> Self {
        Self {
            selected_files: vec![ALL_FILES.to_string()],
            commit_message: commit_message.to_string(),
            branch: branch.to_string(),
            username: String::new(),
            token: String::new(),
            remote_url: None,
        }
    }

    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.selected_files = files;
        self
    }

    pub fn with_credentials(mut self, username: &str, token: &str) -> Self {
        self.username = username.to_string();
        self.token = token.to_string();
        self
    }

    pub fn with_remote_url(mut self, url: &str) -> Self {
        self.remote_url = Some(url.to_string());
        self
    }

    fn stages_everything(&self) -> bool {
        self.selected_files.is_empty() || self.selected_files.iter().any(|f| f == ALL_FILES)
    }
}

/// How a synchronization ended.
#[derive(Debug)]
pub enum SyncOutcome {
    /// The branch was pushed.
    Pushed { branch: String },
    /// An interrupted rebase was completed; the caller should run the sync again.
    RebaseRecovered,
    /// A step failed; earlier steps are not rolled back.
    Failed { stage: SyncStage, error: CockpitError },
}

/// Result of [`RepositorySynchronizer::sync_and_push`].
#[derive(Debug)]
pub struct SyncReport {
    pub outcome: SyncOutcome,
    /// Last stage reached before the outcome was decided.
    pub stage: SyncStage,
    pub committed: bool,
    /// Non-fatal problems (failed upstream setup, pull fallback).
    pub warnings: Vec<String>,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, SyncOutcome::Failed { .. })
    }

    pub fn needs_retry(&self) -> bool {
        matches!(self.outcome, SyncOutcome::RebaseRecovered)
    }

    pub fn error(&self) -> Option<&CockpitError> {
        match &self.outcome {
            SyncOutcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            SyncOutcome::Pushed { branch } => {
                write!(f, "ok: commit, pull & push to {branch} done")
            }
            SyncOutcome::RebaseRecovered => {
                f.write_str("ok: rebase completed, please retry your operation")
            }
            SyncOutcome::Failed { stage, error } => {
                write!(f, "error: {error} (after stage {stage})")
            }
        }
    }
}

#[derive(Debug)]
struct Progress {
    stage: SyncStage,
    committed: bool,
    warnings: Vec<String>,
}

impl Progress {
    fn advance(&mut self, stage: SyncStage) {
        debug!(from = %self.stage, to = %stage, "sync stage");
        self.stage = stage;
    }

    fn warn(&mut self, message: String) {
        warn!("{message}");
        self.warnings.push(message);
    }
}

enum Completion {
    Pushed,
    RebaseRecovered,
}

/// Drives the synchronization protocol over one working copy.
pub struct RepositorySynchronizer<'a, V: VersionControl + ?Sized> {
    vcs: &'a V,
}

impl<'a, V: VersionControl + ?Sized> RepositorySynchronizer<'a, V> {
    pub fn new(vcs: &'a V) -> Self {
        Self { vcs }
    }

    /// Stage, commit and push `request.branch` to `origin`.
    ///
    /// Never returns an error: every failure is logged and folded into the
    /// report.
    #[instrument(skip(self, request), fields(branch = %request.branch))]
    pub fn sync_and_push(&self, request: &SyncRequest) -> SyncReport {
        let mut progress = Progress {
            stage: SyncStage::Uninitialized,
            committed: false,
            warnings: Vec::new(),
        };

        let outcome = match self.run(request, &mut progress) {
            Ok(Completion::Pushed) => SyncOutcome::Pushed {
                branch: request.branch.clone(),
            },
            Ok(Completion::RebaseRecovered) => SyncOutcome::RebaseRecovered,
            Err(err) => {
                error!(stage = %progress.stage, error = %err, "synchronization failed");
                SyncOutcome::Failed {
                    stage: progress.stage,
                    error: err,
                }
            }
        };

        SyncReport {
            outcome,
            stage: progress.stage,
            committed: progress.committed,
            warnings: progress.warnings,
        }
    }

    fn run(&self, request: &SyncRequest, progress: &mut Progress) -> Result<Completion> {
        let vcs = self.vcs;
        let branch = request.branch.as_str();

        if vcs.is_initialized() {
            debug!(root = %vcs.root().display(), "opening existing repository");
        } else {
            vcs.init()?;
            info!(root = %vcs.root().display(), "initialized new repository");
        }
        progress.advance(SyncStage::Initialized);

        self.write_ignore_file()?;
        if request.stages_everything() {
            vcs.add_all()?;
        } else {
            vcs.add_paths(&request.selected_files)?;
        }
        progress.advance(SyncStage::Staged);

        if vcs.has_changes()? {
            vcs.commit(&request.commit_message)?;
            progress.committed = true;
            progress.advance(SyncStage::Committed);
            info!("new commit created");
        } else {
            progress.advance(SyncStage::NothingToCommit);
            info!("nothing new to commit, pushing anyway");
        }

        let origin_url = self.ensure_origin(request)?;
        self.inject_credentials(&origin_url, request)?;
        progress.advance(SyncStage::RemoteReady);

        if vcs.rebase_in_progress() {
            progress.advance(SyncStage::RebaseInProgress);
            self.recover_rebase()?;
            progress.advance(SyncStage::RebaseResolved);
            return Ok(Completion::RebaseRecovered);
        }

        self.sync_branch(branch, progress)?;
        progress.advance(SyncStage::BranchSynced);

        if let Err(err) = vcs.pull(ORIGIN, branch, true) {
            progress.warn(format!(
                "pull with rebase failed: {err}; trying without rebase"
            ));
            vcs.pull(ORIGIN, branch, false)?;
        }
        progress.advance(SyncStage::Pulled);

        match vcs.push(ORIGIN, branch, false)? {
            PushOutcome::Accepted => {
                progress.advance(SyncStage::Pushed);
                info!("pushed to {ORIGIN}");
                Ok(Completion::Pushed)
            }
            PushOutcome::Rejected { summary } => Err(classify_rejection(&summary)),
        }
    }

    fn write_ignore_file(&self) -> Result<()> {
        let path = self.vcs.root().join(IGNORE_FILE);
        fs::write(&path, IGNORE_TEMPLATE).map_err(|e| CockpitError::io(&path, e))?;
        self.vcs.add_paths(&[IGNORE_FILE.to_string()])
    }

    fn ensure_origin(&self, request: &SyncRequest) -> Result<String> {
        if let Some(url) = self.vcs.remote_url(ORIGIN)? {
            return Ok(url);
        }

        let url = request
            .remote_url
            .as_deref()
            .map(clean_remote_url)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| CockpitError::Config("remote URL required".to_string()))?;
        self.vcs.add_remote(ORIGIN, &url)?;
        info!(url = %redact(&url), "created remote {ORIGIN}");
        Ok(url)
    }

    fn inject_credentials(&self, current: &str, request: &SyncRequest) -> Result<()> {
        let cleaned = clean_remote_url(current);
        let target = if cleaned.starts_with("https://") {
            if request.username.trim().is_empty() || request.token.trim().is_empty() {
                return Err(CockpitError::Config(
                    "username and token required for https remotes".to_string(),
                ));
            }
            with_credentials(&cleaned, request.username.trim(), request.token.trim())
        } else {
            cleaned
        };

        if target != current {
            self.vcs.set_remote_url(ORIGIN, &target)?;
            debug!(url = %redact(&target), "updated {ORIGIN} url");
        }
        Ok(())
    }

    fn recover_rebase(&self) -> Result<()> {
        warn!("rebase in progress, attempting to continue");
        while self.vcs.rebase_in_progress() {
            self.vcs.add_all()?;
            if self.vcs.has_changes()? {
                self.vcs.commit_no_edit()?;
            }
            self.vcs.rebase_continue()?;
            info!("rebase --continue executed");
        }
        info!("rebase finished");
        Ok(())
    }

    fn sync_branch(&self, branch: &str, progress: &mut Progress) -> Result<()> {
        let vcs = self.vcs;

        if !vcs.remote_branches(ORIGIN)?.iter().any(|b| b == branch) {
            match vcs.push(ORIGIN, branch, true) {
                Ok(PushOutcome::Accepted) => info!("set upstream {ORIGIN}/{branch}"),
                Ok(PushOutcome::Rejected { summary }) => {
                    progress.warn(format!("failed to set upstream for {branch}: {summary}"))
                }
                Err(err) => progress.warn(format!("failed to set upstream for {branch}: {err}")),
            }
        }

        if vcs.local_branches()?.iter().any(|b| b == branch) {
            return vcs.checkout(branch);
        }

        let upstream = format!("{ORIGIN}/{branch}");
        if let Err(err) = vcs.checkout_tracking(branch, &upstream) {
            debug!(error = %err, "no remote branch to track, creating {branch}");
            vcs.create_branch(branch)?;
        }
        Ok(())
    }
}

/// Map a push rejection summary onto the error taxonomy.
pub fn classify_rejection(summary: &str) -> CockpitError {
    if WORKFLOW_SCOPE_MARKERS.iter().any(|m| summary.contains(m)) {
        CockpitError::Permission {
            scope: WORKFLOW_SCOPE.to_string(),
        }
    } else {
        CockpitError::PushRejected(summary.to_string())
    }
}

/// Initialise the working copy if needed and point `origin` at `remote_url`,
/// replacing any existing `origin`.
pub fn init_and_link<V: VersionControl + ?Sized>(vcs: &V, remote_url: Option<&str>) -> Result<()> {
    if !vcs.is_initialized() {
        vcs.init()?;
    }
    let Some(url) = remote_url.map(clean_remote_url).filter(|u| !u.is_empty()) else {
        return Ok(());
    };
    if vcs.remote_url(ORIGIN)?.is_some() {
        vcs.remove_remote(ORIGIN)?;
    }
    vcs.add_remote(ORIGIN, &url)?;
    info!(url = %redact(&url), "linked {ORIGIN}");
    Ok(())
}

/// Check out `branch`, creating it from HEAD when it does not exist locally.
pub fn switch_branch<V: VersionControl + ?Sized>(vcs: &V, branch: &str) -> Result<()> {
    if vcs.local_branches()?.iter().any(|b| b == branch) {
        vcs.checkout(branch)
    } else {
        vcs.create_branch(branch)
    }
}
