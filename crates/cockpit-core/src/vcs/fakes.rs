//! In-memory working copy (testing only).
//!
//! [`MemoryWorkingCopy`] models just enough repository state for the
//! synchronizer: dirtiness, branches, remotes, pending rebase steps and
//! scripted push/pull failures. Every mutating call is recorded as a
//! [`VcsCall`] so tests can assert on the exact protocol that ran.

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{PushOutcome, VersionControl};
use crate::error::{CockpitError, Result};

/// One recorded operation against the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VcsCall {
    Init,
    AddAll,
    AddPaths(Vec<String>),
    Commit(String),
    CommitNoEdit,
    Checkout(String),
    CheckoutTracking { branch: String, upstream: String },
    CreateBranch(String),
    AddRemote { name: String, url: String },
    RemoveRemote(String),
    SetRemoteUrl { name: String, url: String },
    Pull { remote: String, branch: String, rebase: bool },
    Push { remote: String, branch: String, set_upstream: bool },
    RebaseContinue,
}

#[derive(Debug, Default)]
struct FakeState {
    initialized: bool,
    dirty: bool,
    commits: Vec<String>,
    local_branches: Vec<String>,
    current_branch: Option<String>,
    remote_branches: Vec<String>,
    remotes: BTreeMap<String, String>,
    rebase_steps: usize,
    fail_rebase_continue: bool,
    fail_pull_rebase: bool,
    fail_pull: bool,
    upstream_rejection: Option<String>,
    push_rejections: VecDeque<String>,
    calls: Vec<VcsCall>,
}

/// In-memory [`VersionControl`] double.
#[derive(Debug)]
pub struct MemoryWorkingCopy {
    root: PathBuf,
    state: Mutex<FakeState>,
}

impl MemoryWorkingCopy {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            state: Mutex::new(FakeState::default()),
        }
    }

    fn with_state(self, f: impl FnOnce(&mut FakeState)) -> Self {
        f(&mut self.state.lock().unwrap());
        self
    }

    pub fn initialized(self) -> Self {
        self.with_state(|s| s.initialized = true)
    }

    pub fn with_changes(self) -> Self {
        self.with_state(|s| s.dirty = true)
    }

    pub fn with_local_branch(self, branch: &str) -> Self {
        self.with_state(|s| s.local_branches.push(branch.to_string()))
    }

    pub fn with_remote_branch(self, branch: &str) -> Self {
        self.with_state(|s| s.remote_branches.push(branch.to_string()))
    }

    pub fn with_remote(self, name: &str, url: &str) -> Self {
        self.with_state(|s| {
            s.remotes.insert(name.to_string(), url.to_string());
        })
    }

    /// Pretend a rebase is paused and needs `steps` continues to finish.
    pub fn with_rebase_steps(self, steps: usize) -> Self {
        self.with_state(|s| s.rebase_steps = steps)
    }

    pub fn failing_rebase_continue(self) -> Self {
        self.with_state(|s| s.fail_rebase_continue = true)
    }

    pub fn failing_pull_rebase(self) -> Self {
        self.with_state(|s| s.fail_pull_rebase = true)
    }

    pub fn failing_pull(self) -> Self {
        self.with_state(|s| s.fail_pull = true)
    }

    pub fn rejecting_upstream_push(self, summary: &str) -> Self {
        self.with_state(|s| s.upstream_rejection = Some(summary.to_string()))
    }

    /// Queue a rejection for the next plain (non-upstream) push.
    pub fn rejecting_push(self, summary: &str) -> Self {
        self.with_state(|s| s.push_rejections.push_back(summary.to_string()))
    }

    pub fn calls(&self) -> Vec<VcsCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn commits(&self) -> Vec<String> {
        self.state.lock().unwrap().commits.clone()
    }

    pub fn current_branch(&self) -> Option<String> {
        self.state.lock().unwrap().current_branch.clone()
    }

    pub fn remote(&self, name: &str) -> Option<String> {
        self.state.lock().unwrap().remotes.get(name).cloned()
    }

    pub fn pushes(&self) -> Vec<VcsCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, VcsCall::Push { .. }))
            .collect()
    }

    fn record(&self, call: VcsCall) {
        self.state.lock().unwrap().calls.push(call);
    }
}

impl VersionControl for MemoryWorkingCopy {
    fn root(&self) -> &Path {
        &self.root
    }

    fn is_initialized(&self) -> bool {
        self.state.lock().unwrap().initialized
    }

    fn init(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.initialized = true;
        state.calls.push(VcsCall::Init);
        Ok(())
    }

    fn status(&self) -> Result<String> {
        let state = self.state.lock().unwrap();
        let branch = state.current_branch.as_deref().unwrap_or("main");
        let tree = if state.dirty {
            "changes not committed"
        } else {
            "nothing to commit, working tree clean"
        };
        Ok(format!("On branch {branch}\n{tree}"))
    }

    fn has_changes(&self) -> Result<bool> {
        Ok(self.state.lock().unwrap().dirty)
    }

    fn add_all(&self) -> Result<()> {
        self.record(VcsCall::AddAll);
        Ok(())
    }

    fn add_paths(&self, paths: &[String]) -> Result<()> {
        self.record(VcsCall::AddPaths(paths.to_vec()));
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.commits.push(message.to_string());
        state.dirty = false;
        state.calls.push(VcsCall::Commit(message.to_string()));
        Ok(())
    }

    fn commit_no_edit(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.commits.push("<no-edit>".to_string());
        state.dirty = false;
        state.calls.push(VcsCall::CommitNoEdit);
        Ok(())
    }

    fn local_branches(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().local_branches.clone())
    }

    fn remote_branches(&self, remote: &str) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        if !state.remotes.contains_key(remote) {
            return Ok(Vec::new());
        }
        Ok(state.remote_branches.clone())
    }

    fn checkout(&self, branch: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(VcsCall::Checkout(branch.to_string()));
        if !state.local_branches.iter().any(|b| b == branch) {
            return Err(CockpitError::Vcs(format!("pathspec '{branch}' did not match")));
        }
        state.current_branch = Some(branch.to_string());
        Ok(())
    }

    fn checkout_tracking(&self, branch: &str, upstream: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(VcsCall::CheckoutTracking {
            branch: branch.to_string(),
            upstream: upstream.to_string(),
        });
        let remote_name = upstream.split_once('/').map_or(upstream, |(_, b)| b);
        if !state.remote_branches.iter().any(|b| b == remote_name) {
            return Err(CockpitError::Vcs(format!("'{upstream}' is not a commit")));
        }
        state.local_branches.push(branch.to_string());
        state.current_branch = Some(branch.to_string());
        Ok(())
    }

    fn create_branch(&self, branch: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(VcsCall::CreateBranch(branch.to_string()));
        state.local_branches.push(branch.to_string());
        state.current_branch = Some(branch.to_string());
        Ok(())
    }

    fn remote_url(&self, name: &str) -> Result<Option<String>> {
        Ok(self.state.lock().unwrap().remotes.get(name).cloned())
    }

    fn add_remote(&self, name: &str, url: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(VcsCall::AddRemote {
            name: name.to_string(),
            url: url.to_string(),
        });
        if state.remotes.contains_key(name) {
            return Err(CockpitError::Vcs(format!("remote {name} already exists")));
        }
        state.remotes.insert(name.to_string(), url.to_string());
        Ok(())
    }

    fn remove_remote(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(VcsCall::RemoveRemote(name.to_string()));
        state
            .remotes
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| CockpitError::Vcs(format!("no such remote: {name}")))
    }

    fn set_remote_url(&self, name: &str, url: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(VcsCall::SetRemoteUrl {
            name: name.to_string(),
            url: url.to_string(),
        });
        match state.remotes.get_mut(name) {
            Some(existing) => {
                *existing = url.to_string();
                Ok(())
            }
            None => Err(CockpitError::Vcs(format!("no such remote: {name}"))),
        }
    }

    fn pull(&self, remote: &str, branch: &str, rebase: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(VcsCall::Pull {
            remote: remote.to_string(),
            branch: branch.to_string(),
            rebase,
        });
        let fails = if rebase {
            state.fail_pull_rebase
        } else {
            state.fail_pull
        };
        if fails {
            return Err(CockpitError::Vcs(format!("pull from {remote}/{branch} failed")));
        }
        Ok(())
    }

    fn push(&self, remote: &str, branch: &str, set_upstream: bool) -> Result<PushOutcome> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(VcsCall::Push {
            remote: remote.to_string(),
            branch: branch.to_string(),
            set_upstream,
        });
        let rejection = if set_upstream {
            state.upstream_rejection.clone()
        } else {
            state.push_rejections.pop_front()
        };
        if let Some(summary) = rejection {
            return Ok(PushOutcome::Rejected { summary });
        }
        if !state.remote_branches.iter().any(|b| b == branch) {
            state.remote_branches.push(branch.to_string());
        }
        Ok(PushOutcome::Accepted)
    }

    fn rebase_in_progress(&self) -> bool {
        self.state.lock().unwrap().rebase_steps > 0
    }

    fn rebase_continue(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(VcsCall::RebaseContinue);
        if state.fail_rebase_continue {
            return Err(CockpitError::Vcs(
                "could not apply commit: resolve all conflicts manually".to_string(),
            ));
        }
        state.rebase_steps = state.rebase_steps.saturating_sub(1);
        Ok(())
    }
}
