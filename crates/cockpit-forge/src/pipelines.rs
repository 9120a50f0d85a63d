//! Pipeline definitions, dispatch and run polling.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use crate::error::{ForgeError, Result};
use crate::transport::{require_token, ApiRequest, Method, RestTransport};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// A workflow that can be dispatched on a ref.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunConclusion {
    Success,
    Failure,
    Cancelled,
    #[serde(other)]
    Other,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::Completed => "completed",
            RunStatus::Other => "other",
        }
    }
}

impl RunConclusion {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunConclusion::Success => "success",
            RunConclusion::Failure => "failure",
            RunConclusion::Cancelled => "cancelled",
            RunConclusion::Other => "other",
        }
    }
}

/// One execution of a pipeline definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: u64,
    pub status: RunStatus,
    /// `None` until the run completes.
    #[serde(default)]
    pub conclusion: Option<RunConclusion>,
    #[serde(default)]
    pub head_branch: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub fn state(&self) -> RunState {
        RunState {
            status: self.status,
            conclusion: self.conclusion,
        }
    }
}

/// Status/conclusion pair observed while polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub status: RunStatus,
    pub conclusion: Option<RunConclusion>,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn is_success(&self) -> bool {
        self.is_terminal() && self.conclusion == Some(RunConclusion::Success)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let conclusion = self.conclusion.map_or("none", |c| c.as_str());
        write!(
            f,
            "status: {} | conclusion: {conclusion}",
            self.status.as_str()
        )
    }
}

/// Bounds for [`PipelineController::poll_until_complete`].
///
/// With neither `max_attempts` nor `deadline` set the loop waits for as long as
/// the run takes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: Option<u32>,
    pub deadline: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: None,
            deadline: None,
        }
    }
}

impl PollPolicy {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Which run of a workflow a poll follows.
///
/// The default accepts every run, so the newest one in the list is followed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSelector {
    /// Only runs on this branch.
    pub branch: Option<String>,
    /// Runs that already existed before the dispatch.
    pub known: Vec<u64>,
}

impl RunSelector {
    pub fn latest() -> Self {
        Self::default()
    }

    /// The run created by dispatching on `branch`, given the runs listed
    /// just before the dispatch.
    pub fn dispatched(branch: &str, before: &[PipelineRun]) -> Self {
        Self {
            branch: Some(branch.to_string()),
            known: before.iter().map(|run| run.id).collect(),
        }
    }

    pub fn matches(&self, run: &PipelineRun) -> bool {
        if self.known.contains(&run.id) {
            return false;
        }
        match &self.branch {
            Some(branch) => run.head_branch.as_deref() == Some(branch.as_str()),
            None => true,
        }
    }
}

/// A cancellation receiver whose sender is already gone; polling with it is
/// never interrupted.
pub fn uncancellable() -> watch::Receiver<bool> {
    watch::channel(false).1
}

#[derive(Debug, Deserialize)]
struct WorkflowList {
    workflows: Vec<PipelineDefinition>,
}

#[derive(Debug, Deserialize)]
struct RunList {
    workflow_runs: Vec<PipelineRun>,
}

/// Lists, dispatches and watches pipeline runs.
#[derive(Clone)]
pub struct PipelineController {
    transport: Arc<dyn RestTransport>,
}

impl PipelineController {
    pub fn new(transport: Arc<dyn RestTransport>) -> Self {
        Self { transport }
    }

    pub async fn list_definitions(
        &self,
        owner: &str,
        repo: &str,
        token: &str,
    ) -> Result<Vec<PipelineDefinition>> {
        let token = require_token(token)?;
        let request = ApiRequest::new(
            Method::Get,
            format!("/repos/{owner}/{repo}/actions/workflows"),
            token,
        );
        let list: WorkflowList = self.transport.send(request).await?.json(200)?;
        debug!(count = list.workflows.len(), "pipeline definitions");
        Ok(list.workflows)
    }

    /// Dispatch `workflow_id` on `git_ref`.
    #[instrument(skip(self, token))]
    pub async fn trigger(
        &self,
        owner: &str,
        repo: &str,
        workflow_id: u64,
        git_ref: &str,
        token: &str,
    ) -> Result<bool> {
        let token = require_token(token)?;
        let request = ApiRequest::new(
            Method::Post,
            format!("/repos/{owner}/{repo}/actions/workflows/{workflow_id}/dispatches"),
            token,
        )
        .with_body(json!({ "ref": git_ref }));

        self.transport.send(request).await?.expect_status(204)?;
        info!("pipeline triggered");
        Ok(true)
    }

    /// Runs of `workflow_id`, newest first.
    pub async fn list_runs(
        &self,
        owner: &str,
        repo: &str,
        workflow_id: u64,
        token: &str,
    ) -> Result<Vec<PipelineRun>> {
        let token = require_token(token)?;
        let request = ApiRequest::new(
            Method::Get,
            format!("/repos/{owner}/{repo}/actions/workflows/{workflow_id}/runs"),
            token,
        );
        let list: RunList = self.transport.send(request).await?.json(200)?;
        Ok(list.workflow_runs)
    }

    /// Poll the most recent run until it completes.
    ///
    /// Returns as soon as a `completed` run is seen, whatever its conclusion.
    /// An empty run list means the dispatch has not materialised yet and is
    /// polled again. `cancel` flipping to `true` interrupts the wait.
    pub async fn poll_until_complete(
        &self,
        owner: &str,
        repo: &str,
        workflow_id: u64,
        token: &str,
        policy: &PollPolicy,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<RunState> {
        self.poll_run(owner, repo, workflow_id, token, &RunSelector::latest(), policy, cancel)
            .await
    }

    /// Poll the newest run accepted by `selector` until it completes.
    ///
    /// Runs the selector rejects are ignored, so a list holding only older
    /// runs is treated like an empty one.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip(self, token, cancel))]
    pub async fn poll_run(
        &self,
        owner: &str,
        repo: &str,
        workflow_id: u64,
        token: &str,
        selector: &RunSelector,
        policy: &PollPolicy,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<RunState> {
        let started = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            if *cancel.borrow() {
                return Err(ForgeError::Cancelled);
            }

            attempts += 1;
            let runs = self.list_runs(owner, repo, workflow_id, token).await?;
            match runs.iter().find(|run| selector.matches(run)) {
                Some(run) => {
                    let state = run.state();
                    info!(attempt = attempts, run_id = run.id, "{state}");
                    if state.is_terminal() {
                        return Ok(state);
                    }
                }
                None => info!(attempt = attempts, "no runs found yet, waiting"),
            }

            if policy.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(ForgeError::PollExhausted { attempts });
            }

            let mut wait = policy.interval;
            if let Some(deadline) = policy.deadline {
                let elapsed = started.elapsed();
                if elapsed >= deadline {
                    return Err(ForgeError::PollTimeout { elapsed });
                }
                wait = wait.min(deadline - elapsed);
            }

            pause(wait, cancel).await?;
        }
    }
}

/// Sleep for `wait`, returning early with [`ForgeError::Cancelled`] if the
/// signal turns `true`.
async fn pause(wait: Duration, cancel: &mut watch::Receiver<bool>) -> Result<()> {
    let sleep = tokio::time::sleep(wait);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return Ok(()),
            changed = cancel.changed() => match changed {
                Ok(()) if *cancel.borrow_and_update() => return Err(ForgeError::Cancelled),
                Ok(()) => continue,
                Err(_) => {
                    (&mut sleep).await;
                    return Ok(());
                }
            },
        }
    }
}
