//! Trigger → poll → merge.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::pipelines::{PollPolicy, RunSelector, RunState};
use crate::Forge;

/// What to run and, optionally, which pull request to merge on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRequest {
    pub owner: String,
    pub repo: String,
    pub workflow_id: u64,
    pub git_ref: String,
    pub merge_pr: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub run: RunState,
    pub merged: bool,
}

impl Forge {
    /// Dispatch the pipeline, wait for the run that dispatch created and merge
    /// the pull request when that run succeeded.
    ///
    /// Runs listed before the dispatch, and runs on other branches, are never
    /// taken as the result.
    #[instrument(
        skip(self, token, policy, cancel),
        fields(workflow = request.workflow_id, git_ref = %request.git_ref)
    )]
    pub async fn deliver(
        &self,
        request: &DeliveryRequest,
        token: &str,
        policy: &PollPolicy,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<DeliveryReport> {
        let DeliveryRequest {
            owner,
            repo,
            workflow_id,
            git_ref,
            merge_pr,
        } = request;

        let before = self
            .pipelines
            .list_runs(owner, repo, *workflow_id, token)
            .await?;
        self.pipelines
            .trigger(owner, repo, *workflow_id, git_ref, token)
            .await?;

        let selector = RunSelector::dispatched(git_ref, &before);
        let run = self
            .pipelines
            .poll_run(owner, repo, *workflow_id, token, &selector, policy, cancel)
            .await?;

        let merged = match merge_pr {
            Some(number) if run.is_success() => {
                self.pulls.merge(owner, repo, *number, token).await?
            }
            Some(number) => {
                warn!(pr = number, "{run}; not merging");
                false
            }
            None => false,
        };

        info!(merged, "delivery finished: {run}");
        Ok(DeliveryReport { run, merged })
    }
}
