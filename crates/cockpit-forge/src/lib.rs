//! Hosting platform access for GitOps Cockpit
//!
//! - [`PullRequestGateway`]: open and merge pull requests
//! - [`PipelineController`]: list, dispatch and poll pipeline runs
//! - [`Forge::deliver`]: dispatch, wait, merge on success
//!
//! Everything goes through a [`RestTransport`], so tests swap in
//! [`fakes::ScriptedTransport`].

pub mod delivery;
pub mod error;
pub mod fakes;
pub mod pipelines;
pub mod pulls;
pub mod transport;

use std::sync::Arc;

pub use delivery::{DeliveryReport, DeliveryRequest};
pub use error::{ForgeError, Result};
pub use pipelines::{
    uncancellable, PipelineController, PipelineDefinition, PipelineRun, PollPolicy,
    RunConclusion, RunSelector, RunState, RunStatus, DEFAULT_POLL_INTERVAL,
};
pub use pulls::{PullRequestDraft, PullRequestGateway};
pub use transport::{
    ApiRequest, ApiResponse, HttpTransport, Method, RestTransport, DEFAULT_API_URL,
};

/// Both gateways sharing one transport.
#[derive(Clone)]
pub struct Forge {
    pub pulls: PullRequestGateway,
    pub pipelines: PipelineController,
}

impl Forge {
    pub fn new(transport: Arc<dyn RestTransport>) -> Self {
        Self {
            pulls: PullRequestGateway::new(transport.clone()),
            pipelines: PipelineController::new(transport),
        }
    }

    /// Forge talking HTTPS to `base_url`.
    pub fn connect(base_url: &str) -> Result<Self> {
        Ok(Self::new(Arc::new(HttpTransport::new(base_url)?)))
    }
}
