//! GitOps Cockpit core library
//!
//! Turns generated text into project files and drives the local working copy
//! through the commit/pull/push protocol.

pub mod blocks;
pub mod completion;
pub mod config;
pub mod error;
pub mod files;
pub mod generate;
pub mod layout;
pub mod remote_url;
pub mod sync;
pub mod telemetry;
pub mod vcs;

pub use blocks::{extract_blocks, header_path, ExtractedBlocks, FileBlock};

pub use completion::{
    CannedCompletion, ChatCompletionClient, CompletionClient, CompletionConfig,
};

pub use config::{CockpitConfig, GitIdentity};

pub use error::{CockpitError, Result};

pub use files::{clear_matching, ensure_relative, find_matching, write_file};

pub use generate::{generate_batch, generate_terraform, GeneratedBatch};

pub use layout::{BlockDestination, ProjectLayout};

pub use remote_url::{clean_remote_url, parse_remote, redact, with_credentials, RemoteDescriptor};

pub use sync::{
    classify_rejection, init_and_link, switch_branch, RepositorySynchronizer, SyncOutcome,
    SyncReport, SyncRequest, SyncStage, ALL_FILES,
};

pub use telemetry::init_tracing;

pub use vcs::{is_git_repo, GitWorkingCopy, PushOutcome, VersionControl, ORIGIN};
