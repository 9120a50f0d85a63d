//! Error types for provisioning tool runs

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InfraError {
    #[error("failed to launch {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("init failed:\n{output}")]
    InitFailed { output: String },
}

pub type Result<T> = std::result::Result<T, InfraError>;
