//! Provisioning tool execution.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{info, instrument, warn};

use crate::command::ProvisionCommand;
use crate::error::{InfraError, Result};

pub const DEFAULT_BINARY: &str = "terraform";

/// Captured result of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Full command line, e.g. `plan -var-file dev.tfvars`.
    pub command: String,
    /// Exit code (-1 when killed by a signal).
    pub exit_code: i32,
    /// stdout, a newline, then stderr, with colour codes removed.
    pub output: String,
    pub success: bool,
    pub duration_ms: u64,
}

fn ansi_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*m").expect("ansi pattern is a valid regex"))
}

/// Remove SGR colour sequences.
pub fn strip_ansi(text: &str) -> String {
    ansi_pattern().replace_all(text, "").into_owned()
}

/// Runs the provisioning tool inside one working directory.
#[derive(Debug, Clone)]
pub struct TerraformRunner {
    binary: String,
    working_dir: PathBuf,
    timeout: Option<Duration>,
}

impl TerraformRunner {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            working_dir: working_dir.into(),
            timeout: None,
        }
    }

    pub fn with_binary(mut self, binary: &str) -> Self {
        self.binary = binary.to_string();
        self
    }

    /// Kill any single invocation running longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Run `command`, preceded by `init` when the command needs it.
    ///
    /// A failing `init` aborts with its output. Any other non-zero exit is
    /// returned as a [`ToolOutput`] with `success == false`.
    #[instrument(skip(self), fields(command = %command))]
    pub async fn run(&self, command: &ProvisionCommand) -> Result<ToolOutput> {
        if command.requires_init() {
            let init = self.invoke(&ProvisionCommand::Init).await?;
            if !init.success {
                warn!(exit_code = init.exit_code, "init failed");
                return Err(InfraError::InitFailed {
                    output: init.output,
                });
            }
        }
        self.invoke(command).await
    }

    async fn invoke(&self, command: &ProvisionCommand) -> Result<ToolOutput> {
        let start = Instant::now();
        let args = command.args();
        let shown = args.join(" ");

        let child = Command::new(&self.binary)
            .args(&args)
            .current_dir(&self.working_dir)
            .env("TF_IN_AUTOMATION", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| InfraError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        let waited = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, child.wait_with_output())
                .await
                .map_err(|_| InfraError::Timeout {
                    command: shown.clone(),
                    timeout,
                })?,
            None => child.wait_with_output().await,
        };
        let output = waited.map_err(|source| InfraError::Spawn {
            binary: self.binary.clone(),
            source,
        })?;

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = output.status.code().unwrap_or(-1);
        let combined = format!(
            "{}\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );

        info!(command = %shown, exit_code, duration_ms, "provisioning command finished");
        Ok(ToolOutput {
            command: shown,
            exit_code,
            output: strip_ansi(&combined),
            success: output.status.success(),
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_colour_sequences() {
        let coloured = "\x1b[0m\x1b[1m\x1b[32mSuccess!\x1b[0m The configuration is valid.";
        assert_eq!(strip_ansi(coloured), "Success! The configuration is valid.");
    }

    #[test]
    fn leaves_plain_text_alone() {
        assert_eq!(strip_ansi("Plan: 1 to add"), "Plan: 1 to add");
    }

    #[tokio::test]
    async fn output_joins_stdout_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let runner = TerraformRunner::new(dir.path()).with_binary("echo");

        let out = runner.run(&ProvisionCommand::Validate).await.unwrap();

        assert!(out.success);
        assert_eq!(out.exit_code, 0);
        assert_eq!(out.command, "validate");
        assert_eq!(out.output, "validate\n\n");
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let runner = TerraformRunner::new(dir.path()).with_binary("definitely-not-a-provisioner");

        let err = runner.run(&ProvisionCommand::Fmt).await.unwrap_err();
        assert!(matches!(err, InfraError::Spawn { .. }));
    }
}
