//! Provisioning tool invocation for GitOps Cockpit
//!
//! Runs `terraform` subcommands in the generated `terraform/` directory and
//! returns their combined, colour-free output.

pub mod command;
pub mod error;
pub mod runner;

pub use command::ProvisionCommand;
pub use error::{InfraError, Result};
pub use runner::{strip_ansi, TerraformRunner, ToolOutput, DEFAULT_BINARY};
