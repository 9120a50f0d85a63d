//! Provisioning commands.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One provisioning tool subcommand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "command")]
pub enum ProvisionCommand {
    Init,
    Fmt,
    Validate,
    Plan { var_file: Option<String> },
    Apply { var_file: Option<String> },
    Destroy { var_file: Option<String> },
}

impl ProvisionCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ProvisionCommand::Init => "init",
            ProvisionCommand::Fmt => "fmt",
            ProvisionCommand::Validate => "validate",
            ProvisionCommand::Plan { .. } => "plan",
            ProvisionCommand::Apply { .. } => "apply",
            ProvisionCommand::Destroy { .. } => "destroy",
        }
    }

    /// Arguments passed to the tool binary.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![self.name().to_string()];
        match self {
            ProvisionCommand::Plan { var_file }
            | ProvisionCommand::Apply { var_file }
            | ProvisionCommand::Destroy { var_file } => {
                if let Some(file) = var_file.as_deref().filter(|f| !f.trim().is_empty()) {
                    args.push("-var-file".to_string());
                    args.push(file.to_string());
                }
            }
            _ => {}
        }
        if matches!(
            self,
            ProvisionCommand::Apply { .. } | ProvisionCommand::Destroy { .. }
        ) {
            args.push("-auto-approve".to_string());
        }
        args
    }

    /// Commands touching providers or state need an initialised directory.
    pub fn requires_init(&self) -> bool {
        matches!(
            self,
            ProvisionCommand::Plan { .. }
                | ProvisionCommand::Apply { .. }
                | ProvisionCommand::Destroy { .. }
        )
    }
}

impl fmt::Display for ProvisionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.args().join(" "))
    }
}
