//! On-disk project layout.
//!
//! ```text
//! <base>/
//!   terraform/             .tf / .tfvars
//!   pipelines/github/      generated workflow definitions (*.yml)
//!   .github/workflows/     deployed copies picked up by the hosting platform
//!   .gitignore
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{CockpitError, Result};
use crate::files::{find_matching, write_file};

pub const TERRAFORM_DIR: &str = "terraform";
pub const PIPELINES_DIR: &str = "pipelines/github";
pub const WORKFLOWS_DIR: &str = ".github/workflows";

/// Glob for stale infrastructure files removed before a fresh generation.
pub const TERRAFORM_CLEAR_PATTERN: &str = "**/*.tf*";

/// Resolved directories for one working copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    base_dir: PathBuf,
}

/// Where a saved block lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockDestination {
    Terraform,
    Pipelines,
}

impl BlockDestination {
    /// Infrastructure files go under `terraform/`, everything else is a pipeline.
    pub fn for_path(path: &str) -> Self {
        let lower = path.to_ascii_lowercase();
        if lower.ends_with(".tf") || lower.ends_with(".tfvars") {
            BlockDestination::Terraform
        } else {
            BlockDestination::Pipelines
        }
    }
}

impl ProjectLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn terraform_dir(&self) -> PathBuf {
        self.base_dir.join(TERRAFORM_DIR)
    }

    pub fn pipelines_dir(&self) -> PathBuf {
        self.base_dir.join(PIPELINES_DIR)
    }

    pub fn workflows_dir(&self) -> PathBuf {
        self.base_dir.join(WORKFLOWS_DIR)
    }

    /// Create the terraform and pipeline directories if missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.terraform_dir(), self.pipelines_dir()] {
            fs::create_dir_all(&dir).map_err(|e| CockpitError::io(&dir, e))?;
        }
        Ok(())
    }

    pub fn destination_dir(&self, destination: BlockDestination) -> PathBuf {
        match destination {
            BlockDestination::Terraform => self.terraform_dir(),
            BlockDestination::Pipelines => self.pipelines_dir(),
        }
    }

    /// Save one edited block to the directory matching its extension.
    pub fn save_block(&self, path: &str, content: &str) -> Result<PathBuf> {
        let root = self.destination_dir(BlockDestination::for_path(path));
        write_file(&root, path, content)
    }

    /// `.tfvars` file names directly under `terraform/`, for `plan -var-file`.
    pub fn var_files(&self) -> Result<Vec<String>> {
        let root = self.terraform_dir();
        if !root.exists() {
            return Ok(Vec::new());
        }
        Ok(find_matching(&root, "*.tfvars")?
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect())
    }

    /// Generated files that can be selected for a commit, relative to the base
    /// directory with `/` separators.
    pub fn commit_candidates(&self) -> Result<Vec<String>> {
        let mut candidates = Vec::new();
        for (root, pattern) in [
            (self.terraform_dir(), "**/*.tf"),
            (self.pipelines_dir(), "**/*.yml"),
        ] {
            if !root.exists() {
                continue;
            }
            for path in find_matching(&root, pattern)? {
                if let Ok(rel) = path.strip_prefix(&self.base_dir) {
                    candidates.push(relative_display(rel));
                }
            }
        }
        Ok(candidates)
    }

    /// Copy every `pipelines/github/*.yml` into `.github/workflows/`.
    ///
    /// Returns the destination paths; an empty result means there was nothing
    /// to deploy.
    pub fn deploy_workflows(&self) -> Result<Vec<PathBuf>> {
        let source = self.pipelines_dir();
        if !source.exists() {
            return Ok(Vec::new());
        }
        let definitions = find_matching(&source, "*.yml")?;
        if definitions.is_empty() {
            return Ok(Vec::new());
        }

        let target = self.workflows_dir();
        fs::create_dir_all(&target).map_err(|e| CockpitError::io(&target, e))?;

        let mut copied = Vec::with_capacity(definitions.len());
        for file in definitions {
            let Some(name) = file.file_name() else {
                continue;
            };
            let dest = target.join(name);
            fs::copy(&file, &dest).map_err(|e| CockpitError::io(&dest, e))?;
            copied.push(dest);
        }
        info!(count = copied.len(), "deployed workflow definitions");
        Ok(copied)
    }
}

fn relative_display(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn destination_follows_extension() {
        assert_eq!(BlockDestination::for_path("main.tf"), BlockDestination::Terraform);
        assert_eq!(BlockDestination::for_path("prod.TFVARS"), BlockDestination::Terraform);
        assert_eq!(BlockDestination::for_path("ci.yml"), BlockDestination::Pipelines);
        assert_eq!(BlockDestination::for_path("ci.yaml"), BlockDestination::Pipelines);
    }

    #[test]
    fn save_block_routes_files() {
        let dir = tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());

        let tf = layout.save_block("main.tf", "locals {}").unwrap();
        let yml = layout.save_block("deploy.yml", "name: deploy").unwrap();

        assert_eq!(tf, dir.path().join("terraform/main.tf"));
        assert_eq!(yml, dir.path().join("pipelines/github/deploy.yml"));
    }

    #[test]
    fn var_files_lists_top_level_tfvars() {
        let dir = tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        layout.save_block("dev.tfvars", "a = 1").unwrap();
        layout.save_block("main.tf", "locals {}").unwrap();

        assert_eq!(layout.var_files().unwrap(), vec!["dev.tfvars".to_string()]);
    }

    #[test]
    fn commit_candidates_are_relative() {
        let dir = tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        layout.save_block("modules/vpc/main.tf", "locals {}").unwrap();
        layout.save_block("ci.yml", "name: ci").unwrap();
        layout.save_block("dev.tfvars", "a = 1").unwrap();

        let candidates = layout.commit_candidates().unwrap();
        assert_eq!(
            candidates,
            vec![
                "terraform/modules/vpc/main.tf".to_string(),
                "pipelines/github/ci.yml".to_string(),
            ]
        );
    }

    #[test]
    fn deploy_workflows_copies_yml() {
        let dir = tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        layout.save_block("ci.yml", "name: ci").unwrap();
        layout.save_block("release.yml", "name: release").unwrap();

        let copied = layout.deploy_workflows().unwrap();

        assert_eq!(copied.len(), 2);
        assert_eq!(
            fs::read_to_string(dir.path().join(".github/workflows/ci.yml")).unwrap(),
            "name: ci"
        );
    }

    #[test]
    fn deploy_workflows_without_definitions_is_empty() {
        let dir = tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        layout.ensure_dirs().unwrap();

        assert!(layout.deploy_workflows().unwrap().is_empty());
        assert!(!layout.workflows_dir().exists());
    }
}
