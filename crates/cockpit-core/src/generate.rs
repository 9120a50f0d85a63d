//! Prompt-to-files workflows.

use std::path::PathBuf;

use tracing::{info, instrument, warn};

use crate::blocks::{extract_blocks, ExtractedBlocks};
use crate::completion::CompletionClient;
use crate::error::Result;
use crate::files::{clear_matching, ensure_relative, write_file};
use crate::layout::{ProjectLayout, TERRAFORM_CLEAR_PATTERN};

/// Raw response plus the blocks recovered from it.
#[derive(Debug, Clone)]
pub struct GeneratedBatch {
    pub raw: String,
    pub blocks: ExtractedBlocks,
}

/// Ask for pipeline (or variable) files and keep them in memory for review.
#[instrument(skip(client, prompt))]
pub async fn generate_batch(client: &dyn CompletionClient, prompt: &str) -> Result<GeneratedBatch> {
    let raw = client.complete(prompt).await?;
    let blocks = extract_blocks(&raw);
    if blocks.is_empty() {
        warn!("response contained no recognisable file headers");
    }
    Ok(GeneratedBatch { raw, blocks })
}

/// Generate infrastructure code and replace the contents of `terraform/`.
///
/// Stale `.tf*` files are removed only after the completion succeeded and
/// every block path was checked, so a failed request or a path escaping
/// `terraform/` leaves the previous generation untouched.
#[instrument(skip(client, layout, prompt))]
pub async fn generate_terraform(
    client: &dyn CompletionClient,
    layout: &ProjectLayout,
    prompt: &str,
) -> Result<Vec<PathBuf>> {
    let batch = generate_batch(client, prompt).await?;
    let root = layout.terraform_dir();
    for path in batch.blocks.paths() {
        ensure_relative(path)?;
    }

    let removed = clear_matching(&root, TERRAFORM_CLEAR_PATTERN)?;
    if !removed.is_empty() {
        info!(count = removed.len(), "cleared previous terraform files");
    }

    let mut written = Vec::with_capacity(batch.blocks.len());
    for (path, body) in batch.blocks.iter() {
        written.push(write_file(&root, path, body)?);
    }
    info!(count = written.len(), "wrote terraform files");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CannedCompletion;
    use crate::error::CockpitError;
    use tempfile::tempdir;

    #[tokio::test]
    async fn terraform_generation_replaces_previous_files() {
        let dir = tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        layout.save_block("old.tf", "locals {}").unwrap();
        layout.save_block("old.tfvars", "a = 1").unwrap();

        let client = CannedCompletion::new(vec![
            "**main.tf**\n```hcl\nresource \"null_resource\" \"a\" {}\n```\n**dev.tfvars**\n```\nregion = \"eu-west-1\"\n```".to_string(),
        ]);

        let written = generate_terraform(&client, &layout, "make a resource").await.unwrap();

        assert_eq!(written.len(), 2);
        let tf = layout.terraform_dir();
        assert!(!tf.join("old.tf").exists());
        assert!(!tf.join("old.tfvars").exists());
        assert_eq!(
            std::fs::read_to_string(tf.join("main.tf")).unwrap(),
            "resource \"null_resource\" \"a\" {}"
        );
        assert_eq!(client.prompts(), vec!["make a resource"]);
    }

    #[tokio::test]
    async fn failed_completion_keeps_previous_files() {
        let dir = tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path());
        layout.save_block("old.tf", "locals {}").unwrap();

        let client = CannedCompletion::new(vec![]);
        assert!(generate_terraform(&client, &layout, "p").await.is_err());
        assert!(layout.terraform_dir().join("old.tf").exists());
    }

    #[tokio::test]
    async fn traversal_header_aborts_before_clearing() {
        let dir = tempdir().unwrap();
        let layout = ProjectLayout::new(dir.path().join("work"));
        layout.save_block("old.tf", "locals {}").unwrap();

        let client = CannedCompletion::new(vec![
            "**main.tf**\nlocals {}\n**../../evil.tf**\nresource \"x\" \"y\" {}".to_string(),
        ]);
        let err = generate_terraform(&client, &layout, "p").await.unwrap_err();

        assert!(matches!(err, CockpitError::Config(_)));
        assert!(!dir.path().join("evil.tf").exists());
        assert!(layout.terraform_dir().join("old.tf").exists());
        assert!(!layout.terraform_dir().join("main.tf").exists());
    }

    #[tokio::test]
    async fn batch_keeps_raw_response() {
        let client = CannedCompletion::new(vec!["ci.yml\nname: ci".to_string()]);
        let batch = generate_batch(&client, "pipeline").await.unwrap();
        assert_eq!(batch.raw, "ci.yml\nname: ci");
        assert_eq!(batch.blocks.get("ci.yml"), Some("name: ci"));
    }
}
