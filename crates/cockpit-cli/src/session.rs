//! State carried between `cockpit` invocations.
//!
//! Stored as JSON at `<base>/.cockpit/session.json`; the synchronizer's ignore
//! list keeps it out of commits.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use cockpit_core::ExtractedBlocks;
use cockpit_forge::PipelineDefinition;
use serde::{Deserialize, Serialize};

pub const SESSION_DIR: &str = ".cockpit";
pub const SESSION_FILE: &str = "session.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Branch used by the last successful push.
    pub branch: Option<String>,
    /// Remote URL as entered, without credentials.
    pub remote_url: Option<String>,
    /// Raw text of the last pipeline generation.
    pub last_response: Option<String>,
    /// Generated files awaiting review and save, in generation order.
    pub pending_blocks: ExtractedBlocks,
    /// Pipeline definitions from the last listing.
    pub definitions: Vec<PipelineDefinition>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SessionContext {
    pub fn path(base_dir: &Path) -> PathBuf {
        base_dir.join(SESSION_DIR).join(SESSION_FILE)
    }

    /// Load the session for `base_dir`, or an empty one if none was saved yet.
    pub fn load(base_dir: &Path) -> Result<Self> {
        let path = Self::path(base_dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read session file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Corrupt session file {}", path.display()))
    }

    pub fn save(&mut self, base_dir: &Path) -> Result<()> {
        let path = Self::path(base_dir);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        self.updated_at = Some(Utc::now());
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write session file {}", path.display()))
    }

    /// Replace the pending blocks with a fresh generation.
    pub fn stage_generation(&mut self, raw: String, blocks: ExtractedBlocks) {
        self.last_response = Some(raw);
        self.pending_blocks = blocks;
    }

    /// Resolve a workflow given as numeric id or as a listed name.
    pub fn resolve_workflow(&self, selector: &str) -> Option<u64> {
        if let Ok(id) = selector.parse::<u64>() {
            return Some(id);
        }
        self.definitions
            .iter()
            .find(|d| d.name == selector)
            .map(|d| d.id)
    }
}
