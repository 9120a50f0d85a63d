//! Block extraction from generated text.
//!
//! A language-model response typically interleaves filename lines with the
//! contents of those files, decorated with markdown fences and emphasis:
//!
//! ````text
//! **main.tf**
//! ```hcl
//! resource "aws_s3_bucket" "logs" {}
//! ```
//! ````
//!
//! [`extract_blocks`] splits such a response into a mapping of relative path to
//! file body. Filename detection is a whole-line heuristic: a line counts as a
//! header only when, stripped of emphasis markers, it is nothing but a path
//! ending in `.tf`, `.tfvars`, `.yml` or `.yaml`.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

const FENCE: &str = "```";
const COMMENT: char = '#';

/// A single recovered file: relative path plus trimmed body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBlock {
    pub path: String,
    pub body: String,
}

/// Path-to-body mapping produced by one extraction, in first-seen order.
///
/// Re-inserting a path replaces its body but keeps its original position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractedBlocks {
    blocks: Vec<FileBlock>,
}

impl ExtractedBlocks {
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    fn position(&self, path: &str) -> Option<usize> {
        self.blocks.iter().position(|b| b.path == path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.position(path).is_some()
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.position(path).map(|i| self.blocks[i].body.as_str())
    }

    pub fn insert(&mut self, path: &str, body: String) {
        match self.position(path) {
            Some(i) => self.blocks[i].body = body,
            None => self.blocks.push(FileBlock {
                path: path.to_string(),
                body,
            }),
        }
    }

    /// Remove `path`, keeping the order of the remaining blocks.
    pub fn remove(&mut self, path: &str) -> Option<String> {
        self.position(path).map(|i| self.blocks.remove(i).body)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().map(|b| b.path.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.blocks.iter().map(|b| (b.path.as_str(), b.body.as_str()))
    }

    pub fn into_blocks(self) -> Vec<FileBlock> {
        self.blocks
    }

    /// Render back into the minimal header-plus-body text shape that
    /// [`extract_blocks`] understands.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for block in &self.blocks {
            out.push_str(&block.path);
            out.push('\n');
            out.push_str(&block.body);
            out.push_str("\n\n");
        }
        out
    }

    fn flush(&mut self, path: &str, buffer: &mut Vec<&str>) {
        if buffer.is_empty() {
            return;
        }
        let body = buffer.join("\n").trim().to_string();
        self.insert(path, body);
        buffer.clear();
    }
}

fn header_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^\**\s*([a-z0-9_\-/.]+\.(?:tfvars|tf|ya?ml))\s*\**$")
            .expect("header pattern is a valid regex")
    })
}

/// Return the captured path when `line` (already trimmed) is a filename header.
pub fn header_path(line: &str) -> Option<&str> {
    header_pattern()
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn is_decoration(trimmed: &str) -> bool {
    trimmed.is_empty() || trimmed.starts_with(COMMENT) || trimmed.starts_with(FENCE)
}

/// Split one generated document into per-file bodies.
///
/// Blank lines, `#` comment lines and code-fence lines are dropped. Every
/// content line is stripped of surrounding whitespace, so indentation does not
/// survive extraction. A header
/// followed directly by another header yields no entry, and a path seen twice
/// keeps only its last body.
pub fn extract_blocks(raw: &str) -> ExtractedBlocks {
    let mut extracted = ExtractedBlocks::default();
    let mut current: Option<&str> = None;
    let mut buffer: Vec<&str> = Vec::new();

    for line in raw.lines() {
        let trimmed = line.trim();
        if is_decoration(trimmed) {
            continue;
        }

        if let Some(path) = header_path(trimmed) {
            if let Some(active) = current {
                extracted.flush(active, &mut buffer);
            }
            buffer.clear();
            current = Some(path);
            continue;
        }

        if current.is_some() {
            buffer.push(trimmed);
        }
    }

    if let Some(active) = current {
        extracted.flush(active, &mut buffer);
    }

    extracted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_plain_and_emphasised_headers() {
        assert_eq!(header_path("main.tf"), Some("main.tf"));
        assert_eq!(header_path("**variables.tf**"), Some("variables.tf"));
        assert_eq!(header_path("** envs/prod.tfvars **"), Some("envs/prod.tfvars"));
        assert_eq!(header_path("*ci.YAML*"), Some("ci.YAML"));
        assert_eq!(
            header_path(".github/workflows/deploy.yml"),
            Some(".github/workflows/deploy.yml")
        );
    }

    #[test]
    fn rejects_sentences_mentioning_files() {
        assert_eq!(header_path("Create main.tf with the following"), None);
        assert_eq!(header_path("main.tf:"), None);
        assert_eq!(header_path("main.json"), None);
        assert_eq!(header_path("`main.tf`"), None);
    }

    #[test]
    fn extracts_fenced_blocks() {
        let raw = "Here you go.\n\n**main.tf**\n```hcl\nresource \"null_resource\" \"x\" {}\n```\n\n**outputs.tf**\n```hcl\noutput \"id\" {\n  value = null_resource.x.id\n}\n```\n";
        let blocks = extract_blocks(raw);

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks.get("main.tf"), Some("resource \"null_resource\" \"x\" {}"));
        assert_eq!(
            blocks.get("outputs.tf"),
            Some("output \"id\" {\nvalue = null_resource.x.id\n}")
        );
    }

    #[test]
    fn preamble_before_first_header_is_discarded() {
        let blocks =
            extract_blocks("Sure! Below are the files.\nvariable \"x\" {}\nmain.tf\nlocals {}\n");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks.get("main.tf"), Some("locals {}"));
    }

    #[test]
    fn content_lines_are_stripped() {
        let raw = "ci.yml\n```yaml\nname: ci\non:\n  push:\n    branches: [main]\n```\n";
        let blocks = extract_blocks(raw);
        assert_eq!(blocks.get("ci.yml"), Some("name: ci\non:\npush:\nbranches: [main]"));

        let blocks = extract_blocks("main.tf\nresource {\n    x = 1\n}\n");
        assert_eq!(blocks.get("main.tf"), Some("resource {\nx = 1\n}"));
    }

    #[test]
    fn comment_lines_are_dropped_from_bodies() {
        let raw = "main.tf\n# provider setup\nprovider \"aws\" {}\n  # indented comment\n";
        let blocks = extract_blocks(raw);
        assert_eq!(blocks.get("main.tf"), Some("provider \"aws\" {}"));
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(extract_blocks("").is_empty());
        assert!(extract_blocks("\n\n```\n```\n").is_empty());
    }

    #[test]
    fn blocks_keep_first_seen_order() {
        let blocks = extract_blocks("z.tf\nz\na.tf\n  indented\n");
        assert_eq!(blocks.paths().collect::<Vec<_>>(), vec!["z.tf", "a.tf"]);
        assert_eq!(blocks.get("a.tf"), Some("indented"));
    }

    #[test]
    fn repeated_path_keeps_its_first_position() {
        let blocks = extract_blocks("b.tf\nold\na.tf\na\nb.tf\nnew\n").into_blocks();
        let pairs: Vec<_> = blocks.iter().map(|b| (b.path.as_str(), b.body.as_str())).collect();
        assert_eq!(pairs, vec![("b.tf", "new"), ("a.tf", "a")]);
    }

    #[test]
    fn remove_keeps_remaining_order() {
        let mut blocks = extract_blocks("c.tf\nc\nb.tf\nb\na.tf\na\n");
        assert_eq!(blocks.remove("b.tf").as_deref(), Some("b"));
        assert_eq!(blocks.remove("b.tf"), None);
        assert_eq!(blocks.paths().collect::<Vec<_>>(), vec!["c.tf", "a.tf"]);
    }
}
