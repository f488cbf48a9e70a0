// src/scan/hive_ref.rs

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::errors::{HiveError, Result};
use crate::fs::FileSystem;

/// Placeholder registry prefix marking a project-local base image.
pub const HIVE_PREFIX: &str = "__hive__/";

/// `FROM [--flag=value ...] __hive__/<name>:<tag> [AS alias]`, any case.
static HIVE_FROM_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^FROM\s+(?:--\S+\s+)*__hive__/([^:\s]+):(\S+)")
        .expect("hive FROM pattern is a valid regex")
});

/// A reference to another image of the same project.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HiveRef {
    pub image_name: String,
    pub tag: String,
}

/// Extract every marker reference from Dockerfile text.
///
/// Lines are trimmed before matching; unrelated `FROM` lines are ignored.
pub fn parse_hive_refs(content: &str) -> Vec<HiveRef> {
    content
        .lines()
        .filter_map(|line| HIVE_FROM_PATTERN.captures(line.trim()))
        .map(|caps| HiveRef {
            image_name: caps[1].to_string(),
            tag: caps[2].to_string(),
        })
        .collect()
}

/// Read a Dockerfile and extract its marker references.
pub fn scan_dockerfile_for_hive_refs(fs: &dyn FileSystem, path: &Path) -> Result<Vec<HiveRef>> {
    let content = fs
        .read_to_string(path)
        .map_err(|e| HiveError::scan(format!("failed to read {}", path.display()), e))?;
    Ok(parse_hive_refs(&content))
}
