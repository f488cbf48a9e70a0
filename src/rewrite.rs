// src/rewrite.rs

//! Resolution of `__hive__/` markers to staging-registry coordinates.
//!
//! This is plain text substitution: every occurrence of the marker is
//! replaced, wherever it appears, and nothing else is touched.

use std::io;
use std::path::Path;

use tracing::debug;

use crate::errors::{HiveError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::scan::HIVE_PREFIX;

/// Rewrite the Dockerfile at `source` into `dest` (which may be `source`).
pub fn rewrite_hive_refs(source: &Path, dest: &Path, registry_address: &str) -> Result<()> {
    rewrite_hive_refs_with(&RealFileSystem, source, dest, registry_address)
}

pub fn rewrite_hive_refs_with(
    fs: &dyn FileSystem,
    source: &Path,
    dest: &Path,
    registry_address: &str,
) -> Result<()> {
    let content = fs
        .read(source)
        .map_err(|e| with_path_context(e, "read", source))?;

    let replacement = format!("{}/", registry_address.trim_end_matches('/'));
    let (rewritten, count) = replace_marker(&content, HIVE_PREFIX.as_bytes(), replacement.as_bytes());

    debug!(
        source = %source.display(),
        dest = %dest.display(),
        address = %registry_address,
        replaced = count,
        "rewrote project-local image references"
    );

    fs.write(dest, &rewritten)
        .map_err(|e| with_path_context(e, "write", dest))?;
    Ok(())
}

fn with_path_context(err: io::Error, action: &str, path: &Path) -> HiveError {
    HiveError::IoError(io::Error::new(
        err.kind(),
        format!("failed to {action} {}: {err}", path.display()),
    ))
}

/// Byte-level replacement so that non-UTF-8 content survives untouched.
fn replace_marker(haystack: &[u8], marker: &[u8], replacement: &[u8]) -> (Vec<u8>, usize) {
    let mut out = Vec::with_capacity(haystack.len());
    let mut count = 0;
    let mut i = 0;

    while i < haystack.len() {
        if haystack[i..].starts_with(marker) {
            out.extend_from_slice(replacement);
            i += marker.len();
            count += 1;
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }

    (out, count)
}
