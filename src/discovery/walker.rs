// src/discovery/walker.rs

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use crate::errors::{HiveError, Result};

/// File names that mark a directory as an image definition.
pub const IMAGE_DEFINITION_FILE_NAMES: [&str; 2] = ["image.yml", "image.yaml"];

/// Directory name never descended into (image filesystem overlays).
const ROOTFS_DIR: &str = "rootfs";

/// Walk `images_root` and call `emit` with every image definition found.
///
/// Blocking; run it on a blocking thread. `rootfs` directories are skipped,
/// and the walk does not descend into a directory once it produced a
/// definition. Stops early when `cancel` fires or `emit` returns `false`.
pub fn walk_image_definitions(
    images_root: &Path,
    cancel: &CancellationToken,
    mut emit: impl FnMut(PathBuf) -> bool,
) -> Result<()> {
    let mut entries = WalkDir::new(images_root)
        .sort_by_file_name()
        .into_iter();

    while let Some(entry) = entries.next() {
        if cancel.is_cancelled() {
            return Ok(());
        }

        let entry = entry.map_err(|e| {
            HiveError::DiscoveryError(format!("failed to walk {}: {e}", images_root.display()))
        })?;

        if !entry.file_type().is_dir() {
            continue;
        }

        if entry.depth() > 0 && entry.file_name() == ROOTFS_DIR {
            entries.skip_current_dir();
            continue;
        }

        let definition = IMAGE_DEFINITION_FILE_NAMES
            .iter()
            .map(|name| entry.path().join(name))
            .find(|path| path.is_file());

        if let Some(definition) = definition {
            if !emit(definition) {
                return Ok(());
            }
            entries.skip_current_dir();
        }
    }

    Ok(())
}
