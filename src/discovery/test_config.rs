// src/discovery/test_config.rs

use std::path::{Path, PathBuf};

use crate::errors::{HiveError, Result};

/// Test definition names, in lookup order.
pub const TEST_DEFINITION_FILE_NAMES: [&str; 4] =
    ["test.yaml", "test.yml", "test.yml.gotpl", "test.yaml.gotpl"];

/// First test definition present in `image_dir`, if any.
pub fn find_test_definition(image_dir: &Path) -> Result<Option<PathBuf>> {
    for name in TEST_DEFINITION_FILE_NAMES {
        let path = image_dir.join(name);
        let exists = path.try_exists().map_err(|e| {
            HiveError::DiscoveryError(format!("failed to stat test definition {}: {e}", path.display()))
        })?;
        if exists {
            return Ok(Some(path));
        }
    }
    Ok(None)
}
