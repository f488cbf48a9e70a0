// src/discovery/mod.rs

//! Project discovery.
//!
//! A blocking producer walks `<root>/images` and emits every directory that
//! holds an image definition. Consumers parse definitions concurrently (bounded
//! by a semaphore) and collect them into the [`Project`]. The first error
//! cancels the walk and any parse that has not started yet.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::CONFIG_FILE_NAME;
use crate::errors::{HiveError, Result};
use crate::model::{Image, Project};

pub mod test_config;
pub mod walker;

pub use test_config::{TEST_DEFINITION_FILE_NAMES, find_test_definition};
pub use walker::{IMAGE_DEFINITION_FILE_NAMES, walk_image_definitions};

/// Directory under the project root holding image definitions.
pub const IMAGES_DIR: &str = "images";

#[derive(Debug, Clone, Copy)]
pub struct DiscoveryOptions {
    /// Maximum number of definitions parsed at the same time.
    pub concurrency: usize,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self { concurrency: 8 }
    }
}

/// Discover the project rooted at `root`.
pub async fn discover_project(
    root: &Path,
    options: &DiscoveryOptions,
    cancel: CancellationToken,
) -> Result<Project> {
    verify_project_root(root)?;
    let root_dir = std::fs::canonicalize(root)?;

    let config_file_path = root_dir.join(CONFIG_FILE_NAME);
    if !config_file_path.is_file() {
        return Err(HiveError::ConfigError(format!(
            "no {CONFIG_FILE_NAME} found in project root {}",
            root_dir.display()
        )));
    }

    let images_root = root_dir.join(IMAGES_DIR);
    let images = discover_images(&images_root, options.concurrency, cancel.child_token()).await?;

    let mut project = Project {
        root_dir,
        config_file_path,
        ..Default::default()
    };
    for image in images {
        project.insert(image);
    }

    info!(
        root = %project.root_dir.display(),
        images = project.len(),
        "discovered project"
    );
    Ok(project)
}

fn verify_project_root(root: &Path) -> Result<()> {
    let metadata = std::fs::metadata(root).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            HiveError::ConfigError(format!("project root {} does not exist", root.display()))
        } else {
            HiveError::ConfigError(format!(
                "failed to determine project root {}: {e}",
                root.display()
            ))
        }
    })?;

    if !metadata.is_dir() {
        return Err(HiveError::ConfigError(format!(
            "project root {} is not a directory",
            root.display()
        )));
    }
    Ok(())
}

async fn discover_images(
    images_root: &Path,
    concurrency: usize,
    cancel: CancellationToken,
) -> Result<Vec<Image>> {
    if !images_root.is_dir() {
        return Err(HiveError::DiscoveryError(format!(
            "images directory {} does not exist",
            images_root.display()
        )));
    }

    let concurrency = concurrency.max(1);
    let (tx, mut rx) = mpsc::channel::<PathBuf>(concurrency * 2);

    let producer = {
        let images_root = images_root.to_path_buf();
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            walk_image_definitions(&images_root, &cancel, |path| tx.blocking_send(path).is_ok())
        })
    };

    let semaphore = Arc::new(Semaphore::new(concurrency));
    let found: Arc<Mutex<Vec<Image>>> = Arc::new(Mutex::new(Vec::new()));
    let mut consumers: JoinSet<Result<()>> = JoinSet::new();
    let mut first_error: Option<HiveError> = None;

    while let Some(definition) = rx.recv().await {
        let permit = tokio::select! {
            permit = Arc::clone(&semaphore).acquire_owned() => permit
                .map_err(|e| HiveError::DiscoveryError(format!("discovery semaphore closed: {e}")))?,
            _ = cancel.cancelled() => break,
        };

        debug!(definition = %definition.display(), "found image definition");

        let images_root = images_root.to_path_buf();
        let found = Arc::clone(&found);
        let cancel = cancel.clone();
        consumers.spawn_blocking(move || {
            let _permit = permit;
            if cancel.is_cancelled() {
                return Ok(());
            }
            match load_image(&images_root, &definition) {
                Ok(image) => {
                    found
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .push(image);
                    Ok(())
                }
                Err(e) => {
                    cancel.cancel();
                    Err(e)
                }
            }
        });

        while let Some(joined) = consumers.try_join_next() {
            record_first_error(&mut first_error, flatten(joined));
        }
    }
    drop(rx);

    while let Some(joined) = consumers.join_next().await {
        record_first_error(&mut first_error, flatten(joined));
    }

    let walked = producer
        .await
        .map_err(|e| HiveError::DiscoveryError(format!("directory walker failed: {e}")))
        .and_then(|r| r);
    record_first_error(&mut first_error, walked);

    if let Some(err) = first_error {
        return Err(err);
    }
    if cancel.is_cancelled() {
        return Err(HiveError::Cancelled);
    }

    let mut images = std::mem::take(&mut *found.lock().unwrap_or_else(|poisoned| poisoned.into_inner()));
    images.sort_by(|a, b| a.identifier.cmp(&b.identifier));
    Ok(images)
}

fn load_image(images_root: &Path, definition: &Path) -> Result<Image> {
    let mut image = Image::load(images_root, definition)?;
    image.test_definition_path = find_test_definition(&image.root_dir)?;
    Ok(image)
}

fn flatten(joined: std::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    joined
        .map_err(|e| HiveError::DiscoveryError(format!("image parser task failed: {e}")))
        .and_then(|r| r)
}

fn record_first_error(first: &mut Option<HiveError>, result: Result<()>) {
    if let Err(e) = result {
        if first.is_none() {
            *first = Some(e);
        } else {
            debug!(error = %e, "additional discovery error");
        }
    }
}
