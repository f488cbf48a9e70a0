// src/scan/rendered.rs

//! Walk of the rendered project tree.
//!
//! Layout: `<dist>/<imageName>/<tagOrVariant>/Dockerfile[.gotpl]`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::dag::DependencyGraph;
use crate::errors::{HiveError, Result};
use crate::fs::FileSystem;
use crate::scan::hive_ref::scan_dockerfile_for_hive_refs;

/// Dockerfile names recognised inside a tag directory, in build preference order.
pub const DOCKERFILE_NAMES: [&str; 2] = ["Dockerfile", "Dockerfile.gotpl"];

/// One buildable tag or variant of a rendered image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTag {
    pub tag: String,
    pub dir: PathBuf,
    pub dockerfile: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct RenderedImage {
    pub name: String,
    pub dir: PathBuf,
    pub tags: Vec<RenderedTag>,
}

/// Result of walking a rendered dist directory.
#[derive(Debug, Clone, Default)]
pub struct RenderedProject {
    pub dist: PathBuf,
    pub graph: DependencyGraph,
    /// Build units keyed by image name.
    pub images: BTreeMap<String, RenderedImage>,
}

impl RenderedProject {
    pub fn image(&self, name: &str) -> Option<&RenderedImage> {
        self.images.get(name)
    }

    /// Graph nodes that were referenced but have no directory under `dist`.
    pub fn missing_images(&self) -> Vec<String> {
        self.graph
            .images()
            .filter(|id| !self.images.contains_key(*id))
            .map(|id| id.to_string())
            .collect()
    }
}

/// Build the dependency graph of a rendered project.
///
/// Every top-level directory is an image. Each `__hive__/` reference found in
/// one of its tag directories adds an edge from the owning image to the
/// referenced image name; the referenced tag does not matter for ordering.
pub fn scan_rendered_project(fs: &dyn FileSystem, dist: &Path) -> Result<DependencyGraph> {
    Ok(scan_rendered_layout(fs, dist)?.graph)
}

/// Same walk as [`scan_rendered_project`], also keeping the per-tag build units.
pub fn scan_rendered_layout(fs: &dyn FileSystem, dist: &Path) -> Result<RenderedProject> {
    let entries = fs
        .read_dir(dist)
        .map_err(|e| HiveError::scan(format!("failed to read dist directory {}", dist.display()), e))?;

    let image_dirs: Vec<PathBuf> = entries.into_iter().filter(|p| fs.is_dir(p)).collect();

    let mut project = RenderedProject {
        dist: dist.to_path_buf(),
        ..Default::default()
    };

    // Register all images first so that node order follows the directory
    // listing rather than reference order.
    for dir in &image_dirs {
        if let Some(name) = dir_name(dir) {
            project.graph.add_image(&name);
        }
    }

    for image_dir in image_dirs {
        let Some(image_name) = dir_name(&image_dir) else {
            continue;
        };

        let tag_entries = fs.read_dir(&image_dir).map_err(|e| {
            HiveError::scan(format!("failed to read image directory {image_name}"), e)
        })?;

        let mut image = RenderedImage {
            name: image_name.clone(),
            dir: image_dir.clone(),
            tags: Vec::new(),
        };

        for tag_dir in tag_entries.into_iter().filter(|p| fs.is_dir(p)) {
            let Some(tag) = dir_name(&tag_dir) else {
                continue;
            };

            let mut build_dockerfile = None;
            for df_name in DOCKERFILE_NAMES {
                let df_path = tag_dir.join(df_name);
                if !fs.is_file(&df_path) {
                    continue;
                }

                for hive_ref in scan_dockerfile_for_hive_refs(fs, &df_path)? {
                    debug!(
                        image = %image_name,
                        tag = %tag,
                        dependency = %hive_ref.image_name,
                        dependency_tag = %hive_ref.tag,
                        "found project-local base image reference"
                    );
                    project.graph.add_dependency(&image_name, &hive_ref.image_name);
                }

                build_dockerfile.get_or_insert(df_path);
            }

            match build_dockerfile {
                Some(dockerfile) => image.tags.push(RenderedTag {
                    tag,
                    dir: tag_dir,
                    dockerfile,
                }),
                None => warn!(image = %image_name, tag = %tag, "tag directory has no Dockerfile; ignoring"),
            }
        }

        project.images.insert(image_name, image);
    }

    Ok(project)
}

fn dir_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.to_string())
}
