// src/exec/backend.rs

//! Pluggable image builder abstraction.
//!
//! The scheduler talks to an `ImageBuilder` instead of spawning processes
//! itself, so tests can swap in a builder that only records calls and writes
//! a placeholder archive.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use crate::errors::Result;

/// BuildKit frontend used for every build.
pub const DOCKERFILE_FRONTEND: &str = "dockerfile.v0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    /// Directory sent to the builder as the build context.
    pub root_dir: PathBuf,
    /// Dockerfile to build, with project-local references already resolved.
    pub dockerfile: PathBuf,
    pub frontend: String,
}

impl BuildContext {
    pub fn dockerfile(root_dir: impl Into<PathBuf>, dockerfile: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            dockerfile: dockerfile.into(),
            frontend: DOCKERFILE_FRONTEND.to_string(),
        }
    }
}

/// One build of one tag of one image.
#[derive(Clone)]
pub struct BuildRequest {
    pub image: String,
    pub tag: String,
    pub context: BuildContext,
    pub build_args: BTreeMap<String, String>,
    /// Secret id to resolved value.
    pub secrets: BTreeMap<String, String>,
    /// Where the OCI layout archive is written.
    pub output: PathBuf,
}

impl fmt::Debug for BuildRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildRequest")
            .field("image", &self.image)
            .field("tag", &self.tag)
            .field("context", &self.context)
            .field("build_args", &self.build_args)
            .field("secrets", &self.secrets.keys().collect::<Vec<_>>())
            .field("output", &self.output)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    /// OCI layout archive produced by the build.
    pub archive: PathBuf,
}

pub type BuildFuture<'a> = Pin<Box<dyn Future<Output = Result<BuildOutput>> + Send + 'a>>;

/// Trait abstracting how an image is built.
///
/// Implementations must be callable concurrently from several workers.
pub trait ImageBuilder: Send + Sync {
    fn build(&self, request: BuildRequest) -> BuildFuture<'_>;
}
