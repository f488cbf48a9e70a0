// src/registry/mod.rs

//! Staging registry used to hand freshly built images to dependent builds.
//!
//! - [`embedded`] supervises a local, ephemeral registry process.
//! - [`passthrough`] wraps an externally reachable registry (CI).
//! - [`oci_push`] uploads an OCI-layout archive produced by the builder.
//! - [`selection`] decides which of the two a run uses.
//!
//! The runtime only talks to the [`StagingRegistry`] trait, which makes it
//! easy to swap in a fake registry in tests.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{info, warn};

use crate::errors::Result;

pub mod embedded;
pub mod oci_push;
pub mod passthrough;
pub mod selection;

pub use embedded::EmbeddedRegistry;
pub use oci_push::{PushTarget, push_oci_archive};
pub use passthrough::PassthroughRegistry;
pub use selection::{CiSignals, DEFAULT_REMOTE_REGISTRY, new_registry, select_registry};

/// Boxed future returned by [`StagingRegistry`] operations.
pub type RegistryFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Lifecycle state of a registry handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    Stopped,
    Running,
}

/// Capability contract of a staging registry.
///
/// `push` may be called concurrently; every call targets its own
/// `<address>/<image>:<tag>` coordinate.
pub trait StagingRegistry: Send + Sync {
    fn start(&self) -> RegistryFuture<'_, ()>;

    fn stop(&self) -> RegistryFuture<'_, ()>;

    /// `host[:port][/path]` prefix images are pushed under.
    ///
    /// Empty for an embedded registry that is not running.
    fn address(&self) -> String;

    fn is_local(&self) -> bool;

    fn state(&self) -> RegistryState;

    /// Upload the OCI-layout archive at `oci_archive` as `<address>/<image_name>:<tag>`.
    fn push<'a>(
        &'a self,
        image_name: &'a str,
        tag: &'a str,
        oci_archive: &'a Path,
    ) -> RegistryFuture<'a, ()>;
}

/// Run `f` with a started registry and stop it afterwards, whatever `f` returned.
///
/// A stop failure is reported only when `f` itself succeeded; otherwise it
/// is logged and the original error wins.
pub async fn run_scoped<T, F, Fut>(registry: Arc<dyn StagingRegistry>, f: F) -> Result<T>
where
    F: FnOnce(Arc<dyn StagingRegistry>) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    registry.start().await?;
    info!(
        address = %registry.address(),
        local = registry.is_local(),
        "staging registry ready"
    );

    let outcome = f(Arc::clone(&registry)).await;
    let stopped = registry.stop().await;

    match (outcome, stopped) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(stop_err)) => Err(stop_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(stop_err)) => {
            warn!(error = %stop_err, "failed to stop staging registry after failed run");
            Err(err)
        }
    }
}
