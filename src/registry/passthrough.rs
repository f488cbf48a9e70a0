// src/registry/passthrough.rs

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::registry::oci_push::{PushTarget, push_oci_archive};
use crate::registry::{RegistryFuture, RegistryState, StagingRegistry};

/// Passthrough to a registry that already exists (e.g. in CI).
///
/// Start and stop do nothing but flip the reported state; the address is
/// fixed at construction.
#[derive(Debug)]
pub struct PassthroughRegistry {
    target: PushTarget,
    running: AtomicBool,
}

impl PassthroughRegistry {
    pub fn new(target: PushTarget) -> Self {
        Self {
            target,
            running: AtomicBool::new(false),
        }
    }
}

impl StagingRegistry for PassthroughRegistry {
    fn start(&self) -> RegistryFuture<'_, ()> {
        Box::pin(async move {
            self.running.store(true, Ordering::SeqCst);
            Ok(())
        })
    }

    fn stop(&self) -> RegistryFuture<'_, ()> {
        Box::pin(async move {
            self.running.store(false, Ordering::SeqCst);
            Ok(())
        })
    }

    fn address(&self) -> String {
        self.target.address.clone()
    }

    fn is_local(&self) -> bool {
        false
    }

    fn state(&self) -> RegistryState {
        if self.running.load(Ordering::SeqCst) {
            RegistryState::Running
        } else {
            RegistryState::Stopped
        }
    }

    fn push<'a>(
        &'a self,
        image_name: &'a str,
        tag: &'a str,
        oci_archive: &'a Path,
    ) -> RegistryFuture<'a, ()> {
        Box::pin(async move {
            debug!(image = %image_name, tag = %tag, address = %self.target.address, "pushing to remote registry");
            push_oci_archive(&self.target, image_name, tag, oci_archive).await
        })
    }
}
