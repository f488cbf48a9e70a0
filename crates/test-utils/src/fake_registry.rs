use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

use containerhive::errors::HiveError;
use containerhive::registry::{RegistryFuture, RegistryState, StagingRegistry};

use crate::events::{Event, EventLog};

/// In-memory staging registry recording pushes in the shared event log.
#[derive(Debug)]
pub struct FakeRegistry {
    address: String,
    log: EventLog,
    state: Mutex<RegistryState>,
    failing_pushes: HashSet<String>,
    fail_stop: bool,
}

impl FakeRegistry {
    pub fn new(address: &str, log: EventLog) -> Self {
        Self {
            address: address.to_string(),
            log,
            state: Mutex::new(RegistryState::Stopped),
            failing_pushes: HashSet::new(),
            fail_stop: false,
        }
    }

    pub fn failing_push_for(mut self, image: &str) -> Self {
        self.failing_pushes.insert(image.to_string());
        self
    }

    pub fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }
}

impl StagingRegistry for FakeRegistry {
    fn start(&self) -> RegistryFuture<'_, ()> {
        Box::pin(async move {
            *self.state.lock().unwrap() = RegistryState::Running;
            self.log.record(Event::RegistryStarted);
            Ok(())
        })
    }

    fn stop(&self) -> RegistryFuture<'_, ()> {
        Box::pin(async move {
            *self.state.lock().unwrap() = RegistryState::Stopped;
            self.log.record(Event::RegistryStopped);
            if self.fail_stop {
                return Err(HiveError::RegistryError("fake stop failure".to_string()));
            }
            Ok(())
        })
    }

    fn address(&self) -> String {
        self.address.clone()
    }

    fn is_local(&self) -> bool {
        true
    }

    fn state(&self) -> RegistryState {
        *self.state.lock().unwrap()
    }

    fn push<'a>(
        &'a self,
        image_name: &'a str,
        tag: &'a str,
        _oci_archive: &'a Path,
    ) -> RegistryFuture<'a, ()> {
        Box::pin(async move {
            tokio::task::yield_now().await;
            if self.failing_pushes.contains(image_name) {
                return Err(HiveError::RegistryError(format!(
                    "fake push failure for {image_name}:{tag}"
                )));
            }
            self.log.record(Event::Pushed {
                image: image_name.to_string(),
                tag: tag.to_string(),
            });
            Ok(())
        })
    }
}
