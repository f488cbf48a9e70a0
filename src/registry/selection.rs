// src/registry/selection.rs

use std::sync::Arc;

use oci_distribution::secrets::RegistryAuth;
use tracing::info;

use crate::config::RegistrySettings;
use crate::registry::oci_push::PushTarget;
use crate::registry::{EmbeddedRegistry, PassthroughRegistry, StagingRegistry};
use crate::types::RegistryMode;

/// Remote registry used in CI when no override is given.
pub const DEFAULT_REMOTE_REGISTRY: &str = "docker.io";

/// Environment facts that influence registry selection.
///
/// Read once at the program edge with [`CiSignals::from_env`]; everything
/// below takes them as a value.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CiSignals {
    /// `CI` is set to a non-empty value.
    pub ci: bool,
    /// `CONTAINER_HIVE_REGISTRY`.
    pub registry_override: Option<String>,
    /// `CONTAINER_HIVE_REGISTRY_USERNAME` / `CONTAINER_HIVE_REGISTRY_PASSWORD`.
    pub credentials: Option<(String, String)>,
}

impl std::fmt::Debug for CiSignals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CiSignals")
            .field("ci", &self.ci)
            .field("registry_override", &self.registry_override)
            .field("credentials", &self.credentials.as_ref().map(|(user, _)| user))
            .finish()
    }
}

impl CiSignals {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`CiSignals::from_env`] with a custom variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let credentials = match (
            non_empty("CONTAINER_HIVE_REGISTRY_USERNAME"),
            lookup("CONTAINER_HIVE_REGISTRY_PASSWORD"),
        ) {
            (Some(user), Some(password)) => Some((user, password)),
            _ => None,
        };

        Self {
            ci: non_empty("CI").is_some(),
            registry_override: non_empty("CONTAINER_HIVE_REGISTRY"),
            credentials,
        }
    }
}

/// Choose the staging registry for a run.
///
/// An explicit mode in the settings wins. In `auto` mode a CI signal selects
/// passthrough to the override address (or [`DEFAULT_REMOTE_REGISTRY`]); no
/// CI signal selects the embedded registry.
pub fn select_registry(settings: &RegistrySettings, signals: &CiSignals) -> Arc<dyn StagingRegistry> {
    let passthrough = match settings.mode {
        RegistryMode::Embedded => false,
        RegistryMode::Passthrough => true,
        RegistryMode::Auto => signals.ci,
    };

    if !passthrough {
        info!(mode = ?settings.mode, "using embedded staging registry");
        return Arc::new(EmbeddedRegistry::new(settings.embedded.clone()));
    }

    let address = signals
        .registry_override
        .clone()
        .or_else(|| settings.address.clone())
        .unwrap_or_else(|| DEFAULT_REMOTE_REGISTRY.to_string());

    let auth = match &signals.credentials {
        Some((user, password)) => RegistryAuth::Basic(user.clone(), password.clone()),
        None => RegistryAuth::Anonymous,
    };

    info!(mode = ?settings.mode, address = %address, "using passthrough staging registry");
    Arc::new(PassthroughRegistry::new(PushTarget {
        address,
        insecure: settings.insecure,
        auth,
    }))
}

/// Registry for default settings and the current environment.
pub fn new_registry() -> Arc<dyn StagingRegistry> {
    select_registry(&RegistrySettings::default(), &CiSignals::from_env())
}
