// tests/staging_registry.rs

use std::collections::HashMap;
use std::sync::Arc;

use containerhive::config::{EmbeddedSettings, RegistrySettings};
use containerhive::errors::HiveError;
use containerhive::registry::{
    CiSignals, DEFAULT_REMOTE_REGISTRY, EmbeddedRegistry, RegistryState, StagingRegistry,
    run_scoped, select_registry,
};
use containerhive::types::RegistryMode;
use containerhive_test_utils::{Event, EventLog, FakeRegistry, init_tracing};

fn ci() -> CiSignals {
    CiSignals {
        ci: true,
        ..Default::default()
    }
}

#[test]
fn ci_without_override_selects_default_remote() {
    let registry = select_registry(&RegistrySettings::default(), &ci());

    assert_eq!(registry.address(), DEFAULT_REMOTE_REGISTRY);
    assert_eq!(registry.address(), "docker.io");
    assert!(!registry.is_local());
    assert_eq!(registry.state(), RegistryState::Stopped);
}

#[test]
fn override_address_wins_over_settings() {
    let settings = RegistrySettings {
        address: Some("registry.internal:5000".into()),
        ..Default::default()
    };
    let signals = CiSignals {
        registry_override: Some("ghcr.io/acme".into()),
        ..ci()
    };

    assert_eq!(select_registry(&settings, &signals).address(), "ghcr.io/acme");
    assert_eq!(select_registry(&settings, &ci()).address(), "registry.internal:5000");
}

#[test]
fn no_ci_selects_embedded_with_empty_address() {
    let registry = select_registry(&RegistrySettings::default(), &CiSignals::default());

    assert!(registry.is_local());
    assert_eq!(registry.address(), "");
    assert_eq!(registry.state(), RegistryState::Stopped);
}

#[test]
fn explicit_mode_overrides_ci_detection() {
    let embedded = RegistrySettings {
        mode: RegistryMode::Embedded,
        ..Default::default()
    };
    assert!(select_registry(&embedded, &ci()).is_local());

    let passthrough = RegistrySettings {
        mode: RegistryMode::Passthrough,
        ..Default::default()
    };
    assert!(!select_registry(&passthrough, &CiSignals::default()).is_local());
}

#[test]
fn signals_are_read_from_lookup() {
    let env: HashMap<&str, &str> = HashMap::from([
        ("CI", "true"),
        ("CONTAINER_HIVE_REGISTRY", "ghcr.io/acme"),
        ("CONTAINER_HIVE_REGISTRY_USERNAME", "bot"),
        ("CONTAINER_HIVE_REGISTRY_PASSWORD", "pw"),
    ]);
    let signals = CiSignals::from_lookup(|k| env.get(k).map(|v| v.to_string()));

    assert!(signals.ci);
    assert_eq!(signals.registry_override.as_deref(), Some("ghcr.io/acme"));
    assert_eq!(signals.credentials, Some(("bot".to_string(), "pw".to_string())));
    assert!(!format!("{signals:?}").contains("pw\""));

    let empty_ci = CiSignals::from_lookup(|k| (k == "CI").then(String::new));
    assert!(!empty_ci.ci);
}

#[tokio::test]
async fn passthrough_start_and_stop_flip_state() {
    let registry = select_registry(&RegistrySettings::default(), &ci());

    registry.start().await.unwrap();
    assert_eq!(registry.state(), RegistryState::Running);
    assert_eq!(registry.address(), "docker.io");

    registry.stop().await.unwrap();
    assert_eq!(registry.state(), RegistryState::Stopped);
}

#[tokio::test]
async fn embedded_start_fails_cleanly_without_binary() {
    let registry = EmbeddedRegistry::new(EmbeddedSettings {
        binary: "/nonexistent/zot-binary".into(),
        startup_timeout_secs: 1,
    });

    let err = registry.start().await.unwrap_err();
    assert!(matches!(err, HiveError::RegistryError(_)));
    assert_eq!(registry.state(), RegistryState::Stopped);
    assert_eq!(registry.address(), "");

    let push = registry
        .push("ubuntu", "22.04", std::path::Path::new("image.tar"))
        .await
        .unwrap_err();
    assert!(push.to_string().contains("not running"));
}

#[tokio::test]
async fn run_scoped_stops_registry_after_failure() {
    init_tracing();
    let log = EventLog::new();
    let registry: Arc<dyn StagingRegistry> = Arc::new(FakeRegistry::new("localhost:5000", log.clone()));

    let result: Result<(), HiveError> = run_scoped(Arc::clone(&registry), |_| async {
        Err(HiveError::Cancelled)
    })
    .await;

    assert!(matches!(result, Err(HiveError::Cancelled)));
    assert_eq!(log.events(), vec![Event::RegistryStarted, Event::RegistryStopped]);
    assert_eq!(registry.state(), RegistryState::Stopped);
}

#[tokio::test]
async fn run_scoped_surfaces_stop_failure_only_after_success() {
    let log = EventLog::new();
    let registry: Arc<dyn StagingRegistry> =
        Arc::new(FakeRegistry::new("localhost:5000", log.clone()).failing_stop());

    let ok: Result<u32, HiveError> = run_scoped(Arc::clone(&registry), |r| async move {
        assert_eq!(r.state(), RegistryState::Running);
        Ok(7)
    })
    .await;
    assert!(matches!(ok, Err(HiveError::RegistryError(_))));

    let failed: Result<u32, HiveError> =
        run_scoped(registry, |_| async { Err(HiveError::Cancelled) }).await;
    assert!(matches!(failed, Err(HiveError::Cancelled)));
}
