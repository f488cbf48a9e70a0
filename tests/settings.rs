// tests/settings.rs

use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;

use containerhive::config::load_and_validate;
use containerhive::errors::HiveError;
use containerhive::types::RegistryMode;

fn settings_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn empty_file_uses_defaults() {
    let file = settings_file("");
    let settings = load_and_validate(file.path()).unwrap();

    assert_eq!(settings.build.concurrency, 4);
    assert_eq!(settings.build.dist_dir, std::path::Path::new("dist"));
    assert!(!settings.build.fail_fast);
    assert_eq!(settings.builder.buildctl, std::path::Path::new("buildctl"));
    assert_eq!(settings.registry.mode, RegistryMode::Auto);
    assert_eq!(settings.registry.embedded.startup_timeout(), Duration::from_secs(10));
    assert_eq!(settings.discovery.concurrency, 8);
}

#[test]
fn sections_are_read() {
    let file = settings_file(
        r#"
[build]
concurrency = 2
dist_dir = "out"
fail_fast = true

[builder]
addr = "tcp://buildkitd:1234"

[registry]
mode = "passthrough"
address = "ghcr.io/acme"
insecure = true

[registry.embedded]
binary = "/opt/zot/bin/zot"
"#,
    );
    let settings = load_and_validate(file.path()).unwrap();

    assert_eq!(settings.build.concurrency, 2);
    assert!(settings.build.fail_fast);
    assert_eq!(settings.builder.addr.as_deref(), Some("tcp://buildkitd:1234"));
    assert_eq!(settings.registry.mode, RegistryMode::Passthrough);
    assert_eq!(settings.registry.address.as_deref(), Some("ghcr.io/acme"));
    assert!(settings.registry.insecure);
    assert_eq!(settings.registry.embedded.binary, std::path::Path::new("/opt/zot/bin/zot"));
}

#[test]
fn zero_concurrency_is_config_error() {
    let file = settings_file("[build]\nconcurrency = 0\n");
    match load_and_validate(file.path()) {
        Err(HiveError::ConfigError(msg)) => assert!(msg.contains("concurrency")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn unknown_registry_mode_is_rejected_while_parsing() {
    let file = settings_file("[registry]\nmode = \"sometimes\"\n");
    assert!(matches!(load_and_validate(file.path()), Err(HiveError::TomlError(_))));
}

#[test]
fn blank_registry_address_is_config_error() {
    let file = settings_file("[registry]\naddress = \"  \"\n");
    assert!(matches!(load_and_validate(file.path()), Err(HiveError::ConfigError(_))));
}

#[test]
fn registry_mode_parses_from_str() {
    assert_eq!("Embedded".parse::<RegistryMode>(), Ok(RegistryMode::Embedded));
    assert!("remote".parse::<RegistryMode>().is_err());
}
