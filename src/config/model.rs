// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::RegistryMode;

/// `hive.toml` as read from disk, before validation.
///
/// ```toml
/// [build]
/// concurrency = 4
/// dist_dir = "dist"
///
/// [registry]
/// mode = "auto"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSettings {
    #[serde(default)]
    pub build: BuildSection,

    #[serde(default)]
    pub builder: BuilderSection,

    #[serde(default)]
    pub registry: RegistrySettings,

    #[serde(default)]
    pub discovery: DiscoverySection,
}

/// Validated settings. Only obtainable through `TryFrom<RawSettings>`.
#[derive(Debug, Clone)]
pub struct Settings {
    pub build: BuildSection,
    pub builder: BuilderSection,
    pub registry: RegistrySettings,
    pub discovery: DiscoverySection,
}

impl Settings {
    pub(crate) fn new_unchecked(raw: RawSettings) -> Self {
        Self {
            build: raw.build,
            builder: raw.builder,
            registry: raw.registry,
            discovery: raw.discovery,
        }
    }
}

/// `[build]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildSection {
    /// Maximum number of images building at the same time.
    #[serde(default = "default_build_concurrency")]
    pub concurrency: usize,

    /// Rendered project directory, relative to the project root.
    #[serde(default = "default_dist_dir")]
    pub dist_dir: PathBuf,

    /// Stop handing out new images after the first failure.
    #[serde(default)]
    pub fail_fast: bool,
}

fn default_build_concurrency() -> usize {
    4
}

fn default_dist_dir() -> PathBuf {
    PathBuf::from("dist")
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            concurrency: default_build_concurrency(),
            dist_dir: default_dist_dir(),
            fail_fast: false,
        }
    }
}

/// `[builder]` section: how `buildctl` is invoked.
#[derive(Debug, Clone, Deserialize)]
pub struct BuilderSection {
    #[serde(default = "default_buildctl")]
    pub buildctl: PathBuf,

    /// BuildKit daemon address passed as `--addr`; buildctl's own default if unset.
    #[serde(default)]
    pub addr: Option<String>,
}

fn default_buildctl() -> PathBuf {
    PathBuf::from("buildctl")
}

impl Default for BuilderSection {
    fn default() -> Self {
        Self {
            buildctl: default_buildctl(),
            addr: None,
        }
    }
}

/// `[registry]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrySettings {
    #[serde(default)]
    pub mode: RegistryMode,

    /// Remote registry used in passthrough mode.
    ///
    /// `CONTAINER_HIVE_REGISTRY` takes precedence when set.
    #[serde(default)]
    pub address: Option<String>,

    /// Talk plain HTTP to the remote registry.
    #[serde(default)]
    pub insecure: bool,

    #[serde(default)]
    pub embedded: EmbeddedSettings,
}

/// `[registry.embedded]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddedSettings {
    /// Registry server binary (zot).
    #[serde(default = "default_embedded_binary")]
    pub binary: PathBuf,

    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,
}

fn default_embedded_binary() -> PathBuf {
    PathBuf::from("zot")
}

fn default_startup_timeout_secs() -> u64 {
    10
}

impl EmbeddedSettings {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }
}

impl Default for EmbeddedSettings {
    fn default() -> Self {
        Self {
            binary: default_embedded_binary(),
            startup_timeout_secs: default_startup_timeout_secs(),
        }
    }
}

/// `[discovery]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverySection {
    /// Maximum number of image definitions parsed at the same time.
    #[serde(default = "default_discovery_concurrency")]
    pub concurrency: usize,
}

fn default_discovery_concurrency() -> usize {
    8
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            concurrency: default_discovery_concurrency(),
        }
    }
}
