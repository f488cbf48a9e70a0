// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

use crate::engine::BuildReport;

#[derive(Error, Debug)]
pub enum HiveError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Cycle detected in image dependency graph, unresolved images: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    #[error("Scan error: {context}: {source}")]
    Scan {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Registry error: {0}")]
    RegistryError(String),

    #[error("Build of image '{image}' failed: {reason}")]
    BuildError { image: String, reason: String },

    #[error("Discovery error: {0}")]
    DiscoveryError(String),

    #[error("Build run failed:\n{0}")]
    RunFailed(BuildReport),

    #[error("Build run cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HiveError {
    /// Wrap an IO error that happened while scanning the rendered tree.
    pub fn scan(context: impl Into<String>, source: std::io::Error) -> Self {
        HiveError::Scan {
            context: context.into(),
            source,
        }
    }

    pub fn registry(context: &str, err: impl std::fmt::Display) -> Self {
        HiveError::RegistryError(format!("{context}: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, HiveError>;
