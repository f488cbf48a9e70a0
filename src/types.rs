use std::str::FromStr;

use serde::Deserialize;

/// How the staging registry for a run is chosen.
///
/// - `Auto`: passthrough when a CI environment is detected, embedded otherwise
///   (default).
/// - `Embedded`: always supervise a local ephemeral registry.
/// - `Passthrough`: always use the configured remote registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RegistryMode {
    #[default]
    Auto,
    Embedded,
    Passthrough,
}

impl FromStr for RegistryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(RegistryMode::Auto),
            "embedded" => Ok(RegistryMode::Embedded),
            "passthrough" => Ok(RegistryMode::Passthrough),
            other => Err(format!(
                "invalid registry mode: {other} (expected \"auto\", \"embedded\" or \"passthrough\")"
            )),
        }
    }
}

/// Where a secret value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretSource {
    /// Value is used as-is.
    Plain,
    /// Value names an environment variable (`${VAR}`, `$VAR` or `VAR`).
    Env,
}
