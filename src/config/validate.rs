// src/config/validate.rs

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{RawSettings, Settings};
use crate::errors::{HiveError, Result};
use crate::model::Project;

impl TryFrom<RawSettings> for Settings {
    type Error = HiveError;

    fn try_from(raw: RawSettings) -> std::result::Result<Self, Self::Error> {
        validate_raw_settings(&raw)?;
        Ok(Settings::new_unchecked(raw))
    }
}

fn validate_raw_settings(raw: &RawSettings) -> Result<()> {
    if raw.build.concurrency == 0 {
        return Err(HiveError::ConfigError(
            "[build].concurrency must be >= 1 (got 0)".to_string(),
        ));
    }

    if raw.discovery.concurrency == 0 {
        return Err(HiveError::ConfigError(
            "[discovery].concurrency must be >= 1 (got 0)".to_string(),
        ));
    }

    if raw.registry.embedded.startup_timeout_secs == 0 {
        return Err(HiveError::ConfigError(
            "[registry.embedded].startup_timeout_secs must be >= 1 (got 0)".to_string(),
        ));
    }

    if let Some(address) = &raw.registry.address {
        if address.trim().is_empty() {
            return Err(HiveError::ConfigError(
                "[registry].address must not be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

/// Check the `depends_on` lists of all discovered image definitions.
///
/// Rejects unknown image names, self-dependencies and cycles. This runs
/// before any Dockerfile is scanned, so mistakes in `image.yml` are reported
/// against the definition rather than as a build-order problem.
pub fn validate_declared_dependencies(project: &Project) -> Result<()> {
    for image in project.images_by_identifier.values() {
        for dep in &image.definition.depends_on {
            if !project.images_by_name.contains_key(dep) {
                return Err(HiveError::ConfigError(format!(
                    "image '{}' has unknown dependency '{}' in `depends_on`",
                    image.identifier, dep
                )));
            }
            if *dep == image.name {
                return Err(HiveError::ConfigError(format!(
                    "image '{}' cannot depend on itself in `depends_on`",
                    image.identifier
                )));
            }
        }
    }

    // Edge direction: dependency -> dependent.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in project.images_by_name.keys() {
        graph.add_node(name.as_str());
    }

    for image in project.images_by_identifier.values() {
        for dep in &image.definition.depends_on {
            graph.add_edge(dep.as_str(), image.name.as_str(), ());
        }
    }

    if toposort(&graph, None).is_ok() {
        return Ok(());
    }

    // Self-edges were rejected above, so every cycle is a component of two
    // or more images.
    let mut involved: Vec<String> = tarjan_scc(&graph)
        .into_iter()
        .filter(|component| component.len() > 1)
        .flatten()
        .map(str::to_string)
        .collect();
    involved.sort();
    Err(HiveError::DependencyCycle(involved))
}
