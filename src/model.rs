// src/model.rs

//! Project model produced by discovery.
//!
//! An image definition (`image.yml`) describes the tags and variants of one
//! image plus the build inputs (versions, build args, secrets) shared by all
//! of them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Deserialize;

use crate::errors::{HiveError, Result};
use crate::types::SecretSource;

static ENV_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?$").expect("valid env reference regex")
});

pub type Versions = BTreeMap<String, String>;
pub type BuildArgs = BTreeMap<String, String>;

/// A discovered project: root, settings file and every image definition.
#[derive(Debug, Clone, Default)]
pub struct Project {
    pub root_dir: PathBuf,
    pub config_file_path: PathBuf,
    /// Keyed by project-relative image directory (e.g. `python/3`).
    pub images_by_identifier: BTreeMap<String, Arc<Image>>,
    /// Keyed by image name; several definitions may share one name.
    pub images_by_name: BTreeMap<String, Vec<Arc<Image>>>,
}

impl Project {
    /// Insert an image into both indices.
    pub fn insert(&mut self, image: Image) {
        let image = Arc::new(image);
        let by_name = self.images_by_name.entry(image.name.clone()).or_default();
        by_name.push(Arc::clone(&image));
        by_name.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        self.images_by_identifier
            .insert(image.identifier.clone(), image);
    }

    /// Definition that owns the rendered tag directory `tag_dir` of image `name`.
    ///
    /// A single definition owns every tag of its name. With several, the
    /// first one (by identifier) declaring the tag or one of its variants wins.
    pub fn definition_for_tag(&self, name: &str, tag_dir: &str) -> Option<&Arc<Image>> {
        match self.images_by_name.get(name)?.as_slice() {
            [only] => Some(only),
            images => images.iter().find(|image| image.definition.declares_tag(tag_dir)),
        }
    }

    pub fn len(&self) -> usize {
        self.images_by_identifier.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images_by_identifier.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Image {
    pub identifier: String,
    pub name: String,
    pub root_dir: PathBuf,
    pub definition_file_path: PathBuf,
    pub test_definition_path: Option<PathBuf>,
    pub definition: ImageDefinition,
}

/// Contents of `image.yml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageDefinition {
    #[serde(default)]
    pub tags: Vec<TagConfig>,

    #[serde(default)]
    pub variants: Vec<VariantConfig>,

    #[serde(default)]
    pub versions: Versions,

    #[serde(default)]
    pub build_args: BuildArgs,

    #[serde(default)]
    pub secrets: BTreeMap<String, SecretConfig>,

    /// Image names that must be built before this one.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagConfig {
    pub name: String,

    #[serde(default)]
    pub versions: Versions,

    #[serde(default)]
    pub build_args: BuildArgs,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VariantConfig {
    pub name: String,

    /// Appended to a tag name to form the variant's tag.
    #[serde(default)]
    pub tag_suffix: String,

    #[serde(default)]
    pub versions: Versions,

    #[serde(default)]
    pub build_args: BuildArgs,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecretConfig {
    /// Auto-detected from `value` when omitted.
    #[serde(default)]
    pub source: Option<SecretSource>,

    pub value: String,
}

impl ImageDefinition {
    pub fn from_yaml(contents: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Build args for one rendered tag directory.
    ///
    /// Overlay order, later wins: image, matching tag, matching variant
    /// (by `tag_suffix`). Within each layer `versions` are exported first as
    /// `<NAME>_VERSION`, then explicit `build_args`.
    pub fn build_args_for(&self, tag_dir: &str) -> BuildArgs {
        let mut args = BuildArgs::new();
        overlay(&mut args, &self.versions, &self.build_args);

        let (base_tag, variant) = self.split_variant(tag_dir);

        if let Some(tag) = self.tags.iter().find(|t| t.name == base_tag) {
            overlay(&mut args, &tag.versions, &tag.build_args);
        }
        if let Some(variant) = variant {
            overlay(&mut args, &variant.versions, &variant.build_args);
        }

        args
    }

    /// True if `tag_dir` names one of the declared tags, with or without a
    /// variant suffix.
    pub fn declares_tag(&self, tag_dir: &str) -> bool {
        let (base_tag, _) = self.split_variant(tag_dir);
        self.tags
            .iter()
            .any(|t| t.name == tag_dir || t.name == base_tag)
    }

    /// Split a tag directory name into its base tag and the variant whose
    /// `tag_suffix` ends it (longest suffix wins).
    fn split_variant<'a>(&self, tag_dir: &'a str) -> (&'a str, Option<&VariantConfig>) {
        let variant = self
            .variants
            .iter()
            .filter(|v| !v.tag_suffix.is_empty() && tag_dir.ends_with(&v.tag_suffix))
            .max_by_key(|v| v.tag_suffix.len());

        let base_tag = variant
            .and_then(|v| tag_dir.strip_suffix(v.tag_suffix.as_str()))
            .unwrap_or(tag_dir);

        (base_tag, variant)
    }

    /// Resolve every secret to its value, keyed by secret id.
    pub fn resolve_secrets(&self) -> Result<BTreeMap<String, String>> {
        self.resolve_secrets_with(|name| std::env::var(name).ok())
    }

    pub fn resolve_secrets_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<BTreeMap<String, String>> {
        self.secrets
            .iter()
            .map(|(id, secret)| -> Result<(String, String)> {
                Ok((id.clone(), secret.resolve_with(id, &lookup)?))
            })
            .collect()
    }
}

fn overlay(args: &mut BuildArgs, versions: &Versions, build_args: &BuildArgs) {
    for (name, version) in versions {
        args.insert(format!("{}_VERSION", name.to_uppercase()), version.clone());
    }
    for (key, value) in build_args {
        args.insert(key.clone(), value.clone());
    }
}

impl SecretConfig {
    fn effective_source(&self) -> SecretSource {
        match self.source {
            Some(source) => source,
            None if ENV_REFERENCE.is_match(&self.value) => SecretSource::Env,
            None => SecretSource::Plain,
        }
    }

    fn resolve_with(&self, id: &str, lookup: &impl Fn(&str) -> Option<String>) -> Result<String> {
        match self.effective_source() {
            SecretSource::Plain => Ok(self.value.clone()),
            SecretSource::Env => {
                let var = ENV_REFERENCE
                    .captures(&self.value)
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str())
                    .unwrap_or(self.value.as_str());
                lookup(var).ok_or_else(|| {
                    HiveError::ConfigError(format!(
                        "secret '{id}': environment variable \"{var}\" not found"
                    ))
                })
            }
        }
    }
}

impl Image {
    /// Parse the definition at `definition_file_path`.
    ///
    /// `images_root` is the `<project>/images` directory; the identifier is
    /// the image directory relative to it.
    pub fn load(images_root: &Path, definition_file_path: &Path) -> Result<Self> {
        let root_dir = definition_file_path
            .parent()
            .ok_or_else(|| {
                HiveError::DiscoveryError(format!(
                    "image definition {} has no parent directory",
                    definition_file_path.display()
                ))
            })?
            .to_path_buf();

        let identifier = root_dir
            .strip_prefix(images_root)
            .unwrap_or(&root_dir)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        let name = root_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                HiveError::DiscoveryError(format!(
                    "cannot derive image name from {}",
                    root_dir.display()
                ))
            })?;

        let contents = std::fs::read_to_string(definition_file_path).map_err(|e| {
            HiveError::DiscoveryError(format!(
                "failed to read image definition {}: {e}",
                definition_file_path.display()
            ))
        })?;
        let definition = ImageDefinition::from_yaml(&contents).map_err(|e| {
            HiveError::DiscoveryError(format!(
                "failed to parse image definition {}: {e}",
                definition_file_path.display()
            ))
        })?;

        Ok(Self {
            identifier,
            name,
            test_definition_path: None,
            root_dir,
            definition_file_path: definition_file_path.to_path_buf(),
            definition,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFINITION: &str = r#"
tags:
  - name: "3.13"
    versions:
      python: "3.13.1"
  - name: "3.12"
    build_args:
      EXTRA: "tag"
variants:
  - name: slim
    tag_suffix: "-slim"
    build_args:
      EXTRA: "variant"
versions:
  python: "3.11.0"
build_args:
  EXTRA: "image"
  BASE: "ubuntu"
secrets:
  token:
    value: "${HIVE_TOKEN}"
  motd:
    value: "hello"
depends_on:
  - ubuntu
"#;

    #[test]
    fn tag_and_variant_overlay_image_args() {
        let def = ImageDefinition::from_yaml(DEFINITION).unwrap();

        let plain = def.build_args_for("3.13");
        assert_eq!(plain["PYTHON_VERSION"], "3.13.1");
        assert_eq!(plain["EXTRA"], "image");

        let slim = def.build_args_for("3.12-slim");
        assert_eq!(slim["PYTHON_VERSION"], "3.11.0");
        assert_eq!(slim["EXTRA"], "variant");
        assert_eq!(slim["BASE"], "ubuntu");
    }

    #[test]
    fn secrets_auto_detect_env_references() {
        let def = ImageDefinition::from_yaml(DEFINITION).unwrap();
        let secrets = def
            .resolve_secrets_with(|name| (name == "HIVE_TOKEN").then(|| "t0k".to_string()))
            .unwrap();
        assert_eq!(secrets["token"], "t0k");
        assert_eq!(secrets["motd"], "hello");
    }

    #[test]
    fn missing_env_secret_is_config_error() {
        let def = ImageDefinition::from_yaml(DEFINITION).unwrap();
        let err = def.resolve_secrets_with(|_| None).unwrap_err();
        assert!(matches!(err, HiveError::ConfigError(msg) if msg.contains("HIVE_TOKEN")));
    }
}
