// src/config/mod.rs

//! Project settings for containerhive.
//!
//! - [`model`] is the TOML-backed data model of `hive.toml`.
//! - [`loader`] reads it from disk.
//! - [`validate`] checks settings and declared image dependencies.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{CONFIG_FILE_NAME, load_and_validate, load_from_path};
pub use model::{
    BuildSection, BuilderSection, DiscoverySection, EmbeddedSettings, RawSettings,
    RegistrySettings, Settings,
};
pub use validate::validate_declared_dependencies;
