// src/scan/mod.rs

//! Discovery of cross-image references in rendered Dockerfiles.
//!
//! - [`hive_ref`] parses `FROM __hive__/<name>:<tag>` lines.
//! - [`rendered`] walks `<dist>/<image>/<tag>/` and turns the references it
//!   finds into dependency-graph edges and per-tag build units.

pub mod hive_ref;
pub mod rendered;

pub use hive_ref::{HIVE_PREFIX, HiveRef, parse_hive_refs, scan_dockerfile_for_hive_refs};
pub use rendered::{
    RenderedImage, RenderedProject, RenderedTag, scan_rendered_layout, scan_rendered_project,
};
