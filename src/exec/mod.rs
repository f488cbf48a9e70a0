// src/exec/mod.rs

//! Image build execution.
//!
//! - [`backend`] defines the `ImageBuilder` trait the scheduler calls, and the
//!   request/response types passed through it.
//! - [`buildkit`] is the production builder, driving `buildctl` as a child
//!   process.

pub mod backend;
pub mod buildkit;

pub use backend::{BuildContext, BuildFuture, BuildOutput, BuildRequest, DOCKERFILE_FRONTEND, ImageBuilder};
pub use buildkit::BuildctlBuilder;
