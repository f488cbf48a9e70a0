// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::types::RegistryMode;

/// Command-line arguments for `containerhive`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "containerhive",
    version,
    about = "Build interdependent container images of one project in dependency order.",
    long_about = None
)]
pub struct CliArgs {
    /// Project root (contains `hive.toml` and `images/`).
    #[arg(long, value_name = "PATH", default_value = ".")]
    pub project: PathBuf,

    /// Rendered project directory.
    ///
    /// Default: `[build].dist_dir` from `hive.toml`, relative to the project.
    #[arg(long, value_name = "PATH")]
    pub dist: Option<PathBuf>,

    /// Maximum number of images built in parallel (overrides `[build].concurrency`).
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub concurrency: Option<u16>,

    /// Staging registry selection (overrides `[registry].mode`).
    #[arg(long, value_enum, value_name = "MODE")]
    pub registry_mode: Option<CliRegistryMode>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `CONTAINERHIVE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Discover and scan, print the build order, but don't build anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum CliRegistryMode {
    Auto,
    Embedded,
    Passthrough,
}

impl From<CliRegistryMode> for RegistryMode {
    fn from(mode: CliRegistryMode) -> Self {
        match mode {
            CliRegistryMode::Auto => RegistryMode::Auto,
            CliRegistryMode::Embedded => RegistryMode::Embedded,
            CliRegistryMode::Passthrough => RegistryMode::Passthrough,
        }
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
