// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod discovery;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod model;
pub mod registry;
pub mod rewrite;
pub mod scan;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::{config_path, load_and_validate};
use crate::config::{Settings, validate_declared_dependencies};
use crate::dag::BuildPlan;
use crate::discovery::{DiscoveryOptions, discover_project};
use crate::engine::{BuildReport, BuildScheduler, SchedulerOptions, plan_jobs};
use crate::errors::{HiveError, Result};
use crate::exec::BuildctlBuilder;
use crate::fs::{FileSystem, RealFileSystem};
use crate::model::Project;
use crate::registry::{CiSignals, run_scoped, select_registry};
use crate::scan::{RenderedProject, scan_rendered_layout};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - settings loading and CLI overrides
/// - project discovery and `depends_on` validation
/// - scanning of the rendered project into a build plan
/// - staging registry lifecycle and the build scheduler
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("Ctrl+C received; finishing running builds and skipping the rest");
            cancel.cancel();
        });
    }

    let mut settings = load_and_validate(config_path(&args.project))?;
    apply_cli_overrides(&mut settings, &args);

    let discovery = DiscoveryOptions {
        concurrency: settings.discovery.concurrency,
    };
    let project = discover_project(&args.project, &discovery, cancel.clone()).await?;
    validate_declared_dependencies(&project)?;

    let dist = args
        .dist
        .clone()
        .unwrap_or_else(|| project.root_dir.join(&settings.build.dist_dir));

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let mut rendered = scan_rendered_layout(fs.as_ref(), &dist)?;
    add_declared_dependencies(&mut rendered, &project);

    let missing = rendered.missing_images();
    if !missing.is_empty() {
        return Err(HiveError::ConfigError(format!(
            "images referenced but not rendered under {}: {}",
            dist.display(),
            missing.join(", ")
        )));
    }

    let plan = BuildPlan::new(rendered.graph.clone())?;

    if args.dry_run {
        print_dry_run(&settings, &dist, &plan, &rendered);
        return Ok(());
    }

    let jobs = plan_jobs(&rendered, Some(&project))?;
    let registry = select_registry(&settings.registry, &CiSignals::from_env());
    let builder = Arc::new(BuildctlBuilder::new(&settings.builder));
    let options = SchedulerOptions {
        concurrency: settings.build.concurrency,
        fail_fast: settings.build.fail_fast,
    };

    let run_cancel = cancel.clone();
    let report = run_scoped(registry, move |registry| async move {
        BuildScheduler::new(builder, registry, fs, options)
            .run(plan, jobs, run_cancel)
            .await
    })
    .await?;

    finish_run(report, &cancel)
}

fn apply_cli_overrides(settings: &mut Settings, args: &CliArgs) {
    if let Some(concurrency) = args.concurrency {
        settings.build.concurrency = usize::from(concurrency);
    }
    if let Some(mode) = args.registry_mode {
        settings.registry.mode = mode.into();
    }
}

/// Add `depends_on` edges of rendered images to the scanned graph.
fn add_declared_dependencies(rendered: &mut RenderedProject, project: &Project) {
    for image in project.images_by_identifier.values() {
        if !rendered.images.contains_key(&image.name) {
            continue;
        }
        for dep in &image.definition.depends_on {
            debug!(image = %image.name, dependency = %dep, "declared dependency");
            rendered.graph.add_dependency(&image.name, dep);
        }
    }
}

fn finish_run(report: BuildReport, cancel: &CancellationToken) -> Result<()> {
    if report.is_success() {
        info!(images = report.built.len(), "all images built");
        return Ok(());
    }
    if report.failed.is_empty() && cancel.is_cancelled() {
        return Err(HiveError::Cancelled);
    }
    Err(HiveError::RunFailed(report))
}

/// Print the build order, dependencies and tags without building anything.
fn print_dry_run(settings: &Settings, dist: &Path, plan: &BuildPlan, rendered: &RenderedProject) {
    println!("containerhive dry-run");
    println!("  dist = {}", dist.display());
    println!("  build.concurrency = {}", settings.build.concurrency);
    println!("  registry.mode = {:?}", settings.registry.mode);
    println!();

    println!("build order ({}):", plan.order().len());
    for (idx, id) in plan.order().iter().enumerate() {
        println!("  {}. {id}", idx + 1);

        let deps = plan.graph().dependencies(id);
        if !deps.is_empty() {
            println!("       depends on: {}", deps.join(", "));
        }

        if let Some(image) = rendered.image(id) {
            let tags: Vec<&str> = image.tags.iter().map(|t| t.tag.as_str()).collect();
            println!("       tags: {}", tags.join(", "));
        }
    }

    debug!("dry-run complete (nothing built)");
}
