// src/engine/runtime.rs

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dag::BuildPlan;
use crate::engine::jobs::{BuildJobs, TagJob};
use crate::engine::report::{BuildReport, FailedImage};
use crate::engine::{ImageId, ImageOutcome};
use crate::errors::{HiveError, Result};
use crate::exec::{BuildContext, BuildRequest, ImageBuilder};
use crate::fs::FileSystem;
use crate::registry::StagingRegistry;
use crate::rewrite::rewrite_hive_refs_with;

/// Dockerfile written next to the rendered one with markers resolved.
pub const RESOLVED_DOCKERFILE_NAME: &str = "Dockerfile.resolved";
/// OCI layout archive written by the builder into the tag directory.
pub const OCI_ARCHIVE_NAME: &str = "image.tar";

#[derive(Debug, Clone, Copy)]
pub struct SchedulerOptions {
    /// Number of worker tasks; at most this many images build at once.
    pub concurrency: usize,
    /// Cancel the run on the first failed image.
    pub fail_fast: bool,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            fail_fast: false,
        }
    }
}

/// Runs a [`BuildPlan`] with a bounded pool of workers.
///
/// This is an IO shell around the plan, which holds all scheduling
/// semantics. Each worker pops a ready image, builds and pushes every tag of
/// it, then reports the outcome back to the plan. Dependents become ready only
/// inside that report, so a dependent build never starts before its
/// dependency is available in the staging registry.
pub struct BuildScheduler {
    builder: Arc<dyn ImageBuilder>,
    registry: Arc<dyn StagingRegistry>,
    fs: Arc<dyn FileSystem>,
    options: SchedulerOptions,
}

impl fmt::Debug for BuildScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildScheduler")
            .field("options", &self.options)
            .field("registry", &self.registry.address())
            .finish_non_exhaustive()
    }
}

/// Plan and report share one lock so an outcome is recorded atomically.
struct RunState {
    plan: BuildPlan,
    report: BuildReport,
}

struct Shared {
    state: Mutex<RunState>,
    /// Signalled whenever the ready queue may have changed.
    wakeup: Notify,
    cancel: CancellationToken,
    jobs: BuildJobs,
    builder: Arc<dyn ImageBuilder>,
    registry: Arc<dyn StagingRegistry>,
    fs: Arc<dyn FileSystem>,
    options: SchedulerOptions,
}

impl BuildScheduler {
    pub fn new(
        builder: Arc<dyn ImageBuilder>,
        registry: Arc<dyn StagingRegistry>,
        fs: Arc<dyn FileSystem>,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            builder,
            registry,
            fs,
            options,
        }
    }

    /// Execute `plan` to completion.
    ///
    /// Returns the report of the run; failed images are recorded in it rather
    /// than returned as errors. `Err` is only returned when a worker task
    /// itself dies. Cancelling `cancel` stops handing out new images; builds
    /// already started run to completion.
    pub async fn run(
        &self,
        plan: BuildPlan,
        jobs: BuildJobs,
        cancel: CancellationToken,
    ) -> Result<BuildReport> {
        let total = plan.order().len();
        let workers = self.options.concurrency.max(1).min(total.max(1));

        info!(images = total, workers, "starting build run");

        let shared = Arc::new(Shared {
            state: Mutex::new(RunState {
                plan,
                report: BuildReport::new(total),
            }),
            wakeup: Notify::new(),
            cancel,
            jobs,
            builder: Arc::clone(&self.builder),
            registry: Arc::clone(&self.registry),
            fs: Arc::clone(&self.fs),
            options: self.options,
        });

        let mut set = JoinSet::new();
        for worker in 0..workers {
            let shared = Arc::clone(&shared);
            set.spawn(async move { worker_loop(shared, worker).await });
        }

        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "build worker died; aborting run");
                shared.cancel.cancel();
                set.abort_all();
                return Err(HiveError::Other(anyhow::anyhow!("build worker failed: {e}")));
            }
        }

        let mut state = shared.lock_state();
        if !state.plan.all_terminal() {
            warn!("build run finished with images left in a non-terminal state");
        }
        let report = std::mem::take(&mut state.report);

        info!(
            built = report.built.len(),
            failed = report.failed.len(),
            cancelled = report.cancelled.len(),
            "build run finished"
        );
        Ok(report)
    }
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, RunState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Either hand out the next ready image, or tell the worker what to do.
    fn next_action(&self) -> WorkerAction {
        let mut state = self.lock_state();

        if self.cancel.is_cancelled() {
            let cancelled = state.plan.cancel_remaining();
            if !cancelled.is_empty() {
                info!(images = ?cancelled, "run cancelled; skipping images not yet started");
                state.report.cancelled.extend(cancelled);
            }
        }

        if state.plan.is_finished() {
            return WorkerAction::Exit;
        }

        match state.plan.next_ready() {
            Some(id) => WorkerAction::Build(id),
            None => WorkerAction::Wait,
        }
    }

    fn complete(&self, id: &str, result: Result<()>) {
        let outcome = match &result {
            Ok(()) => ImageOutcome::Built,
            Err(_) => ImageOutcome::Failed,
        };

        {
            let mut state = self.lock_state();
            let step = state.plan.step_completion(id, outcome);

            match result {
                Ok(()) => state.report.built.push(id.to_string()),
                Err(error) => {
                    error!(image = %id, error = %error, "image failed");
                    state.report.failed.push(FailedImage {
                        image: id.to_string(),
                        error,
                        skipped_dependents: step.newly_skipped,
                    });
                    if self.options.fail_fast {
                        info!(image = %id, "fail_fast set; cancelling run");
                        self.cancel.cancel();
                    }
                }
            }

            if step.run_just_finished {
                debug!("last image completed");
            }
        }

        self.wakeup.notify_waiters();
    }

    /// Build and push every tag of one image.
    async fn build_image(&self, id: &str) -> Result<()> {
        let tags = self
            .jobs
            .get(id)
            .filter(|tags| !tags.is_empty())
            .ok_or_else(|| HiveError::BuildError {
                image: id.to_string(),
                reason: "no Dockerfile found for any tag".to_string(),
            })?;

        for job in tags {
            self.build_tag(id, job).await?;
        }
        Ok(())
    }

    async fn build_tag(&self, id: &str, job: &TagJob) -> Result<()> {
        let address = self.registry.address();
        let resolved = job.dir.join(RESOLVED_DOCKERFILE_NAME);
        rewrite_hive_refs_with(self.fs.as_ref(), &job.dockerfile, &resolved, &address).map_err(
            |e| HiveError::BuildError {
                image: id.to_string(),
                reason: format!("tag {}: failed to resolve Dockerfile: {e}", job.tag),
            },
        )?;

        let request = BuildRequest {
            image: id.to_string(),
            tag: job.tag.clone(),
            context: BuildContext::dockerfile(&job.dir, &resolved),
            build_args: job.build_args.clone(),
            secrets: job.secrets.clone(),
            output: job.dir.join(OCI_ARCHIVE_NAME),
        };

        let output = self.builder.build(request).await?;

        self.registry.push(id, &job.tag, &output.archive).await?;
        info!(image = %id, tag = %job.tag, address = %address, "pushed to staging registry");
        Ok(())
    }
}

enum WorkerAction {
    Build(ImageId),
    Wait,
    Exit,
}

async fn worker_loop(shared: Arc<Shared>, worker: usize) {
    debug!(worker, "build worker started");

    loop {
        // Register for wakeups before looking at the queue, so a completion
        // between the check and the await is not missed.
        let notified = shared.wakeup.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        match shared.next_action() {
            WorkerAction::Build(id) => {
                let result = shared.build_image(&id).await;
                shared.complete(&id, result);
            }
            WorkerAction::Wait if shared.cancel.is_cancelled() => {
                notified.await;
            }
            WorkerAction::Wait => {
                tokio::select! {
                    _ = &mut notified => {}
                    _ = shared.cancel.cancelled() => {}
                }
            }
            WorkerAction::Exit => break,
        }
    }

    debug!(worker, "build worker finished");
}
