// tests/build_scheduler.rs

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use containerhive::dag::{BuildPlan, BuildState};
use containerhive::engine::{BuildReport, BuildScheduler, SchedulerOptions, plan_jobs};
use containerhive::errors::HiveError;
use containerhive::fs::mock::MockFileSystem;
use containerhive::scan::scan_rendered_layout;
use containerhive_test_utils::builders::{MockDistBuilder, graph};
use containerhive_test_utils::events::{build_started, pushed};
use containerhive_test_utils::{EventLog, FakeBuilder, FakeRegistry, init_tracing, with_timeout};

const REGISTRY: &str = "localhost:5000";

struct Harness {
    fs: MockFileSystem,
    log: EventLog,
    builder: Arc<FakeBuilder>,
    registry: Arc<FakeRegistry>,
}

impl Harness {
    fn new(fs: MockFileSystem, configure: impl FnOnce(FakeBuilder) -> FakeBuilder) -> Self {
        init_tracing();
        let log = EventLog::new();
        Self {
            fs,
            builder: Arc::new(configure(FakeBuilder::new(log.clone()))),
            registry: Arc::new(FakeRegistry::new(REGISTRY, log.clone())),
            log,
        }
    }

    fn with_registry(mut self, registry: FakeRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    async fn run(&self, dist: &Path, options: SchedulerOptions, cancel: CancellationToken) -> BuildReport {
        let rendered = scan_rendered_layout(&self.fs, dist).unwrap();
        let plan = BuildPlan::new(rendered.graph.clone()).unwrap();
        let jobs = plan_jobs(&rendered, None).unwrap();

        let scheduler = BuildScheduler::new(
            self.builder.clone(),
            self.registry.clone(),
            Arc::new(self.fs.clone()),
            options,
        );
        with_timeout(scheduler.run(plan, jobs, cancel)).await.unwrap()
    }
}

fn options(concurrency: usize) -> SchedulerOptions {
    SchedulerOptions {
        concurrency,
        fail_fast: false,
    }
}

#[tokio::test]
async fn dependent_starts_only_after_dependency_is_pushed() {
    let (fs, dist) = MockDistBuilder::new("dist")
        .dockerfile("ubuntu", "22.04", "FROM ubuntu:22.04\n")
        .dockerfile("python", "3.13", "FROM __hive__/ubuntu:22.04\n")
        .build();
    let h = Harness::new(fs, |b| b.with_delay("ubuntu", Duration::from_millis(30)));

    let report = h.run(&dist, options(4), CancellationToken::new()).await;

    assert!(report.is_success(), "{report}");
    let ubuntu_pushed = h.log.position(&pushed("ubuntu", "22.04")).unwrap();
    let python_started = h.log.position(&build_started("python", "3.13")).unwrap();
    assert!(ubuntu_pushed < python_started, "events: {:?}", h.log.events());
    assert_eq!(report.built, vec!["ubuntu", "python"]);
}

#[tokio::test]
async fn dockerfile_is_resolved_against_registry_before_build() {
    let (fs, dist) = MockDistBuilder::new("dist")
        .dockerfile("ubuntu", "22.04", "FROM ubuntu:22.04\n")
        .dockerfile("python", "3.13", "FROM __hive__/ubuntu:22.04 AS base\n")
        .build();
    let h = Harness::new(fs, |b| b);

    let report = h.run(&dist, options(2), CancellationToken::new()).await;
    assert!(report.is_success());

    assert_eq!(
        h.fs.contents("dist/python/3.13/Dockerfile.resolved").unwrap(),
        b"FROM localhost:5000/ubuntu:22.04 AS base\n".to_vec()
    );
    // The rendered Dockerfile keeps its marker.
    assert_eq!(
        h.fs.contents("dist/python/3.13/Dockerfile").unwrap(),
        b"FROM __hive__/ubuntu:22.04 AS base\n".to_vec()
    );

    let python = h
        .builder
        .requests()
        .into_iter()
        .find(|r| r.image == "python")
        .unwrap();
    assert_eq!(python.context.frontend, "dockerfile.v0");
    assert_eq!(python.context.dockerfile, Path::new("dist/python/3.13/Dockerfile.resolved"));
    assert_eq!(python.context.root_dir, Path::new("dist/python/3.13"));
    assert_eq!(python.output, Path::new("dist/python/3.13/image.tar"));
}

#[tokio::test]
async fn every_tag_is_built_and_pushed() {
    let (fs, dist) = MockDistBuilder::new("dist")
        .dockerfile("ubuntu", "22.04", "FROM ubuntu:22.04\n")
        .dockerfile("ubuntu", "24.04", "FROM ubuntu:24.04\n")
        .build();
    let h = Harness::new(fs, |b| b);

    let report = h.run(&dist, options(1), CancellationToken::new()).await;

    assert!(report.is_success());
    assert_eq!(
        h.log.pushed(),
        vec![
            ("ubuntu".to_string(), "22.04".to_string()),
            ("ubuntu".to_string(), "24.04".to_string())
        ]
    );
}

#[tokio::test]
async fn failure_skips_transitive_dependents_only() {
    let (fs, dist) = MockDistBuilder::new("dist")
        .dockerfile("ubuntu", "1", "FROM scratch\n")
        .dockerfile("python", "1", "FROM __hive__/ubuntu:1\n")
        .dockerfile("app", "1", "FROM __hive__/python:1\n")
        .dockerfile("tools", "1", "FROM __hive__/ubuntu:1\n")
        .build();
    let h = Harness::new(fs, |b| b.failing_on("python"));

    let report = h.run(&dist, options(2), CancellationToken::new()).await;

    assert!(!report.is_success());
    let mut built = report.built.clone();
    built.sort();
    assert_eq!(built, vec!["tools", "ubuntu"]);

    assert_eq!(report.failed.len(), 1);
    let failure = &report.failed[0];
    assert_eq!(failure.image, "python");
    assert!(matches!(failure.error, HiveError::BuildError { .. }));
    assert_eq!(failure.skipped_dependents, vec!["app"]);

    assert!(!h.log.started_images().contains(&"app".to_string()));
    let rendered = report.to_string();
    assert!(rendered.contains("python"));
    assert!(rendered.contains("skipped dependents: app"));
}

#[tokio::test]
async fn push_failure_counts_as_image_failure() {
    let (fs, dist) = MockDistBuilder::new("dist")
        .dockerfile("ubuntu", "1", "FROM scratch\n")
        .dockerfile("python", "1", "FROM __hive__/ubuntu:1\n")
        .build();
    let log = EventLog::new();
    let h = Harness::new(fs, |b| b)
        .with_registry(FakeRegistry::new(REGISTRY, log).failing_push_for("ubuntu"));

    let report = h.run(&dist, options(2), CancellationToken::new()).await;

    assert_eq!(report.failed.len(), 1);
    assert!(matches!(report.failed[0].error, HiveError::RegistryError(_)));
    assert_eq!(report.failed[0].skipped_dependents, vec!["python"]);
    assert!(report.built.is_empty());
}

#[tokio::test]
async fn unreadable_dockerfile_is_a_build_failure_of_that_image() {
    let (fs, dist) = MockDistBuilder::new("dist")
        .dockerfile("ubuntu", "1", "FROM scratch\n")
        .dockerfile("python", "1", "FROM __hive__/ubuntu:1\n")
        .build();
    let h = Harness::new(fs, |b| b);

    let rendered = scan_rendered_layout(&h.fs, &dist).unwrap();
    let plan = BuildPlan::new(rendered.graph.clone()).unwrap();
    let mut jobs = plan_jobs(&rendered, None).unwrap();
    // Rendered Dockerfile gone between scan and build.
    jobs.get_mut("ubuntu").unwrap()[0].dockerfile = dist.join("ubuntu/1/Dockerfile.gone");

    let scheduler = BuildScheduler::new(
        h.builder.clone(),
        h.registry.clone(),
        Arc::new(h.fs.clone()),
        options(2),
    );
    let report = with_timeout(scheduler.run(plan, jobs, CancellationToken::new()))
        .await
        .unwrap();

    assert_eq!(report.failed.len(), 1);
    let failure = &report.failed[0];
    assert_eq!(failure.image, "ubuntu");
    assert!(
        matches!(&failure.error, HiveError::BuildError { image, reason }
            if image == "ubuntu" && reason.contains("Dockerfile.gone")),
        "unexpected error: {:?}",
        failure.error
    );
    assert_eq!(failure.skipped_dependents, vec!["python"]);
    assert!(h.builder.requests().is_empty());
}

#[tokio::test]
async fn concurrency_bounds_parallel_builds() {
    let mut dist = MockDistBuilder::new("dist");
    for i in 0..6 {
        dist = dist.dockerfile(&format!("img{i}"), "1", "FROM scratch\n");
    }
    let (fs, dist) = dist.build();
    let h = Harness::new(fs, |mut b| {
        for i in 0..6 {
            b = b.with_delay(&format!("img{i}"), Duration::from_millis(20));
        }
        b
    });

    let report = h.run(&dist, options(2), CancellationToken::new()).await;

    assert!(report.is_success());
    assert_eq!(report.built.len(), 6);
    assert!(h.builder.max_in_flight() <= 2, "max in flight: {}", h.builder.max_in_flight());
}

#[tokio::test]
async fn cancelled_run_starts_nothing() {
    let (fs, dist) = MockDistBuilder::new("dist")
        .dockerfile("a", "1", "FROM scratch\n")
        .dockerfile("b", "1", "FROM __hive__/a:1\n")
        .build();
    let h = Harness::new(fs, |b| b);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = h.run(&dist, options(2), cancel).await;

    assert!(!report.is_success());
    assert!(report.built.is_empty());
    assert_eq!(report.cancelled, vec!["a", "b"]);
    assert!(h.log.events().is_empty());
}

#[tokio::test]
async fn fail_fast_cancels_remaining_images() {
    let (fs, dist) = MockDistBuilder::new("dist")
        .dockerfile("a", "1", "FROM scratch\n")
        .dockerfile("b", "1", "FROM scratch\n")
        .dockerfile("c", "1", "FROM scratch\n")
        .build();
    let h = Harness::new(fs, |b| b.failing_on("a"));

    let report = h
        .run(
            &dist,
            SchedulerOptions {
                concurrency: 1,
                fail_fast: true,
            },
            CancellationToken::new(),
        )
        .await;

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.cancelled, vec!["b", "c"]);
    assert_eq!(h.log.started_images(), vec!["a"]);
}

#[tokio::test]
async fn image_without_dockerfile_fails() {
    let (fs, dist) = MockDistBuilder::new("dist")
        .empty_tag("docs", "latest")
        .build();
    let h = Harness::new(fs, |b| b);

    let report = h.run(&dist, options(1), CancellationToken::new()).await;

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].image, "docs");
}

#[tokio::test]
async fn empty_plan_succeeds() {
    let (fs, dist) = MockDistBuilder::new("dist").build();
    let h = Harness::new(fs, |b| b);

    let report = h.run(&dist, options(3), CancellationToken::new()).await;

    assert!(report.is_success());
    assert_eq!(report.total, 0);
}

#[test]
fn cyclic_graph_is_rejected_before_scheduling() {
    let g = graph(&["a", "b"], &[("a", "b"), ("b", "a")]);
    assert!(matches!(BuildPlan::new(g), Err(HiveError::DependencyCycle(_))));
}

#[test]
fn plan_releases_dependents_only_when_all_dependencies_are_built() {
    let g = graph(&["a", "b", "c"], &[("c", "a"), ("c", "b")]);
    let mut plan = BuildPlan::new(g).unwrap();

    assert_eq!(plan.next_ready().as_deref(), Some("a"));
    assert_eq!(plan.next_ready().as_deref(), Some("b"));
    assert_eq!(plan.next_ready(), None);
    assert_eq!(plan.state_of("c"), Some(BuildState::Pending));

    let step = plan.step_completion("a", containerhive::engine::ImageOutcome::Built);
    assert!(step.newly_ready.is_empty());
    assert!(!step.run_just_finished);

    let step = plan.step_completion("b", containerhive::engine::ImageOutcome::Built);
    assert_eq!(step.newly_ready, vec!["c"]);

    assert_eq!(plan.next_ready().as_deref(), Some("c"));
    let step = plan.step_completion("c", containerhive::engine::ImageOutcome::Built);
    assert!(step.run_just_finished);
    assert!(plan.all_terminal());
}

#[test]
fn failed_image_attributes_skips() {
    let g = graph(&["a", "b", "c"], &[("b", "a"), ("c", "b")]);
    let mut plan = BuildPlan::new(g).unwrap();

    let a = plan.next_ready().unwrap();
    let step = plan.step_completion(&a, containerhive::engine::ImageOutcome::Failed);

    let mut skipped = step.newly_skipped.clone();
    skipped.sort();
    assert_eq!(skipped, vec!["b", "c"]);
    assert_eq!(plan.skipped_because_of("c"), Some("a"));
    assert_eq!(plan.state_of("b"), Some(BuildState::Skipped));
    assert!(plan.is_finished());
}
