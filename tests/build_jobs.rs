// tests/build_jobs.rs

use tokio_util::sync::CancellationToken;

use containerhive::discovery::{DiscoveryOptions, discover_project};
use containerhive::engine::{BuildJobs, TagJob, plan_jobs};
use containerhive::fs::RealFileSystem;
use containerhive::scan::scan_rendered_layout;
use containerhive_test_utils::builders::{ProjectTreeBuilder, path_of};
use containerhive_test_utils::{init_tracing, with_timeout};

const PYTHON: &str = "\
build_args:
  FLAVOR: a
tags:
  - name: \"3.13\"
";

const TEAM_PYTHON: &str = "\
build_args:
  FLAVOR: b
tags:
  - name: \"3.12\"
variants:
  - name: slim
    tag_suffix: -slim
    build_args:
      SLIM: \"1\"
secrets:
  tok:
    source: plain
    value: team-token
";

async fn plan(tree: ProjectTreeBuilder) -> BuildJobs {
    let dir = tree.build();
    let project = with_timeout(discover_project(
        dir.path(),
        &DiscoveryOptions::default(),
        CancellationToken::new(),
    ))
    .await
    .unwrap();
    let rendered = scan_rendered_layout(&RealFileSystem, &path_of(&dir, "dist")).unwrap();
    plan_jobs(&rendered, Some(&project)).unwrap()
}

fn job<'a>(jobs: &'a BuildJobs, image: &str, tag: &str) -> &'a TagJob {
    jobs[image].iter().find(|j| j.tag == tag).unwrap()
}

#[tokio::test]
async fn tags_take_inputs_from_the_definition_that_declares_them() {
    init_tracing();
    let jobs = plan(
        ProjectTreeBuilder::new()
            .hive_toml("")
            .image("python", PYTHON)
            .image("team/python", TEAM_PYTHON)
            .rendered("python", "3.13", "FROM scratch\n")
            .rendered("python", "3.12", "FROM scratch\n")
            .rendered("python", "3.12-slim", "FROM scratch\n"),
    )
    .await;

    let own = job(&jobs, "python", "3.13");
    assert_eq!(own.build_args.get("FLAVOR").map(String::as_str), Some("a"));
    assert!(own.secrets.is_empty());

    let team = job(&jobs, "python", "3.12");
    assert_eq!(team.build_args.get("FLAVOR").map(String::as_str), Some("b"));
    assert_eq!(team.secrets.get("tok").map(String::as_str), Some("team-token"));

    let slim = job(&jobs, "python", "3.12-slim");
    assert_eq!(slim.build_args.get("FLAVOR").map(String::as_str), Some("b"));
    assert_eq!(slim.build_args.get("SLIM").map(String::as_str), Some("1"));
    assert_eq!(slim.secrets.get("tok").map(String::as_str), Some("team-token"));
}

#[tokio::test]
async fn undeclared_tag_of_a_shared_name_gets_no_inputs() {
    let jobs = plan(
        ProjectTreeBuilder::new()
            .hive_toml("")
            .image("python", PYTHON)
            .image("team/python", TEAM_PYTHON)
            .rendered("python", "2.7", "FROM scratch\n"),
    )
    .await;

    let legacy = job(&jobs, "python", "2.7");
    assert!(legacy.build_args.is_empty());
    assert!(legacy.secrets.is_empty());
}

#[tokio::test]
async fn single_definition_owns_every_rendered_tag() {
    let jobs = plan(
        ProjectTreeBuilder::new()
            .hive_toml("")
            .image("python", PYTHON)
            .rendered("python", "3.14", "FROM scratch\n"),
    )
    .await;

    let next = job(&jobs, "python", "3.14");
    assert_eq!(next.build_args.get("FLAVOR").map(String::as_str), Some("a"));
}
