// tests/dependency_graph.rs

use containerhive::dag::DependencyGraph;
use containerhive::errors::HiveError;
use containerhive_test_utils::builders::graph;

fn position(order: &[String], id: &str) -> usize {
    order.iter().position(|x| x == id).unwrap()
}

#[test]
fn dependencies_come_before_dependents() {
    let g = graph(
        &["app", "python", "ubuntu", "tools"],
        &[("app", "python"), ("python", "ubuntu"), ("tools", "ubuntu")],
    );

    let order = g.topological_sort().unwrap();

    assert_eq!(order.len(), 4);
    assert!(position(&order, "ubuntu") < position(&order, "python"));
    assert!(position(&order, "python") < position(&order, "app"));
    assert!(position(&order, "ubuntu") < position(&order, "tools"));
}

#[test]
fn ties_are_broken_by_registration_order() {
    let g = graph(&["c", "b", "a"], &[]);
    assert_eq!(g.topological_sort().unwrap(), vec!["c", "b", "a"]);

    // "a" was registered first but only becomes ready after "base".
    let g = graph(&["a", "b", "base"], &[("a", "base")]);
    assert_eq!(g.topological_sort().unwrap(), vec!["b", "base", "a"]);
}

#[test]
fn two_node_cycle_is_reported_with_both_images() {
    let g = graph(&["a", "b"], &[("a", "b"), ("b", "a")]);

    match g.topological_sort() {
        Err(HiveError::DependencyCycle(ids)) => assert_eq!(ids, vec!["a", "b"]),
        other => panic!("expected DependencyCycle, got {other:?}"),
    }
}

#[test]
fn three_node_cycle_names_only_unresolved_images() {
    let g = graph(
        &["root", "a", "b", "c", "leaf"],
        &[("a", "c"), ("b", "a"), ("c", "b"), ("a", "root"), ("leaf", "a")],
    );

    match g.topological_sort() {
        Err(HiveError::DependencyCycle(ids)) => assert_eq!(ids, vec!["a", "b", "c", "leaf"]),
        other => panic!("expected DependencyCycle, got {other:?}"),
    }
}

#[test]
fn self_dependency_is_a_cycle() {
    let mut g = DependencyGraph::new();
    g.add_dependency("loop", "loop");

    assert!(g.has_dependencies());
    assert!(matches!(
        g.topological_sort(),
        Err(HiveError::DependencyCycle(ids)) if ids == vec!["loop".to_string()]
    ));
}

#[test]
fn add_dependency_registers_missing_images_and_collapses_duplicates() {
    let mut g = DependencyGraph::new();
    g.add_dependency("python", "ubuntu");
    g.add_dependency("python", "ubuntu");
    g.add_image("python");

    assert_eq!(g.len(), 2);
    assert!(g.contains("ubuntu"));
    assert_eq!(g.dependencies("python"), ["ubuntu".to_string()]);
    assert_eq!(g.dependents("ubuntu"), ["python".to_string()]);
}

#[test]
fn dependents_are_direct_only() {
    let g = graph(&[], &[("app", "python"), ("python", "ubuntu")]);

    assert_eq!(g.dependents("ubuntu"), ["python".to_string()]);
    assert!(g.dependents("app").is_empty());
    assert!(g.dependents("unknown").is_empty());
}

#[test]
fn has_dependencies_reflects_edges() {
    let mut g = graph(&["a", "b"], &[]);
    assert!(!g.has_dependencies());
    assert!(!DependencyGraph::new().has_dependencies());

    g.add_dependency("a", "b");
    assert!(g.has_dependencies());
}

#[test]
fn empty_graph_sorts_to_nothing() {
    let g = DependencyGraph::new();
    assert!(g.is_empty());
    assert!(g.topological_sort().unwrap().is_empty());
}
