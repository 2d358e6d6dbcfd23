//! Cycle detection and deterministic execution ordering.
//!
//! Nodes are first ordered by how many tests they transitively depend on
//! (ties keep declaration order), then resolved depth-first with explicit
//! colors: a node is appended only after all of its prerequisites, and
//! reaching a node that is still in progress is a cycle.
//!
//! Ancestor counting is O(V + E) per node, so a full pass is O(V * (V + E)).
//! Suites hold tens of tests; this is a known limit, not a correctness issue.

use crate::diagnostics::IntegrateError;
use crate::graph::DependencyGraph;
use crate::suite::TestDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Unvisited,
    InProgress,
    Done,
}

/// A valid linear execution order for one suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    /// Node indices in execution order.
    order: Vec<usize>,
    /// `levels[i]` is the level of node `i` (0 for tests without prerequisites).
    levels: Vec<usize>,
}

impl Schedule {
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Test names in execution order.
    pub fn names<'g>(&self, graph: &'g DependencyGraph) -> Vec<&'g str> {
        self.order.iter().map(|&i| graph.node(i).name()).collect()
    }

    pub fn descriptors<'g>(&self, graph: &'g DependencyGraph) -> Vec<&'g TestDescriptor> {
        self.order.iter().map(|&i| graph.node(i)).collect()
    }

    /// Groups the order into sets of mutually independent tests. Every test
    /// sits one level above its deepest prerequisite; within a level the
    /// execution order is kept.
    pub fn levels(&self) -> Vec<Vec<usize>> {
        let depth = self.levels.iter().copied().max().map_or(0, |m| m + 1);
        let mut grouped = vec![Vec::new(); depth];
        for &node in &self.order {
            grouped[self.levels[node]].push(node);
        }
        grouped
    }
}

struct Resolver<'g> {
    graph: &'g DependencyGraph,
    colors: Vec<Color>,
    levels: Vec<usize>,
    order: Vec<usize>,
    /// Nodes currently in progress, outermost first.
    path: Vec<usize>,
}

impl<'g> Resolver<'g> {
    fn resolve(&mut self, node: usize) -> Result<(), IntegrateError> {
        match self.colors[node] {
            Color::Done => return Ok(()),
            Color::InProgress => unreachable!("in-progress nodes are caught by their dependent"),
            Color::Unvisited => {}
        }

        self.colors[node] = Color::InProgress;
        self.path.push(node);
        let mut level = 0;
        for &pre in self.graph.prerequisites(node) {
            if self.colors[pre] == Color::InProgress {
                return Err(self.cycle(node, pre));
            }
            self.resolve(pre)?;
            level = level.max(self.levels[pre] + 1);
        }
        self.path.pop();
        self.colors[node] = Color::Done;
        self.levels[node] = level;
        self.order.push(node);
        Ok(())
    }

    fn cycle(&self, from: usize, to: usize) -> IntegrateError {
        let start = self.path.iter().position(|&n| n == to).unwrap_or(0);
        // Each name depends on the one after it.
        let mut cycle: Vec<String> = self.path[start..]
            .iter()
            .map(|&n| self.graph.node(n).name().to_string())
            .collect();
        if let Some(first) = cycle.first().cloned() {
            cycle.push(first);
        }
        let name = |n: usize| self.graph.node(n).name().to_string();
        IntegrateError::DependencyCycle {
            suite: self.graph.suite().to_string(),
            from: name(from),
            to: name(to),
            cycle,
        }
    }
}

/// Produces an execution order in which every test follows all of its
/// dependencies, or the first cycle found.
pub fn schedule(graph: &DependencyGraph) -> Result<Schedule, IntegrateError> {
    let mut candidates: Vec<(usize, usize)> = (0..graph.len())
        .map(|i| (graph.ancestor_count(i), i))
        .collect();
    // Stable: equal counts keep declaration order.
    candidates.sort_by_key(|&(count, _)| count);

    let mut resolver = Resolver {
        graph,
        colors: vec![Color::Unvisited; graph.len()],
        levels: vec![0; graph.len()],
        order: Vec::with_capacity(graph.len()),
        path: Vec::new(),
    };
    for (count, node) in candidates {
        tracing::trace!(test = graph.node(node).name(), ancestors = count, "resolving");
        resolver.resolve(node)?;
    }

    tracing::debug!(
        suite = graph.suite(),
        order = ?resolver.order.iter().map(|&i| graph.node(i).name()).collect::<Vec<_>>(),
        "scheduled suite"
    );

    Ok(Schedule {
        order: resolver.order,
        levels: resolver.levels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::TestOptions;

    fn graph(tests: &[(&str, &[&str], &[&str])]) -> DependencyGraph {
        let descriptors: Vec<_> = tests
            .iter()
            .map(|(name, depends, skip_if_failed)| {
                TestDescriptor::new(
                    *name,
                    TestOptions::new()
                        .depends(depends.iter().copied())
                        .skip_if_failed(skip_if_failed.iter().copied()),
                )
            })
            .collect();
        DependencyGraph::build("suite", &descriptors).unwrap()
    }

    fn assert_topological(graph: &DependencyGraph, schedule: &Schedule) {
        let position: Vec<usize> = {
            let mut p = vec![0; graph.len()];
            for (i, &n) in schedule.order().iter().enumerate() {
                p[n] = i;
            }
            p
        };
        for (from, to) in graph.edges() {
            assert!(
                position[from] < position[to],
                "{} must precede {}",
                graph.node(from).name(),
                graph.node(to).name()
            );
        }
        assert_eq!(schedule.len(), graph.len());
    }

    #[test]
    fn every_dependency_precedes_its_dependent() {
        let g = graph(&[
            ("deploy", &["build", "migrate"], &[]),
            ("build", &["fetch"], &[]),
            ("migrate", &[], &["fetch"]),
            ("fetch", &[], &[]),
            ("smoke", &["deploy"], &["build"]),
            ("lint", &[], &[]),
        ]);
        let s = schedule(&g).unwrap();
        assert_topological(&g, &s);
    }

    #[test]
    fn independent_tests_run_first_in_declaration_order() {
        let g = graph(&[
            ("c", &["a"], &[]),
            ("a", &[], &[]),
            ("d", &["c"], &[]),
            ("b", &[], &[]),
        ]);
        let s = schedule(&g).unwrap();
        assert_eq!(s.names(&g), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn order_is_deterministic() {
        let g = graph(&[
            ("t3", &[], &["t2"]),
            ("t2", &["t1"], &[]),
            ("t1", &[], &[]),
            ("t4", &[], &[]),
        ]);
        let first = schedule(&g).unwrap();
        let second = schedule(&g).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.names(&g), vec!["t1", "t4", "t2", "t3"]);
    }

    #[test]
    fn two_node_cycle_names_both_tests() {
        let g = graph(&[("a", &["b"], &[]), ("b", &["a"], &[])]);
        let err = schedule(&g).unwrap_err();
        match err {
            IntegrateError::DependencyCycle {
                from, to, cycle, ..
            } => {
                assert_eq!((from.as_str(), to.as_str()), ("b", "a"));
                assert_eq!(cycle, vec!["a", "b", "a"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn longer_cycle_lists_every_participant() {
        let g = graph(&[
            ("ok", &[], &[]),
            ("x", &["z"], &[]),
            ("y", &[], &["x"]),
            ("z", &["y"], &[]),
        ]);
        let err = schedule(&g).unwrap_err();
        let IntegrateError::DependencyCycle { cycle, .. } = err else {
            panic!("expected a cycle");
        };
        assert_eq!(cycle.len(), 4);
        for name in ["x", "y", "z"] {
            assert!(cycle.iter().any(|c| c == name));
        }
        assert_eq!(cycle.first(), cycle.last());
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let g = graph(&[("a", &["a"], &[])]);
        let err = schedule(&g).unwrap_err();
        assert!(matches!(
            err,
            IntegrateError::DependencyCycle { ref from, ref to, .. } if from == "a" && to == "a"
        ));
    }

    #[test]
    fn levels_group_independent_tests() {
        let g = graph(&[
            ("a", &[], &[]),
            ("b", &[], &[]),
            ("c", &["a"], &[]),
            ("d", &["a", "b"], &[]),
            ("e", &["c"], &["d"]),
        ]);
        let s = schedule(&g).unwrap();
        let named: Vec<Vec<&str>> = s
            .levels()
            .into_iter()
            .map(|level| level.into_iter().map(|i| g.node(i).name()).collect())
            .collect();
        assert_eq!(named, vec![vec!["a", "b"], vec!["c", "d"], vec!["e"]]);
    }

    #[test]
    fn empty_graph_schedules_nothing() {
        let g = graph(&[]);
        let s = schedule(&g).unwrap();
        assert!(s.is_empty());
        assert!(s.levels().is_empty());
    }
}
