//! Dependency graph construction.
//!
//! Nodes are the suite's descriptors, indexed by declaration order. An edge
//! `A -> B` means B names A in `depends` or `skip_if_failed`, i.e. A must run
//! first. Names resolve only against the same suite.

use std::collections::HashMap;

use crate::diagnostics::IntegrateError;
use crate::suite::TestDescriptor;

#[derive(Debug, Clone)]
pub struct DependencyGraph {
    suite: String,
    nodes: Vec<TestDescriptor>,
    /// `prerequisites[b]` lists every `a` with an edge `a -> b`, in declared order.
    prerequisites: Vec<Vec<usize>>,
    /// `dependents[a]` lists every `b` with an edge `a -> b`.
    dependents: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Builds the graph for one suite, failing on duplicate test names and on
    /// dependency names that match no test.
    pub fn build(suite: &str, descriptors: &[TestDescriptor]) -> Result<Self, IntegrateError> {
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(descriptors.len());
        for (i, d) in descriptors.iter().enumerate() {
            if index.insert(d.name(), i).is_some() {
                return Err(IntegrateError::DuplicateTest {
                    suite: suite.to_string(),
                    test: d.name().to_string(),
                });
            }
        }

        let mut prerequisites = vec![Vec::new(); descriptors.len()];
        let mut dependents = vec![Vec::new(); descriptors.len()];
        for (b, d) in descriptors.iter().enumerate() {
            for name in d.dependencies() {
                let Some(&a) = index.get(name) else {
                    return Err(IntegrateError::UnknownDependency {
                        suite: suite.to_string(),
                        test: d.name().to_string(),
                        dependency: name.to_string(),
                    });
                };
                if prerequisites[b].contains(&a) {
                    continue;
                }
                prerequisites[b].push(a);
                dependents[a].push(b);
            }
        }

        tracing::debug!(
            suite,
            nodes = descriptors.len(),
            edges = prerequisites.iter().map(Vec::len).sum::<usize>(),
            "built dependency graph"
        );

        Ok(Self {
            suite: suite.to_string(),
            nodes: descriptors.to_vec(),
            prerequisites,
            dependents,
        })
    }

    pub fn suite(&self) -> &str {
        &self.suite
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: usize) -> &TestDescriptor {
        &self.nodes[index]
    }

    pub fn nodes(&self) -> &[TestDescriptor] {
        &self.nodes
    }

    pub fn prerequisites(&self, index: usize) -> &[usize] {
        &self.prerequisites[index]
    }

    pub fn dependents(&self, index: usize) -> &[usize] {
        &self.dependents[index]
    }

    /// All `(from, to)` edges.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.prerequisites
            .iter()
            .enumerate()
            .flat_map(|(b, pre)| pre.iter().map(move |&a| (a, b)))
    }

    /// Number of distinct tests reachable through prerequisite edges.
    pub fn ancestor_count(&self, index: usize) -> usize {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack: Vec<usize> = self.prerequisites[index].clone();
        let mut count = 0;
        while let Some(n) = stack.pop() {
            if seen[n] || n == index {
                continue;
            }
            seen[n] = true;
            count += 1;
            stack.extend(&self.prerequisites[n]);
        }
        count
    }
}
