//! Issue dependency graph.
//!
//! Edges point from an issue to the issues it depends on. The graph must stay
//! a DAG: an edit that would let a dependency reach back to the issue itself
//! is rejected with [`CoreError::CyclicDependency`].

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::error::CoreError;
use crate::types::DbId;

/// Maximum number of direct dependencies a single issue may declare.
pub const MAX_DEPENDENCIES: usize = 64;

/// Adjacency map of `issue -> dependencies`.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: HashMap<DbId, HashSet<DbId>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from `(issue_id, depends_on_id)` pairs.
    pub fn from_edges<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = (DbId, DbId)>,
    {
        let mut graph = Self::new();
        for (issue_id, depends_on) in edges {
            graph.edges.entry(issue_id).or_default().insert(depends_on);
        }
        graph
    }

    /// Direct dependencies of `issue_id`.
    pub fn dependencies_of(&self, issue_id: DbId) -> impl Iterator<Item = DbId> + '_ {
        self.edges
            .get(&issue_id)
            .into_iter()
            .flat_map(|deps| deps.iter().copied())
    }

    /// Whether `target` is reachable from `start` by following dependency edges.
    pub fn reaches(&self, start: DbId, target: DbId) -> bool {
        if start == target {
            return true;
        }
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            for next in self.dependencies_of(current) {
                if next == target {
                    return true;
                }
                queue.push_back(next);
            }
        }
        false
    }

    /// Check that replacing `issue_id`'s dependencies with `dependencies`
    /// keeps the graph acyclic.
    ///
    /// A cycle appears exactly when some new dependency can already reach
    /// `issue_id`; the issue's current outgoing edges never lie on such a
    /// path, so they need not be removed first.
    pub fn check_dependencies(
        &self,
        issue_id: DbId,
        dependencies: &[DbId],
    ) -> Result<(), CoreError> {
        for &dependency_id in dependencies {
            if self.reaches(dependency_id, issue_id) {
                return Err(CoreError::CyclicDependency {
                    issue_id,
                    dependency_id,
                });
            }
        }
        Ok(())
    }
}

/// Sort, deduplicate and bound-check a dependency id list from a request.
pub fn normalize_dependency_ids(ids: &[DbId]) -> Result<Vec<DbId>, CoreError> {
    if let Some(bad) = ids.iter().find(|id| **id <= 0) {
        return Err(CoreError::Validation(format!(
            "Invalid dependency issue id: {bad}"
        )));
    }
    let unique: BTreeSet<DbId> = ids.iter().copied().collect();
    if unique.len() > MAX_DEPENDENCIES {
        return Err(CoreError::Validation(format!(
            "An issue may depend on at most {MAX_DEPENDENCIES} issues"
        )));
    }
    Ok(unique.into_iter().collect())
}
