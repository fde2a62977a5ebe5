//! Topological ordering of named nodes.
//!
//! The sorter is iterative: every round emits all nodes that no longer wait
//! on anything, so a cycle shows up as a round without progress instead of
//! unbounded recursion.

use std::collections::HashSet;
use std::fmt::Display;
use std::hash::Hash;

/// Orders nodes so that every dependency precedes its dependents.
///
/// Ties are broken by insertion order. One node may be marked deferred; it
/// is always emitted last, outside the graph.
///
/// # Examples
///
/// ```
/// use ringfold_core::DependencySorter;
///
/// let mut sorter = DependencySorter::new();
/// sorter.add_node("app", 2);
/// sorter.add_node("base", 1);
/// sorter.add_dependency("app", "base");
/// sorter.set_deferred("deploy", 3).unwrap();
///
/// let keys: Vec<_> = sorter.sort().unwrap().into_iter().map(|(k, _)| k).collect();
/// assert_eq!(keys, ["base", "app", "deploy"]);
/// ```
#[derive(Debug, Clone)]
pub struct DependencySorter<K, V> {
    nodes: Vec<(K, V)>,
    /// `(node, dependency)` pairs.
    edges: Vec<(K, K)>,
    deferred: Option<(K, V)>,
}

impl<K, V> Default for DependencySorter<K, V> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            deferred: None,
        }
    }
}

impl<K, V> DependencySorter<K, V>
where
    K: Eq + Hash + Clone + Display,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node. Adding an existing key replaces its value but keeps its
    /// original position.
    pub fn add_node(&mut self, key: K, value: V) {
        match self.nodes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.nodes.push((key, value)),
        }
    }

    /// Declares that `node` depends on `dependency`.
    ///
    /// Edges whose endpoints are never added as nodes are discarded by
    /// [`sort`](Self::sort).
    pub fn add_dependency(&mut self, node: K, dependency: K) {
        self.edges.push((node, dependency));
    }

    /// Marks the node that sorts after everything else.
    pub fn set_deferred(&mut self, key: K, value: V) -> crate::Result<()> {
        if let Some((existing, _)) = &self.deferred {
            return Err(crate::Error::MultipleDeferred {
                first: existing.to_string(),
                second: key.to_string(),
            });
        }
        self.deferred = Some((key, value));
        Ok(())
    }

    /// Consumes the sorter and returns the nodes in dependency order.
    pub fn sort(self) -> crate::Result<Vec<(K, V)>> {
        let Self {
            nodes: mut remaining,
            mut edges,
            deferred,
        } = self;

        let known: HashSet<K> = remaining.iter().map(|(k, _)| k.clone()).collect();
        edges.retain(|(node, dependency)| {
            let keep = known.contains(node) && known.contains(dependency);
            if !keep {
                tracing::debug!(%node, %dependency, "dropping dangling dependency edge");
            }
            keep
        });

        let mut sorted = Vec::with_capacity(remaining.len() + 1);

        while !remaining.is_empty() {
            let pending: HashSet<K> = edges.iter().map(|(node, _)| node.clone()).collect();

            let before = remaining.len();
            let (ready, blocked): (Vec<_>, Vec<_>) = remaining
                .into_iter()
                .partition(|(key, _)| !pending.contains(key));
            sorted.extend(ready);
            remaining = blocked;

            if remaining.len() == before {
                return Err(stuck(&remaining));
            }

            if edges.is_empty() {
                sorted.append(&mut remaining);
                break;
            }

            // An edge is resolved once its dependency was emitted this round.
            let before = edges.len();
            edges.retain(|(_, dependency)| pending.contains(dependency));
            if edges.len() == before && !remaining.is_empty() {
                return Err(stuck(&remaining));
            }
        }

        sorted.extend(deferred);
        Ok(sorted)
    }
}

fn stuck<K: Display, V>(remaining: &[(K, V)]) -> crate::Error {
    crate::Error::CyclicDependency {
        nodes: remaining.iter().map(|(k, _)| k.to_string()).collect(),
    }
}
