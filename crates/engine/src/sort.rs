//! Dependency ordering of a change set using topological sort.
//!
//! Uses Kahn's algorithm with cycle detection. Creates/updates are
//! ordered so a dependency is applied before its dependents (resolved
//! against the sync snapshot — the post-change state); deletes are
//! ordered in reverse, dependents before their dependencies (resolved
//! against the active snapshot, since the sync side no longer has them).
//!
//! Dependency edges are only drawn between documents of the same
//! collection that are both touched by the run; names pointing outside
//! the touched set (modules, themes, untouched config) impose no
//! ordering constraint here.
//!
//! Output is deterministic: whenever several documents are ready at
//! once, they are emitted in ascending (collection, name) order.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use tracing::debug;

use crate::diff::{Change, ChangeOp, ChangeSet, qualified};
use crate::error::{ConfigError, ConfigResult};
use crate::snapshot::Snapshot;

type Key = (String, String);

/// Order a change set into the final apply sequence.
///
/// Deletes come first (dependents before dependencies), followed by
/// creates and updates (dependencies before dependents). The diff
/// guarantees the delete set is name-disjoint from the create/update
/// set, so the two blocks have no cross constraints.
///
/// Fails with [`ConfigError::CyclicDependency`] naming the cycle when
/// no topological order exists. Runs entirely before apply begins — a
/// cycle never causes partial mutation.
pub fn order(
    changes: &ChangeSet,
    active: &Snapshot,
    sync: &Snapshot,
) -> ConfigResult<Vec<Change>> {
    let deletes = changes.delete_keys().clone();
    let creates_updates = changes.create_update_keys();

    // Dependents deleted before their dependencies: reverse each edge.
    let delete_order = sort_subset(&deletes, |(collection, name)| {
        dependents_within(&deletes, active, collection, name)
    })?;

    // Dependencies created/updated before their dependents.
    let create_update_order = sort_subset(&creates_updates, |(collection, name)| {
        dependencies_within(&creates_updates, sync, collection, name)
    })?;

    let mut ordered = Vec::with_capacity(delete_order.len() + create_update_order.len());
    for (collection, name) in delete_order {
        ordered.push(Change::new(collection, name, ChangeOp::Delete));
    }
    for (collection, name) in create_update_order {
        let op = match changes.op_for(&collection, &name) {
            Some(op) => op,
            None => continue, // unreachable: keys came from the set itself
        };
        ordered.push(Change::new(collection, name, op));
    }

    debug!(operations = ordered.len(), "Change set ordered");
    Ok(ordered)
}

/// Declared dependencies of a document that are part of `subset`.
fn dependencies_within(
    subset: &BTreeSet<Key>,
    snapshot: &Snapshot,
    collection: &str,
    name: &str,
) -> Vec<Key> {
    let Some(doc) = snapshot.get(collection, name) else {
        return Vec::new();
    };
    doc.dependencies()
        .into_iter()
        .map(|dep| (collection.to_string(), dep))
        .filter(|key| subset.contains(key))
        .collect()
}

/// Documents in `subset` that declare a dependency on the given one.
fn dependents_within(
    subset: &BTreeSet<Key>,
    snapshot: &Snapshot,
    collection: &str,
    name: &str,
) -> Vec<Key> {
    subset
        .iter()
        .filter(|(other_collection, other_name)| {
            other_collection == collection
                && snapshot
                    .get(other_collection, other_name)
                    .is_some_and(|doc| doc.dependencies().contains(name))
        })
        .cloned()
        .collect()
}

/// Kahn's algorithm over one subset of the change set.
///
/// `predecessors_of` returns the nodes that must be emitted before the
/// given node. Ties among ready nodes break by ascending key via a
/// min-heap, keeping the output deterministic.
fn sort_subset(
    keys: &BTreeSet<Key>,
    predecessors_of: impl Fn(&Key) -> Vec<Key>,
) -> ConfigResult<Vec<Key>> {
    let mut in_degree: BTreeMap<&Key, usize> = keys.iter().map(|k| (k, 0)).collect();
    let mut successors: BTreeMap<&Key, Vec<&Key>> = BTreeMap::new();

    for key in keys {
        for pred in predecessors_of(key) {
            // Resolve the returned key back to the set's own allocation.
            let Some(pred) = keys.get(&pred) else { continue };
            if pred == key {
                continue; // self-dependency imposes no order
            }
            if let Some(degree) = in_degree.get_mut(key) {
                *degree += 1;
            }
            successors.entry(pred).or_default().push(key);
        }
    }

    let mut ready: BinaryHeap<Reverse<&Key>> = in_degree
        .iter()
        .filter(|&(_, &degree)| degree == 0)
        .map(|(&key, _)| Reverse(key))
        .collect();

    let mut result = Vec::with_capacity(keys.len());
    while let Some(Reverse(key)) = ready.pop() {
        result.push(key.clone());

        if let Some(next) = successors.get(key) {
            for &successor in next {
                if let Some(degree) = in_degree.get_mut(successor) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(Reverse(successor));
                    }
                }
            }
        }
    }

    if result.len() != keys.len() {
        let emitted: BTreeSet<&Key> = result.iter().collect();
        let members: Vec<String> = keys
            .iter()
            .filter(|key| !emitted.contains(key))
            .map(|(collection, name)| qualified(collection, name))
            .collect();
        return Err(ConfigError::CyclicDependency { members });
    }

    Ok(result)
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::diff::diff;
    use crate::document::ConfigDocument;

    fn doc(name: &str, config_deps: &[&str]) -> ConfigDocument {
        let yaml = if config_deps.is_empty() {
            "label: test\n".to_string()
        } else {
            let list: String = config_deps.iter().map(|d| format!("    - {d}\n")).collect();
            format!("label: test\ndependencies:\n  config:\n{list}")
        };
        ConfigDocument::new(name, serde_yml::from_str(&yaml).unwrap())
    }

    fn position(ordered: &[Change], name: &str) -> usize {
        ordered.iter().position(|c| c.name == name).unwrap()
    }

    #[test]
    fn dependency_created_before_dependent() {
        let active = Snapshot::empty();
        let sync = Snapshot::from_documents([doc("a", &["b"]), doc("b", &[])]);

        let changes = diff(&active, &sync);
        let ordered = order(&changes, &active, &sync).unwrap();

        assert!(position(&ordered, "b") < position(&ordered, "a"));
    }

    #[test]
    fn dependent_deleted_before_dependency() {
        let active = Snapshot::from_documents([doc("a", &["b"]), doc("b", &[])]);
        let sync = Snapshot::empty();

        let changes = diff(&active, &sync);
        let ordered = order(&changes, &active, &sync).unwrap();

        assert!(position(&ordered, "a") < position(&ordered, "b"));
        assert!(ordered.iter().all(|c| c.op == ChangeOp::Delete));
    }

    #[test]
    fn diamond_resolves_with_root_first() {
        let active = Snapshot::empty();
        let sync = Snapshot::from_documents([
            doc("top", &["left", "right"]),
            doc("left", &["base"]),
            doc("right", &["base"]),
            doc("base", &[]),
        ]);

        let changes = diff(&active, &sync);
        let ordered = order(&changes, &active, &sync).unwrap();

        assert!(position(&ordered, "base") < position(&ordered, "left"));
        assert!(position(&ordered, "base") < position(&ordered, "right"));
        assert!(position(&ordered, "left") < position(&ordered, "top"));
        assert!(position(&ordered, "right") < position(&ordered, "top"));
    }

    #[test]
    fn ties_break_by_ascending_name() {
        let active = Snapshot::empty();
        let sync =
            Snapshot::from_documents([doc("zebra", &[]), doc("alpha", &[]), doc("middle", &[])]);

        let changes = diff(&active, &sync);
        let ordered = order(&changes, &active, &sync).unwrap();

        let names: Vec<&str> = ordered.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "middle", "zebra"]);
    }

    #[test]
    fn direct_cycle_detected() {
        let active = Snapshot::empty();
        let sync = Snapshot::from_documents([doc("a", &["b"]), doc("b", &["a"])]);

        let changes = diff(&active, &sync);
        let err = order(&changes, &active, &sync).unwrap_err();
        match err {
            ConfigError::CyclicDependency { members } => {
                assert_eq!(members, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected CyclicDependency, got: {other}"),
        }
    }

    #[test]
    fn indirect_cycle_detected() {
        let active = Snapshot::empty();
        let sync =
            Snapshot::from_documents([doc("a", &["b"]), doc("b", &["c"]), doc("c", &["a"])]);

        let changes = diff(&active, &sync);
        assert!(matches!(
            order(&changes, &active, &sync),
            Err(ConfigError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn external_dependencies_impose_no_order() {
        // "b" exists in both snapshots unchanged, "module_x" is not config.
        let active = Snapshot::from_documents([doc("b", &[])]);
        let sync = Snapshot::from_documents([doc("a", &["b", "module_x"]), doc("b", &[])]);

        let changes = diff(&active, &sync);
        let ordered = order(&changes, &active, &sync).unwrap();

        assert_eq!(ordered.len(), 1);
        assert_eq!(ordered[0].name, "a");
    }

    #[test]
    fn deletes_precede_creates() {
        let active = Snapshot::from_documents([doc("old", &[])]);
        let sync = Snapshot::from_documents([doc("new", &[])]);

        let changes = diff(&active, &sync);
        let ordered = order(&changes, &active, &sync).unwrap();

        assert_eq!(ordered[0].op, ChangeOp::Delete);
        assert_eq!(ordered[1].op, ChangeOp::Create);
    }
}
