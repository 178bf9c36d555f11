// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Containment tree builder
//!
//! Turns a flat set of keys plus a "which container holds this key" relation
//! into an explicit parent map with a distinguished root.

use ifc_xml_model::{Diagnostic, IdentifierScheme, Result, SceneGraph};
use log::{debug, warn};
use rustc_hash::{FxHashMap, FxHashSet};

/// Parent map reconstructed from scene containment
///
/// Only nodes outside excluded categories are part of the tree; the others
/// are kept in a side table. Iteration yields parents before children.
#[derive(Clone, Debug, Default)]
pub struct ContainmentTree {
    /// Distinguished root (self-referential or first container-less node)
    root: Option<String>,
    /// key -> parent key (None for root-level nodes)
    parents: FxHashMap<String, Option<String>>,
    /// parent key -> child keys in scene order
    children: FxHashMap<String, Vec<String>>,
    /// Keys in parent-before-child order
    order: Vec<String>,
    /// Keys that can hold children
    containers: FxHashSet<String>,
    /// Diverted nodes: key -> excluded category that caught them
    excluded: Vec<(String, String)>,
    diagnostics: Vec<Diagnostic>,
}

impl ContainmentTree {
    /// Build the tree for everything under `root` in the scene
    ///
    /// Precomputes a reverse index (container -> members) so each node's
    /// container is found in O(1). The root's own container lies outside the
    /// enumerated set, so the root is treated as self-contained.
    pub fn build(scene: &dyn SceneGraph, root: &str, scheme: &IdentifierScheme) -> Result<Self> {
        let keys = scene.nodes(root)?;

        let mut container_index: FxHashMap<&str, &str> = FxHashMap::default();
        let mut containers = Vec::new();
        let members: Vec<(usize, Vec<String>)> = keys
            .iter()
            .enumerate()
            .filter(|(_, key)| scene.is_container(key))
            .map(|(i, key)| (i, scene.members(key)))
            .collect();
        for (i, list) in &members {
            let container = keys[*i].as_str();
            containers.push(container);
            for member in list {
                // First container wins when a node is linked into several
                container_index.entry(member.as_str()).or_insert(container);
            }
        }

        Ok(Self::from_relation(
            &keys,
            containers,
            |key| match container_index.get(key) {
                Some(container) => Some((*container).to_string()),
                None if key == root => Some(root.to_string()),
                None => None,
            },
            scheme,
        ))
    }

    /// Build the tree from an explicit containment relation
    ///
    /// `container_of` returns the immediate container of a key. A key that
    /// is its own container is the root. References to unknown keys and
    /// missing containers are recovered by attaching the node at the top
    /// level.
    pub fn from_relation<K, C, F>(
        keys: &[K],
        containers: C,
        container_of: F,
        scheme: &IdentifierScheme,
    ) -> Self
    where
        K: AsRef<str>,
        C: IntoIterator,
        C::Item: AsRef<str>,
        F: Fn(&str) -> Option<String>,
    {
        let mut tree = Self {
            containers: containers
                .into_iter()
                .map(|c| c.as_ref().to_string())
                .collect(),
            ..Self::default()
        };

        let known: FxHashSet<&str> = keys.iter().map(|k| k.as_ref()).collect();
        let mut raw_parents: FxHashMap<&str, Option<String>> = FxHashMap::default();
        let mut enumeration: Vec<&str> = Vec::with_capacity(keys.len());

        for key in keys.iter().map(|k| k.as_ref()) {
            if raw_parents.contains_key(key) {
                continue;
            }
            enumeration.push(key);

            let parent = match container_of(key) {
                Some(container) if container == key => {
                    if tree.root.is_none() {
                        tree.root = Some(key.to_string());
                    } else {
                        warn!("Second self-contained node {key}, attaching at root");
                        tree.diagnostics.push(Diagnostic::Orphan {
                            key: key.to_string(),
                        });
                    }
                    None
                }
                Some(container) if !known.contains(container.as_str()) => {
                    warn!("Container {container} of {key} is not a known key");
                    tree.diagnostics.push(Diagnostic::LookupFailure {
                        key: key.to_string(),
                        container,
                    });
                    None
                }
                Some(container) => Some(container),
                None => {
                    warn!("{key} has no container, attaching at root");
                    tree.diagnostics.push(Diagnostic::Orphan {
                        key: key.to_string(),
                    });
                    None
                }
            };
            raw_parents.insert(key, parent);
        }

        if tree.root.is_none() {
            tree.root = enumeration
                .iter()
                .find(|key| matches!(raw_parents.get(**key), Some(None)))
                .map(|key| key.to_string());
        }

        // Divert every node whose chain passes through an excluded category
        let mut exclusion: FxHashMap<&str, Option<String>> = FxHashMap::default();
        for &key in &enumeration {
            if let Some(category) = excluded_via(key, &raw_parents, scheme, &mut exclusion) {
                debug!("Excluding {key} (under {category})");
                tree.diagnostics.push(Diagnostic::Excluded {
                    key: key.to_string(),
                    category: category.clone(),
                });
                tree.excluded.push((key.to_string(), category));
            }
        }

        let included: Vec<&str> = enumeration
            .iter()
            .copied()
            .filter(|key| !matches!(exclusion.get(key), Some(Some(_))))
            .collect();
        if tree
            .root
            .as_deref()
            .is_some_and(|root| matches!(exclusion.get(root), Some(Some(_))))
        {
            tree.root = None;
        }

        for &key in &included {
            let parent = raw_parents.get(key).cloned().flatten();
            if let Some(parent) = &parent {
                tree.children
                    .entry(parent.clone())
                    .or_default()
                    .push(key.to_string());
            }
            tree.parents.insert(key.to_string(), parent);
        }

        tree.order_nodes(&included);
        debug!(
            "Containment tree: {} nodes, {} excluded, root {:?}",
            tree.order.len(),
            tree.excluded.len(),
            tree.root
        );
        tree
    }

    /// Fill `order` with a parent-before-child walk, cutting cycles
    fn order_nodes(&mut self, included: &[&str]) {
        let mut visited: FxHashSet<String> = FxHashSet::default();

        let starts: Vec<String> = included
            .iter()
            .filter(|key| matches!(self.parents.get(**key), Some(None)))
            .map(|key| key.to_string())
            .collect();
        for start in starts {
            self.walk_from(&start, &mut visited);
        }

        // Anything left hangs off a containment loop
        for &key in included {
            if visited.contains(key) {
                continue;
            }
            let entry = self.cycle_entry(key);
            warn!("Containment cycle through {entry}, cutting it");
            if let Some(Some(parent)) = self.parents.insert(entry.clone(), None) {
                if let Some(siblings) = self.children.get_mut(&parent) {
                    siblings.retain(|child| child != &entry);
                }
            }
            self.diagnostics.push(Diagnostic::Cycle { key: entry.clone() });
            self.walk_from(&entry, &mut visited);
        }
    }

    fn walk_from(&mut self, start: &str, visited: &mut FxHashSet<String>) {
        let mut stack = vec![start.to_string()];
        while let Some(key) = stack.pop() {
            if !visited.insert(key.clone()) {
                continue;
            }
            if let Some(children) = self.children.get(&key) {
                // Reverse so the first child is visited first
                stack.extend(children.iter().rev().cloned());
            }
            self.order.push(key);
        }
    }

    /// First node met twice when climbing parents from `start`
    fn cycle_entry(&self, start: &str) -> String {
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let mut current = start;
        loop {
            if !seen.insert(current) {
                return current.to_string();
            }
            match self.parents.get(current) {
                Some(Some(parent)) => current = parent.as_str(),
                _ => return current.to_string(),
            }
        }
    }

    /// The distinguished root, if any node qualified
    pub fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    /// Parent of a node; `None` for root-level and unknown nodes
    pub fn parent(&self, key: &str) -> Option<&str> {
        self.parents.get(key).and_then(|p| p.as_deref())
    }

    /// The full parent map
    pub fn parent_map(&self) -> &FxHashMap<String, Option<String>> {
        &self.parents
    }

    /// Children of a node in scene order
    pub fn children(&self, key: &str) -> &[String] {
        self.children.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Keys in parent-before-child order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Keys with no parent, in order
    pub fn top_level(&self) -> impl Iterator<Item = &str> {
        self.iter().filter(|key| self.parent(key).is_none())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.parents.contains_key(key)
    }

    pub fn is_container(&self, key: &str) -> bool {
        self.containers.contains(key)
    }

    /// Diverted nodes with the category that excluded them
    pub fn excluded(&self) -> &[(String, String)] {
        &self.excluded
    }

    pub fn is_excluded(&self, key: &str) -> bool {
        self.excluded.iter().any(|(k, _)| k == key)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Category that excludes `key`, looking at the key itself and its ancestors
fn excluded_via<'a>(
    key: &'a str,
    parents: &'a FxHashMap<&'a str, Option<String>>,
    scheme: &IdentifierScheme,
    memo: &mut FxHashMap<&'a str, Option<String>>,
) -> Option<String> {
    // Climb until a decided node, the top, or a repeat
    let mut chain: Vec<&'a str> = Vec::new();
    let mut seen: FxHashSet<&'a str> = FxHashSet::default();
    let mut current = Some(key);
    let mut verdict = None;

    while let Some(node) = current {
        if let Some(decided) = memo.get(node) {
            verdict = decided.clone();
            break;
        }
        if !seen.insert(node) {
            break;
        }
        if scheme.is_excluded(node) {
            let id = scheme.parse(node);
            verdict = Some(id.category.unwrap_or(node).to_string());
            memo.insert(node, verdict.clone());
            break;
        }
        chain.push(node);
        current = parents.get(node).and_then(|p| p.as_deref());
    }

    for node in chain {
        memo.insert(node, verdict.clone());
    }
    verdict
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relation(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: FxHashMap<String, String> = pairs
            .iter()
            .map(|(k, c)| (k.to_string(), c.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_single_self_reference_is_root() {
        let keys = ["Root", "IfcBuilding/Tower", "IfcBuildingStorey/L1"];
        let tree = ContainmentTree::from_relation(
            &keys,
            ["Root", "IfcBuilding/Tower"],
            relation(&[
                ("Root", "Root"),
                ("IfcBuilding/Tower", "Root"),
                ("IfcBuildingStorey/L1", "IfcBuilding/Tower"),
            ]),
            &IdentifierScheme::default(),
        );

        assert_eq!(tree.root(), Some("Root"));
        assert_eq!(tree.parent("Root"), None);
        assert_eq!(tree.parent("IfcBuilding/Tower"), Some("Root"));
        assert_eq!(tree.parent("IfcBuildingStorey/L1"), Some("IfcBuilding/Tower"));
        assert_eq!(tree.top_level().count(), 1);
        assert!(tree.diagnostics().is_empty());
    }

    #[test]
    fn test_unknown_container_recovers() {
        let keys = ["Root", "IfcWall/W1"];
        let tree = ContainmentTree::from_relation(
            &keys,
            ["Root"],
            relation(&[("Root", "Root"), ("IfcWall/W1", "IfcBuilding/Ghost")]),
            &IdentifierScheme::default(),
        );

        assert_eq!(tree.parent("IfcWall/W1"), None);
        assert!(tree.contains("IfcWall/W1"));
        assert_eq!(
            tree.diagnostics(),
            &[Diagnostic::LookupFailure {
                key: "IfcWall/W1".into(),
                container: "IfcBuilding/Ghost".into(),
            }]
        );
    }

    #[test]
    fn test_excluded_subtree() {
        let keys = ["Root", "Views", "Views/Section1", "IfcAnnotation/A1", "IfcWall/W1"];
        let tree = ContainmentTree::from_relation(
            &keys,
            ["Root", "Views", "Views/Section1"],
            relation(&[
                ("Root", "Root"),
                ("Views", "Root"),
                ("Views/Section1", "Views"),
                ("IfcAnnotation/A1", "Views/Section1"),
                ("IfcWall/W1", "Root"),
            ]),
            &IdentifierScheme::default(),
        );

        let order: Vec<&str> = tree.iter().collect();
        assert_eq!(order, ["Root", "IfcWall/W1"]);
        assert!(tree.is_excluded("Views"));
        assert!(tree.is_excluded("Views/Section1"));
        assert!(tree.is_excluded("IfcAnnotation/A1"));
        assert!(!tree.contains("IfcAnnotation/A1"));
        assert!(tree.children("Root").iter().all(|c| c == "IfcWall/W1"));
    }

    #[test]
    fn test_parent_before_child_order() {
        // Enumerated leaf-first on purpose
        let keys = ["IfcBuildingStorey/L2", "IfcBuildingStorey/L1", "IfcBuilding/Tower", "Root"];
        let tree = ContainmentTree::from_relation(
            &keys,
            ["Root", "IfcBuilding/Tower"],
            relation(&[
                ("Root", "Root"),
                ("IfcBuilding/Tower", "Root"),
                ("IfcBuildingStorey/L1", "IfcBuilding/Tower"),
                ("IfcBuildingStorey/L2", "IfcBuilding/Tower"),
            ]),
            &IdentifierScheme::default(),
        );

        let order: Vec<&str> = tree.iter().collect();
        assert_eq!(
            order,
            ["Root", "IfcBuilding/Tower", "IfcBuildingStorey/L2", "IfcBuildingStorey/L1"]
        );
    }

    #[test]
    fn test_cycle_is_cut() {
        let keys = ["Root", "IfcSpace/A", "IfcSpace/B"];
        let tree = ContainmentTree::from_relation(
            &keys,
            ["Root", "IfcSpace/A", "IfcSpace/B"],
            relation(&[
                ("Root", "Root"),
                ("IfcSpace/A", "IfcSpace/B"),
                ("IfcSpace/B", "IfcSpace/A"),
            ]),
            &IdentifierScheme::default(),
        );

        assert_eq!(tree.len(), 3);
        assert!(tree
            .diagnostics()
            .iter()
            .any(|d| matches!(d, Diagnostic::Cycle { .. })));
        assert_eq!(tree.top_level().count(), 2);
    }
}
