// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mirror builder
//!
//! Creates one output node per tree node, then wires the parent/child
//! relation between them, then copies transforms. Building always comes
//! first: [`MirrorNodes`] only turns into a [`MirrorTree`] through
//! [`MirrorNodes::assemble`], so assembly can never observe a half-built set.

use crate::containment::ContainmentTree;
use ifc_xml_model::{Diagnostic, IdentifierScheme, Noted, ObjectAttributes, Transform};
use log::{debug, warn};
use rayon::prelude::*;
use rustc_hash::FxHashMap;

/// Format used for the `time` attribute
pub const TIME_FORMAT: &str = "%Y/%m/%d %H:%M";

/// Current local time as written in the `time` attribute
pub fn timestamp_now() -> String {
    chrono::Local::now().format(TIME_FORMAT).to_string()
}

/// Output node paralleling one source node
#[derive(Clone, Debug, PartialEq)]
pub struct MirrorNode {
    /// Key of the source node
    pub key: String,
    pub attributes: ObjectAttributes,
    /// Copied transform; identity when the source had none
    pub transform: Transform,
    /// Key of the mirrored parent; `None` at the top level
    pub parent_key: Option<String>,
    /// Document path, set once the node is inserted
    pub path: Option<String>,
    /// Whether a transform was found on the source
    pub has_transform: bool,
    children: Vec<usize>,
}

impl MirrorNode {
    fn new(key: String, attributes: ObjectAttributes) -> Self {
        Self {
            key,
            attributes,
            transform: Transform::IDENTITY,
            parent_key: None,
            path: None,
            has_transform: false,
            children: Vec::new(),
        }
    }
}

/// Settings for the build phase
#[derive(Clone, Debug)]
pub struct MirrorBuilder {
    scheme: IdentifierScheme,
    category_code: String,
    timestamp: Option<String>,
    strip_type_prefix: bool,
}

impl MirrorBuilder {
    /// Create a builder using the given identifier rules
    pub fn new(scheme: IdentifierScheme) -> Self {
        Self {
            scheme,
            category_code: "0".to_string(),
            timestamp: None,
            strip_type_prefix: true,
        }
    }

    /// Classification code written to `category`
    pub fn with_category_code(mut self, code: impl Into<String>) -> Self {
        self.category_code = code.into();
        self
    }

    /// Fixed value for the `time` attribute instead of the current time
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Keep the hierarchy prefix on `type` (`IfcBuilding` instead of `Building`)
    pub fn with_strip_type_prefix(mut self, strip: bool) -> Self {
        self.strip_type_prefix = strip;
        self
    }

    /// Build phase: one node per tree node, in tree order, no relations yet
    pub fn build(&self, tree: &ContainmentTree) -> MirrorNodes {
        let time = self.timestamp.clone().unwrap_or_else(timestamp_now);

        let nodes: Vec<MirrorNode> = tree
            .iter()
            .map(|key| MirrorNode::new(key.to_string(), self.attributes_for(key, &time)))
            .collect();
        let index = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.key.clone(), i))
            .collect();

        debug!("Built {} mirror nodes", nodes.len());
        MirrorNodes {
            nodes,
            index,
            diagnostics: Vec::new(),
        }
    }

    /// Attribute record derived from a key
    pub fn attributes_for(&self, key: &str, time: &str) -> ObjectAttributes {
        let id = self.scheme.parse(key);
        let name = id.display_name().to_string();
        let category = id.category_or_empty();
        let object_type = if self.strip_type_prefix {
            self.scheme.object_type(category)
        } else {
            category
        };
        ObjectAttributes {
            object_type: object_type.to_string(),
            category: self.category_code.clone(),
            alias: name.clone(),
            model: name.clone(),
            name,
            id: String::new(),
            remark: String::new(),
            time: time.to_string(),
            noted: Noted::Created,
        }
    }
}

/// Mirror nodes after the build phase, before assembly
#[derive(Clone, Debug)]
pub struct MirrorNodes {
    nodes: Vec<MirrorNode>,
    index: FxHashMap<String, usize>,
    diagnostics: Vec<Diagnostic>,
}

impl MirrorNodes {
    /// Transform phase; may run before or after assembly
    pub fn apply_transforms<F>(&mut self, provider: F)
    where
        F: Fn(&str) -> Option<Transform> + Sync,
    {
        copy_transforms(&mut self.nodes, &mut self.diagnostics, provider);
    }

    /// Assemble phase: mirror the tree's parent/child relation
    ///
    /// Nodes whose parent is absent (the root, or a parent that was never
    /// mirrored) go to the top level.
    pub fn assemble(mut self, tree: &ContainmentTree) -> MirrorTree {
        let mut top_level = Vec::new();

        for i in 0..self.nodes.len() {
            let parent = tree
                .parent(&self.nodes[i].key)
                .and_then(|p| self.index.get(p).copied().map(|idx| (p, idx)));
            match parent {
                Some((parent_key, parent_idx)) => {
                    self.nodes[i].parent_key = Some(parent_key.to_string());
                    self.nodes[parent_idx].children.push(i);
                }
                None => top_level.push(i),
            }
        }

        debug!(
            "Assembled mirror tree: {} nodes, {} at top level",
            self.nodes.len(),
            top_level.len()
        );
        MirrorTree {
            nodes: self.nodes,
            index: self.index,
            top_level,
            diagnostics: self.diagnostics,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&MirrorNode> {
        self.index.get(key).map(|&i| &self.nodes[i])
    }
}

/// Fully assembled mirror tree
#[derive(Clone, Debug)]
pub struct MirrorTree {
    nodes: Vec<MirrorNode>,
    index: FxHashMap<String, usize>,
    top_level: Vec<usize>,
    diagnostics: Vec<Diagnostic>,
}

impl MirrorTree {
    /// Transform phase run after assembly
    pub fn apply_transforms<F>(&mut self, provider: F)
    where
        F: Fn(&str) -> Option<Transform> + Sync,
    {
        copy_transforms(&mut self.nodes, &mut self.diagnostics, provider);
    }

    /// Get a node by source key
    pub fn get(&self, key: &str) -> Option<&MirrorNode> {
        self.index.get(key).map(|&i| &self.nodes[i])
    }

    /// Record the document path of a node
    pub fn set_path(&mut self, key: &str, path: impl Into<String>) {
        if let Some(&i) = self.index.get(key) {
            self.nodes[i].path = Some(path.into());
        }
    }

    /// Top-level nodes in order
    pub fn top_level(&self) -> impl Iterator<Item = &MirrorNode> {
        self.top_level.iter().map(|&i| &self.nodes[i])
    }

    /// Children of a node in order
    pub fn children<'a>(&'a self, node: &'a MirrorNode) -> impl Iterator<Item = &'a MirrorNode> {
        node.children.iter().map(|&i| &self.nodes[i])
    }

    /// Iterate all nodes depth-first, parents before children
    pub fn iter(&self) -> MirrorIter<'_> {
        MirrorIter {
            tree: self,
            stack: self.top_level.iter().rev().copied().collect(),
        }
    }

    /// Skip a subtree while iterating: collect every key under `key`
    pub fn subtree_keys(&self, key: &str) -> Vec<String> {
        let Some(&start) = self.index.get(key) else {
            return Vec::new();
        };
        let mut keys = Vec::new();
        let mut stack = vec![start];
        while let Some(i) = stack.pop() {
            keys.push(self.nodes[i].key.clone());
            stack.extend(self.nodes[i].children.iter().rev().copied());
        }
        keys
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Iterator over mirror nodes (depth-first)
pub struct MirrorIter<'a> {
    tree: &'a MirrorTree,
    stack: Vec<usize>,
}

impl<'a> Iterator for MirrorIter<'a> {
    type Item = &'a MirrorNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = &self.tree.nodes[self.stack.pop()?];
        // Add children in reverse order so first child is processed first
        self.stack.extend(node.children.iter().rev().copied());
        Some(node)
    }
}

/// Copy transforms onto nodes, falling back to identity
///
/// Each node is read and written independently, so the copy runs in
/// parallel; diagnostics are collected afterwards in node order.
fn copy_transforms<F>(nodes: &mut [MirrorNode], diagnostics: &mut Vec<Diagnostic>, provider: F)
where
    F: Fn(&str) -> Option<Transform> + Sync,
{
    nodes.par_iter_mut().for_each(|node| match provider(&node.key) {
        Some(transform) => {
            node.transform = transform;
            node.has_transform = true;
        }
        None => {
            node.transform = Transform::IDENTITY;
            node.has_transform = false;
        }
    });

    // Only the latest pass decides which nodes lack a transform
    diagnostics.retain(|d| !matches!(d, Diagnostic::MissingTransform { .. }));
    for node in nodes.iter().filter(|n| !n.has_transform) {
        warn!("No transform for {}, using identity", node.key);
        diagnostics.push(Diagnostic::MissingTransform {
            key: node.key.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ifc_xml_model::Vec3;

    fn scenario_tree() -> ContainmentTree {
        let relation = |key: &str| -> Option<String> {
            match key {
                "Root" => Some("Root".into()),
                "IfcBuilding/Tower" => Some("Root".into()),
                "IfcBuildingStorey/L1" | "IfcBuildingStorey/L2" => {
                    Some("IfcBuilding/Tower".into())
                }
                _ => None,
            }
        };
        ContainmentTree::from_relation(
            &["Root", "IfcBuilding/Tower", "IfcBuildingStorey/L1", "IfcBuildingStorey/L2"],
            ["Root", "IfcBuilding/Tower"],
            relation,
            &IdentifierScheme::default(),
        )
    }

    fn builder() -> MirrorBuilder {
        MirrorBuilder::new(IdentifierScheme::default()).with_timestamp("2023/05/04 10:30")
    }

    #[test]
    fn test_build_attributes() {
        let nodes = builder().build(&scenario_tree());
        assert_eq!(nodes.len(), 4);

        let storey = nodes.get("IfcBuildingStorey/L1").unwrap();
        assert_eq!(storey.attributes.object_type, "BuildingStorey");
        assert_eq!(storey.attributes.name, "L1");
        assert_eq!(storey.attributes.alias, "L1");
        assert_eq!(storey.attributes.model, "L1");
        assert_eq!(storey.attributes.category, "0");
        assert_eq!(storey.attributes.id, "");
        assert_eq!(storey.attributes.time, "2023/05/04 10:30");
        assert_eq!(storey.attributes.noted, Noted::Created);
        // Nothing is wired before assembly
        assert!(storey.parent_key.is_none());
    }

    #[test]
    fn test_bare_key_uses_whole_key_as_name() {
        let nodes = builder().build(&scenario_tree());
        let root = nodes.get("Root").unwrap();
        assert_eq!(root.attributes.name, "Root");
        assert_eq!(root.attributes.object_type, "");
    }

    #[test]
    fn test_keep_type_prefix() {
        let nodes = builder()
            .with_strip_type_prefix(false)
            .with_category_code("7")
            .build(&scenario_tree());
        let tower = nodes.get("IfcBuilding/Tower").unwrap();
        assert_eq!(tower.attributes.object_type, "IfcBuilding");
        assert_eq!(tower.attributes.category, "7");
    }

    #[test]
    fn test_assemble_mirrors_structure() {
        let tree = scenario_tree();
        let mirror = builder().build(&tree).assemble(&tree);

        let top: Vec<&str> = mirror.top_level().map(|n| n.key.as_str()).collect();
        assert_eq!(top, ["Root"]);

        let tower = mirror.get("IfcBuilding/Tower").unwrap();
        assert_eq!(tower.parent_key.as_deref(), Some("Root"));
        let storeys: Vec<&str> = mirror.children(tower).map(|n| n.attributes.name.as_str()).collect();
        assert_eq!(storeys, ["L1", "L2"]);

        let order: Vec<&str> = mirror.iter().map(|n| n.key.as_str()).collect();
        assert_eq!(
            order,
            ["Root", "IfcBuilding/Tower", "IfcBuildingStorey/L1", "IfcBuildingStorey/L2"]
        );
    }

    #[test]
    fn test_transforms_before_and_after_assembly_agree() {
        let tree = scenario_tree();
        let provider = |key: &str| {
            (key == "IfcBuilding/Tower").then(|| {
                Transform::new([1.5, -2.0, 3.25], [0.0, 0.0, std::f64::consts::FRAC_PI_2], [2.0, 2.0, 2.0])
            })
        };

        let mut early = builder().build(&tree);
        early.apply_transforms(provider);
        let early = early.assemble(&tree);

        let mut late = builder().build(&tree).assemble(&tree);
        late.apply_transforms(provider);

        for key in tree.iter() {
            assert_eq!(early.get(key).unwrap().transform, late.get(key).unwrap().transform);
        }
        let tower = late.get("IfcBuilding/Tower").unwrap();
        assert_eq!(tower.transform.position, Vec3::new(1.5, -2.0, 3.25));
        assert!(tower.has_transform);
    }

    #[test]
    fn test_missing_transform_defaults_to_identity() {
        let tree = scenario_tree();
        let mut mirror = builder().build(&tree).assemble(&tree);
        mirror.apply_transforms(|_| None);

        let root = mirror.get("Root").unwrap();
        assert_eq!(root.transform, Transform::IDENTITY);
        assert_eq!(root.transform.scale, Vec3::ONE);
        assert_eq!(mirror.diagnostics().len(), 4);
        assert!(mirror
            .diagnostics()
            .iter()
            .all(|d| matches!(d, Diagnostic::MissingTransform { .. })));
    }

    #[test]
    fn test_second_pass_clears_missing_transforms() {
        let tree = scenario_tree();
        let mut mirror = builder().build(&tree).assemble(&tree);
        mirror.apply_transforms(|_| None);
        assert_eq!(mirror.diagnostics().len(), 4);

        mirror.apply_transforms(|key: &str| (key != "Root").then_some(Transform::IDENTITY));
        assert_eq!(
            mirror.diagnostics(),
            [Diagnostic::MissingTransform { key: "Root".into() }]
        );
        assert!(mirror.get("IfcBuildingStorey/L1").unwrap().has_transform);
    }

    #[test]
    fn test_subtree_keys() {
        let tree = scenario_tree();
        let mirror = builder().build(&tree).assemble(&tree);
        assert_eq!(
            mirror.subtree_keys("IfcBuilding/Tower"),
            ["IfcBuilding/Tower", "IfcBuildingStorey/L1", "IfcBuildingStorey/L2"]
        );
        assert!(mirror.subtree_keys("Nope").is_empty());
    }
}
