// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Immutable scene snapshot
//!
//! A [`SceneSnapshot`] is captured once before a run and only read
//! afterwards. It loads from JSON:
//!
//! ```json
//! {
//!   "nodes": [
//!     { "key": "IfcProject/", "is_container": true, "members": ["IfcBuilding/Tower"] },
//!     { "key": "IfcBuilding/Tower", "transform": { "position": { "x": 0.0, "y": 0.0, "z": 0.0 } } }
//!   ]
//! }
//! ```

use ifc_xml_model::{ExportError, Result, SceneGraph, Transform};
use log::{debug, warn};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One node of the captured scene
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub key: String,
    #[serde(default)]
    pub is_container: bool,
    /// Direct members in scene order; only meaningful for containers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotData {
    nodes: Vec<SnapshotNode>,
}

/// Read-only scene captured at the start of a run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(from = "SnapshotData", into = "SnapshotData")]
pub struct SceneSnapshot {
    nodes: Vec<SnapshotNode>,
    index: FxHashMap<String, usize>,
}

impl From<SnapshotData> for SceneSnapshot {
    fn from(data: SnapshotData) -> Self {
        Self::from_nodes(data.nodes)
    }
}

impl From<SceneSnapshot> for SnapshotData {
    fn from(snapshot: SceneSnapshot) -> Self {
        SnapshotData {
            nodes: snapshot.nodes,
        }
    }
}

impl SceneSnapshot {
    /// Start building a snapshot in code
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::default()
    }

    /// Create a snapshot from a node list
    ///
    /// When a key appears twice, the first occurrence is kept.
    pub fn from_nodes(nodes: Vec<SnapshotNode>) -> Self {
        let mut index = FxHashMap::default();
        let mut kept = Vec::with_capacity(nodes.len());
        for node in nodes {
            if index.contains_key(&node.key) {
                warn!("Duplicate scene key {}, keeping the first", node.key);
                continue;
            }
            index.insert(node.key.clone(), kept.len());
            kept.push(node);
        }
        Self { nodes: kept, index }
    }

    /// Parse a snapshot from JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        let snapshot: SceneSnapshot = serde_json::from_str(json)?;
        debug!("Loaded scene snapshot with {} nodes", snapshot.len());
        Ok(snapshot)
    }

    /// Load a snapshot from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Encode the snapshot as pretty-printed JSON
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&SnapshotData {
            nodes: self.nodes.clone(),
        })?)
    }

    pub fn get(&self, key: &str) -> Option<&SnapshotNode> {
        self.index.get(key).map(|&i| &self.nodes[i])
    }

    /// All nodes in capture order
    pub fn iter(&self) -> impl Iterator<Item = &SnapshotNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl SceneGraph for SceneSnapshot {
    fn nodes(&self, root: &str) -> Result<Vec<String>> {
        if !self.contains(root) {
            return Err(ExportError::RootNotFound(root.to_string()));
        }

        let mut visited: FxHashSet<&str> = FxHashSet::default();
        let mut keys = Vec::new();
        let mut stack = vec![root];
        while let Some(key) = stack.pop() {
            if !visited.insert(key) {
                continue;
            }
            keys.push(key.to_string());
            let Some(node) = self.get(key) else {
                continue;
            };
            if node.is_container {
                // Reverse so the first member is visited first
                stack.extend(
                    node.members
                        .iter()
                        .rev()
                        .map(String::as_str)
                        .filter(|member| {
                            let known = self.contains(member);
                            if !known {
                                debug!("{key} lists unknown member {member}");
                            }
                            known && !visited.contains(member)
                        }),
                );
            }
        }
        Ok(keys)
    }

    fn members(&self, container: &str) -> Vec<String> {
        match self.get(container) {
            Some(node) if node.is_container => node.members.clone(),
            _ => Vec::new(),
        }
    }

    fn is_container(&self, key: &str) -> bool {
        self.get(key).is_some_and(|node| node.is_container)
    }

    fn world_transform(&self, key: &str) -> Option<Transform> {
        self.get(key).and_then(|node| node.transform)
    }

    fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }
}

/// Programmatic construction of a [`SceneSnapshot`]
#[derive(Clone, Debug, Default)]
pub struct SnapshotBuilder {
    nodes: Vec<SnapshotNode>,
}

impl SnapshotBuilder {
    /// Add a container with its direct members
    pub fn container<I, S>(mut self, key: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.nodes.push(SnapshotNode {
            key: key.into(),
            is_container: true,
            members: members.into_iter().map(Into::into).collect(),
            transform: None,
        });
        self
    }

    /// Add a leaf object carrying a transform
    pub fn object(mut self, key: impl Into<String>, transform: Transform) -> Self {
        self.nodes.push(SnapshotNode {
            key: key.into(),
            is_container: false,
            members: Vec::new(),
            transform: Some(transform),
        });
        self
    }

    /// Add a leaf object with no transform
    pub fn bare(mut self, key: impl Into<String>) -> Self {
        self.nodes.push(SnapshotNode {
            key: key.into(),
            is_container: false,
            members: Vec::new(),
            transform: None,
        });
        self
    }

    /// Attach a transform to the most recently added node
    pub fn with_transform(mut self, transform: Transform) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.transform = Some(transform);
        }
        self
    }

    pub fn build(self) -> SceneSnapshot {
        SceneSnapshot::from_nodes(self.nodes)
    }
}
