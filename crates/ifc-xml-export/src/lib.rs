// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IFC-XML Export - Rebuild an IFC spatial hierarchy and write it as XML
//!
//! Scene nodes are addressed by flat `Category/LocalName` keys; who contains
//! whom is only known from container membership. This crate turns such a
//! scene into an explicit tree and writes it as a nested, attributed XML
//! document. It implements the traits defined in `ifc-xml-model`.
//!
//! # Pipeline
//!
//! - [`ContainmentTree`] - parent map and root, auxiliary subtrees diverted
//! - [`MirrorBuilder`] - one output node per tree node, with transforms
//! - [`Document`] - path-indexed document; each insert finds its parent in O(1)
//! - [`writer`] / [`reader`] - XML out and back in
//!
//! # Example
//!
//! ```ignore
//! use ifc_xml_export::{ExportSettings, Exporter, SceneSnapshot};
//!
//! let scene = SceneSnapshot::from_json_file("scene.json")?;
//! let report = Exporter::new(ExportSettings::default()).export(&scene)?;
//! for diagnostic in &report.diagnostics {
//!     println!("{diagnostic}");
//! }
//! report.write_to_path("model.xml")?;
//! ```

mod containment;
mod document;
mod mirror;
mod snapshot;

pub mod reader;
pub mod writer;

pub use containment::ContainmentTree;
pub use document::{
    escape_segment, CollisionPolicy, Document, DocumentState, ElementId, ObjectElement, PathIndex,
    ORDINAL_MARKER, PATH_SEPARATOR, ROOT_PATH,
};
pub use mirror::{
    timestamp_now, MirrorBuilder, MirrorIter, MirrorNode, MirrorNodes, MirrorTree, TIME_FORMAT,
};
pub use reader::{read_document, read_document_file};
pub use snapshot::{SceneSnapshot, SnapshotBuilder, SnapshotNode};
pub use writer::{to_xml_string, write_to_path};

use ifc_xml_model::{
    DataSource, Diagnostic, ExportError, IdentifierScheme, Result, SceneGraph,
    DEFAULT_EXCLUSIONS, DEFAULT_HIERARCHY_PREFIX,
};
use log::{debug, info, warn};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default hierarchy root key
pub const DEFAULT_ROOT: &str = "IfcProject/";

/// Settings for one export run
///
/// Every field has a default, so a settings file only needs the values it
/// changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Key of the hierarchy root in the scene
    pub root: String,
    /// Auxiliary categories whose subtrees are left out
    pub exclusions: Vec<String>,
    /// Prefix marking structurally significant categories
    pub hierarchy_prefix: String,
    /// What to do when two siblings share a name
    pub collision_policy: CollisionPolicy,
    /// Value of the `category` attribute
    pub category_code: String,
    pub data_source: DataSource,
    /// Fixed `time` attribute; current local time when unset
    pub timestamp: Option<String>,
    /// Write `Building` rather than `IfcBuilding` as the object type
    pub strip_type_prefix: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            root: DEFAULT_ROOT.to_string(),
            exclusions: DEFAULT_EXCLUSIONS.iter().map(|c| c.to_string()).collect(),
            hierarchy_prefix: DEFAULT_HIERARCHY_PREFIX.to_string(),
            collision_policy: CollisionPolicy::default(),
            category_code: "0".to_string(),
            data_source: DataSource::default(),
            timestamp: None,
            strip_type_prefix: true,
        }
    }
}

impl ExportSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse settings from JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load settings from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn with_root(mut self, root: impl Into<String>) -> Self {
        self.root = root.into();
        self
    }

    /// Replace the excluded categories
    pub fn with_exclusions<I, S>(mut self, exclusions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclusions = exclusions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_hierarchy_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.hierarchy_prefix = prefix.into();
        self
    }

    pub fn with_collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.collision_policy = policy;
        self
    }

    pub fn with_category_code(mut self, code: impl Into<String>) -> Self {
        self.category_code = code.into();
        self
    }

    pub fn with_data_source(mut self, data_source: DataSource) -> Self {
        self.data_source = data_source;
        self
    }

    /// Stamp every object with a fixed time instead of the current one
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn with_strip_type_prefix(mut self, strip: bool) -> Self {
        self.strip_type_prefix = strip;
        self
    }

    /// Identifier rules implied by these settings
    pub fn scheme(&self) -> IdentifierScheme {
        IdentifierScheme::new(&self.exclusions, self.hierarchy_prefix.as_str())
    }
}

/// Result of an export run
#[derive(Debug)]
pub struct ExportReport {
    pub document: Document,
    /// Every recovered condition, in pipeline order
    pub diagnostics: Vec<Diagnostic>,
    /// Nodes left out under an auxiliary category
    pub excluded: usize,
    /// Nodes skipped because their path was taken
    pub rejected: usize,
}

impl ExportReport {
    pub fn to_xml_string(&self) -> Result<String> {
        writer::to_xml_string(&self.document)
    }

    /// Write the document, all or nothing
    pub fn write_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        writer::write_to_path(&self.document, path)
    }
}

/// Runs the pipeline: containment, mirror, document
#[derive(Clone, Debug, Default)]
pub struct Exporter {
    settings: ExportSettings,
}

impl Exporter {
    pub fn new(settings: ExportSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Export everything under the configured root
    pub fn export(&self, scene: &dyn SceneGraph) -> Result<ExportReport> {
        let settings = &self.settings;
        let scheme = settings.scheme();

        let tree = ContainmentTree::build(scene, &settings.root, &scheme)?;
        info!(
            "Containment: {} nodes under {}, {} excluded",
            tree.len(),
            settings.root,
            tree.excluded().len()
        );

        let mut builder = MirrorBuilder::new(scheme)
            .with_category_code(settings.category_code.as_str())
            .with_strip_type_prefix(settings.strip_type_prefix);
        if let Some(timestamp) = &settings.timestamp {
            builder = builder.with_timestamp(timestamp.as_str());
        }
        // Assembly only starts once every node exists
        let mut mirror = builder.build(&tree).assemble(&tree);
        mirror.apply_transforms(|key| scene.world_transform(key));

        let mut document =
            Document::with_data_source(settings.data_source.clone(), settings.collision_policy);
        let mut rejected: Vec<Diagnostic> = Vec::new();
        let mut skipped: FxHashSet<String> = FxHashSet::default();

        let order: Vec<String> = mirror.iter().map(|node| node.key.clone()).collect();
        for key in &order {
            if skipped.contains(key) {
                continue;
            }
            let Some(node) = mirror.get(key) else {
                continue;
            };
            let parent_path = node
                .parent_key
                .as_deref()
                .and_then(|parent| mirror.get(parent))
                .and_then(|parent| parent.path.clone())
                .unwrap_or_else(|| ROOT_PATH.to_string());

            match document.insert(&parent_path, node.attributes.clone(), node.transform) {
                Ok(path) => mirror.set_path(key, path),
                Err(ExportError::PathCollision(path)) => {
                    warn!("{key}: path {path} is taken, skipping its subtree");
                    let subtree = mirror.subtree_keys(key);
                    debug!("Skipping {} nodes under {key}", subtree.len());
                    skipped.extend(subtree);
                    rejected.push(Diagnostic::Rejected {
                        key: key.clone(),
                        path,
                    });
                }
                Err(err) => return Err(err),
            }
        }

        let mut diagnostics = tree.diagnostics().to_vec();
        diagnostics.extend_from_slice(mirror.diagnostics());
        diagnostics.extend_from_slice(document.diagnostics());
        let rejected_count = rejected.len();
        diagnostics.extend(rejected);

        info!(
            "Document: {} objects, {} diagnostics",
            document.len(),
            diagnostics.len()
        );
        Ok(ExportReport {
            document,
            diagnostics,
            excluded: tree.excluded().len(),
            rejected: rejected_count,
        })
    }
}

/// Export a scene and return the XML text
pub fn export_to_string(scene: &dyn SceneGraph, settings: ExportSettings) -> Result<String> {
    Exporter::new(settings).export(scene)?.to_xml_string()
}

/// Export a scene and write it to a file
pub fn export_to_path(
    scene: &dyn SceneGraph,
    settings: ExportSettings,
    path: impl AsRef<Path>,
) -> Result<ExportReport> {
    let report = Exporter::new(settings).export(scene)?;
    report.write_to_path(path)?;
    Ok(report)
}
