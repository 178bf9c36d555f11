// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Path-indexed document builder
//!
//! The document is an append-only tree of `Object` elements under a
//! singleton root that carries the [`DataSource`]. Every element is
//! addressed by its name path (`root/Tower/L1`); the [`PathIndex`] maps those
//! paths to elements so an insertion finds its parent in O(1) instead of
//! walking the tree.

use ifc_xml_model::{
    AttributeField, DataSource, Diagnostic, ExportError, Noted, ObjectAttributes, Result,
    Transform,
};
use log::{debug, warn};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Path segment of the document root
pub const ROOT_PATH: &str = "root";

/// Separator between path segments
pub const PATH_SEPARATOR: char = '/';

/// Marker between a colliding path and its ordinal
pub const ORDINAL_MARKER: char = '~';

/// Encode a name as a single path segment
///
/// `%`, the separator and the ordinal marker are percent-encoded, so a name
/// such as `A/B` can never alias the path of a grandchild `B` under `A`.
pub fn escape_segment(name: &str) -> Cow<'_, str> {
    if !name.contains(['%', PATH_SEPARATOR, ORDINAL_MARKER]) {
        return Cow::Borrowed(name);
    }
    let mut segment = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        match c {
            '%' => segment.push_str("%25"),
            PATH_SEPARATOR => segment.push_str("%2F"),
            ORDINAL_MARKER => segment.push_str("%7E"),
            _ => segment.push(c),
        }
    }
    Cow::Owned(segment)
}

/// What to do when a sibling already owns a path
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Fail the insertion with [`ExportError::PathCollision`]
    #[default]
    Reject,
    /// Store the element under `path~N` with the first free N >= 2
    Disambiguate,
}

/// Position of an element in insertion order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub usize);

/// Lifecycle of a document
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentState {
    /// No DataSource yet
    Empty,
    /// DataSource present, zero or more objects
    Populated,
}

/// One `Object` element
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectElement {
    pub attributes: ObjectAttributes,
    pub transform: Transform,
    path: String,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
}

impl ObjectElement {
    /// Root-relative path of this element
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Parent element; `None` when directly under the document root
    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    /// Child elements in insertion order
    pub fn children(&self) -> &[ElementId] {
        &self.children
    }
}

/// Cache from root-relative path to element
///
/// Paths are never reused; the document only grows.
#[derive(Clone, Debug, Default)]
pub struct PathIndex {
    paths: FxHashMap<String, ElementId>,
}

impl PathIndex {
    pub fn get(&self, path: &str) -> Option<ElementId> {
        self.paths.get(path).copied()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains_key(path)
    }

    /// Register a new path; fails if the path is taken
    fn register(&mut self, path: String, id: ElementId) -> Result<()> {
        if self.paths.contains_key(&path) {
            return Err(ExportError::PathCollision(path));
        }
        self.paths.insert(path, id);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// In-memory document under construction
#[derive(Clone, Debug, Default)]
pub struct Document {
    data_source: Option<DataSource>,
    /// Elements in insertion order
    elements: Vec<ObjectElement>,
    /// Elements directly under the document root
    top_level: Vec<ElementId>,
    index: PathIndex,
    policy: CollisionPolicy,
    diagnostics: Vec<Diagnostic>,
}

impl Document {
    /// Create an empty document (no DataSource yet)
    pub fn new(policy: CollisionPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Create a populated document
    pub fn with_data_source(data_source: DataSource, policy: CollisionPolicy) -> Self {
        let mut doc = Self::new(policy);
        doc.set_data_source(data_source);
        doc
    }

    /// Attach the DataSource, moving the document to [`DocumentState::Populated`]
    pub fn set_data_source(&mut self, data_source: DataSource) {
        self.data_source = Some(data_source);
    }

    pub fn state(&self) -> DocumentState {
        match self.data_source {
            Some(_) => DocumentState::Populated,
            None => DocumentState::Empty,
        }
    }

    pub fn data_source(&self) -> Option<&DataSource> {
        self.data_source.as_ref()
    }

    pub fn policy(&self) -> CollisionPolicy {
        self.policy
    }

    /// Append an object under `parent_path` and return its own path
    ///
    /// The first insertion always lands under the document root. Later
    /// insertions resolve `parent_path` through the index; `root` names the
    /// document root. An unknown parent path is reported and the object is
    /// attached under the document root instead.
    pub fn insert(
        &mut self,
        parent_path: &str,
        attributes: ObjectAttributes,
        transform: Transform,
    ) -> Result<String> {
        if self.data_source.is_none() {
            return Err(ExportError::MissingDataSource);
        }

        let parent = if self.index.is_empty() || parent_path == ROOT_PATH {
            None
        } else {
            match self.index.get(parent_path) {
                Some(id) => Some(id),
                None => {
                    warn!("Parent path {parent_path} is not in the document, attaching at root");
                    self.diagnostics.push(Diagnostic::LookupFailure {
                        key: attributes.name.clone(),
                        container: parent_path.to_string(),
                    });
                    None
                }
            }
        };

        let base = match parent {
            Some(id) => self.elements[id.0].path.as_str(),
            None => ROOT_PATH,
        };
        let requested = format!("{base}{PATH_SEPARATOR}{}", escape_segment(&attributes.name));
        let path = self.assign_path(requested)?;

        let id = ElementId(self.elements.len());
        self.index.register(path.clone(), id)?;
        match parent {
            Some(parent_id) => self.elements[parent_id.0].children.push(id),
            None => self.top_level.push(id),
        }
        self.elements.push(ObjectElement {
            attributes,
            transform,
            path: path.clone(),
            parent,
            children: Vec::new(),
        });

        debug!("Inserted {path}");
        Ok(path)
    }

    /// Apply the collision policy to a requested path
    fn assign_path(&mut self, requested: String) -> Result<String> {
        if !self.index.contains(&requested) {
            return Ok(requested);
        }
        match self.policy {
            CollisionPolicy::Reject => Err(ExportError::PathCollision(requested)),
            CollisionPolicy::Disambiguate => {
                let assigned = (2usize..)
                    .map(|n| format!("{requested}{ORDINAL_MARKER}{n}"))
                    .find(|candidate| !self.index.contains(candidate))
                    .unwrap_or_else(|| requested.clone());
                warn!("Path {requested} is taken, using {assigned}");
                self.diagnostics.push(Diagnostic::Disambiguated {
                    requested,
                    assigned: assigned.clone(),
                });
                Ok(assigned)
            }
        }
    }

    /// Element registered under a path
    pub fn resolve(&self, path: &str) -> Option<ElementId> {
        self.index.get(path)
    }

    pub fn get(&self, path: &str) -> Option<&ObjectElement> {
        self.resolve(path).map(|id| &self.elements[id.0])
    }

    pub fn element(&self, id: ElementId) -> Option<&ObjectElement> {
        self.elements.get(id.0)
    }

    /// First element, in insertion order, whose attribute equals `value`
    ///
    /// Linear in the number of elements; not indexed.
    pub fn find_by_attribute(&self, field: AttributeField, value: &str) -> Option<&str> {
        self.elements
            .iter()
            .find(|element| element.attributes.get(field) == value)
            .map(|element| element.path.as_str())
    }

    /// Edit one attribute of an inserted element
    ///
    /// Marks the element `modified` and stamps it with `time`. The name is
    /// fixed because the element's path is derived from it.
    pub fn update_attribute(
        &mut self,
        path: &str,
        field: AttributeField,
        value: impl Into<String>,
        time: impl Into<String>,
    ) -> Result<()> {
        if matches!(field, AttributeField::Name | AttributeField::Noted | AttributeField::Time) {
            return Err(ExportError::ImmutableAttribute(field));
        }
        let id = self
            .resolve(path)
            .ok_or_else(|| ExportError::UnknownPath(path.to_string()))?;
        let attributes = &mut self.elements[id.0].attributes;
        attributes.set(field, value)?;
        attributes.noted = Noted::Modified;
        attributes.time = time.into();
        Ok(())
    }

    /// Elements in insertion order
    pub fn elements(&self) -> impl Iterator<Item = &ObjectElement> {
        self.elements.iter()
    }

    /// Elements directly under the document root, in order
    pub fn top_level(&self) -> impl Iterator<Item = &ObjectElement> {
        self.top_level.iter().map(|id| &self.elements[id.0])
    }

    /// Children of an element, in order
    pub fn children<'a>(&'a self, element: &'a ObjectElement) -> impl Iterator<Item = &'a ObjectElement> {
        element.children.iter().map(|id| &self.elements[id.0])
    }

    /// Walk the document depth-first in output order, with paths
    pub fn iter_with_paths(&self) -> impl Iterator<Item = (&str, &ObjectElement)> {
        let mut stack: Vec<ElementId> = self.top_level.iter().rev().copied().collect();
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            let element = &self.elements[id.0];
            stack.extend(element.children.iter().rev().copied());
            Some((element.path.as_str(), element))
        })
    }

    pub fn index(&self) -> &PathIndex {
        &self.index
    }

    /// Conditions recovered from while inserting
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
