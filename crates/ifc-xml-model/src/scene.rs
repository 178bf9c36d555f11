// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Read-only scene access
//!
//! The exporter never talks to a live editor. It receives a [`SceneGraph`]
//! captured before the run starts and only reads from it.

use crate::{Result, Transform};

/// Read-only view of the host scene
///
/// Nodes are addressed by their compound key. Containers group other nodes;
/// a container may list itself among its members, which marks it as the
/// hierarchy root.
///
/// # Example
///
/// ```ignore
/// use ifc_xml_model::SceneGraph;
///
/// fn dump(scene: &dyn SceneGraph) -> ifc_xml_model::Result<()> {
///     for key in scene.nodes("IfcProject/")? {
///         let kind = if scene.is_container(&key) { "container" } else { "object" };
///         println!("{key} ({kind}) -> {:?}", scene.world_transform(&key));
///     }
///     Ok(())
/// }
/// ```
pub trait SceneGraph: Send + Sync {
    /// Enumerate the root and every node it contains, transitively
    ///
    /// The root comes first, followed by its contents in depth-first member
    /// order. Fails with [`crate::ExportError::RootNotFound`] when the root
    /// is not in the scene.
    fn nodes(&self, root: &str) -> Result<Vec<String>>;

    /// Direct members of a container, in scene order
    ///
    /// Returns an empty list for non-containers and unknown keys.
    fn members(&self, container: &str) -> Vec<String>;

    /// Whether the node can hold children
    fn is_container(&self, key: &str) -> bool;

    /// World-space translation, Euler rotation (radians, XYZ) and scale
    ///
    /// `None` when no transform-bearing proxy exists for the node.
    fn world_transform(&self, key: &str) -> Option<Transform>;

    /// Whether the key exists in the scene
    fn contains(&self, key: &str) -> bool;
}
