// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IFC-XML Model - Shared types and traits for IFC hierarchy export
//!
//! This crate holds the vocabulary used by every stage of the export
//! pipeline. It has no knowledge of XML; it only describes what a scene
//! looks like from the exporter's point of view and what gets written.
//!
//! # Architecture
//!
//! - [`IdentifierScheme`] - Splits `Category/LocalName` keys and decides
//!   which categories are auxiliary
//! - [`SceneGraph`] - Read-only access to the host scene
//! - [`Transform`] / [`ObjectAttributes`] - The payload of every exported object
//! - [`Diagnostic`] - Recoverable conditions reported during a run
//! - [`ExportError`] - Hard failures
//!
//! # Example
//!
//! ```ignore
//! use ifc_xml_model::{IdentifierScheme, SceneGraph};
//!
//! let scheme = IdentifierScheme::default();
//! for key in scene.nodes("IfcProject/")? {
//!     let id = scheme.parse(&key);
//!     println!("{} -> {:?}", key, id.level());
//! }
//! ```

pub mod diagnostics;
pub mod error;
pub mod identifier;
pub mod scene;
pub mod types;

// Re-export all public types
pub use diagnostics::*;
pub use error::*;
pub use identifier::*;
pub use scene::*;
pub use types::*;
