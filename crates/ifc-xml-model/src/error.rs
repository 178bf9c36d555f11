// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for export operations

use crate::AttributeField;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for export operations
pub type Result<T> = std::result::Result<T, ExportError>;

/// Errors that abort an export operation
///
/// Conditions the pipeline can recover from (unknown containers, missing
/// transforms, excluded subtrees) are reported as [`crate::Diagnostic`]
/// values instead.
#[derive(Error, Debug)]
pub enum ExportError {
    /// A sibling with the same name already owns this path
    #[error("Path collision: {0} is already in the document")]
    PathCollision(String),

    /// The document has no DataSource yet and cannot take objects
    #[error("Document has no DataSource")]
    MissingDataSource,

    /// No document element is registered under this path
    #[error("Unknown document path: {0}")]
    UnknownPath(String),

    /// The requested hierarchy root does not exist in the scene
    #[error("Root node {0} not found in scene")]
    RootNotFound(String),

    /// The attribute cannot change once the element is in the document
    #[error("Attribute {0} cannot be modified after insertion")]
    ImmutableAttribute(AttributeField),

    /// Attribute key outside the fixed schema
    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    /// XML encoding or decoding failed
    #[error("XML error: {0}")]
    Xml(String),

    /// Document read back does not have the expected shape
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// The output target could not be opened or written
    #[error("Failed to write {path}: {source}")]
    Sink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON snapshot or settings could not be decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExportError {
    /// Create a new XML error
    pub fn xml(msg: impl std::fmt::Display) -> Self {
        ExportError::Xml(msg.to_string())
    }

    /// Create a new malformed document error
    pub fn malformed(msg: impl Into<String>) -> Self {
        ExportError::MalformedDocument(msg.into())
    }

    /// Create a new sink error
    pub fn sink(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExportError::Sink {
            path: path.into(),
            source,
        }
    }
}
