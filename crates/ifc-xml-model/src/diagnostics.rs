// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Recoverable conditions reported during an export run

use serde::{Deserialize, Serialize};
use std::fmt;

/// A condition the pipeline recovered from
///
/// Each one resolves to a documented default; none of them stops the run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// The node's container is not a known key; it was attached at the document root
    LookupFailure { key: String, container: String },
    /// The node has no container at all; it was attached at the document root
    Orphan { key: String },
    /// No transform found; identity transform used
    MissingTransform { key: String },
    /// The node sits under an auxiliary category and was left out
    Excluded { key: String, category: String },
    /// The node's parent chain loops back on itself; the loop was cut here
    Cycle { key: String },
    /// A sibling already used this path; the node got a suffixed path
    Disambiguated { requested: String, assigned: String },
    /// A sibling already used this path; the node and its subtree were skipped
    Rejected { key: String, path: String },
}

impl Diagnostic {
    /// Key of the node the diagnostic concerns
    pub fn key(&self) -> &str {
        match self {
            Diagnostic::LookupFailure { key, .. }
            | Diagnostic::Orphan { key }
            | Diagnostic::MissingTransform { key }
            | Diagnostic::Excluded { key, .. }
            | Diagnostic::Cycle { key }
            | Diagnostic::Rejected { key, .. } => key,
            Diagnostic::Disambiguated { requested, .. } => requested,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::LookupFailure { key, container } => {
                write!(f, "{key}: container {container} is unknown, attached at root")
            }
            Diagnostic::Orphan { key } => write!(f, "{key}: no container, attached at root"),
            Diagnostic::MissingTransform { key } => {
                write!(f, "{key}: no transform, using identity")
            }
            Diagnostic::Excluded { key, category } => {
                write!(f, "{key}: excluded via {category}")
            }
            Diagnostic::Cycle { key } => write!(f, "{key}: containment cycle cut"),
            Diagnostic::Disambiguated {
                requested,
                assigned,
            } => write!(f, "{requested}: path taken, stored as {assigned}"),
            Diagnostic::Rejected { key, path } => {
                write!(f, "{key}: path {path} taken, subtree skipped")
            }
        }
    }
}
