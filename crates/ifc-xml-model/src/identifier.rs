// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Compound identifiers of the form `Category/LocalName`

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Separator between category and local name
pub const SEPARATOR: char = '/';

/// Categories whose subtrees are auxiliary by default
pub const DEFAULT_EXCLUSIONS: [&str; 5] = ["Views", "Types", "StructuralItems", "Members", "Connections"];

/// Prefix marking structurally significant categories
pub const DEFAULT_HIERARCHY_PREFIX: &str = "Ifc";

/// A key split into its category and local name
///
/// Keys without a separator are non-hierarchical leaves: both parts are `None`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CompoundId<'a> {
    pub key: &'a str,
    pub category: Option<&'a str>,
    pub local_name: Option<&'a str>,
}

impl<'a> CompoundId<'a> {
    /// Split a raw key on the first separator
    pub fn parse(key: &'a str) -> Self {
        match key.split_once(SEPARATOR) {
            Some((category, local_name)) => Self {
                key,
                category: Some(category),
                local_name: Some(local_name),
            },
            None => Self {
                key,
                category: None,
                local_name: None,
            },
        }
    }

    /// Category, empty for non-hierarchical leaves
    pub fn category_or_empty(&self) -> &'a str {
        self.category.unwrap_or("")
    }

    /// Name used for the exported object
    ///
    /// An empty local name (`IfcProject/`) falls back to the category, a
    /// bare key to the whole key.
    pub fn display_name(&self) -> &'a str {
        match (self.category, self.local_name) {
            (_, Some(name)) if !name.is_empty() => name,
            (Some(category), _) if !category.is_empty() => category,
            _ => self.key,
        }
    }

    /// Hierarchy level implied by the category, under the `Ifc` prefix
    ///
    /// Use [`IdentifierScheme::level`] when the scheme has its own prefix.
    pub fn level(&self) -> HierarchyLevel {
        HierarchyLevel::from_category(self.category)
    }
}

/// Level in the IFC spatial structure
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HierarchyLevel {
    /// IfcProject - root of the hierarchy
    Project,
    /// IfcSite - geographic site
    Site,
    /// IfcBuilding - a building structure
    Building,
    /// IfcBuildingStorey - a floor/level
    Storey,
    /// Any other `Ifc*` category
    Element,
    /// Non-hierarchical leaf
    Other,
}

impl HierarchyLevel {
    /// Determine level from a category string
    pub fn from_category(category: Option<&str>) -> Self {
        Self::from_category_with_prefix(category, DEFAULT_HIERARCHY_PREFIX)
    }

    /// Determine level from a category under a given hierarchy prefix
    pub fn from_category_with_prefix(category: Option<&str>, prefix: &str) -> Self {
        let Some(rest) = category
            .filter(|_| !prefix.is_empty())
            .and_then(|c| c.strip_prefix(prefix))
        else {
            return HierarchyLevel::Other;
        };
        match rest {
            "Project" => HierarchyLevel::Project,
            "Site" => HierarchyLevel::Site,
            "Building" => HierarchyLevel::Building,
            "BuildingStorey" => HierarchyLevel::Storey,
            _ => HierarchyLevel::Element,
        }
    }

    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            HierarchyLevel::Project => "Project",
            HierarchyLevel::Site => "Site",
            HierarchyLevel::Building => "Building",
            HierarchyLevel::Storey => "Storey",
            HierarchyLevel::Element => "Element",
            HierarchyLevel::Other => "Other",
        }
    }
}

/// Rules for reading compound identifiers
///
/// Holds the exclusion set and the hierarchy prefix. The scheme never fails:
/// malformed keys are treated as leaves with an empty category.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentifierScheme {
    exclusions: HashSet<String>,
    hierarchy_prefix: String,
}

impl IdentifierScheme {
    /// Create a scheme with explicit exclusions and prefix
    pub fn new<I, S>(exclusions: I, hierarchy_prefix: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exclusions: exclusions.into_iter().map(Into::into).collect(),
            hierarchy_prefix: hierarchy_prefix.into(),
        }
    }

    /// Split a key into `(category, local_name)`
    pub fn split<'a>(&self, key: &'a str) -> (Option<&'a str>, Option<&'a str>) {
        let id = CompoundId::parse(key);
        (id.category, id.local_name)
    }

    /// Parse a key
    pub fn parse<'a>(&self, key: &'a str) -> CompoundId<'a> {
        CompoundId::parse(key)
    }

    /// Whether the key names an auxiliary category
    ///
    /// A compound key is tested by its category, a bare key (such as the
    /// `Views` grouping itself) by its full text.
    pub fn is_excluded(&self, key: &str) -> bool {
        let id = CompoundId::parse(key);
        let class = id.category.unwrap_or(key);
        self.exclusions.contains(class)
    }

    /// Whether the category is structurally significant
    pub fn is_hierarchical(&self, category: &str) -> bool {
        !self.hierarchy_prefix.is_empty() && category.starts_with(&self.hierarchy_prefix)
    }

    /// Hierarchy level of a key under this scheme's prefix
    pub fn level(&self, id: &CompoundId<'_>) -> HierarchyLevel {
        HierarchyLevel::from_category_with_prefix(id.category, &self.hierarchy_prefix)
    }

    /// Object type written to the document
    ///
    /// Hierarchical categories lose their prefix (`IfcBuilding` becomes
    /// `Building`); everything else is written as-is.
    pub fn object_type<'a>(&self, category: &'a str) -> &'a str {
        if self.is_hierarchical(category) {
            &category[self.hierarchy_prefix.len()..]
        } else {
            category
        }
    }

    /// Excluded categories
    pub fn exclusions(&self) -> impl Iterator<Item = &str> {
        self.exclusions.iter().map(String::as_str)
    }

    pub fn hierarchy_prefix(&self) -> &str {
        &self.hierarchy_prefix
    }
}

impl Default for IdentifierScheme {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUSIONS, DEFAULT_HIERARCHY_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_compound() {
        let scheme = IdentifierScheme::default();
        assert_eq!(
            scheme.split("IfcBuildingStorey/15FL"),
            (Some("IfcBuildingStorey"), Some("15FL"))
        );
        // Only the first separator splits
        assert_eq!(scheme.split("IfcWall/A/B"), (Some("IfcWall"), Some("A/B")));
    }

    #[test]
    fn test_split_bare_key() {
        let scheme = IdentifierScheme::default();
        assert_eq!(scheme.split("Root"), (None, None));

        let id = scheme.parse("Root");
        assert_eq!(id.category_or_empty(), "");
        assert_eq!(id.display_name(), "Root");
        assert_eq!(id.level(), HierarchyLevel::Other);
    }

    #[test]
    fn test_exclusions() {
        let scheme = IdentifierScheme::default();
        assert!(scheme.is_excluded("Views"));
        assert!(scheme.is_excluded("Views/Section1"));
        assert!(scheme.is_excluded("Types/IfcWallType"));
        assert!(!scheme.is_excluded("IfcBuilding/Tower"));
        assert!(!scheme.is_excluded("Viewsheds/North"));
    }

    #[test]
    fn test_custom_exclusions() {
        let scheme = IdentifierScheme::new(["Annotations"], "Ifc");
        assert!(scheme.is_excluded("Annotations/Grid"));
        assert!(!scheme.is_excluded("Views/Section1"));
    }

    #[test]
    fn test_object_type() {
        let scheme = IdentifierScheme::default();
        assert_eq!(scheme.object_type("IfcBuilding"), "Building");
        assert_eq!(scheme.object_type("IfcBuildingStorey"), "BuildingStorey");
        assert_eq!(scheme.object_type("Furniture"), "Furniture");
        assert_eq!(scheme.object_type(""), "");
    }

    #[test]
    fn test_levels() {
        assert_eq!(CompoundId::parse("IfcProject/P").level(), HierarchyLevel::Project);
        assert_eq!(CompoundId::parse("IfcSite/S").level(), HierarchyLevel::Site);
        assert_eq!(CompoundId::parse("IfcBuilding/B").level(), HierarchyLevel::Building);
        assert_eq!(CompoundId::parse("IfcBuildingStorey/1F").level(), HierarchyLevel::Storey);
        assert_eq!(CompoundId::parse("IfcWall/W1").level(), HierarchyLevel::Element);
        assert_eq!(CompoundId::parse("Chair/C1").level(), HierarchyLevel::Other);
    }

    #[test]
    fn test_levels_follow_scheme_prefix() {
        let scheme = IdentifierScheme::new(DEFAULT_EXCLUSIONS, "Bim");
        let storey = scheme.parse("BimBuildingStorey/1F");
        assert!(scheme.is_hierarchical(storey.category_or_empty()));
        assert_eq!(scheme.level(&storey), HierarchyLevel::Storey);
        assert_eq!(scheme.level(&scheme.parse("BimWall/W1")), HierarchyLevel::Element);

        let ifc = scheme.parse("IfcBuilding/B");
        assert!(!scheme.is_hierarchical(ifc.category_or_empty()));
        assert_eq!(scheme.level(&ifc), HierarchyLevel::Other);

        let default = IdentifierScheme::default();
        let building = default.parse("IfcBuilding/B");
        assert_eq!(default.level(&building), building.level());
    }

    #[test]
    fn test_empty_local_name_uses_category() {
        let id = CompoundId::parse("IfcProject/");
        assert_eq!(id.local_name, Some(""));
        assert_eq!(id.display_name(), "IfcProject");
        assert_eq!(CompoundId::parse("/").display_name(), "/");
        assert_eq!(CompoundId::parse("IfcWall/A/B").display_name(), "A/B");
    }
}
