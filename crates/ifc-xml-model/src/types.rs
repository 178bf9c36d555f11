// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core types for exported objects
//!
//! This module defines the payload carried by every node from the moment it
//! is mirrored until it is written into the document.

use crate::ExportError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Three real components, used for position, rotation and scale
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// All components zero
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);
    /// All components one
    pub const ONE: Vec3 = Vec3::new(1.0, 1.0, 1.0);

    /// Create a new vector
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Components as an array in x, y, z order
    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from(v: [f64; 3]) -> Self {
        Vec3::new(v[0], v[1], v[2])
    }
}

impl From<(f64, f64, f64)> for Vec3 {
    fn from(v: (f64, f64, f64)) -> Self {
        Vec3::new(v.0, v.1, v.2)
    }
}

/// World-space placement of a node
///
/// Position is in scene units, rotation is an Euler triple in radians
/// applied X then Y then Z, scale is a per-axis factor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    #[serde(default)]
    pub position: Vec3,
    #[serde(default)]
    pub rotation: Vec3,
    #[serde(default = "unit_scale")]
    pub scale: Vec3,
}

fn unit_scale() -> Vec3 {
    Vec3::ONE
}

impl Transform {
    /// Zero position, zero rotation, unit scale
    pub const IDENTITY: Transform = Transform {
        position: Vec3::ZERO,
        rotation: Vec3::ZERO,
        scale: Vec3::ONE,
    };

    /// Create a new transform
    pub fn new(position: impl Into<Vec3>, rotation: impl Into<Vec3>, scale: impl Into<Vec3>) -> Self {
        Self {
            position: position.into(),
            rotation: rotation.into(),
            scale: scale.into(),
        }
    }

    /// Transform with only a translation
    pub fn from_position(position: impl Into<Vec3>) -> Self {
        Self {
            position: position.into(),
            ..Self::IDENTITY
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Whether an object was freshly created or edited afterwards
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Noted {
    #[default]
    Created,
    Modified,
}

impl Noted {
    pub fn as_str(&self) -> &'static str {
        match self {
            Noted::Created => "created",
            Noted::Modified => "modified",
        }
    }
}

impl fmt::Display for Noted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Noted {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Noted::Created),
            "modified" => Ok(Noted::Modified),
            other => Err(ExportError::malformed(format!(
                "noted must be created or modified, got {other:?}"
            ))),
        }
    }
}

/// The nine attributes written on every `Object` element
///
/// The schema is closed; use [`AttributeField`] to address a single field
/// dynamically.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ObjectAttributes {
    /// Object type, e.g. `Building` or `BuildingStorey`
    #[serde(rename = "type")]
    pub object_type: String,
    /// Numeric classification code
    pub category: String,
    /// Name, also the object's path segment
    pub name: String,
    pub alias: String,
    pub id: String,
    pub remark: String,
    pub model: String,
    /// Creation or modification time, `YYYY/MM/DD HH:MM`
    pub time: String,
    pub noted: Noted,
}

impl ObjectAttributes {
    /// Get a field as a string slice
    pub fn get(&self, field: AttributeField) -> &str {
        match field {
            AttributeField::Type => &self.object_type,
            AttributeField::Category => &self.category,
            AttributeField::Name => &self.name,
            AttributeField::Alias => &self.alias,
            AttributeField::Id => &self.id,
            AttributeField::Remark => &self.remark,
            AttributeField::Model => &self.model,
            AttributeField::Time => &self.time,
            AttributeField::Noted => self.noted.as_str(),
        }
    }

    /// Set a field from a string
    pub fn set(&mut self, field: AttributeField, value: impl Into<String>) -> crate::Result<()> {
        let value = value.into();
        match field {
            AttributeField::Type => self.object_type = value,
            AttributeField::Category => self.category = value,
            AttributeField::Name => self.name = value,
            AttributeField::Alias => self.alias = value,
            AttributeField::Id => self.id = value,
            AttributeField::Remark => self.remark = value,
            AttributeField::Model => self.model = value,
            AttributeField::Time => self.time = value,
            AttributeField::Noted => self.noted = value.parse()?,
        }
        Ok(())
    }

    /// Fields paired with their values in document order
    pub fn pairs(&self) -> [(AttributeField, &str); 9] {
        AttributeField::ALL.map(|field| (field, self.get(field)))
    }
}

/// One field of [`ObjectAttributes`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeField {
    Type,
    Category,
    Name,
    Alias,
    Id,
    Remark,
    Model,
    Time,
    Noted,
}

impl AttributeField {
    /// All fields in the order they are written
    pub const ALL: [AttributeField; 9] = [
        AttributeField::Type,
        AttributeField::Category,
        AttributeField::Name,
        AttributeField::Alias,
        AttributeField::Id,
        AttributeField::Remark,
        AttributeField::Model,
        AttributeField::Time,
        AttributeField::Noted,
    ];

    /// XML attribute name
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeField::Type => "type",
            AttributeField::Category => "category",
            AttributeField::Name => "name",
            AttributeField::Alias => "alias",
            AttributeField::Id => "id",
            AttributeField::Remark => "remark",
            AttributeField::Model => "model",
            AttributeField::Time => "time",
            AttributeField::Noted => "noted",
        }
    }
}

impl fmt::Display for AttributeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttributeField {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AttributeField::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| ExportError::UnknownAttribute(s.to_string()))
    }
}

/// Metadata describing the exporting system, written once per document
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    pub product_type: String,
    pub version: String,
    pub source: String,
}

impl DataSource {
    /// Create new data source metadata
    pub fn new(
        product_type: impl Into<String>,
        version: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            product_type: product_type.into(),
            version: version.into(),
            source: source.into(),
        }
    }
}

impl Default for DataSource {
    fn default() -> Self {
        Self::new("OCMS2_0", "2023.02.16", "Unity")
    }
}
