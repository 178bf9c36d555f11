// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Read a written document back into memory
//!
//! Objects are replayed through [`Document::insert`] in document order, so
//! the rebuilt path index matches the one the writer started from.
//! Duplicate sibling names can only appear in a document written under
//! [`CollisionPolicy::Disambiguate`]; replaying them under the same policy
//! reassigns the same suffixes.

use crate::document::{CollisionPolicy, Document, ROOT_PATH};
use ifc_xml_model::{AttributeField, DataSource, ExportError, ObjectAttributes, Result, Transform, Vec3};
use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;

/// Object seen on the way down, inserted once its transform is known
struct Pending {
    attributes: ObjectAttributes,
    transform: Transform,
    path: Option<String>,
}

/// Parse an XML document
pub fn read_document(xml: &str) -> Result<Document> {
    let mut reader = Reader::from_str(xml);
    let mut document = Document::new(CollisionPolicy::Disambiguate);
    let mut stack: Vec<Pending> = Vec::new();
    let mut in_transform = false;
    let mut seen_root = false;

    loop {
        let event = reader.read_event().map_err(ExportError::xml)?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let empty = matches!(event, Event::Empty(_));
                match e.name().as_ref() {
                    b"Root" => seen_root = true,
                    b"DataSource" => document.set_data_source(parse_data_source(e)?),
                    b"Object" => {
                        if !seen_root {
                            return Err(ExportError::malformed("Object outside Root"));
                        }
                        flush(&mut document, &mut stack)?;
                        stack.push(Pending {
                            attributes: parse_object(e)?,
                            transform: Transform::IDENTITY,
                            path: None,
                        });
                        if empty {
                            flush(&mut document, &mut stack)?;
                            stack.pop();
                        }
                    }
                    b"Transform" => {
                        if stack.is_empty() {
                            return Err(ExportError::malformed("Transform outside Object"));
                        }
                        in_transform = !empty;
                    }
                    tag @ (b"position" | b"rotation" | b"scale") => {
                        let top = match stack.last_mut() {
                            Some(top) if in_transform => top,
                            _ => {
                                return Err(ExportError::malformed(
                                    "vector element outside Transform",
                                ))
                            }
                        };
                        let value = parse_vector(e)?;
                        match tag {
                            b"position" => top.transform.position = value,
                            b"rotation" => top.transform.rotation = value,
                            _ => top.transform.scale = value,
                        }
                    }
                    other => {
                        return Err(ExportError::malformed(format!(
                            "unexpected element {}",
                            String::from_utf8_lossy(other)
                        )))
                    }
                }
            }
            Event::End(ref e) => match e.name().as_ref() {
                b"Transform" => {
                    in_transform = false;
                    flush(&mut document, &mut stack)?;
                }
                b"Object" => {
                    flush(&mut document, &mut stack)?;
                    stack.pop();
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(ExportError::malformed("missing Root element"));
    }
    if !stack.is_empty() {
        return Err(ExportError::malformed("unterminated Object element"));
    }

    debug!("Read {} objects", document.len());
    Ok(document)
}

/// Read and parse an XML file
pub fn read_document_file(path: impl AsRef<Path>) -> Result<Document> {
    let xml = std::fs::read_to_string(path)?;
    read_document(&xml)
}

/// Insert the innermost pending object if it is not in the document yet
fn flush(document: &mut Document, stack: &mut [Pending]) -> Result<()> {
    let Some((top, rest)) = stack.split_last_mut() else {
        return Ok(());
    };
    if top.path.is_some() {
        return Ok(());
    }
    let parent = rest
        .last()
        .and_then(|p| p.path.as_deref())
        .unwrap_or(ROOT_PATH);
    let path = document.insert(parent, top.attributes.clone(), top.transform)?;
    top.path = Some(path);
    Ok(())
}

fn attributes(e: &BytesStart<'_>) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(ExportError::xml)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(ExportError::xml)?.into_owned();
        pairs.push((key, value));
    }
    Ok(pairs)
}

fn parse_data_source(e: &BytesStart<'_>) -> Result<DataSource> {
    let mut source = DataSource::new("", "", "");
    for (key, value) in attributes(e)? {
        match key.as_str() {
            "ProductType" => source.product_type = value,
            "Version" => source.version = value,
            "Source" => source.source = value,
            other => {
                return Err(ExportError::malformed(format!(
                    "unexpected DataSource attribute {other}"
                )))
            }
        }
    }
    Ok(source)
}

fn parse_object(e: &BytesStart<'_>) -> Result<ObjectAttributes> {
    let mut object = ObjectAttributes::default();
    for (key, value) in attributes(e)? {
        let field: AttributeField = key.parse()?;
        object.set(field, value)?;
    }
    Ok(object)
}

fn parse_vector(e: &BytesStart<'_>) -> Result<Vec3> {
    let mut v = Vec3::ZERO;
    for (key, value) in attributes(e)? {
        let n = lexical_core::parse::<f64>(value.as_bytes()).map_err(|err| {
            ExportError::malformed(format!("invalid number {value:?} for {key}: {err}"))
        })?;
        match key.as_str() {
            "x" => v.x = n,
            "y" => v.y = n,
            "z" => v.z = n,
            other => {
                return Err(ExportError::malformed(format!(
                    "unexpected vector attribute {other}"
                )))
            }
        }
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::to_xml_string;
    use ifc_xml_model::Noted;

    fn named(name: &str) -> ObjectAttributes {
        ObjectAttributes {
            object_type: "BuildingStorey".into(),
            category: "0".into(),
            name: name.into(),
            alias: name.into(),
            model: name.into(),
            time: "2023/05/04 10:30".into(),
            ..ObjectAttributes::default()
        }
    }

    #[test]
    fn test_reads_back_what_was_written() {
        let mut original = Document::with_data_source(DataSource::default(), CollisionPolicy::Reject);
        let tower = original
            .insert(
                ROOT_PATH,
                named("Tower"),
                Transform::new([1.5, 0.0, -2.25], [0.0, 1.0e-3, 0.0], [1.0, 2.0, 1.0]),
            )
            .unwrap();
        original.insert(&tower, named("L1"), Transform::IDENTITY).unwrap();
        original
            .insert(&tower, named("L2"), Transform::from_position([0.0, 3.2, 0.0]))
            .unwrap();
        original
            .update_attribute("root/Tower/L2", AttributeField::Remark, "checked", "2023/06/01 08:00")
            .unwrap();

        let xml = to_xml_string(&original).unwrap();
        let parsed = read_document(&xml).unwrap();

        assert_eq!(parsed.data_source(), original.data_source());
        let expected: Vec<_> = original.iter_with_paths().collect();
        let actual: Vec<_> = parsed.iter_with_paths().collect();
        assert_eq!(expected.len(), actual.len());
        for ((p1, e1), (p2, e2)) in expected.iter().zip(actual.iter()) {
            assert_eq!(p1, p2);
            assert_eq!(e1.attributes, e2.attributes);
            assert_eq!(e1.transform, e2.transform);
        }
        assert_eq!(parsed.get("root/Tower/L2").unwrap().attributes.noted, Noted::Modified);
    }

    #[test]
    fn test_duplicate_siblings_keep_their_suffixes() {
        let mut original =
            Document::with_data_source(DataSource::default(), CollisionPolicy::Disambiguate);
        original.insert(ROOT_PATH, named("Core"), Transform::IDENTITY).unwrap();
        original.insert(ROOT_PATH, named("Core"), Transform::IDENTITY).unwrap();

        let parsed = read_document(&to_xml_string(&original).unwrap()).unwrap();
        let paths: Vec<_> = parsed.iter_with_paths().map(|(p, _)| p.to_string()).collect();
        assert_eq!(paths, ["root/Core", "root/Core~2"]);
    }

    #[test]
    fn test_empty_document() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<Root xmlns:xsd="http://www.w3.org/2001/XMLSchema" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
    <DataSource ProductType="OCMS2_0" Version="2023.02.16" Source="Unity"/>
</Root>"#;
        let parsed = read_document(xml).unwrap();
        assert!(parsed.is_empty());
        assert_eq!(parsed.data_source(), Some(&DataSource::default()));
    }

    #[test]
    fn test_object_without_data_source_is_rejected() {
        let xml = r#"<Root><Object name="A"><Transform/></Object></Root>"#;
        assert!(matches!(read_document(xml), Err(ExportError::MissingDataSource)));
    }

    #[test]
    fn test_bad_number_is_malformed() {
        let xml = r#"<Root>
    <DataSource ProductType="P" Version="1" Source="S"/>
    <Object name="A"><Transform><position x="one" y="0.0" z="0.0"/></Transform></Object>
</Root>"#;
        assert!(matches!(read_document(xml), Err(ExportError::MalformedDocument(_))));
    }

    #[test]
    fn test_unknown_attribute_is_rejected() {
        let xml = r#"<Root>
    <DataSource ProductType="P" Version="1" Source="S"/>
    <Object colour="red"/>
</Root>"#;
        assert!(matches!(read_document(xml), Err(ExportError::UnknownAttribute(_))));
    }
}
