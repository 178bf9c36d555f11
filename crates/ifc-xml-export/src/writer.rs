// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! XML serialization of a [`Document`]
//!
//! Output is a pure function of the in-memory tree: attributes are written
//! in schema order, indentation is four spaces, numbers use the shortest
//! representation that parses back to the same `f64`.

use crate::document::{Document, ObjectElement};
use ifc_xml_model::{ExportError, Result, Vec3};
use log::info;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use std::io::Write;
use std::path::Path;

const XMLNS_XSD: &str = "http://www.w3.org/2001/XMLSchema";
const XMLNS_XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
const INDENT: usize = 4;

/// Render a number for an attribute value
///
/// Integral values keep a trailing `.0`; everything round-trips exactly.
pub fn format_number(value: f64) -> String {
    format!("{value:?}")
}

/// Serialize the document into an XML string
pub fn to_xml_string(document: &Document) -> Result<String> {
    let bytes = to_xml_bytes(document)?;
    String::from_utf8(bytes).map_err(ExportError::xml)
}

/// Serialize the document into UTF-8 bytes
pub fn to_xml_bytes(document: &Document) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_document(document, &mut buffer)?;
    Ok(buffer)
}

/// Serialize the document into any sink
pub fn write_document<W: Write>(document: &Document, sink: W) -> Result<()> {
    let mut writer = Writer::new_with_indent(sink, b' ', INDENT);
    emit(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)),
    )?;

    let mut root = BytesStart::new("Root");
    root.push_attribute(("xmlns:xsd", XMLNS_XSD));
    root.push_attribute(("xmlns:xsi", XMLNS_XSI));
    emit(&mut writer, Event::Start(root))?;

    if let Some(source) = document.data_source() {
        let mut element = BytesStart::new("DataSource");
        element.push_attribute(("ProductType", source.product_type.as_str()));
        element.push_attribute(("Version", source.version.as_str()));
        element.push_attribute(("Source", source.source.as_str()));
        emit(&mut writer, Event::Empty(element))?;
    }

    for object in document.top_level() {
        write_object(&mut writer, document, object)?;
    }

    emit(&mut writer, Event::End(BytesEnd::new("Root")))?;
    writer
        .into_inner()
        .flush()
        .map_err(ExportError::Io)
}

/// Write the document to a file, all or nothing
///
/// The XML is rendered in memory, written to a temporary file next to the
/// target and renamed into place, so a failure never leaves a partial file.
pub fn write_to_path(document: &Document, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let bytes = to_xml_bytes(document)?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(|e| ExportError::sink(path, e))?;
    file.write_all(&bytes)
        .and_then(|_| file.as_file().sync_all())
        .map_err(|e| ExportError::sink(path, e))?;
    file.persist(path)
        .map_err(|e| ExportError::sink(path, e.error))?;

    info!(
        "Wrote {} objects ({} bytes) to {}",
        document.len(),
        bytes.len(),
        path.display()
    );
    Ok(())
}

fn write_object<W: Write>(
    writer: &mut Writer<W>,
    document: &Document,
    object: &ObjectElement,
) -> Result<()> {
    let mut start = BytesStart::new("Object");
    for (field, value) in object.attributes.pairs() {
        start.push_attribute((field.as_str(), value));
    }
    emit(writer, Event::Start(start))?;

    emit(writer, Event::Start(BytesStart::new("Transform")))?;
    write_vector(writer, "position", object.transform.position)?;
    write_vector(writer, "rotation", object.transform.rotation)?;
    write_vector(writer, "scale", object.transform.scale)?;
    emit(writer, Event::End(BytesEnd::new("Transform")))?;

    for child in document.children(object) {
        write_object(writer, document, child)?;
    }

    emit(writer, Event::End(BytesEnd::new("Object")))
}

fn write_vector<W: Write>(writer: &mut Writer<W>, tag: &str, v: Vec3) -> Result<()> {
    let (x, y, z) = (format_number(v.x), format_number(v.y), format_number(v.z));
    let mut element = BytesStart::new(tag);
    element.push_attribute(("x", x.as_str()));
    element.push_attribute(("y", y.as_str()));
    element.push_attribute(("z", z.as_str()));
    emit(writer, Event::Empty(element))
}

fn emit<W: Write>(writer: &mut Writer<W>, event: Event<'_>) -> Result<()> {
    writer.write_event(event).map_err(ExportError::xml)
}
