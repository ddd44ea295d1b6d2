//! OOXML package structure: sheet list, relationships and part paths

use crate::error::{PickError, PickResult};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use zip::ZipArchive;
use zip::result::ZipError;

pub const WORKBOOK_PART: &str = "xl/workbook.xml";
pub const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// A `<sheet>` entry of `xl/workbook.xml` joined with its relationship
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetEntry {
    pub name: String,
    pub sheet_id: String,
    pub rel_id: String,
    /// Archive path of the sheet part, e.g. `xl/worksheets/sheet1.xml`
    pub part_path: Option<String>,
}

/// A `<Relationship>` entry of a `.rels` part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

impl Relationship {
    /// Relationship types are URIs; compare on the trailing segment so both
    /// transitional and strict namespaces match
    pub fn is_type(&self, kind: &str) -> bool {
        self.rel_type.rsplit('/').next() == Some(kind)
    }
}

/// Read a whole archive entry as UTF-8 text
pub fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> PickResult<String> {
    let mut file = archive.by_name(name).map_err(|e| match e {
        ZipError::FileNotFound => PickError::MissingPart(name.to_string()),
        other => PickError::Zip(other),
    })?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(content)
}

/// List the sheets of a workbook package in tab order
pub fn read_sheet_entries<R: Read + Seek>(archive: &mut ZipArchive<R>) -> PickResult<Vec<SheetEntry>> {
    let workbook_xml = read_part(archive, WORKBOOK_PART)?;
    let rels_xml = read_part(archive, WORKBOOK_RELS_PART)?;
    let relationships = parse_relationships(&rels_xml)?;
    sheet_entries(&workbook_xml, &relationships)
}

/// Convenience wrapper over [`read_sheet_entries`] for in-memory packages
pub fn sheet_entries_from_bytes(bytes: &[u8]) -> PickResult<Vec<SheetEntry>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    read_sheet_entries(&mut archive)
}

/// Join the `<sheet>` elements of `workbook.xml` with the workbook relationships
pub fn sheet_entries(workbook_xml: &str, relationships: &[Relationship]) -> PickResult<Vec<SheetEntry>> {
    let targets: HashMap<&str, &Relationship> =
        relationships.iter().map(|r| (r.id.as_str(), r)).collect();

    let mut reader = Reader::from_str(workbook_xml);
    let mut buf = Vec::new();
    let mut sheets = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"sheet" => {
                let mut name = String::new();
                let mut sheet_id = String::new();
                let mut rel_id = String::new();

                for attr in e.attributes() {
                    let attr = attr?;
                    match attr.key.as_ref() {
                        b"name" => name = attr.unescape_value()?.into_owned(),
                        b"sheetId" => sheet_id = attr.unescape_value()?.into_owned(),
                        // r:id, whatever prefix the relationships namespace got
                        _ if attr.key.local_name().as_ref() == b"id" => {
                            rel_id = attr.unescape_value()?.into_owned();
                        }
                        _ => {}
                    }
                }

                let part_path = targets
                    .get(rel_id.as_str())
                    .filter(|r| !r.external)
                    .map(|r| resolve_target("xl", &r.target));

                sheets.push(SheetEntry {
                    name,
                    sheet_id,
                    rel_id,
                    part_path,
                });
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
        buf.clear();
    }

    Ok(sheets)
}

/// Parse every `<Relationship>` of a `.rels` part
pub fn parse_relationships(xml: &str) -> PickResult<Vec<Relationship>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut relationships = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let mut rel = Relationship {
                    id: String::new(),
                    rel_type: String::new(),
                    target: String::new(),
                    external: false,
                };
                for attr in e.attributes() {
                    let attr = attr?;
                    match attr.key.as_ref() {
                        b"Id" => rel.id = attr.unescape_value()?.into_owned(),
                        b"Type" => rel.rel_type = attr.unescape_value()?.into_owned(),
                        b"Target" => rel.target = attr.unescape_value()?.into_owned(),
                        b"TargetMode" => rel.external = attr.value.as_ref() == b"External",
                        _ => {}
                    }
                }
                relationships.push(rel);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
        buf.clear();
    }

    Ok(relationships)
}

/// Resolve a relationship target against the directory of its source part
pub fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Path of the `.rels` part that belongs to `part`
pub fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORKBOOK_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets>
<sheet name="Fund A" sheetId="1" r:id="rId1"/>
<sheet name="R&amp;D" sheetId="4" r:id="rId2"/>
<sheet name="Chart" sheetId="5" r:id="rId3"/>
</sheets>
</workbook>"#;

    const RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="/xl/worksheets/sheet7.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/chartsheet" Target="chartsheets/sheet1.xml"/>
<Relationship Id="rId4" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#;

    #[test]
    fn test_sheet_entries_in_tab_order() {
        let rels = parse_relationships(RELS_XML).unwrap();
        let sheets = sheet_entries(WORKBOOK_XML, &rels).unwrap();

        let names: Vec<&str> = sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Fund A", "R&D", "Chart"]);
        assert_eq!(sheets[1].sheet_id, "4");
        assert_eq!(sheets[1].rel_id, "rId2");
        assert_eq!(sheets[0].part_path.as_deref(), Some("xl/worksheets/sheet1.xml"));
        assert_eq!(sheets[1].part_path.as_deref(), Some("xl/worksheets/sheet7.xml"));
        assert_eq!(sheets[2].part_path.as_deref(), Some("xl/chartsheets/sheet1.xml"));
    }

    #[test]
    fn test_relationship_types() {
        let rels = parse_relationships(RELS_XML).unwrap();
        assert_eq!(rels.len(), 4);
        assert!(rels[0].is_type("worksheet"));
        assert!(rels[3].is_type("styles"));
        assert!(!rels[3].is_type("worksheet"));
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target("xl", "worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(resolve_target("xl", "/xl/vbaProject.bin"), "xl/vbaProject.bin");
        assert_eq!(
            resolve_target("xl/worksheets", "../drawings/drawing1.xml"),
            "xl/drawings/drawing1.xml"
        );
    }

    #[test]
    fn test_rels_path_for() {
        assert_eq!(
            rels_path_for("xl/worksheets/sheet3.xml"),
            "xl/worksheets/_rels/sheet3.xml.rels"
        );
        assert_eq!(rels_path_for("xl/workbook.xml"), "xl/_rels/workbook.xml.rels");
    }
}
