//! XLSX package rewriting: remove sheets (and optionally VBA) while copying
//! every untouched archive entry raw

use crate::error::PickResult;
use crate::reader::package::{
    CONTENT_TYPES_PART, Relationship, SheetEntry, WORKBOOK_PART, WORKBOOK_RELS_PART,
    parse_relationships, read_part, rels_path_for, resolve_target, sheet_entries,
};
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashSet;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

const MACRO_WORKBOOK_CONTENT_TYPE: &str = "application/vnd.ms-excel.sheet.macroEnabled.main+xml";
const STANDARD_WORKBOOK_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";

/// Struct used to define modifications to be applied to a workbook
#[derive(Debug, Default)]
pub struct WorkbookModifications {
    pub remove_sheets: HashSet<String>,
    /// Drop the VBA project so the result is a plain `.xlsx`
    pub strip_macros: bool,
}

/// Apply `modifications` to an in-memory XLSX/XLSM package
pub fn modify_workbook_xlsx(input: &[u8], modifications: &WorkbookModifications) -> PickResult<Vec<u8>> {
    let mut archive = ZipArchive::new(Cursor::new(input))?;

    // Read workbook.xml and its relationships needed for IDs and cleanup
    let workbook_xml = read_part(&mut archive, WORKBOOK_PART)?;
    let rels_xml = read_part(&mut archive, WORKBOOK_RELS_PART)?;
    let relationships = parse_relationships(&rels_xml)?;
    let sheets = sheet_entries(&workbook_xml, &relationships)?;

    let archive_names: Vec<String> = archive.file_names().map(str::to_string).collect();
    let plan = RemovalPlan::new(&sheets, &relationships, &archive_names, modifications);

    if plan.is_noop() {
        tracing::debug!("no package changes needed, returning source bytes");
        return Ok(input.to_vec());
    }

    tracing::debug!(
        removed_sheets = plan.removed_names.len(),
        skipped_parts = plan.skipped_parts.len(),
        strip_macros = plan.strip_macros,
        "rewriting workbook package"
    );

    let mut zip_writer = ZipWriter::new(Cursor::new(Vec::new()));

    // Iterate through all files in the archive, keeping their order
    for i in 0..archive.len() {
        let (name, compression) = {
            let file = archive.by_index_raw(i)?;
            (file.name().to_string(), file.compression())
        };

        if plan.should_skip(&name) {
            continue;
        }

        let rewritten = match name.as_str() {
            WORKBOOK_PART => Some(rewrite_workbook_xml(&workbook_xml, &plan)?),
            WORKBOOK_RELS_PART => Some(remove_relationships(&rels_xml, &plan.removed_rel_ids)?),
            CONTENT_TYPES_PART => {
                let content = read_part(&mut archive, &name)?;
                Some(rewrite_content_types(&content, &plan)?)
            }
            _ => None,
        };

        match rewritten {
            Some(content) => {
                let options = SimpleFileOptions::default().compression_method(compression);
                zip_writer.start_file(name.as_str(), options)?;
                zip_writer.write_all(&content)?;
            }
            // Copy file as is, compressed bytes included
            None => zip_writer.raw_copy_file(archive.by_index_raw(i)?)?,
        }
    }

    Ok(zip_writer.finish()?.into_inner())
}

/// Everything that has to disappear from the package, computed once from a
/// snapshot of the sheet list
#[derive(Debug, Default)]
struct RemovalPlan {
    /// Old tab position -> new tab position, `None` when removed
    index_map: Vec<Option<usize>>,
    removed_names: Vec<String>,
    removed_rel_ids: HashSet<String>,
    skipped_parts: HashSet<String>,
    strip_macros: bool,
}

impl RemovalPlan {
    fn new(
        sheets: &[SheetEntry],
        relationships: &[Relationship],
        archive_names: &[String],
        modifications: &WorkbookModifications,
    ) -> Self {
        let mut plan = RemovalPlan::default();
        let mut kept = 0usize;

        for sheet in sheets {
            if modifications.remove_sheets.contains(&sheet.name) {
                plan.index_map.push(None);
                plan.removed_names.push(sheet.name.clone());
                plan.removed_rel_ids.insert(sheet.rel_id.clone());
                if let Some(part) = &sheet.part_path {
                    plan.skipped_parts.insert(rels_path_for(part));
                    plan.skipped_parts.insert(part.clone());
                }
            } else {
                plan.index_map.push(Some(kept));
                kept += 1;
            }
        }

        // calcChain indexes cells by sheet position; applications rebuild it
        if !plan.removed_names.is_empty() {
            for rel in relationships.iter().filter(|r| r.is_type("calcChain")) {
                plan.removed_rel_ids.insert(rel.id.clone());
                plan.skipped_parts.insert(resolve_target("xl", &rel.target));
            }
        }

        if modifications.strip_macros {
            let mut has_vba = false;
            for rel in relationships.iter().filter(|r| r.is_type("vbaProject")) {
                let part = resolve_target("xl", &rel.target);
                plan.removed_rel_ids.insert(rel.id.clone());
                plan.skipped_parts.insert(rels_path_for(&part));
                plan.skipped_parts.insert(part);
                has_vba = true;
            }
            for name in archive_names.iter().filter(|n| is_vba_part(n)) {
                plan.skipped_parts.insert(name.clone());
                has_vba = true;
            }
            plan.strip_macros = has_vba;
        }

        plan
    }

    fn is_noop(&self) -> bool {
        self.removed_names.is_empty() && !self.strip_macros
    }

    fn should_skip(&self, name: &str) -> bool {
        self.skipped_parts.contains(name) || (self.strip_macros && is_vba_part(name))
    }

    fn is_skipped_part_name(&self, part_name: &str) -> bool {
        let part = part_name.trim_start_matches('/');
        self.skipped_parts.iter().any(|p| p.eq_ignore_ascii_case(part))
            || (self.strip_macros && is_vba_part(part))
    }

    /// New position for a tab index, falling back to the nearest kept tab
    /// on the left (or the first tab)
    fn remap_tab(&self, old: usize) -> usize {
        if old >= self.index_map.len() {
            return 0;
        }
        self.index_map[..=old]
            .iter()
            .flatten()
            .last()
            .copied()
            .unwrap_or(0)
    }
}

fn is_vba_part(name: &str) -> bool {
    name.rsplit('/')
        .next()
        .is_some_and(|file| file.starts_with("vbaProject"))
}

/// `<definedName>` being buffered until its end tag decides whether it stays
struct PendingName {
    start: BytesStart<'static>,
    inner: Vec<Event<'static>>,
    formula: String,
    drop: bool,
}

fn rewrite_workbook_xml(xml: &str, plan: &RemovalPlan) -> PickResult<Vec<u8>> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();
    let mut skip_current_sheet = false;
    let mut pending: Option<PendingName> = None;

    loop {
        let event = reader.read_event_into(&mut buf)?;

        if let Some(mut name) = pending.take() {
            match event {
                Event::End(e) if e.local_name().as_ref() == b"definedName" => {
                    if name.drop || references_removed_sheet(&name.formula, &plan.removed_names) {
                        tracing::debug!(formula = %name.formula, "dropping defined name");
                    } else {
                        writer.write_event(Event::Start(name.start))?;
                        for inner in name.inner {
                            writer.write_event(inner)?;
                        }
                        writer.write_event(Event::End(e))?;
                    }
                }
                Event::Eof => break,
                other => {
                    if let Event::Text(text) = &other {
                        name.formula.push_str(&text.unescape()?);
                    }
                    name.inner.push(other.into_owned());
                    pending = Some(name);
                }
            }
            buf.clear();
            continue;
        }

        match event {
            Event::Start(e) if e.local_name().as_ref() == b"sheet" => {
                if plan.removed_names.contains(&sheet_name(&e)?) {
                    skip_current_sheet = true;
                } else {
                    writer.write_event(Event::Start(e))?;
                }
            }
            Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                if !plan.removed_names.contains(&sheet_name(&e)?) {
                    writer.write_event(Event::Empty(e))?;
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"sheet" => {
                if skip_current_sheet {
                    skip_current_sheet = false;
                } else {
                    writer.write_event(Event::End(e))?;
                }
            }
            Event::Start(e) if e.local_name().as_ref() == b"definedName" => {
                let (start, drop) = rescope_defined_name(&e, plan)?;
                pending = Some(PendingName {
                    start,
                    inner: Vec::new(),
                    formula: String::new(),
                    drop,
                });
            }
            Event::Empty(e) if e.local_name().as_ref() == b"definedName" => {
                let (start, drop) = rescope_defined_name(&e, plan)?;
                if !drop {
                    writer.write_event(Event::Empty(start))?;
                }
            }
            Event::Start(e) if e.local_name().as_ref() == b"workbookView" => {
                writer.write_event(Event::Start(remap_workbook_view(&e, plan)?))?;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"workbookView" => {
                writer.write_event(Event::Empty(remap_workbook_view(&e, plan)?))?;
            }
            Event::Eof => break,
            e => {
                if !skip_current_sheet {
                    writer.write_event(e)?;
                }
            }
        }
        buf.clear();
    }

    Ok(writer.into_inner().into_inner())
}

fn sheet_name(e: &BytesStart<'_>) -> PickResult<String> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == b"name" {
            return Ok(attr.unescape_value()?.into_owned());
        }
    }
    Ok(String::new())
}

/// Renumber `localSheetId`; the flag is set when the scope sheet is gone
fn rescope_defined_name(e: &BytesStart<'_>, plan: &RemovalPlan) -> PickResult<(BytesStart<'static>, bool)> {
    let mut rewritten = e.to_owned();
    rewritten.clear_attributes();
    let mut drop = false;

    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == b"localSheetId" {
            let old: Option<usize> = attr.unescape_value()?.parse().ok();
            match old.and_then(|old| plan.index_map.get(old).copied().flatten()) {
                Some(new) => rewritten.push_attribute(("localSheetId", new.to_string().as_str())),
                None => drop = true,
            }
        } else {
            rewritten.push_attribute(attr);
        }
    }

    Ok((rewritten, drop))
}

fn remap_workbook_view(e: &BytesStart<'_>, plan: &RemovalPlan) -> PickResult<BytesStart<'static>> {
    let mut rewritten = e.to_owned();
    rewritten.clear_attributes();

    for attr in e.attributes() {
        let attr = attr?;
        match attr.key.as_ref() {
            key @ (b"activeTab" | b"firstSheet") => {
                let key = if key == b"activeTab" { "activeTab" } else { "firstSheet" };
                let old: usize = attr.unescape_value()?.parse().unwrap_or(0);
                rewritten.push_attribute((key, plan.remap_tab(old).to_string().as_str()));
            }
            _ => rewritten.push_attribute(attr),
        }
    }

    Ok(rewritten)
}

/// Whether a defined-name formula points at one of the removed sheets
fn references_removed_sheet(formula: &str, removed: &[String]) -> bool {
    removed.iter().any(|name| {
        let quoted = format!("'{}'!", name.replace('\'', "''"));
        if formula.contains(&quoted) {
            return true;
        }
        let bare = format!("{name}!");
        formula.match_indices(&bare).any(|(pos, _)| {
            formula[..pos]
                .chars()
                .next_back()
                .is_none_or(|c| !(c.is_alphanumeric() || c == '_' || c == '.'))
        })
    })
}

fn remove_relationships(xml: &str, rel_ids: &HashSet<String>) -> PickResult<Vec<u8>> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();
    // Inside a removed non-self-closing <Relationship>
    let mut skipping = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                // Skip if this is a relationship we're removing
                if !rel_ids.contains(&relationship_id(&e)?) {
                    writer.write_event(Event::Empty(e))?;
                }
            }
            Event::Start(e) if e.local_name().as_ref() == b"Relationship" => {
                if rel_ids.contains(&relationship_id(&e)?) {
                    skipping = true;
                } else {
                    writer.write_event(Event::Start(e))?;
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"Relationship" => {
                if skipping {
                    skipping = false;
                } else {
                    writer.write_event(Event::End(e))?;
                }
            }
            Event::Eof => break,
            e => {
                if !skipping {
                    writer.write_event(e)?;
                }
            }
        }
        buf.clear();
    }

    Ok(writer.into_inner().into_inner())
}

fn relationship_id(e: &BytesStart<'_>) -> PickResult<String> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == b"Id" {
            return Ok(attr.unescape_value()?.into_owned());
        }
    }
    Ok(String::new())
}

fn rewrite_content_types(xml: &str, plan: &RemovalPlan) -> PickResult<Vec<u8>> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Empty(e) if e.local_name().as_ref() == b"Override" => {
                let mut part_name = String::new();
                let mut content_type = String::new();
                for attr in e.attributes() {
                    let attr = attr?;
                    match attr.key.as_ref() {
                        b"PartName" => part_name = attr.unescape_value()?.into_owned(),
                        b"ContentType" => content_type = attr.unescape_value()?.into_owned(),
                        _ => {}
                    }
                }

                if plan.is_skipped_part_name(&part_name) {
                    // Dropped along with its part
                } else if plan.strip_macros && content_type == MACRO_WORKBOOK_CONTENT_TYPE {
                    let mut rewritten = e.to_owned();
                    rewritten.clear_attributes();
                    for attr in e.attributes() {
                        let attr = attr?;
                        if attr.key.as_ref() == b"ContentType" {
                            rewritten.push_attribute(("ContentType", STANDARD_WORKBOOK_CONTENT_TYPE));
                        } else {
                            rewritten.push_attribute(attr);
                        }
                    }
                    writer.write_event(Event::Empty(rewritten))?;
                } else {
                    writer.write_event(Event::Empty(e))?;
                }
            }
            Event::Empty(e) if plan.strip_macros && e.local_name().as_ref() == b"Default" => {
                let mut is_vba = false;
                for attr in e.attributes() {
                    let attr = attr?;
                    if attr.key.as_ref() == b"ContentType" {
                        is_vba = attr.unescape_value()?.contains("vbaProject");
                    }
                }
                if !is_vba {
                    writer.write_event(Event::Empty(e))?;
                }
            }
            Event::Eof => break,
            e => writer.write_event(e)?,
        }
        buf.clear();
    }

    Ok(writer.into_inner().into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_for(sheets: &[&str], remove: &[&str]) -> RemovalPlan {
        let entries: Vec<SheetEntry> = sheets
            .iter()
            .enumerate()
            .map(|(i, name)| SheetEntry {
                name: name.to_string(),
                sheet_id: (i + 1).to_string(),
                rel_id: format!("rId{}", i + 1),
                part_path: Some(format!("xl/worksheets/sheet{}.xml", i + 1)),
            })
            .collect();
        let mods = WorkbookModifications {
            remove_sheets: remove.iter().map(|s| s.to_string()).collect(),
            strip_macros: false,
        };
        RemovalPlan::new(&entries, &[], &[], &mods)
    }

    fn rewrite(xml: &str, plan: &RemovalPlan) -> String {
        String::from_utf8(rewrite_workbook_xml(xml, plan).unwrap()).unwrap()
    }

    #[test]
    fn test_plan_index_map() {
        let plan = plan_for(&["A", "B", "C", "D"], &["B", "D"]);
        assert_eq!(plan.index_map, vec![Some(0), None, Some(1), None]);
        assert!(plan.skipped_parts.contains("xl/worksheets/sheet2.xml"));
        assert!(plan.skipped_parts.contains("xl/worksheets/_rels/sheet4.xml.rels"));
        assert!(plan.removed_rel_ids.contains("rId2"));
        assert!(!plan.is_noop());
    }

    #[test]
    fn test_remap_tab() {
        let plan = plan_for(&["A", "B", "C", "D"], &["A", "C"]);
        assert_eq!(plan.remap_tab(0), 0);
        assert_eq!(plan.remap_tab(1), 0);
        assert_eq!(plan.remap_tab(2), 0);
        assert_eq!(plan.remap_tab(3), 1);
        assert_eq!(plan.remap_tab(9), 0);
    }

    #[test]
    fn test_rewrite_sheets_and_defined_names() {
        let xml = r#"<workbook><bookViews><workbookView activeTab="2" firstSheet="1"/></bookViews><sheets><sheet name="A" sheetId="1" r:id="rId1"/><sheet name="B" sheetId="2" r:id="rId2"/><sheet name="C" sheetId="3" r:id="rId3"/></sheets><definedNames><definedName name="_xlnm.Print_Area" localSheetId="1">B!$A$1:$C$3</definedName><definedName name="_xlnm.Print_Area" localSheetId="2">C!$A$1:$C$3</definedName><definedName name="Total">'B'!$A$1</definedName><definedName name="Keep">C!$B$2</definedName><definedName name="DataB">DATAB!$A$1</definedName></definedNames></workbook>"#;
        let plan = plan_for(&["A", "B", "C"], &["B"]);
        let out = rewrite(xml, &plan);

        assert!(out.contains(r#"<sheet name="A" sheetId="1" r:id="rId1"/>"#));
        assert!(!out.contains(r#"name="B""#));
        assert!(out.contains(r#"<sheet name="C" sheetId="3" r:id="rId3"/>"#));
        assert!(out.contains(r#"<workbookView activeTab="1" firstSheet="0"/>"#));
        assert!(out.contains(r#"localSheetId="1">C!$A$1:$C$3</definedName>"#));
        assert!(!out.contains("B!$A$1:$C$3"));
        assert!(!out.contains(r#"name="Total""#));
        assert!(out.contains(r#"<definedName name="Keep">C!$B$2</definedName>"#));
        assert!(out.contains("DATAB!$A$1"));
    }

    #[test]
    fn test_rewrite_escaped_sheet_names() {
        let xml = r#"<workbook><sheets><sheet name="R&amp;D" sheetId="1" r:id="rId1"/><sheet name="Ops" sheetId="2" r:id="rId2"/></sheets><definedNames><definedName name="Budget">'R&amp;D'!$A$1</definedName></definedNames></workbook>"#;
        let plan = plan_for(&["R&D", "Ops"], &["R&D"]);
        let out = rewrite(xml, &plan);

        assert!(!out.contains("R&amp;D"));
        assert!(!out.contains("Budget"));
        assert!(out.contains(r#"<sheet name="Ops" sheetId="2" r:id="rId2"/>"#));
    }

    #[test]
    fn test_references_removed_sheet() {
        let removed = vec!["Fund A".to_string(), "Q1".to_string(), "O'Neil".to_string()];
        assert!(references_removed_sheet("'Fund A'!$A$1", &removed));
        assert!(references_removed_sheet("Q1!$A$1", &removed));
        assert!(references_removed_sheet("SUM(Q1!A1,B!A1)", &removed));
        assert!(references_removed_sheet("'O''Neil'!B2", &removed));
        assert!(!references_removed_sheet("XQ1!$A$1", &removed));
        assert!(!references_removed_sheet("'Fund B'!$A$1", &removed));
    }

    #[test]
    fn test_remove_relationships_by_id() {
        let xml = r#"<Relationships><Relationship Id="rId1" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Target="worksheets/sheet2.xml"/></Relationships>"#;
        let ids: HashSet<String> = ["rId2".to_string()].into_iter().collect();
        let out = String::from_utf8(remove_relationships(xml, &ids).unwrap()).unwrap();
        assert!(out.contains("rId1"));
        assert!(!out.contains("rId2"));
    }

    #[test]
    fn test_remove_non_self_closing_relationships() {
        let xml = r#"<Relationships><Relationship Id="rId1" Target="worksheets/sheet1.xml"></Relationship><Relationship Id="rId2" Target="worksheets/sheet2.xml"></Relationship><Relationship Id="rId3" Target="styles.xml"/></Relationships>"#;
        let ids: HashSet<String> = ["rId2".to_string()].into_iter().collect();
        let out = String::from_utf8(remove_relationships(xml, &ids).unwrap()).unwrap();
        assert_eq!(
            out,
            r#"<Relationships><Relationship Id="rId1" Target="worksheets/sheet1.xml"></Relationship><Relationship Id="rId3" Target="styles.xml"/></Relationships>"#
        );
    }

    #[test]
    fn test_content_types_strip_macros() {
        let xml = r#"<Types><Default Extension="bin" ContentType="application/vnd.ms-office.vbaProject"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.ms-excel.sheet.macroEnabled.main+xml"/><Override PartName="/xl/worksheets/sheet2.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;
        let mut plan = plan_for(&["A", "B"], &["B"]);
        plan.strip_macros = true;

        let out = String::from_utf8(rewrite_content_types(xml, &plan).unwrap()).unwrap();
        assert!(!out.contains("vbaProject"));
        assert!(!out.contains("sheet2.xml"));
        assert!(out.contains(STANDARD_WORKBOOK_CONTENT_TYPE));
        assert!(out.contains(r#"Extension="xml""#));
    }

    #[test]
    fn test_is_vba_part() {
        assert!(is_vba_part("xl/vbaProject.bin"));
        assert!(is_vba_part("xl/vbaProjectSignature.bin"));
        assert!(is_vba_part("xl/_rels/vbaProject.bin.rels"));
        assert!(!is_vba_part("xl/workbook.xml"));
    }
}
