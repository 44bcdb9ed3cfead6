//! Workbook-level SpreadsheetML parts: package relationships, the workbook
//! itself, shared strings and cell styles.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;

use super::dates::{is_builtin_date_format, is_date_format_code};
use crate::error::{Result, SalvageError};

pub const PACKAGE_RELS: &str = "_rels/.rels";
pub const DEFAULT_WORKBOOK: &str = "xl/workbook.xml";

const REL_OFFICE_DOCUMENT: &str = "/officeDocument";
const REL_WORKSHEET: &str = "/worksheet";
const REL_SHARED_STRINGS: &str = "/sharedStrings";
const REL_STYLES: &str = "/styles";

/// Read attribute `name` (matched on its local name) from a start tag.
pub(super) fn attr(e: &BytesStart<'_>, name: &[u8], part: &str) -> Result<Option<String>> {
    for a in e.attributes() {
        let a = a.map_err(|err| SalvageError::xml(part, err))?;
        if a.key.local_name().as_ref() == name {
            let value = a
                .unescape_value()
                .map_err(|err| SalvageError::xml(part, err))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Resolve a relationship target against the directory of its source part.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = source_part.split('/').collect();
    segments.pop();

    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    segments.join("/")
}

/// Path of the relationships part that belongs to `part`.
pub fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

#[derive(Debug, Clone)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
}

pub fn parse_relationships(xml: &[u8], part: &str) -> Result<Vec<Relationship>> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut rels = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                let id = attr(&e, b"Id", part)?.unwrap_or_default();
                let rel_type = attr(&e, b"Type", part)?.unwrap_or_default();
                let target = attr(&e, b"Target", part)?.unwrap_or_default();
                rels.push(Relationship {
                    id,
                    rel_type,
                    target,
                });
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(SalvageError::xml(part, e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

/// Locate the workbook part through the package relationships.
pub fn workbook_path(package_rels: Option<&[u8]>) -> Result<String> {
    let Some(xml) = package_rels else {
        return Ok(DEFAULT_WORKBOOK.to_string());
    };

    let found = parse_relationships(xml, PACKAGE_RELS)?
        .into_iter()
        .find(|r| r.rel_type.ends_with(REL_OFFICE_DOCUMENT))
        .map(|r| resolve_target("", &r.target));

    Ok(found.unwrap_or_else(|| DEFAULT_WORKBOOK.to_string()))
}

#[derive(Debug, Clone)]
pub struct SheetRef {
    pub name: String,
    pub rel_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct WorkbookInfo {
    pub sheets: Vec<SheetRef>,
    pub date1904: bool,
}

pub fn parse_workbook(xml: &[u8], part: &str) -> Result<WorkbookInfo> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut info = WorkbookInfo::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"workbookPr" => {
                    let flag = attr(&e, b"date1904", part)?;
                    info.date1904 = matches!(flag.as_deref(), Some("1") | Some("true"));
                }
                b"sheet" => {
                    let name = attr(&e, b"name", part)?.unwrap_or_default();
                    let rel_id = attr(&e, b"id", part)?.ok_or_else(|| {
                        SalvageError::InvalidWorkbook(format!("sheet {:?} has no r:id", name))
                    })?;
                    info.sheets.push(SheetRef { name, rel_id });
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(SalvageError::xml(part, e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(info)
}

/// Where the workbook's parts live, resolved from its relationships.
#[derive(Debug, Clone, Default)]
pub struct WorkbookLinks {
    targets: HashMap<String, String>,
    pub shared_strings: Option<String>,
    pub styles: Option<String>,
}

impl WorkbookLinks {
    pub fn from_relationships(workbook_part: &str, rels: Vec<Relationship>) -> Self {
        let mut links = WorkbookLinks::default();
        for rel in rels {
            let target = resolve_target(workbook_part, &rel.target);
            if rel.rel_type.ends_with(REL_SHARED_STRINGS) {
                links.shared_strings = Some(target.clone());
            } else if rel.rel_type.ends_with(REL_STYLES) {
                links.styles = Some(target.clone());
            }
            if rel.rel_type.ends_with(REL_WORKSHEET) {
                links.targets.insert(rel.id, target);
            }
        }
        links
    }

    pub fn worksheet(&self, rel_id: &str) -> Option<&str> {
        self.targets.get(rel_id).map(String::as_str)
    }
}

/// Shared string table; rich-text runs are concatenated, phonetic hints dropped.
pub fn parse_shared_strings(xml: &[u8], part: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_t = false;
    let mut phonetic_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"rPh" => phonetic_depth += 1,
                b"t" if phonetic_depth == 0 => in_t = true,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => {
                strings.push(String::new());
            }
            Ok(Event::Text(te)) if in_t => {
                let text = te.unescape().map_err(|err| SalvageError::xml(part, err))?;
                if let Some(s) = current.as_mut() {
                    s.push_str(&text);
                }
            }
            Ok(Event::CData(cd)) if in_t => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&String::from_utf8_lossy(&cd));
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"si" => strings.extend(current.take()),
                b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                b"t" => in_t = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(SalvageError::xml(part, e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}

/// Which cell style indices render numbers as dates.
#[derive(Debug, Clone, Default)]
pub struct DateStyles {
    is_date: Vec<bool>,
}

impl DateStyles {
    pub fn is_date(&self, style_index: usize) -> bool {
        self.is_date.get(style_index).copied().unwrap_or(false)
    }
}

pub fn parse_styles(xml: &[u8], part: &str) -> Result<DateStyles> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut custom_formats: HashMap<u32, String> = HashMap::new();
    let mut xf_format_ids: Vec<u32> = Vec::new();
    let mut in_cell_xfs = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"numFmt" => {
                    let id = attr(&e, b"numFmtId", part)?.and_then(|v| v.parse().ok());
                    let code = attr(&e, b"formatCode", part)?;
                    if let (Some(id), Some(code)) = (id, code) {
                        custom_formats.insert(id, code);
                    }
                }
                b"cellXfs" => in_cell_xfs = true,
                b"xf" if in_cell_xfs => {
                    let id = attr(&e, b"numFmtId", part)?
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(0);
                    xf_format_ids.push(id);
                }
                _ => {}
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = false,
            Ok(Event::Eof) => break,
            Err(e) => return Err(SalvageError::xml(part, e)),
            _ => {}
        }
        buf.clear();
    }

    let is_date = xf_format_ids
        .into_iter()
        .map(|id| match custom_formats.get(&id) {
            Some(code) => is_date_format_code(code),
            None => is_builtin_date_format(id),
        })
        .collect();

    Ok(DateStyles { is_date })
}
