use std::collections::HashSet;

use tracing::debug;

use super::parts::{
    PACKAGE_RELS, WorkbookLinks, parse_relationships, parse_shared_strings, parse_styles,
    parse_workbook, rels_path_for, workbook_path,
};
use super::worksheet::{CellContext, SheetRow, parse_worksheet};
use super::{CellValue, TableRecord};
use crate::error::{Result, SalvageError};
use crate::zip::ZipExtractor;

const DEFAULT_SHARED_STRINGS: &str = "xl/sharedStrings.xml";
const DEFAULT_STYLES: &str = "xl/styles.xml";

/// A workbook that opened cleanly, reduced to its first worksheet.
#[derive(Debug, Clone)]
pub struct ValidatedTable {
    pub table: TableRecord,
    pub sheet_name: String,
    pub sheet_part: String,
    pub entry_count: usize,
}

fn invalid_archive(e: anyhow::Error) -> SalvageError {
    SalvageError::InvalidArchive(format!("{:#}", e))
}

/// Open `archive` as an XLSX workbook and read its first worksheet.
///
/// Column names come from the first non-empty row; every later row is
/// mapped onto them by position.
pub fn validate(archive: &[u8]) -> Result<ValidatedTable> {
    let zip = ZipExtractor::open(archive).map_err(invalid_archive)?;
    let read = |name: &str| zip.read_named(name).map_err(invalid_archive);
    let read_optional = |name: &str| -> Result<Option<Vec<u8>>> {
        match zip.entry(name) {
            Some(entry) => zip.extract_to_memory(entry).map(Some).map_err(invalid_archive),
            None => Ok(None),
        }
    };

    let package_rels = read_optional(PACKAGE_RELS)?;
    let workbook_part = workbook_path(package_rels.as_deref())?;
    let workbook = parse_workbook(&read(&workbook_part)?, &workbook_part)?;

    let first = workbook
        .sheets
        .first()
        .ok_or_else(|| SalvageError::InvalidWorkbook("workbook lists no sheets".to_string()))?;

    let rels_part = rels_path_for(&workbook_part);
    let links = WorkbookLinks::from_relationships(
        &workbook_part,
        parse_relationships(&read(&rels_part)?, &rels_part)?,
    );

    let sheet_part = links
        .worksheet(&first.rel_id)
        .ok_or_else(|| {
            SalvageError::InvalidWorkbook(format!(
                "sheet {:?} ({}) has no worksheet relationship",
                first.name, first.rel_id
            ))
        })?
        .to_string();

    let strings_part = links
        .shared_strings
        .as_deref()
        .unwrap_or(DEFAULT_SHARED_STRINGS);
    let shared_strings = match read_optional(strings_part)? {
        Some(xml) => parse_shared_strings(&xml, strings_part)?,
        None => Vec::new(),
    };

    let styles_part = links.styles.as_deref().unwrap_or(DEFAULT_STYLES);
    let styles = match read_optional(styles_part)? {
        Some(xml) => parse_styles(&xml, styles_part)?,
        None => Default::default(),
    };

    let ctx = CellContext {
        shared_strings: &shared_strings,
        styles: &styles,
        date1904: workbook.date1904,
    };
    let rows = parse_worksheet(&read(&sheet_part)?, &sheet_part, &ctx)?;

    debug!(
        sheet = %first.name,
        part = %sheet_part,
        sheet_rows = rows.len(),
        shared_strings = shared_strings.len(),
        "parsed first worksheet"
    );

    Ok(ValidatedTable {
        table: build_table(rows),
        sheet_name: first.name.clone(),
        sheet_part,
        entry_count: zip.entries().len(),
    })
}

/// Turn sheet rows into a header-keyed table.
fn build_table(mut rows: Vec<SheetRow>) -> TableRecord {
    for row in &mut rows {
        trim_trailing_empty(&mut row.cells);
    }
    rows.sort_by_key(|r| r.index);

    let Some(header_pos) = rows.iter().position(|r| !r.cells.is_empty()) else {
        return TableRecord::default();
    };

    let mut rows = rows.split_off(header_pos).into_iter();
    let Some(header) = rows.next() else {
        return TableRecord::default();
    };

    // Missing row numbers between data rows are blank rows.
    let mut data: Vec<Vec<CellValue>> = Vec::new();
    let mut expected = header.index + 1;
    for row in rows {
        while expected < row.index {
            data.push(Vec::new());
            expected += 1;
        }
        data.push(row.cells);
        expected = row.index + 1;
    }

    while data.last().is_some_and(|cells| cells.is_empty()) {
        data.pop();
    }

    let width = data
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(header.cells.len()))
        .max()
        .unwrap_or(0);

    for cells in &mut data {
        cells.resize(width, CellValue::Empty);
    }

    TableRecord::new(column_names(&header.cells, width), data)
}

fn trim_trailing_empty(cells: &mut Vec<CellValue>) {
    while cells.last().is_some_and(CellValue::is_empty) {
        cells.pop();
    }
}

/// Header cells as unique column names.
///
/// Blank headers become `Unnamed: <index>`; repeats get `.1`, `.2`, ...
fn column_names(header: &[CellValue], width: usize) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut names = Vec::with_capacity(width);

    for index in 0..width {
        let base = match header.get(index) {
            Some(cell) if !cell.is_empty() => cell.to_string(),
            _ => format!("Unnamed: {}", index),
        };

        let mut name = base.clone();
        let mut suffix = 1;
        while seen.contains(&name) {
            name = format!("{}.{}", base, suffix);
            suffix += 1;
        }

        seen.insert(name.clone());
        names.push(name);
    }

    names
}
