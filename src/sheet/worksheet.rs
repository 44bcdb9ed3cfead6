//! Worksheet cell grid parsing.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::CellValue;
use super::dates::serial_to_datetime;
use super::parts::{DateStyles, attr};
use crate::error::{Result, SalvageError};

/// Spreadsheet limits; references beyond them mean a damaged sheet.
const MAX_COLUMNS: u32 = 16_384;
const MAX_ROWS: u32 = 1_048_576;

/// Everything a cell's raw text needs to become a value.
pub struct CellContext<'a> {
    pub shared_strings: &'a [String],
    pub styles: &'a DateStyles,
    pub date1904: bool,
}

/// A parsed row: its 0-based sheet index and its cells from column A.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    pub index: u32,
    pub cells: Vec<CellValue>,
}

/// Split a reference such as `AB12` into 0-based (column, row).
pub fn parse_cell_ref(reference: &str) -> Option<(u32, u32)> {
    let letters = reference
        .bytes()
        .take_while(|b| b.is_ascii_alphabetic())
        .count();
    if letters == 0 {
        return None;
    }

    let (col_part, row_part) = reference.split_at(letters);
    let mut column: u32 = 0;
    for b in col_part.bytes() {
        column = column
            .checked_mul(26)?
            .checked_add((b.to_ascii_uppercase() - b'A' + 1) as u32)?;
    }

    let row: u32 = row_part.parse().ok()?;
    if row == 0 {
        return None;
    }

    Some((column - 1, row - 1))
}

#[derive(Default)]
struct PendingCell {
    column: u32,
    cell_type: Option<String>,
    style: usize,
    value: String,
    inline: String,
}

pub fn parse_worksheet(xml: &[u8], part: &str, ctx: &CellContext<'_>) -> Result<Vec<SheetRow>> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut rows: Vec<SheetRow> = Vec::new();
    let mut next_row: u32 = 0;
    let mut next_column: u32 = 0;
    let mut cell: Option<PendingCell> = None;
    let mut in_value = false;
    let mut in_inline_text = false;
    let mut phonetic_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => {
                    let index = row_index(&e, next_row, part)?;
                    rows.push(SheetRow {
                        index,
                        cells: Vec::new(),
                    });
                    next_row = index + 1;
                    next_column = 0;
                }
                b"c" => {
                    let pending = start_cell(&e, next_column, part)?;
                    next_column = pending.column + 1;
                    cell = Some(pending);
                }
                b"v" => in_value = true,
                b"rPh" => phonetic_depth += 1,
                b"t" if phonetic_depth == 0 => in_inline_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"row" => {
                    let index = row_index(&e, next_row, part)?;
                    rows.push(SheetRow {
                        index,
                        cells: Vec::new(),
                    });
                    next_row = index + 1;
                    next_column = 0;
                }
                b"c" => {
                    // A styled but valueless cell only advances the column.
                    let pending = start_cell(&e, next_column, part)?;
                    next_column = pending.column + 1;
                }
                _ => {}
            },
            Ok(Event::Text(te)) if in_value || in_inline_text => {
                let text = te.unescape().map_err(|err| SalvageError::xml(part, err))?;
                if let Some(c) = cell.as_mut() {
                    if in_value {
                        c.value.push_str(&text);
                    } else {
                        c.inline.push_str(&text);
                    }
                }
            }
            Ok(Event::CData(cd)) if in_value || in_inline_text => {
                let text = String::from_utf8_lossy(&cd);
                if let Some(c) = cell.as_mut() {
                    if in_value {
                        c.value.push_str(&text);
                    } else {
                        c.inline.push_str(&text);
                    }
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" => in_value = false,
                b"t" => in_inline_text = false,
                b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                b"c" => {
                    if let Some(pending) = cell.take() {
                        let column = pending.column;
                        let value = resolve_cell(pending, ctx)?;
                        if !value.is_empty() {
                            place_cell(&mut rows, next_row, column, value);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(SalvageError::xml(part, e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(rows)
}

fn row_index(e: &BytesStart<'_>, fallback: u32, part: &str) -> Result<u32> {
    let Some(r) = attr(e, b"r", part)? else {
        return Ok(fallback);
    };

    match r.parse::<u32>() {
        Ok(n) if (1..=MAX_ROWS).contains(&n) => Ok(n - 1),
        _ => Err(SalvageError::InvalidWorkbook(format!(
            "row number {:?} out of range in {}",
            r, part
        ))),
    }
}

fn start_cell(e: &BytesStart<'_>, fallback_column: u32, part: &str) -> Result<PendingCell> {
    let column = match attr(e, b"r", part)? {
        Some(reference) => parse_cell_ref(&reference)
            .map(|(col, _)| col)
            .ok_or_else(|| {
                SalvageError::InvalidWorkbook(format!(
                    "bad cell reference {:?} in {}",
                    reference, part
                ))
            })?,
        None => fallback_column,
    };

    if column >= MAX_COLUMNS {
        return Err(SalvageError::InvalidWorkbook(format!(
            "cell column {} out of range in {}",
            column + 1,
            part
        )));
    }

    let style = attr(e, b"s", part)?
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    Ok(PendingCell {
        column,
        cell_type: attr(e, b"t", part)?,
        style,
        ..PendingCell::default()
    })
}

/// Put a finished cell in the row currently open (the last one pushed).
fn place_cell(rows: &mut Vec<SheetRow>, next_row: u32, column: u32, value: CellValue) {
    if rows.is_empty() {
        // Cells outside any <row>; treat as the row the cursor is on.
        rows.push(SheetRow {
            index: next_row,
            cells: Vec::new(),
        });
    }

    if let Some(row) = rows.last_mut() {
        let column = column as usize;
        if row.cells.len() <= column {
            row.cells.resize(column + 1, CellValue::Empty);
        }
        row.cells[column] = value;
    }
}

fn resolve_cell(cell: PendingCell, ctx: &CellContext<'_>) -> Result<CellValue> {
    let raw = cell.value;

    let value = match cell.cell_type.as_deref() {
        Some("s") => {
            let index: usize = raw.trim().parse().map_err(|_| {
                SalvageError::InvalidWorkbook(format!("bad shared string index {:?}", raw))
            })?;
            let text = ctx.shared_strings.get(index).ok_or_else(|| {
                SalvageError::InvalidWorkbook(format!(
                    "shared string index {} out of range ({} strings)",
                    index,
                    ctx.shared_strings.len()
                ))
            })?;
            text_value(text.clone())
        }
        Some("inlineStr") => text_value(cell.inline),
        Some("str") | Some("e") => text_value(raw),
        Some("b") => match raw.trim() {
            "" => CellValue::Empty,
            "0" => CellValue::Text("FALSE".to_string()),
            _ => CellValue::Text("TRUE".to_string()),
        },
        Some("d") => parse_iso_date(raw.trim())
            .map(CellValue::Date)
            .unwrap_or_else(|| text_value(raw)),
        _ => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                CellValue::Empty
            } else {
                match trimmed.parse::<f64>() {
                    Ok(n) if ctx.styles.is_date(cell.style) => serial_to_datetime(n, ctx.date1904)
                        .map(CellValue::Date)
                        .unwrap_or(CellValue::Number(n)),
                    Ok(n) => CellValue::Number(n),
                    Err(_) => CellValue::Text(trimmed.to_string()),
                }
            }
        }
    };

    Ok(value)
}

fn text_value(text: String) -> CellValue {
    if text.is_empty() {
        CellValue::Empty
    } else {
        CellValue::Text(text)
    }
}

fn parse_iso_date(s: &str) -> Option<chrono::NaiveDateTime> {
    use chrono::{NaiveDate, NaiveDateTime};

    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
