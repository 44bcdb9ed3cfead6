//! Fixture builders shared by the integration tests.

#![allow(dead_code)]

use chrono::NaiveDate;
use std::io::{Cursor, Write};
use xlsalvage::CellValue;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug, Clone)]
pub enum Cell {
    Text(&'static str),
    Number(f64),
    Date(i32, u32, u32),
    Blank,
}

impl Cell {
    /// What the table should hold for this cell once recovered.
    pub fn expected(&self) -> CellValue {
        match self {
            Cell::Text(s) => CellValue::Text(s.to_string()),
            Cell::Number(n) => CellValue::Number(*n),
            Cell::Date(y, m, d) => CellValue::Date(
                NaiveDate::from_ymd_opt(*y, *m, *d)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
            ),
            Cell::Blank => CellValue::Empty,
        }
    }
}

/// A small clinical export: header plus `rows` data rows.
pub fn lab_sheet(rows: usize) -> (Vec<&'static str>, Vec<Vec<Cell>>) {
    let columns = vec!["patientId", "timestamp", "test", "value"];
    let patients = ["an1", "an2", "an3"];
    let tests = ["glucose", "hba1c", "creatinine"];

    let data = (0..rows)
        .map(|i| {
            vec![
                Cell::Text(patients[i % patients.len()]),
                Cell::Date(2024, 1 + (i % 12) as u32, 1 + (i % 28) as u32),
                Cell::Text(tests[i % tests.len()]),
                Cell::Number(4.5 + i as f64),
            ]
        })
        .collect();

    (columns, data)
}

fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap()
}

fn excel_serial(y: i32, m: u32, d: u32) -> i64 {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).unwrap();
    (NaiveDate::from_ymd_opt(y, m, d).unwrap() - epoch).num_days()
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets></workbook>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/><xf numFmtId="14" fontId="0" fillId="0" borderId="0" applyNumberFormat="1"/></cellXfs></styleSheet>"#;

/// Which parts to leave out, to build damaged workbooks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Omit {
    pub worksheet: bool,
    pub workbook: bool,
}

/// Build an XLSX workbook whose first sheet holds `columns` then `rows`.
pub fn workbook(columns: &[&str], rows: &[Vec<Cell>]) -> Vec<u8> {
    workbook_with(columns, rows, Omit::default())
}

pub fn workbook_with(columns: &[&str], rows: &[Vec<Cell>], omit: Omit) -> Vec<u8> {
    let mut strings: Vec<String> = Vec::new();
    let mut string_index = |s: &str| -> usize {
        match strings.iter().position(|x| x == s) {
            Some(i) => i,
            None => {
                strings.push(s.to_string());
                strings.len() - 1
            }
        }
    };

    let mut sheet = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );

    let header: Vec<Cell> = columns
        .iter()
        .map(|c| Cell::Text(Box::leak(c.to_string().into_boxed_str())))
        .collect();

    for (r, cells) in std::iter::once(&header).chain(rows.iter()).enumerate() {
        let row_number = r + 1;
        sheet.push_str(&format!(r#"<row r="{}">"#, row_number));
        for (c, cell) in cells.iter().enumerate() {
            let reference = format!("{}{}", column_letter(c), row_number);
            match cell {
                Cell::Text(s) => sheet.push_str(&format!(
                    r#"<c r="{}" t="s"><v>{}</v></c>"#,
                    reference,
                    string_index(s)
                )),
                Cell::Number(n) => {
                    sheet.push_str(&format!(r#"<c r="{}"><v>{}</v></c>"#, reference, n))
                }
                Cell::Date(y, m, d) => sheet.push_str(&format!(
                    r#"<c r="{}" s="1"><v>{}</v></c>"#,
                    reference,
                    excel_serial(*y, *m, *d)
                )),
                Cell::Blank => {}
            }
        }
        sheet.push_str("</row>");
    }
    sheet.push_str("</sheetData></worksheet>");

    let mut shared = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{0}" uniqueCount="{0}">"#,
        strings.len()
    );
    for s in &strings {
        shared.push_str(&format!("<si><t>{}</t></si>", escape(s)));
    }
    shared.push_str("</sst>");

    let mut parts: Vec<(&str, String)> = vec![
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", PACKAGE_RELS.to_string()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_string()),
        ("xl/styles.xml", STYLES.to_string()),
        ("xl/sharedStrings.xml", shared),
    ];
    if !omit.workbook {
        parts.push(("xl/workbook.xml", WORKBOOK.to_string()));
    }
    if !omit.worksheet {
        parts.push(("xl/worksheets/sheet1.xml", sheet));
    }

    zip_parts(&parts)
}

fn zip_parts(parts: &[(&str, String)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, content) in parts {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }

    writer.finish().unwrap().into_inner()
}

/// Wrap archive bytes the way a text export mangles them.
pub fn json_wrapped(archive: &[u8]) -> Vec<u8> {
    let mut out = b"[\n  \"".to_vec();
    out.extend_from_slice(archive);
    out.extend_from_slice(b"\"\n]\n");
    out
}

/// One-entry STORED archive assembled byte by byte.
///
/// With name `a.txt` and data `abc` none of its bytes are wrapper
/// artifacts, which makes it a precise probe for the cleaner.
pub fn stored_archive(name: &str, data: &[u8]) -> Vec<u8> {
    let crc = {
        let mut crc = flate2::Crc::new();
        crc.update(data);
        crc.sum()
    };

    let mut out = Vec::new();
    out.extend_from_slice(b"PK\x03\x04");
    out.extend_from_slice(&20u16.to_le_bytes());
    out.extend_from_slice(&[0u8; 8]);
    out.extend_from_slice(&crc.to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(&(name.len() as u16).to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(data);

    let cd_offset = out.len() as u32;
    out.extend_from_slice(b"PK\x01\x02");
    out.extend_from_slice(&20u16.to_le_bytes());
    out.extend_from_slice(&20u16.to_le_bytes());
    out.extend_from_slice(&[0u8; 8]);
    out.extend_from_slice(&crc.to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(&(name.len() as u16).to_le_bytes());
    out.extend_from_slice(&[0u8; 12]);
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(name.as_bytes());
    let cd_size = out.len() as u32 - cd_offset;

    out.extend_from_slice(b"PK\x05\x06");
    out.extend_from_slice(&[0u8; 4]);
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&cd_size.to_le_bytes());
    out.extend_from_slice(&cd_offset.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out
}
