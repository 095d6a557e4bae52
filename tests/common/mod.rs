#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub fn tmp_file(name: &str, ext: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("clioinfra-ingest-{name}-{nanos}.{ext}"))
}

/// A wide indicator sheet, written as a hand-built package so the XML is exactly known.
#[derive(Debug, Clone)]
pub struct SheetFixture {
    pub sheet_name: String,
    pub indicator: String,
    pub unit: Option<String>,
    pub years: Vec<String>,
    /// `(code, name, one value per year)`.
    pub rows: Vec<(String, String, Vec<Option<String>>)>,
}

impl SheetFixture {
    pub fn new(indicator: &str, unit: Option<&str>, years: &[&str]) -> Self {
        Self {
            sheet_name: "Data".to_string(),
            indicator: indicator.to_string(),
            unit: unit.map(str::to_string),
            years: years.iter().map(|y| y.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row(mut self, code: &str, name: &str, values: &[Option<&str>]) -> Self {
        self.rows.push((
            code.to_string(),
            name.to_string(),
            values.iter().map(|v| v.map(str::to_string)).collect(),
        ));
        self
    }

    pub fn width(&self) -> usize {
        self.years.len() + 2
    }

    pub fn to_xlsx(&self) -> Vec<u8> {
        let mut strings = StringPool::default();
        let sheet = self.sheet_xml(&mut strings);
        build_package(&[(&self.sheet_name, &sheet)], &strings.items)
    }

    fn sheet_xml(&self, strings: &mut StringPool) -> String {
        let spans = format!("1:{}", self.width());
        let mut rows = Vec::new();
        let mut n = 1u32;

        rows.push(row_xml(n, &spans, &[cell_xml(0, n, &self.indicator, strings)]));
        n += 1;
        if let Some(unit) = &self.unit {
            rows.push(row_xml(n, &spans, &[cell_xml(0, n, unit, strings)]));
            n += 1;
        }

        let mut header = vec![
            cell_xml(0, n, "Code", strings),
            cell_xml(1, n, "Continent, Region, Country", strings),
        ];
        for (i, year) in self.years.iter().enumerate() {
            header.push(cell_xml(i + 2, n, year, strings));
        }
        rows.push(row_xml(n, &spans, &header));
        n += 1;

        for (code, name, values) in &self.rows {
            let mut cells = vec![cell_xml(0, n, code, strings), cell_xml(1, n, name, strings)];
            for (i, value) in values.iter().enumerate() {
                if let Some(value) = value {
                    cells.push(cell_xml(i + 2, n, value, strings));
                }
            }
            rows.push(row_xml(n, &spans, &cells));
            n += 1;
        }
        worksheet_xml(&rows.concat())
    }
}

#[derive(Default)]
pub struct StringPool {
    pub items: Vec<String>,
}

impl StringPool {
    pub fn index(&mut self, text: &str) -> usize {
        match self.items.iter().position(|s| s == text) {
            Some(i) => i,
            None => {
                self.items.push(text.to_string());
                self.items.len() - 1
            }
        }
    }
}

pub fn column_letter(index: usize) -> String {
    let letter = |n: usize| char::from(b'A' + n as u8);
    if index < 26 {
        letter(index).to_string()
    } else {
        [letter(index / 26 - 1), letter(index % 26)].iter().collect()
    }
}

pub fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Numbers go in `<v>` directly; any other text goes through the shared string table.
pub fn cell_xml(column: usize, row: u32, text: &str, strings: &mut StringPool) -> String {
    let reference = format!("{}{row}", column_letter(column));
    if text.parse::<f64>().is_ok() {
        format!(r#"<c r="{reference}"><v>{text}</v></c>"#)
    } else {
        let index = strings.index(text);
        format!(r#"<c r="{reference}" t="s"><v>{index}</v></c>"#)
    }
}

pub fn row_xml(number: u32, spans: &str, cells: &[String]) -> String {
    format!(r#"<row r="{number}" spans="{spans}">{}</row>"#, cells.concat())
}

pub fn worksheet_xml(rows: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{rows}</sheetData></worksheet>"#
    )
}

pub fn shared_strings_xml(items: &[String]) -> String {
    let si: String = items
        .iter()
        .map(|s| format!("<si><t>{}</t></si>", xml_escape(s)))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{n}" uniqueCount="{n}">{si}</sst>"#,
        n = items.len()
    )
}

/// Zip up a workbook with the given `(sheet name, worksheet xml)` parts and shared strings.
pub fn build_package(sheets: &[(&str, &str)], strings: &[String]) -> Vec<u8> {
    let mut sheet_entries = String::new();
    let mut rels = String::new();
    for (i, (name, _)) in sheets.iter().enumerate() {
        let id = i + 1;
        sheet_entries.push_str(&format!(
            r#"<sheet name="{}" sheetId="{id}" r:id="rId{id}"/>"#,
            xml_escape(name)
        ));
        rels.push_str(&format!(
            r#"<Relationship Id="rId{id}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{id}.xml"/>"#
        ));
    }
    rels.push_str(&format!(
        r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>"#,
        sheets.len() + 1
    ));

    let workbook = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>{sheet_entries}</sheets></workbook>"#
    );
    let workbook_rels = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{rels}</Relationships>"#
    );

    let mut parts: Vec<(String, String)> = vec![
        ("xl/workbook.xml".to_string(), workbook),
        ("xl/_rels/workbook.xml.rels".to_string(), workbook_rels),
        ("xl/sharedStrings.xml".to_string(), shared_strings_xml(strings)),
    ];
    for (i, (_, xml)) in sheets.iter().enumerate() {
        parts.push((format!("xl/worksheets/sheet{}.xml", i + 1), xml.to_string()));
    }
    zip_parts(&parts)
}

pub fn zip_parts(parts: &[(String, String)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, body) in parts {
        writer.start_file(name.as_str(), options).unwrap();
        writer.write_all(body.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}
