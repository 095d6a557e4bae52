use std::io::{BufReader, Read, Seek};

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::{IngestError, IngestResult};

use super::shared_strings::{parse_shared_strings, SharedStringTable};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const DEFAULT_SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const DEFAULT_WORKSHEET_PART: &str = "xl/worksheets/sheet1.xml";

/// How to choose the worksheet of a workbook.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WorksheetSelection {
    /// The first sheet in workbook order (default).
    #[default]
    First,
    /// The sheet with this name.
    Named(String),
}

#[derive(Debug, Clone)]
struct Relationship {
    id: String,
    target: String,
    kind: String,
}

/// An opened OpenXML spreadsheet package.
pub struct XlsxPackage<R: Read + Seek> {
    archive: ZipArchive<R>,
    relationships: Vec<Relationship>,
}

impl<R: Read + Seek> XlsxPackage<R> {
    pub fn open(reader: R) -> IngestResult<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let relationships = match archive.by_name(WORKBOOK_RELS_PART) {
            Ok(part) => parse_relationships(BufReader::new(part))?,
            Err(ZipError::FileNotFound) => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            archive,
            relationships,
        })
    }

    /// Read the workbook's shared string table. A package without one yields an empty table.
    pub fn shared_strings(&mut self) -> IngestResult<SharedStringTable> {
        let part = self
            .relationships
            .iter()
            .find(|r| r.kind.ends_with("/sharedStrings"))
            .map(|r| part_name(&r.target))
            .unwrap_or_else(|| DEFAULT_SHARED_STRINGS_PART.to_string());

        let table = match self.archive.by_name(&part) {
            Ok(file) => parse_shared_strings(BufReader::new(file))?,
            Err(ZipError::FileNotFound) => {
                tracing::warn!(part = %part, "package has no shared strings part");
                SharedStringTable::default()
            }
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(part = %part, entries = table.items().len(), "loaded shared strings");
        Ok(table)
    }

    /// Resolve the zip entry name of the selected worksheet.
    pub fn worksheet_part(&mut self, selection: &WorksheetSelection) -> IngestResult<String> {
        let sheets = match self.archive.by_name(WORKBOOK_PART) {
            Ok(part) => parse_workbook_sheets(BufReader::new(part))?,
            Err(ZipError::FileNotFound) if *selection == WorksheetSelection::First => {
                tracing::warn!("package has no workbook part, assuming {DEFAULT_WORKSHEET_PART}");
                return Ok(DEFAULT_WORKSHEET_PART.to_string());
            }
            Err(e) => return Err(e.into()),
        };

        let (name, rel_id) = match selection {
            WorksheetSelection::First => sheets.into_iter().next(),
            WorksheetSelection::Named(wanted) => sheets.into_iter().find(|(name, _)| name == wanted),
        }
        .ok_or_else(|| IngestError::MalformedPackage {
            message: match selection {
                WorksheetSelection::First => "workbook has no sheets".to_string(),
                WorksheetSelection::Named(wanted) => format!("workbook has no sheet named '{wanted}'"),
            },
        })?;

        let part = match self.relationships.iter().find(|r| r.id == rel_id) {
            Some(rel) => part_name(&rel.target),
            None if *selection == WorksheetSelection::First => {
                tracing::warn!(sheet = %name, rel_id = %rel_id, "sheet relationship not found, assuming {DEFAULT_WORKSHEET_PART}");
                DEFAULT_WORKSHEET_PART.to_string()
            }
            None => {
                return Err(IngestError::MalformedPackage {
                    message: format!("relationship '{rel_id}' for sheet '{name}' not found"),
                });
            }
        };
        tracing::debug!(sheet = %name, part = %part, "resolved worksheet part");
        Ok(part)
    }

    /// Open a part of the package for streaming.
    pub fn open_part(&mut self, name: &str) -> IngestResult<impl Read + '_> {
        match self.archive.by_name(name) {
            Ok(file) => Ok(file),
            Err(ZipError::FileNotFound) => Err(IngestError::MalformedPackage {
                message: format!("part '{name}' not found"),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

/// Zip entry name of a relationship target of `xl/workbook.xml`.
fn part_name(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target.trim_start_matches("./")),
    }
}

fn parse_relationships<B: std::io::BufRead>(input: B) -> IngestResult<Vec<Relationship>> {
    let mut reader = Reader::from_reader(input);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut out = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let mut rel = Relationship {
                    id: String::new(),
                    target: String::new(),
                    kind: String::new(),
                };
                for attr in e.attributes() {
                    let attr = attr.map_err(quick_xml::Error::from)?;
                    match attr.key.as_ref() {
                        b"Id" => rel.id = attr.unescape_value()?.into_owned(),
                        b"Target" => rel.target = attr.unescape_value()?.into_owned(),
                        b"Type" => rel.kind = attr.unescape_value()?.into_owned(),
                        _ => {}
                    }
                }
                out.push(rel);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

/// `(name, relationship id)` of every `<sheet>` in workbook order.
fn parse_workbook_sheets<B: std::io::BufRead>(input: B) -> IngestResult<Vec<(String, String)>> {
    let mut reader = Reader::from_reader(input);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut out = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let mut name = String::new();
                let mut rel_id = String::new();
                for attr in e.attributes() {
                    let attr = attr.map_err(quick_xml::Error::from)?;
                    match (attr.key.prefix().is_some(), attr.key.local_name().as_ref()) {
                        (false, b"name") => name = attr.unescape_value()?.into_owned(),
                        (true, b"id") => rel_id = attr.unescape_value()?.into_owned(),
                        _ => {}
                    }
                }
                out.push((name, rel_id));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}
