//! Shared string table lookup.
//!
//! Worksheet cells with `t="s"` store an index into the workbook's deduplicated
//! string pool instead of their text. The pipeline only ever reads that pool, through
//! the [`SharedStrings`] capability.

use std::io::BufRead;

use quick_xml::events::Event;
use quick_xml::name::QName;
use quick_xml::Reader;

use crate::error::{IngestError, IngestResult};

/// Read-only lookup from a shared-string index to its text.
pub trait SharedStrings {
    /// Number of entries in the table.
    fn len(&self) -> usize;

    /// Text at `index`, if present.
    fn get(&self, index: usize) -> Option<&str>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve the raw `<v>` content of a shared-string cell.
    ///
    /// A non-numeric or out-of-range reference means the package is corrupt.
    fn resolve(&self, reference: &str) -> IngestResult<&str> {
        let corrupt = || IngestError::CorruptSharedStringReference {
            reference: reference.to_string(),
            table_len: self.len(),
        };
        let index = reference.trim().parse::<usize>().map_err(|_| corrupt())?;
        self.get(index).ok_or_else(corrupt)
    }
}

/// In-memory shared string table, as read from `xl/sharedStrings.xml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedStringTable {
    items: Vec<String>,
}

impl SharedStringTable {
    pub fn new(items: Vec<String>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }
}

impl From<Vec<String>> for SharedStringTable {
    fn from(items: Vec<String>) -> Self {
        Self::new(items)
    }
}

impl SharedStrings for SharedStringTable {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn get(&self, index: usize) -> Option<&str> {
        self.items.get(index).map(String::as_str)
    }
}

impl SharedStrings for [String] {
    fn len(&self) -> usize {
        <[String]>::len(self)
    }

    fn get(&self, index: usize) -> Option<&str> {
        <[String]>::get(self, index).map(String::as_str)
    }
}

/// Parse a `sharedStrings.xml` part.
///
/// Each `<si>` contributes one entry: the concatenation of its `<t>` runs, either direct
/// children or inside rich-text `<r>` runs. Phonetic `<rPh>` runs are not part of the
/// displayed string and are skipped.
pub fn parse_shared_strings<B: BufRead>(input: B) -> IngestResult<SharedStringTable> {
    let mut reader = Reader::from_reader(input);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut items = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"si" => {
                items.push(read_si(&mut reader)?);
            }
            Event::Empty(e) if e.local_name().as_ref() == b"si" => items.push(String::new()),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(SharedStringTable::new(items))
}

fn read_si<B: BufRead>(reader: &mut Reader<B>) -> IngestResult<String> {
    let mut buf = Vec::new();
    let mut text = String::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"t" => {
                let end = e.name().as_ref().to_vec();
                text.push_str(&read_text(reader, QName(&end))?);
            }
            // Rich text run: its `<t>` children arrive as ordinary events.
            Event::Start(e) if e.local_name().as_ref() == b"r" => {}
            Event::Start(e) => {
                let end = e.name().as_ref().to_vec();
                reader.read_to_end_into(QName(&end), &mut Vec::new())?;
            }
            Event::End(e) if e.local_name().as_ref() == b"si" => break,
            Event::Eof => {
                return Err(IngestError::MalformedPackage {
                    message: "unexpected eof in shared string item".to_string(),
                });
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(text)
}

fn read_text<B: BufRead>(reader: &mut Reader<B>, end: QName<'_>) -> IngestResult<String> {
    let mut buf = Vec::new();
    let mut text = String::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Text(e) => text.push_str(&e.unescape()?),
            Event::CData(e) => text.push_str(&String::from_utf8_lossy(&e)),
            Event::End(e) if e.name() == end => break,
            Event::Eof => {
                return Err(IngestError::MalformedPackage {
                    message: "unexpected eof in shared string text".to_string(),
                });
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(text)
}
