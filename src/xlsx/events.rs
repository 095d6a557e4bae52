//! Worksheet event source.
//!
//! [`SheetEvents`] turns a worksheet XML stream into the handful of structural events the
//! ingest pipeline cares about. It is lazy, forward-only and single-pass: the sheet is never
//! materialized, and reading it again means reopening the package.

use std::collections::VecDeque;
use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::IngestResult;

use super::shared_strings::SharedStrings;

/// A structural event of a worksheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetEvent {
    /// `<row>`; `spans` is the raw `spans` attribute (`"1:12"`).
    RowStart {
        number: Option<u32>,
        spans: Option<String>,
    },
    /// `<c>`; `reference` is the raw `r` attribute (`"C3"`).
    CellStart {
        reference: Option<String>,
        shared_string: bool,
    },
    /// Text of the current cell, with shared-string references already resolved.
    Value { text: String },
    RowEnd,
    SheetEnd,
}

impl SheetEvent {
    pub fn row_start(number: u32, spans: &str) -> Self {
        Self::RowStart {
            number: Some(number),
            spans: Some(spans.to_string()),
        }
    }

    pub fn cell(reference: &str) -> Self {
        Self::CellStart {
            reference: Some(reference.to_string()),
            shared_string: false,
        }
    }

    pub fn value(text: impl Into<String>) -> Self {
        Self::Value { text: text.into() }
    }
}

/// Owned summary of one XML event, so the read buffer can be released before acting on it.
enum Markup {
    Row {
        number: Option<u32>,
        spans: Option<String>,
        empty: bool,
    },
    Cell {
        reference: Option<String>,
        shared_string: bool,
        empty: bool,
    },
    ValueStart,
    ValueEnd,
    InlineStart,
    InlineEnd,
    InlineTextStart,
    InlineTextEnd,
    Text(String),
    CellEnd,
    RowEnd,
    SheetEnd,
    Eof,
    Other,
}

/// Lazy iterator of [`SheetEvent`]s over a worksheet part.
///
/// Cell text is taken from `<v>` (and from `<is><t>` inline strings); formulas, styles and
/// every element outside `<sheetData>` rows are ignored.
pub struct SheetEvents<'s, B: BufRead, S: SharedStrings + ?Sized> {
    reader: Reader<B>,
    strings: &'s S,
    buf: Vec<u8>,
    pending: VecDeque<SheetEvent>,
    shared_cell: Option<bool>,
    capture: Option<String>,
    inline: Option<String>,
    ended: bool,
}

impl<'s, B: BufRead, S: SharedStrings + ?Sized> SheetEvents<'s, B, S> {
    pub fn new(input: B, strings: &'s S) -> Self {
        let mut reader = Reader::from_reader(input);
        reader.config_mut().trim_text(false);
        Self {
            reader,
            strings,
            buf: Vec::new(),
            pending: VecDeque::new(),
            shared_cell: None,
            capture: None,
            inline: None,
            ended: false,
        }
    }

    fn read_markup(&mut self) -> IngestResult<Markup> {
        self.buf.clear();
        let markup = match self.reader.read_event_into(&mut self.buf)? {
            Event::Start(e) => start_markup(&e, false)?,
            Event::Empty(e) => start_markup(&e, true)?,
            Event::End(e) => match e.local_name().as_ref() {
                b"v" => Markup::ValueEnd,
                b"is" => Markup::InlineEnd,
                b"t" => Markup::InlineTextEnd,
                b"c" => Markup::CellEnd,
                b"row" => Markup::RowEnd,
                b"sheetData" => Markup::SheetEnd,
                _ => Markup::Other,
            },
            Event::Text(t) => Markup::Text(t.unescape()?.into_owned()),
            Event::CData(t) => Markup::Text(String::from_utf8_lossy(&t).into_owned()),
            Event::Eof => Markup::Eof,
            _ => Markup::Other,
        };
        Ok(markup)
    }

    fn next_event(&mut self) -> IngestResult<Option<SheetEvent>> {
        loop {
            match self.read_markup()? {
                Markup::Row {
                    number,
                    spans,
                    empty,
                } => {
                    if empty {
                        self.pending.push_back(SheetEvent::RowEnd);
                    }
                    return Ok(Some(SheetEvent::RowStart { number, spans }));
                }
                Markup::Cell {
                    reference,
                    shared_string,
                    empty,
                } => {
                    self.shared_cell = (!empty).then_some(shared_string);
                    return Ok(Some(SheetEvent::CellStart {
                        reference,
                        shared_string,
                    }));
                }
                Markup::ValueStart if self.shared_cell.is_some() => {
                    self.capture = Some(String::new());
                }
                Markup::InlineStart if self.shared_cell.is_some() => {
                    self.inline = Some(String::new());
                }
                Markup::InlineTextStart if self.inline.is_some() => {
                    self.capture = Some(String::new());
                }
                Markup::Text(text) => {
                    if let Some(capture) = self.capture.as_mut() {
                        capture.push_str(&text);
                    }
                }
                Markup::InlineTextEnd => {
                    if let (Some(inline), Some(text)) = (self.inline.as_mut(), self.capture.take()) {
                        inline.push_str(&text);
                    }
                }
                Markup::InlineEnd => {
                    if let Some(text) = self.inline.take() {
                        return Ok(Some(SheetEvent::Value { text }));
                    }
                }
                Markup::ValueEnd => {
                    if let Some(raw) = self.capture.take() {
                        let text = if self.shared_cell == Some(true) {
                            self.strings.resolve(&raw)?.to_string()
                        } else {
                            raw
                        };
                        return Ok(Some(SheetEvent::Value { text }));
                    }
                }
                Markup::CellEnd => {
                    self.shared_cell = None;
                    self.capture = None;
                    self.inline = None;
                }
                Markup::RowEnd => return Ok(Some(SheetEvent::RowEnd)),
                Markup::SheetEnd => {
                    self.ended = true;
                    return Ok(Some(SheetEvent::SheetEnd));
                }
                Markup::Eof => {
                    self.ended = true;
                    tracing::warn!("worksheet ended without a closing sheetData element");
                    return Ok(Some(SheetEvent::SheetEnd));
                }
                _ => {}
            }
        }
    }
}

impl<B: BufRead, S: SharedStrings + ?Sized> Iterator for SheetEvents<'_, B, S> {
    type Item = IngestResult<SheetEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(event) = self.pending.pop_front() {
            return Some(Ok(event));
        }
        if self.ended {
            return None;
        }
        match self.next_event() {
            Ok(event) => event.map(Ok),
            Err(e) => {
                self.ended = true;
                Some(Err(e))
            }
        }
    }
}

fn start_markup(e: &BytesStart<'_>, empty: bool) -> IngestResult<Markup> {
    let markup = match e.local_name().as_ref() {
        b"row" => {
            let mut number = None;
            let mut spans = None;
            let mut has_number = false;
            for attr in e.attributes() {
                let attr = attr.map_err(quick_xml::Error::from)?;
                match attr.key.as_ref() {
                    b"r" => {
                        has_number = true;
                        let raw = attr.unescape_value()?;
                        number = raw.trim().parse::<u32>().ok();
                        if number.is_none() {
                            tracing::warn!(r = %raw, "row element has an unparsable r attribute");
                        }
                    }
                    b"spans" => spans = Some(attr.unescape_value()?.into_owned()),
                    _ => {}
                }
            }
            if !has_number {
                tracing::warn!("row element has no r attribute");
            }
            Markup::Row {
                number,
                spans,
                empty,
            }
        }
        b"c" => {
            let mut reference = None;
            let mut shared_string = false;
            for attr in e.attributes() {
                let attr = attr.map_err(quick_xml::Error::from)?;
                match attr.key.as_ref() {
                    b"r" => reference = Some(attr.unescape_value()?.into_owned()),
                    b"t" => shared_string = attr.value.as_ref() == b"s",
                    _ => {}
                }
            }
            Markup::Cell {
                reference,
                shared_string,
                empty,
            }
        }
        b"v" if !empty => Markup::ValueStart,
        b"is" if !empty => Markup::InlineStart,
        b"t" if !empty => Markup::InlineTextStart,
        b"sheetData" if empty => Markup::SheetEnd,
        _ => Markup::Other,
    };
    Ok(markup)
}
