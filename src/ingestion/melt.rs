//! First pass: melt wide rows into long records.
//!
//! Each data row carries a code, a display name and one cell per year. Every year cell with a
//! value becomes one [`LongRecord`], written as a tab-delimited line to the intermediate file.

use std::io::Write;

use crate::error::{IngestError, IngestResult};
use crate::types::{
    LongRecord, WideRow, COLUMN_COUNTRY_CODE, COLUMN_COUNTRY_ID, COLUMN_INDICATOR, COLUMN_UNIT,
    COLUMN_VALUE, PROVISIONAL_INDICATOR_ID,
};
use crate::xlsx::column::cell_column;
use crate::xlsx::SheetEvent;

use super::header::{resolve_header, SheetHeader, LEADING_COLUMNS};

/// Whether a raw year cell holds no observation.
pub fn is_empty_cell(raw: &str) -> bool {
    raw.is_empty() || raw == "."
}

/// Reject text that would split a line or a field of the intermediate file.
fn check_delimiters(row: &WideRow, column: &str, text: &str) -> IngestResult<()> {
    if text.contains(['\t', '\n', '\r']) {
        return Err(IngestError::DelimiterInCell {
            row: row.label(),
            column: column.to_string(),
            value: text.to_string(),
        });
    }
    Ok(())
}

/// Collects the cells of one data row into a [`WideRow`].
#[derive(Debug)]
pub struct WideRowBuilder {
    width: usize,
    number: Option<u32>,
    cells: Vec<Option<String>>,
    column: Option<usize>,
}

impl WideRowBuilder {
    /// Start a row of `width` columns (code, name and the years).
    pub fn new(width: usize, number: Option<u32>) -> Self {
        Self {
            width,
            number,
            cells: vec![None; width],
            column: None,
        }
    }

    /// Position the builder on a cell.
    ///
    /// A cell past the width fixed by the header is fatal.
    pub fn start_cell(&mut self, reference: Option<&str>) -> IngestResult<()> {
        let column = cell_column(reference, self.column)?;
        if column >= self.width {
            return Err(IngestError::RowWidthMismatch {
                row: self.row_label(),
                expected: self.width,
                found: column + 1,
            });
        }
        self.column = Some(column);
        Ok(())
    }

    /// Store the text of the current cell.
    pub fn set_value(&mut self, text: String) {
        if let Some(column) = self.column {
            self.cells[column] = Some(text);
        }
    }

    pub fn build(self) -> WideRow {
        let mut cells = self.cells.into_iter();
        let code = cells.next().flatten();
        let name = cells.next().flatten();
        WideRow {
            number: self.number,
            code,
            name,
            values: cells.collect(),
        }
    }

    fn row_label(&self) -> String {
        self.number.map_or_else(|| "?".to_string(), |n| n.to_string())
    }
}

/// Writes melted records to the intermediate file and counts them.
pub struct RowMelter<'h, W: Write> {
    header: &'h SheetHeader,
    writer: csv::Writer<W>,
    case_count: u64,
}

impl<'h, W: Write> RowMelter<'h, W> {
    pub fn new(header: &'h SheetHeader, sink: W) -> Self {
        let writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .quote_style(csv::QuoteStyle::Never)
            .has_headers(false)
            .from_writer(sink);
        Self {
            header,
            writer,
            case_count: 0,
        }
    }

    /// Records of `row`, one per non-empty year cell, in year-column order.
    pub fn records(&self, row: &WideRow) -> IngestResult<Vec<LongRecord>> {
        if row.values.len() != self.header.year_count() {
            return Err(IngestError::RowWidthMismatch {
                row: row.label(),
                expected: self.header.year_count() + LEADING_COLUMNS,
                found: row.values.len() + LEADING_COLUMNS,
            });
        }

        let unit = self.header.unit.as_deref().unwrap_or_default();
        let country_code = row.name.as_deref().unwrap_or_default();
        let country_id = row.code.as_deref().unwrap_or_default();
        let mut records = Vec::new();
        for (value, year) in row.values.iter().zip(&self.header.years) {
            let Some(value) = value.as_deref().filter(|v| !is_empty_cell(v)) else {
                continue;
            };
            if records.is_empty() {
                check_delimiters(row, COLUMN_INDICATOR, &self.header.indicator)?;
                check_delimiters(row, COLUMN_UNIT, unit)?;
                check_delimiters(row, COLUMN_COUNTRY_CODE, country_code)?;
                check_delimiters(row, COLUMN_COUNTRY_ID, country_id)?;
            }
            check_delimiters(row, COLUMN_VALUE, value)?;
            records.push(LongRecord {
                indicator: self.header.indicator.clone(),
                indicator_id: PROVISIONAL_INDICATOR_ID.to_string(),
                unit: unit.to_string(),
                country_code: country_code.to_string(),
                country_id: country_id.to_string(),
                year: year.clone(),
                value: value.to_string(),
            });
        }
        Ok(records)
    }

    /// Melt one row into the intermediate file. Returns the number of records written.
    pub fn melt(&mut self, row: &WideRow) -> IngestResult<usize> {
        let records = self.records(row)?;
        for record in &records {
            self.writer.write_record(record.fields())?;
        }
        self.case_count += records.len() as u64;
        Ok(records.len())
    }

    /// Flush the intermediate file and hand back the sink with the final case count.
    pub fn finish(self) -> IngestResult<(u64, W)> {
        let sink = self.writer.into_inner().map_err(|e| e.into_error())?;
        Ok((self.case_count, sink))
    }
}

/// Outcome of the first pass.
#[derive(Debug)]
pub struct FirstPass<W> {
    pub header: SheetHeader,
    /// Records written to the intermediate file.
    pub case_count: u64,
    /// Data rows seen after the header, including rows that melted to nothing.
    pub row_count: u64,
    pub sink: W,
}

/// Resolve the header from `events`, then melt every following row into `sink`.
///
/// A sheet whose data rows produce no record at all is rejected with
/// [`IngestError::NoDataRows`].
pub fn first_pass<I, W>(events: &mut I, sink: W) -> IngestResult<FirstPass<W>>
where
    I: Iterator<Item = IngestResult<SheetEvent>>,
    W: Write,
{
    let header = resolve_header(events)?;
    let mut melter = RowMelter::new(&header, sink);
    let mut current: Option<WideRowBuilder> = None;
    let mut row_count = 0u64;

    for event in events.by_ref() {
        match event? {
            SheetEvent::RowStart { number, .. } => {
                current = Some(WideRowBuilder::new(header.width, number));
            }
            SheetEvent::CellStart { reference, .. } => {
                if let Some(builder) = current.as_mut() {
                    builder.start_cell(reference.as_deref())?;
                }
            }
            SheetEvent::Value { text } => {
                if let Some(builder) = current.as_mut() {
                    builder.set_value(text);
                }
            }
            SheetEvent::RowEnd => {
                if let Some(builder) = current.take() {
                    melter.melt(&builder.build())?;
                    row_count += 1;
                }
            }
            SheetEvent::SheetEnd => break,
        }
    }

    let (case_count, sink) = melter.finish()?;
    if case_count == 0 {
        return Err(IngestError::NoDataRows {
            message: if row_count == 0 {
                "sheet has a header row but no data rows".to_string()
            } else {
                format!("none of the {row_count} data rows has a value for any year")
            },
        });
    }
    tracing::debug!(rows = row_count, cases = case_count, "first pass complete");
    Ok(FirstPass {
        header,
        case_count,
        row_count,
        sink,
    })
}
