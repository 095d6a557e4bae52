//! Second pass: type coercion of the melted records.
//!
//! Numeric columns go through a small sentinel vocabulary before they are checked as numbers:
//!
//! | raw (case-insensitive)  | written as |
//! |-------------------------|------------|
//! | empty, `.`, `NA`        | empty      |
//! | `NaN`                   | `NaN`      |
//! | `Inf`, `+Inf`           | `Inf`      |
//! | `-Inf`                  | `-Inf`     |
//! | `null`                  | `0`        |
//!
//! Any other numeric value must parse as an `f64`; spellings such as `infinity` or `-nan` are
//! written as the tokens above. Text columns are written double-quoted with
//! embedded quotes escaped as `\"`.

use std::borrow::Cow;
use std::io::{Read, Write};

use crate::error::{IngestError, IngestResult};
use crate::types::{ColumnSchema, Field, VAR_QUANTITY};

use super::melt::is_empty_cell;
use super::tally::CategoryTally;

/// Coerce a raw numeric value. `None` when it is neither a sentinel nor a number.
pub fn coerce_numeric(raw: &str) -> Option<Cow<'_, str>> {
    if is_empty_cell(raw) || raw.eq_ignore_ascii_case("NA") {
        return Some(Cow::Borrowed(""));
    }
    if raw.eq_ignore_ascii_case("NaN") {
        return Some(Cow::Borrowed("NaN"));
    }
    if raw.eq_ignore_ascii_case("Inf") || raw.eq_ignore_ascii_case("+Inf") {
        return Some(Cow::Borrowed("Inf"));
    }
    if raw.eq_ignore_ascii_case("-Inf") {
        return Some(Cow::Borrowed("-Inf"));
    }
    // Inherited rule: "null" is a numeric zero, not a missing value.
    if raw.eq_ignore_ascii_case("null") {
        return Some(Cow::Borrowed("0"));
    }
    let trimmed = raw.trim();
    let number = trimmed.parse::<f64>().ok()?;
    Some(Cow::Borrowed(if number.is_nan() {
        "NaN"
    } else if number == f64::INFINITY {
        "Inf"
    } else if number == f64::NEG_INFINITY {
        "-Inf"
    } else {
        trimmed
    }))
}

/// Quote a raw text value: strip one leading and one trailing `"`, escape the rest, wrap.
///
/// Empty and `.` values are missing and stay unquoted.
pub fn quote_text(raw: &str) -> String {
    if is_empty_cell(raw) {
        return String::new();
    }
    let inner = raw.strip_prefix('"').unwrap_or(raw);
    let inner = inner.strip_suffix('"').unwrap_or(inner);
    format!("\"{}\"", inner.replace('"', "\\\""))
}

/// Coerce one field of intermediate line `line` (1-based).
pub fn coerce_field<'a>(field: &Field, raw: &'a str, line: u64) -> IngestResult<Cow<'a, str>> {
    if !field.is_numeric() {
        return Ok(Cow::Owned(quote_text(raw)));
    }
    coerce_numeric(raw).ok_or_else(|| IngestError::NumericParseError {
        line,
        column: field.name.to_string(),
        raw: raw.to_string(),
    })
}

/// Read the intermediate file, tally raw values and write the final file.
///
/// Returns the number of lines written.
pub fn second_pass<R: Read, W: Write>(
    intermediate: R,
    output: W,
    tally: &mut CategoryTally,
) -> IngestResult<u64> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .quoting(false)
        .has_headers(false)
        .flexible(true)
        .from_reader(intermediate);
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Never)
        .has_headers(false)
        .from_writer(output);

    let fields = ColumnSchema.fields();
    let mut line = 0u64;
    let mut record = csv::StringRecord::new();

    while reader.read_record(&mut record)? {
        line += 1;
        if record.len() != VAR_QUANTITY {
            return Err(IngestError::FieldCountMismatch {
                line,
                expected: VAR_QUANTITY,
                found: record.len(),
            });
        }
        tally.observe_line(record.iter());

        let coerced = fields
            .iter()
            .zip(record.iter())
            .map(|(field, raw)| coerce_field(field, raw, line))
            .collect::<IngestResult<Vec<_>>>()?;
        writer.write_record(coerced.iter().map(|c| c.as_bytes()))?;
    }

    writer.flush()?;
    tracing::debug!(lines = line, "second pass complete");
    Ok(line)
}
