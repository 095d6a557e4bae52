//! Column label codec.
//!
//! Data sheets never go past column `ZZ`, so labels are one or two uppercase letters:
//! `A`..`Z` map to `0..=25` and a two-letter label `XY` maps to `26 * (1 + X) + Y`.

use crate::error::{IngestError, IngestResult};

/// Highest index with a label (`ZZ`).
pub const MAX_COLUMN_INDEX: usize = 26 * 26 + 25;

/// Decode a column label (`"A"`, `"AB"`, ...) into a zero-based index.
pub fn decode_column(label: &str) -> IngestResult<usize> {
    let invalid = || IngestError::InvalidColumnLabel {
        label: label.to_string(),
    };
    match label.as_bytes() {
        [single] if single.is_ascii_uppercase() => Ok(usize::from(single - b'A')),
        [first, second] if first.is_ascii_uppercase() && second.is_ascii_uppercase() => {
            Ok(26 * (1 + usize::from(first - b'A')) + usize::from(second - b'A'))
        }
        _ => Err(invalid()),
    }
}

/// Encode a zero-based index as a column label. Inverse of [`decode_column`].
pub fn encode_column(index: usize) -> IngestResult<String> {
    if index > MAX_COLUMN_INDEX {
        return Err(IngestError::ColumnIndexOutOfRange {
            index,
            max: MAX_COLUMN_INDEX,
        });
    }
    let letter = |n: usize| char::from(b'A' + n as u8);
    if index < 26 {
        Ok(letter(index).to_string())
    } else {
        Ok([letter(index / 26 - 1), letter(index % 26)].iter().collect())
    }
}

/// The letter part of an A1-style cell reference (`"AB12"` -> `"AB"`).
pub fn column_label(reference: &str) -> &str {
    let end = reference
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(reference.len());
    &reference[..end]
}

/// Decode the column of an A1-style cell reference.
pub fn decode_reference(reference: &str) -> IngestResult<usize> {
    decode_column(column_label(reference)).map_err(|_| IngestError::InvalidColumnLabel {
        label: reference.to_string(),
    })
}

/// Column of a cell, from its `r` attribute or, when that is omitted, the column after
/// `previous` (the first column when the cell opens its row).
pub fn cell_column(reference: Option<&str>, previous: Option<usize>) -> IngestResult<usize> {
    match reference {
        Some(reference) => decode_reference(reference),
        None => Ok(previous.map_or(0, |p| p + 1)),
    }
}
