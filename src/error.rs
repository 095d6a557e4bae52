use thiserror::Error;

/// Convenience result type for ingest operations.
pub type IngestResult<T> = Result<T, IngestError>;

/// Error type returned by the ingest pipeline.
///
/// Every variant is fatal to the ingest invocation that produced it: there is no partial result.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Underlying I/O error (e.g. file not found, temp file could not be created).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The input is not a readable zip/OpenXML package.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A package part is not well-formed XML.
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Reading or writing an intermediate tab-delimited file failed.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// The package is structurally unusable (no worksheet, truncated shared strings, ...).
    #[error("malformed package: {message}")]
    MalformedPackage { message: String },

    /// A cell position label is not one or two uppercase letters.
    #[error("invalid column label '{label}'")]
    InvalidColumnLabel { label: String },

    /// A column index is beyond the last encodable label (`ZZ`).
    #[error("column index {index} is out of range (max {max})")]
    ColumnIndexOutOfRange { index: usize, max: usize },

    /// A shared-string cell references an entry that does not exist.
    #[error("corrupt shared string reference '{reference}' (table has {table_len} entries)")]
    CorruptSharedStringReference { reference: String, table_len: usize },

    /// The header row's `spans` attribute is missing or unparsable.
    #[error("malformed header: {message}")]
    MalformedHeader { message: String },

    /// A header cell does not have the expected shape (continent label, year).
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// The header ended before the code marker and continent label were both found.
    #[error("incomplete header: {message}")]
    IncompleteHeader { message: String },

    /// A data row has a cell past the column count established by the header.
    #[error("row {row}: width mismatch, {expected} columns expected, cell found at column {found}")]
    RowWidthMismatch {
        row: String,
        expected: usize,
        found: usize,
    },

    /// A cell holds a tab or line break, which the tab-delimited intermediate file cannot carry.
    #[error("row {row}: {column} value {value:?} contains a tab or line break")]
    DelimiterInCell {
        row: String,
        column: String,
        value: String,
    },

    /// The header was read but no data row produced a record.
    #[error("no data rows: {message}")]
    NoDataRows { message: String },

    /// An intermediate line does not split into the expected number of fields.
    #[error("line {line}: {expected} delimited values expected, {found} found")]
    FieldCountMismatch {
        line: u64,
        expected: usize,
        found: usize,
    },

    /// A numeric column holds a value that is neither a number nor a recognized sentinel.
    #[error("failed to parse numeric value at line {line} column '{column}' (raw='{raw}')")]
    NumericParseError {
        line: u64,
        column: String,
        raw: String,
    },

    /// The first pass and the second pass disagree on the number of records.
    #[error("row count mismatch: first pass wrote {first_pass} records, second pass read {second_pass}")]
    RowCountMismatch { first_pass: u64, second_pass: u64 },
}
