//! OpenXML spreadsheet plumbing: column labels, the shared string table, worksheet events and
//! the zip package that holds them.

pub mod column;
pub mod events;
pub mod package;
pub mod shared_strings;

pub use column::{decode_column, encode_column, MAX_COLUMN_INDEX};
pub use events::{SheetEvent, SheetEvents};
pub use package::{WorksheetSelection, XlsxPackage};
pub use shared_strings::{parse_shared_strings, SharedStringTable, SharedStrings};
