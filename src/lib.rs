//! `clioinfra-ingest` reads Clio Infra indicator workbooks: one indicator per sheet, laid out
//! wide (one row per region or country code, one column per year).
//!
//! The primary entrypoint is [`ingestion::ingest_xlsx_from_path`], which streams the worksheet
//! once, melts it into a long-format tab-delimited file and returns that file together with
//! [`types::IngestMetadata`].
//!
//! ## Sheet layout
//!
//! ```text
//! row 1   Life expectancy at birth (total)          indicator
//! row 2   Years                                     unit (optional)
//! row 3   Code | Continent, Region, Country | 1950 | 1951 | ...
//! row 4+  40   | Austria                    | 68.3 | 68.9 | ...
//! ```
//!
//! ## Output
//!
//! Seven columns per line, tab-delimited, in [`types::ColumnSchema`] order:
//!
//! - `indicator`, `unit`, `countrycode`: text, double-quoted, `\"` for embedded quotes
//! - `indicatortid`, `countrytid`, `year`, `value`: numeric, unquoted; `NA`/`.`/empty are
//!   missing, `NaN`/`Inf`/`-Inf` are kept, `null` is `0`
//!
//! Only year cells with a value produce a line.
//!
//! ## Quick example
//!
//! ```no_run
//! use clioinfra_ingest::ingestion::{ingest_xlsx_from_path, IngestOptions};
//!
//! # fn main() -> Result<(), clioinfra_ingest::IngestError> {
//! let ingest = ingest_xlsx_from_path("wages.xlsx", &IngestOptions::default())?;
//! for variable in &ingest.metadata.variables {
//!     println!("{} ({:?}): {} categories", variable.name, variable.var_type, variable.categories.len());
//! }
//! let metadata = ingest.persist_to("wages.tab")?;
//! println!("cases={}", metadata.case_quantity);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`ingestion`]: the two-pass pipeline, its options and observer hooks
//! - [`xlsx`]: package, shared strings and worksheet event decoding
//! - [`types`]: output schema and metadata types
//! - [`error`]: error types used across the crate

pub mod error;
pub mod ingestion;
pub mod types;
pub mod xlsx;

pub use error::{IngestError, IngestResult};
