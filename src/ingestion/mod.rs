//! The ingest pipeline.
//!
//! Most callers should use [`ingest_xlsx_from_path`] (from [`pipeline`]) which:
//!
//! - resolves the sheet header ([`header`])
//! - melts the wide data rows into an intermediate file ([`melt`])
//! - coerces and quotes every field into the final file ([`coerce`]) while tallying raw values
//!   ([`tally`])
//! - checks the pass counts and builds the metadata ([`assemble`])
//! - optionally reports success/failure/alerts to an [`IngestObserver`]

pub mod assemble;
pub mod coerce;
pub mod header;
pub mod melt;
pub mod observability;
pub mod pipeline;
pub mod tally;

pub use assemble::assemble_metadata;
pub use coerce::{coerce_numeric, quote_text, second_pass};
pub use header::{HeaderResolver, HeaderState, SheetHeader, Transition};
pub use melt::{first_pass, FirstPass, RowMelter, WideRowBuilder};
pub use observability::{
    CompositeObserver, FileObserver, IngestContext, IngestObserver, IngestSeverity, IngestStats,
    StdErrObserver, TracingObserver,
};
pub use pipeline::{
    ingest_xlsx_from_path, ingest_xlsx_from_reader, IngestOptions, IngestRequest, TabularIngest,
};
pub use tally::{CategoryTally, FrequencyMap};
