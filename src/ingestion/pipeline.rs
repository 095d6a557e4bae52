//! Two-pass ingest driver.
//!
//! Most callers should use [`ingest_xlsx_from_path`], which reads one worksheet of a workbook
//! into a tab-delimited data file plus [`IngestMetadata`].
//!
//! - Pass 1 resolves the header and melts every data row into an anonymous intermediate file.
//! - Pass 2 reads that file back, coerces each field and writes the final file while tallying
//!   raw values.
//! - If an [`IngestObserver`] is provided, success/failure/alerts are reported to it.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::NamedTempFile;

use crate::error::{IngestError, IngestResult};
use crate::types::IngestMetadata;
use crate::xlsx::{SheetEvents, WorksheetSelection, XlsxPackage};

use super::assemble::assemble_metadata;
use super::coerce::second_pass;
use super::melt::first_pass;
use super::observability::{IngestContext, IngestObserver, IngestSeverity, IngestStats};
use super::tally::CategoryTally;

const DATA_FILE_PREFIX: &str = "data-";
const DATA_FILE_SUFFIX: &str = ".tab";

/// Options controlling an ingest.
///
/// Use [`Default`] for common cases.
#[derive(Clone)]
pub struct IngestOptions {
    /// Directory for the intermediate and final files. System temp dir when `None`.
    pub temp_dir: Option<PathBuf>,
    /// Which worksheet of the workbook to read.
    pub worksheet: WorksheetSelection,
    /// Optional observer for logging/alerts.
    pub observer: Option<Arc<dyn IngestObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: IngestSeverity,
}

impl fmt::Debug for IngestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestOptions")
            .field("temp_dir", &self.temp_dir)
            .field("worksheet", &self.worksheet)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            temp_dir: None,
            worksheet: WorksheetSelection::default(),
            observer: None,
            alert_at_or_above: IngestSeverity::Critical,
        }
    }
}

/// The result of an ingest: metadata plus the tab-delimited data file.
///
/// The data file is deleted when this value is dropped unless it is persisted first.
#[derive(Debug)]
pub struct TabularIngest {
    pub metadata: IngestMetadata,
    pub data_file: NamedTempFile,
}

impl TabularIngest {
    /// Current location of the data file.
    pub fn data_path(&self) -> &Path {
        self.data_file.path()
    }

    /// Keep the data file at `path` and return the metadata.
    pub fn persist_to(self, path: impl AsRef<Path>) -> IngestResult<IngestMetadata> {
        self.data_file
            .persist(path.as_ref())
            .map_err(|e| IngestError::Io(e.error))?;
        Ok(self.metadata)
    }
}

/// Ingest the selected worksheet of a workbook read from `reader`.
///
/// Both temporary files are scoped to this call: the intermediate file is anonymous and the
/// final file is only kept when the call succeeds.
pub fn ingest_xlsx_from_reader<R: Read + Seek>(
    reader: R,
    options: &IngestOptions,
) -> IngestResult<TabularIngest> {
    let mut package = XlsxPackage::open(reader)?;
    let strings = package.shared_strings()?;
    let part = package.worksheet_part(&options.worksheet)?;

    let intermediate = match &options.temp_dir {
        Some(dir) => tempfile::tempfile_in(dir)?,
        None => tempfile::tempfile()?,
    };
    let first = {
        let sheet = package.open_part(&part)?;
        let mut events = SheetEvents::new(BufReader::new(sheet), &strings);
        first_pass(&mut events, BufWriter::new(intermediate))?
    };
    let mut intermediate = first.sink.into_inner().map_err(|e| e.into_error())?;
    intermediate.seek(SeekFrom::Start(0))?;

    let mut builder = tempfile::Builder::new();
    builder.prefix(DATA_FILE_PREFIX).suffix(DATA_FILE_SUFFIX);
    let mut data_file = match &options.temp_dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };

    let mut tally = CategoryTally::new();
    let line_count = second_pass(BufReader::new(intermediate), data_file.as_file_mut(), &mut tally)?;
    let metadata = assemble_metadata(first.case_count, line_count, tally)?;

    tracing::debug!(path = %data_file.path().display(), "produced data file");
    tracing::info!(
        indicator = %first.header.indicator,
        variables = metadata.var_quantity,
        cases = metadata.case_quantity,
        "ingested worksheet {part}"
    );
    Ok(TabularIngest {
        metadata,
        data_file,
    })
}

/// Ingest the selected worksheet of the workbook at `path`.
///
/// When an observer is configured, this function reports:
///
/// - `on_success` on success, with case and variable counts
/// - `on_failure` on failure, with a computed severity
/// - `on_alert` on failure when the computed severity is >= `options.alert_at_or_above`
///
/// # Examples
///
/// ```no_run
/// use clioinfra_ingest::ingestion::{ingest_xlsx_from_path, IngestOptions};
///
/// # fn main() -> Result<(), clioinfra_ingest::IngestError> {
/// let ingest = ingest_xlsx_from_path("life_expectancy.xlsx", &IngestOptions::default())?;
/// println!("cases={}", ingest.metadata.case_quantity);
/// let metadata = ingest.persist_to("life_expectancy.tab")?;
/// # let _ = metadata;
/// # Ok(())
/// # }
/// ```
///
/// ## Named worksheet with stderr logging
///
/// ```no_run
/// use std::sync::Arc;
///
/// use clioinfra_ingest::ingestion::{
///     ingest_xlsx_from_path, IngestOptions, IngestSeverity, StdErrObserver,
/// };
/// use clioinfra_ingest::xlsx::WorksheetSelection;
///
/// # fn main() -> Result<(), clioinfra_ingest::IngestError> {
/// let opts = IngestOptions {
///     worksheet: WorksheetSelection::Named("Data".to_string()),
///     observer: Some(Arc::new(StdErrObserver::default())),
///     alert_at_or_above: IngestSeverity::Critical,
///     ..Default::default()
/// };
///
/// // Missing files are treated as Critical and will trigger `on_alert` at this threshold.
/// let _err = ingest_xlsx_from_path("does_not_exist.xlsx", &opts).unwrap_err();
/// # Ok(())
/// # }
/// ```
pub fn ingest_xlsx_from_path(
    path: impl AsRef<Path>,
    options: &IngestOptions,
) -> IngestResult<TabularIngest> {
    let path = path.as_ref();
    let ctx = IngestContext {
        source: path.to_path_buf(),
        worksheet: options.worksheet.clone(),
    };

    let result = File::open(path)
        .map_err(IngestError::from)
        .and_then(|file| ingest_xlsx_from_reader(BufReader::new(file), options));

    if let Some(obs) = options.observer.as_ref() {
        match &result {
            Ok(ingest) => obs.on_success(
                &ctx,
                IngestStats {
                    cases: ingest.metadata.case_quantity,
                    variables: ingest.metadata.var_quantity,
                },
            ),
            Err(e) => {
                let sev = severity_for_error(e);
                obs.on_failure(&ctx, sev, e);
                if sev >= options.alert_at_or_above {
                    obs.on_alert(&ctx, sev, e);
                }
            }
        }
    }

    result
}

/// I/O failures are infrastructure problems; everything else is a problem with the input.
pub fn severity_for_error(e: &IngestError) -> IngestSeverity {
    match e {
        IngestError::Io(_) => IngestSeverity::Critical,
        IngestError::Zip(zip::result::ZipError::Io(_)) => IngestSeverity::Critical,
        IngestError::Xml(quick_xml::Error::Io(_)) => IngestSeverity::Critical,
        IngestError::Csv(err) => match err.kind() {
            ::csv::ErrorKind::Io(_) => IngestSeverity::Critical,
            _ => IngestSeverity::Error,
        },
        _ => IngestSeverity::Error,
    }
}

/// Owned ingest request, for callers that enqueue work in a job system.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub path: PathBuf,
    pub options: IngestOptions,
}

impl IngestRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            options: IngestOptions::default(),
        }
    }

    /// Execute the request by calling [`ingest_xlsx_from_path`].
    pub fn run(&self) -> IngestResult<TabularIngest> {
        ingest_xlsx_from_path(&self.path, &self.options)
    }
}
