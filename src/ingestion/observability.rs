use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::error::IngestError;
use crate::xlsx::WorksheetSelection;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestSeverity {
    Info,
    /// Non-fatal.
    Warning,
    /// The ingest failed on its input.
    Error,
    /// The ingest failed on infrastructure (I/O).
    Critical,
}

/// What was being ingested.
#[derive(Debug, Clone)]
pub struct IngestContext {
    pub source: PathBuf,
    pub worksheet: WorksheetSelection,
}

impl IngestContext {
    fn worksheet_name(&self) -> &str {
        match &self.worksheet {
            WorksheetSelection::First => "<first>",
            WorksheetSelection::Named(name) => name,
        }
    }
}

/// Counts reported on a successful ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    /// Records in the output file.
    pub cases: u64,
    pub variables: usize,
}

/// Observer interface for ingest outcomes.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait IngestObserver: Send + Sync {
    fn on_success(&self, _ctx: &IngestContext, _stats: IngestStats) {}

    fn on_failure(&self, _ctx: &IngestContext, _severity: IngestSeverity, _error: &IngestError) {}

    /// Called when a failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &IngestContext, severity: IngestSeverity, error: &IngestError) {
        self.on_failure(ctx, severity, error)
    }
}

/// Fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn IngestObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn IngestObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl IngestObserver for CompositeObserver {
    fn on_success(&self, ctx: &IngestContext, stats: IngestStats) {
        for o in &self.observers {
            o.on_success(ctx, stats);
        }
    }

    fn on_failure(&self, ctx: &IngestContext, severity: IngestSeverity, error: &IngestError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &IngestContext, severity: IngestSeverity, error: &IngestError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Prints ingest events to stderr.
#[derive(Debug, Default)]
pub struct StdErrObserver;

impl IngestObserver for StdErrObserver {
    fn on_success(&self, ctx: &IngestContext, stats: IngestStats) {
        eprintln!(
            "[ingest][ok] source={} sheet={} cases={} variables={}",
            ctx.source.display(),
            ctx.worksheet_name(),
            stats.cases,
            stats.variables
        );
    }

    fn on_failure(&self, ctx: &IngestContext, severity: IngestSeverity, error: &IngestError) {
        eprintln!(
            "[ingest][{severity:?}] source={} sheet={} err={error}",
            ctx.source.display(),
            ctx.worksheet_name()
        );
    }

    fn on_alert(&self, ctx: &IngestContext, severity: IngestSeverity, error: &IngestError) {
        eprintln!(
            "[ALERT][ingest][{severity:?}] source={} sheet={} err={error}",
            ctx.source.display(),
            ctx.worksheet_name()
        );
    }
}

/// Forwards ingest events to `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl IngestObserver for TracingObserver {
    fn on_success(&self, ctx: &IngestContext, stats: IngestStats) {
        tracing::info!(
            source = %ctx.source.display(),
            sheet = ctx.worksheet_name(),
            cases = stats.cases,
            variables = stats.variables,
            "ingest succeeded"
        );
    }

    fn on_failure(&self, ctx: &IngestContext, severity: IngestSeverity, error: &IngestError) {
        tracing::warn!(
            source = %ctx.source.display(),
            sheet = ctx.worksheet_name(),
            severity = ?severity,
            error = %error,
            "ingest failed"
        );
    }

    fn on_alert(&self, ctx: &IngestContext, severity: IngestSeverity, error: &IngestError) {
        tracing::error!(
            source = %ctx.source.display(),
            sheet = ctx.worksheet_name(),
            severity = ?severity,
            error = %error,
            "ingest alert"
        );
    }
}

#[derive(Serialize)]
struct LogLine<'a> {
    ts: u64,
    event: &'a str,
    source: String,
    sheet: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    severity: Option<IngestSeverity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<IngestStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Appends ingest events to a local log file, one JSON object per line.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append(&self, line: &LogLine<'_>) {
        let Ok(json) = serde_json::to_string(line) else {
            return;
        };
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{json}");
        }
    }

    fn failure_line<'a>(
        event: &'a str,
        ctx: &'a IngestContext,
        severity: IngestSeverity,
        error: &IngestError,
    ) -> LogLine<'a> {
        LogLine {
            ts: unix_ts(),
            event,
            source: ctx.source.display().to_string(),
            sheet: ctx.worksheet_name(),
            severity: Some(severity),
            stats: None,
            error: Some(error.to_string()),
        }
    }
}

impl IngestObserver for FileObserver {
    fn on_success(&self, ctx: &IngestContext, stats: IngestStats) {
        self.append(&LogLine {
            ts: unix_ts(),
            event: "ok",
            source: ctx.source.display().to_string(),
            sheet: ctx.worksheet_name(),
            severity: None,
            stats: Some(stats),
            error: None,
        });
    }

    fn on_failure(&self, ctx: &IngestContext, severity: IngestSeverity, error: &IngestError) {
        self.append(&Self::failure_line("fail", ctx, severity, error));
    }

    fn on_alert(&self, ctx: &IngestContext, severity: IngestSeverity, error: &IngestError) {
        self.append(&Self::failure_line("alert", ctx, severity, error));
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
