mod common;

use std::sync::{Arc, Mutex};

use clioinfra_ingest::IngestError;
use clioinfra_ingest::ingestion::{
    CompositeObserver, FileObserver, IngestContext, IngestObserver, IngestOptions, IngestRequest,
    IngestSeverity, IngestStats, ingest_xlsx_from_path,
};

use common::{SheetFixture, tmp_file};

#[derive(Default)]
struct RecordingObserver {
    successes: Mutex<Vec<IngestStats>>,
    failures: Mutex<Vec<IngestSeverity>>,
    alerts: Mutex<Vec<IngestSeverity>>,
}

impl IngestObserver for RecordingObserver {
    fn on_success(&self, _ctx: &IngestContext, stats: IngestStats) {
        self.successes.lock().unwrap().push(stats);
    }

    fn on_failure(&self, _ctx: &IngestContext, severity: IngestSeverity, _error: &IngestError) {
        self.failures.lock().unwrap().push(severity);
    }

    fn on_alert(&self, _ctx: &IngestContext, severity: IngestSeverity, _error: &IngestError) {
        self.alerts.lock().unwrap().push(severity);
    }
}

fn write_fixture(name: &str, fixture: &SheetFixture) -> std::path::PathBuf {
    let path = tmp_file(name, "xlsx");
    std::fs::write(&path, fixture.to_xlsx()).unwrap();
    path
}

#[test]
fn observer_receives_failure_and_alert_on_critical_io_error() {
    let obs = Arc::new(RecordingObserver::default());
    let opts = IngestOptions {
        observer: Some(obs.clone()),
        alert_at_or_above: IngestSeverity::Critical,
        ..Default::default()
    };

    // Missing file -> Io error -> Critical
    let _ = ingest_xlsx_from_path("tests/fixtures/does_not_exist.xlsx", &opts).unwrap_err();

    let failures = obs.failures.lock().unwrap().clone();
    let alerts = obs.alerts.lock().unwrap().clone();
    assert_eq!(failures, vec![IngestSeverity::Critical]);
    assert_eq!(alerts, vec![IngestSeverity::Critical]);
}

#[test]
fn observer_receives_failure_without_alert_for_non_critical_error() {
    let obs = Arc::new(RecordingObserver::default());
    let opts = IngestOptions {
        observer: Some(obs.clone()),
        alert_at_or_above: IngestSeverity::Critical,
        ..Default::default()
    };
    let path = write_fixture(
        "bad-year",
        &SheetFixture::new("GDP", None, &["abc"]).row("40", "Austria", &[Some("1")]),
    );

    // Schema mismatch -> Error severity (not Critical) -> should not alert
    let err = ingest_xlsx_from_path(&path, &opts).unwrap_err();
    assert!(matches!(err, IngestError::SchemaMismatch { .. }));

    let failures = obs.failures.lock().unwrap().clone();
    assert_eq!(failures, vec![IngestSeverity::Error]);
    assert!(obs.alerts.lock().unwrap().is_empty());

    let _ = std::fs::remove_file(&path);
}

#[test]
fn lower_alert_threshold_alerts_on_input_errors() {
    let obs = Arc::new(RecordingObserver::default());
    let opts = IngestOptions {
        observer: Some(obs.clone()),
        alert_at_or_above: IngestSeverity::Error,
        ..Default::default()
    };
    let path = write_fixture("header-only", &SheetFixture::new("GDP", None, &["2000"]));

    let _ = ingest_xlsx_from_path(&path, &opts).unwrap_err();
    assert_eq!(obs.alerts.lock().unwrap().clone(), vec![IngestSeverity::Error]);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn observer_receives_success_stats() {
    let obs = Arc::new(RecordingObserver::default());
    let path = write_fixture(
        "success",
        &SheetFixture::new("GDP", Some("GK$"), &["2000", "2001"])
            .row("40", "Austria", &[Some("1"), Some("2")])
            .row("56", "Belgium", &[None, Some("3")]),
    );

    let mut request = IngestRequest::new(&path);
    request.options.observer = Some(obs.clone());
    let ingest = request.run().unwrap();

    assert_eq!(ingest.metadata.case_quantity, 3);
    assert_eq!(
        obs.successes.lock().unwrap().clone(),
        vec![IngestStats { cases: 3, variables: 7 }]
    );
    assert!(obs.failures.lock().unwrap().is_empty());

    let _ = std::fs::remove_file(&path);
}

#[test]
fn composite_observer_fans_out_to_file_log() {
    let recording = Arc::new(RecordingObserver::default());
    let log = tmp_file("observer-log", "jsonl");
    let composite = CompositeObserver::new(vec![
        recording.clone() as Arc<dyn IngestObserver>,
        Arc::new(FileObserver::new(&log)),
    ]);
    let opts = IngestOptions {
        observer: Some(Arc::new(composite)),
        ..Default::default()
    };

    let _ = ingest_xlsx_from_path("tests/fixtures/missing.xlsx", &opts).unwrap_err();

    assert_eq!(recording.failures.lock().unwrap().len(), 1);
    assert_eq!(recording.alerts.lock().unwrap().len(), 1);
    let lines: Vec<serde_json::Value> = std::fs::read_to_string(&log)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let events: Vec<&str> = lines.iter().map(|l| l["event"].as_str().unwrap()).collect();
    assert_eq!(events, vec!["fail", "alert"]);
    assert!(lines[0]["source"].as_str().unwrap().ends_with("missing.xlsx"));

    let _ = std::fs::remove_file(&log);
}
