pub mod otlp;
pub mod reader;

use std::fmt;
use std::path::Path;

use lotel_core::error::{LotelError, Result};
use lotel_core::signal::SignalKind;
use lotel_store::Store;
use tracing::debug;

use crate::otlp::{LogExport, MetricExport, TraceExport, service_name};

/// Rows written per signal by one ingestion pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    pub spans: usize,
    pub metric_points: usize,
    pub logs: usize,
}

impl fmt::Display for IngestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} spans, {} metric points, {} logs",
            self.spans, self.metric_points, self.logs
        )
    }
}

/// Ingests the three collector-written signal files under `data_dir` into
/// the store. Missing files are skipped; each present file is parsed
/// line-by-line and committed in a single transaction. Re-ingesting a file
/// appends duplicate rows by design.
pub fn ingest_all(store: &Store, data_dir: &Path) -> Result<IngestSummary> {
    let mut summary = IngestSummary::default();

    for signal in SignalKind::ALL {
        let file = data_dir.join(signal.as_str()).join(signal.file_name());
        if !file.exists() {
            continue;
        }

        let count = match signal {
            SignalKind::Traces => ingest_traces(store, &file),
            SignalKind::Metrics => ingest_metrics(store, &file),
            SignalKind::Logs => ingest_logs(store, &file),
        }
        .map_err(|e| LotelError::Ingest(format!("ingesting {signal}: {e}")))?;

        match signal {
            SignalKind::Traces => summary.spans = count,
            SignalKind::Metrics => summary.metric_points = count,
            SignalKind::Logs => summary.logs = count,
        }
    }

    Ok(summary)
}

fn ingest_traces(store: &Store, file: &Path) -> Result<usize> {
    let mut rows = Vec::new();
    let mut skipped = 0usize;

    reader::each_line(file, |line| {
        let Ok(batch) = serde_json::from_str::<TraceExport>(line) else {
            skipped += 1;
            return;
        };
        for resource in &batch.resource_spans {
            let service = service_name(&resource.resource);
            for scope in &resource.scope_spans {
                for span in &scope.spans {
                    rows.push(span.to_row(&service));
                }
            }
        }
    })?;

    log_skipped(file, skipped);
    store.insert_spans(&rows)?;
    Ok(rows.len())
}

fn ingest_metrics(store: &Store, file: &Path) -> Result<usize> {
    let mut rows = Vec::new();
    let mut skipped = 0usize;

    reader::each_line(file, |line| {
        let Ok(batch) = serde_json::from_str::<MetricExport>(line) else {
            skipped += 1;
            return;
        };
        for resource in &batch.resource_metrics {
            let service = service_name(&resource.resource);
            for scope in &resource.scope_metrics {
                for metric in &scope.metrics {
                    rows.extend(metric.data_points(&service));
                }
            }
        }
    })?;

    log_skipped(file, skipped);
    store.insert_metrics(&rows)?;
    Ok(rows.len())
}

fn ingest_logs(store: &Store, file: &Path) -> Result<usize> {
    let mut rows = Vec::new();
    let mut skipped = 0usize;

    reader::each_line(file, |line| {
        let Ok(batch) = serde_json::from_str::<LogExport>(line) else {
            skipped += 1;
            return;
        };
        for resource in &batch.resource_logs {
            let service = service_name(&resource.resource);
            for scope in &resource.scope_logs {
                for record in &scope.log_records {
                    rows.push(record.to_row(&service));
                }
            }
        }
    })?;

    log_skipped(file, skipped);
    store.insert_logs(&rows)?;
    Ok(rows.len())
}

fn log_skipped(file: &Path, skipped: usize) {
    if skipped > 0 {
        debug!(file = %file.display(), skipped, "skipped malformed lines");
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use lotel_core::filter::QueryOptions;
    use lotel_core::model::metric::MetricType;

    use super::*;

    #[test]
    fn traces_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        lotel_testkit::write_signal_files(tmp.path()).unwrap();
        let store = Store::open_in_memory().unwrap();

        let summary = ingest_all(&store, tmp.path()).unwrap();
        assert_eq!(
            summary,
            IngestSummary {
                spans: 2,
                metric_points: 1,
                logs: 1,
            }
        );

        let spans = store
            .query_spans(&QueryOptions::for_service("test-uuid-svc"))
            .unwrap();
        assert_eq!(spans.len(), 2);
        assert!(spans[0].start_time <= spans[1].start_time);
        assert_eq!(spans[0].span_id, "1111");
        assert_eq!(spans[0].parent_span_id, None);
        assert_eq!(spans[1].span_id, "2222");
        assert_eq!(spans[1].parent_span_id.as_deref(), Some("1111"));
        assert_eq!(spans[0].attributes["http.method"], "GET");
        assert_eq!(spans[0].duration_ns, 100_000_000);
    }

    #[test]
    fn metrics_and_logs_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        lotel_testkit::write_signal_files(tmp.path()).unwrap();
        let store = Store::open_in_memory().unwrap();
        ingest_all(&store, tmp.path()).unwrap();

        let metrics = store
            .query_metrics(&QueryOptions::for_service("test-uuid-svc"))
            .unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].metric_name, "http_requests_total");
        assert_eq!(metrics[0].metric_type, MetricType::Sum);
        assert_eq!(metrics[0].value, 100.0);

        let logs = store
            .query_logs(&QueryOptions::for_service("test-uuid-svc"))
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].body, "request processed");
        assert_eq!(logs[0].severity_number, 9);
    }

    #[test]
    fn reingesting_duplicates_rows() {
        let tmp = tempfile::tempdir().unwrap();
        lotel_testkit::write_signal_files(tmp.path()).unwrap();
        let store = Store::open_in_memory().unwrap();

        ingest_all(&store, tmp.path()).unwrap();
        ingest_all(&store, tmp.path()).unwrap();

        let spans = store.query_spans(&QueryOptions::default()).unwrap();
        assert_eq!(spans.len(), 4);
        let logs = store.query_logs(&QueryOptions::default()).unwrap();
        assert_eq!(logs.len(), 2);
    }

    #[test]
    fn malformed_lines_are_skipped_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let traces_dir = tmp.path().join("traces");
        fs::create_dir_all(&traces_dir).unwrap();
        let good = lotel_testkit::TRACES_JSONL.trim_end();
        fs::write(
            traces_dir.join("traces.jsonl"),
            format!("not json at all\n{good}\n{{\"resourceSpans\": truncated"),
        )
        .unwrap();

        let store = Store::open_in_memory().unwrap();
        let summary = ingest_all(&store, tmp.path()).unwrap();
        assert_eq!(summary.spans, 2);
    }

    #[test]
    fn missing_and_empty_files_are_no_ops() {
        let tmp = tempfile::tempdir().unwrap();
        let logs_dir = tmp.path().join("logs");
        fs::create_dir_all(&logs_dir).unwrap();
        fs::write(logs_dir.join("logs.jsonl"), "").unwrap();

        let store = Store::open_in_memory().unwrap();
        let summary = ingest_all(&store, tmp.path()).unwrap();
        assert_eq!(summary, IngestSummary::default());
    }

    #[test]
    fn unattributed_resources_fall_back_to_unknown_service() {
        let tmp = tempfile::tempdir().unwrap();
        let logs_dir = tmp.path().join("logs");
        fs::create_dir_all(&logs_dir).unwrap();
        fs::write(
            logs_dir.join("logs.jsonl"),
            r#"{"resourceLogs":[{"scopeLogs":[{"logRecords":[{"timeUnixNano":"1700000000000000000","body":{"stringValue":"orphan"}}]}]}]}"#,
        )
        .unwrap();

        let store = Store::open_in_memory().unwrap();
        ingest_all(&store, tmp.path()).unwrap();
        let logs = store.query_logs(&QueryOptions::default()).unwrap();
        assert_eq!(logs[0].service_name, "unknown");
    }
}
