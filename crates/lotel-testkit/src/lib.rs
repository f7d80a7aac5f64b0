//! Canned OTLP-JSON signal batches, shaped like the collector's file
//! exporter output, for tests that exercise ingestion end to end.

use std::fs;
use std::io;
use std::path::Path;

/// One batch with two spans of trace `aaaa`; span `2222` is a child of
/// `1111` and starts 10 ms later.
pub const TRACES_JSONL: &str = concat!(
    r#"{"resourceSpans":[{"resource":{"attributes":[{"key":"service.name","value":{"stringValue":"test-uuid-svc"}}]},"scopeSpans":[{"spans":[{"traceId":"aaaa","spanId":"1111","name":"GET /api","kind":2,"startTimeUnixNano":"1700000000000000000","endTimeUnixNano":"1700000000100000000","status":{"code":1},"attributes":[{"key":"http.method","value":{"stringValue":"GET"}}]},{"traceId":"aaaa","spanId":"2222","parentSpanId":"1111","name":"db_query","kind":3,"startTimeUnixNano":"1700000000010000000","endTimeUnixNano":"1700000000050000000","status":{"code":1},"attributes":[{"key":"db.system","value":{"stringValue":"postgresql"}}]}]}]}]}"#,
    "\n"
);

/// One batch with a single monotonic cumulative sum point of value 100.
pub const METRICS_JSONL: &str = concat!(
    r#"{"resourceMetrics":[{"resource":{"attributes":[{"key":"service.name","value":{"stringValue":"test-uuid-svc"}}]},"scopeMetrics":[{"metrics":[{"name":"http_requests_total","unit":"1","sum":{"dataPoints":[{"timeUnixNano":"1700000000000000000","asInt":"100","attributes":[{"key":"method","value":{"stringValue":"GET"}}]}],"aggregationTemporality":2,"isMonotonic":true}}]}]}]}"#,
    "\n"
);

/// One batch with a single INFO log record.
pub const LOGS_JSONL: &str = concat!(
    r#"{"resourceLogs":[{"resource":{"attributes":[{"key":"service.name","value":{"stringValue":"test-uuid-svc"}}]},"scopeLogs":[{"logRecords":[{"timeUnixNano":"1700000000000000000","severityText":"INFO","severityNumber":9,"body":{"stringValue":"request processed"},"attributes":[{"key":"request.id","value":{"stringValue":"req-123"}}]}]}]}]}"#,
    "\n"
);

/// Lays out `<data>/<signal>/<signal>.jsonl` for all three signals, exactly
/// as a collector run would leave them.
pub fn write_signal_files(data_dir: &Path) -> io::Result<()> {
    for (signal, body) in [
        ("traces", TRACES_JSONL),
        ("metrics", METRICS_JSONL),
        ("logs", LOGS_JSONL),
    ] {
        let dir = data_dir.join(signal);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(format!("{signal}.jsonl")), body)?;
    }
    Ok(())
}
