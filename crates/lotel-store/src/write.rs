use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use duckdb::params;
use lotel_core::error::{LotelError, Result};
use lotel_core::model::log::LogRow;
use lotel_core::model::metric::MetricRow;
use lotel_core::model::span::SpanRow;

use crate::Store;

impl Store {
    /// Appends span rows inside a single transaction; the caller hands over
    /// everything extracted from one signal file so a mid-file failure rolls
    /// back in full.
    pub fn insert_spans(&self, spans: &[SpanRow]) -> Result<()> {
        if spans.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .map_err(|e| LotelError::Store(format!("begin tx failed: {e}")))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO traces
                     (trace_id, span_id, parent_span_id, name, kind, start_time, end_time,
                      duration_ns, status_code, service_name, attributes, date)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .map_err(|e| LotelError::Store(format!("prepare insert spans failed: {e}")))?;

            for span in spans {
                stmt.execute(params![
                    span.trace_id,
                    span.span_id,
                    span.parent_span_id,
                    span.name,
                    span.kind,
                    span.start_time.to_rfc3339(),
                    span.end_time.to_rfc3339(),
                    span.duration_ns,
                    span.status_code,
                    span.service_name,
                    attrs_json(&span.attributes)?,
                    utc_day(span.start_time),
                ])
                .map_err(|e| LotelError::Store(format!("insert span failed: {e}")))?;
            }
        }

        tx.commit()
            .map_err(|e| LotelError::Store(format!("commit spans failed: {e}")))
    }

    pub fn insert_metrics(&self, metrics: &[MetricRow]) -> Result<()> {
        if metrics.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .map_err(|e| LotelError::Store(format!("begin tx failed: {e}")))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO metrics
                     (metric_name, metric_type, value, timestamp, service_name,
                      aggregation_temporality, is_monotonic, unit, attributes, date)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .map_err(|e| LotelError::Store(format!("prepare insert metrics failed: {e}")))?;

            for metric in metrics {
                stmt.execute(params![
                    metric.metric_name,
                    metric.metric_type.as_str(),
                    metric.value,
                    metric.timestamp.to_rfc3339(),
                    metric.service_name,
                    metric.aggregation_temporality,
                    metric.is_monotonic,
                    metric.unit,
                    attrs_json(&metric.attributes)?,
                    utc_day(metric.timestamp),
                ])
                .map_err(|e| LotelError::Store(format!("insert metric failed: {e}")))?;
            }
        }

        tx.commit()
            .map_err(|e| LotelError::Store(format!("commit metrics failed: {e}")))
    }

    pub fn insert_logs(&self, logs: &[LogRow]) -> Result<()> {
        if logs.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .map_err(|e| LotelError::Store(format!("begin tx failed: {e}")))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO logs
                     (timestamp, severity, severity_number, body, service_name,
                      trace_id, span_id, attributes, date)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .map_err(|e| LotelError::Store(format!("prepare insert logs failed: {e}")))?;

            for log in logs {
                stmt.execute(params![
                    log.timestamp.to_rfc3339(),
                    log.severity,
                    log.severity_number,
                    log.body,
                    log.service_name,
                    log.trace_id,
                    log.span_id,
                    attrs_json(&log.attributes)?,
                    utc_day(log.timestamp),
                ])
                .map_err(|e| LotelError::Store(format!("insert log failed: {e}")))?;
            }
        }

        tx.commit()
            .map_err(|e| LotelError::Store(format!("commit logs failed: {e}")))
    }
}

fn attrs_json(attrs: &BTreeMap<String, String>) -> Result<String> {
    serde_json::to_string(attrs)
        .map_err(|e| LotelError::Store(format!("serializing attributes: {e}")))
}

/// The partition day: the row's primary timestamp truncated to its UTC
/// calendar date.
fn utc_day(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use duckdb::params;
    use lotel_core::model::metric::MetricType;

    use super::*;

    fn span_at(ts: DateTime<Utc>) -> SpanRow {
        SpanRow {
            trace_id: "aaaa".into(),
            span_id: "1111".into(),
            parent_span_id: None,
            name: "GET /api".into(),
            kind: 2,
            start_time: ts,
            end_time: ts + chrono::Duration::milliseconds(100),
            duration_ns: 100_000_000,
            status_code: 1,
            service_name: "api".into(),
            attributes: BTreeMap::new(),
        }
    }

    #[test]
    fn date_column_matches_utc_day_of_timestamp() {
        let store = Store::open_in_memory().unwrap();
        // Late enough on the 14th UTC that any local-time truncation would
        // land on a different day.
        let ts = Utc.with_ymd_and_hms(2026, 2, 14, 23, 30, 0).unwrap();
        store.insert_spans(&[span_at(ts)]).unwrap();
        store
            .insert_metrics(&[MetricRow {
                metric_name: "cpu_usage".into(),
                metric_type: MetricType::Gauge,
                value: 1.0,
                timestamp: ts,
                service_name: "api".into(),
                aggregation_temporality: None,
                is_monotonic: None,
                unit: String::new(),
                attributes: BTreeMap::new(),
            }])
            .unwrap();
        store
            .insert_logs(&[LogRow {
                timestamp: ts,
                severity: "INFO".into(),
                severity_number: 9,
                body: "hello".into(),
                service_name: "api".into(),
                trace_id: None,
                span_id: None,
                attributes: BTreeMap::new(),
            }])
            .unwrap();

        let conn = store.conn();
        for table in ["traces", "metrics", "logs"] {
            let day: String = conn
                .query_row(
                    &format!("SELECT CAST(date AS VARCHAR) FROM {table}"),
                    params![],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(day, "2026-02-14", "{table} date mismatch");
        }
    }

    #[test]
    fn insert_is_transactional_per_call() {
        let store = Store::open_in_memory().unwrap();
        let ts = Utc.with_ymd_and_hms(2026, 2, 14, 12, 0, 0).unwrap();
        let batch = vec![span_at(ts), span_at(ts + chrono::Duration::seconds(1))];
        store.insert_spans(&batch).unwrap();

        let conn = store.conn();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM traces", params![], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }
}
