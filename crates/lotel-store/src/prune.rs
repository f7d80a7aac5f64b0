use chrono::{DateTime, SecondsFormat, Utc};
use duckdb::params_from_iter;
use duckdb::types::Value;
use lotel_core::error::{LotelError, Result};
use lotel_core::signal::SignalKind;
use serde::{Deserialize, Serialize};

use crate::Store;

/// What was (or would be) deleted from one signal table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PruneReport {
    pub signal: SignalKind,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub service_name: String,
    pub deleted: i64,
    pub cutoff: String,
}

impl Store {
    /// Counts, and unless `dry_run` deletes, the rows of each signal whose
    /// primary timestamp is strictly before `cutoff`, optionally scoped to
    /// one service. Returns one report per signal.
    pub fn prune(
        &self,
        cutoff: DateTime<Utc>,
        service: &str,
        dry_run: bool,
    ) -> Result<Vec<PruneReport>> {
        let conn = self.conn();
        let mut reports = Vec::with_capacity(SignalKind::ALL.len());

        for signal in SignalKind::ALL {
            let time_col = time_column(signal);
            let mut conditions = format!("{time_col} < ?");
            let mut args = vec![Value::Text(cutoff.to_rfc3339())];
            if !service.is_empty() {
                conditions.push_str(" AND service_name = ?");
                args.push(Value::Text(service.to_string()));
            }

            let count_sql = format!("SELECT COUNT(*) FROM {signal} WHERE {conditions}");
            let mut deleted: i64 = conn
                .query_row(&count_sql, params_from_iter(args.iter()), |row| row.get(0))
                .map_err(|e| LotelError::Store(format!("counting {signal} for prune: {e}")))?;

            if !dry_run && deleted > 0 {
                let delete_sql = format!("DELETE FROM {signal} WHERE {conditions}");
                deleted = conn
                    .execute(&delete_sql, params_from_iter(args.iter()))
                    .map_err(|e| LotelError::Store(format!("pruning {signal}: {e}")))?
                    as i64;
            }

            reports.push(PruneReport {
                signal,
                service_name: service.to_string(),
                deleted,
                cutoff: cutoff.to_rfc3339_opts(SecondsFormat::Secs, true),
            });
        }

        Ok(reports)
    }
}

fn time_column(signal: SignalKind) -> &'static str {
    match signal {
        SignalKind::Traces => "start_time",
        SignalKind::Metrics | SignalKind::Logs => "timestamp",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Duration;
    use lotel_core::filter::QueryOptions;
    use lotel_core::model::span::SpanRow;

    use super::*;

    fn span(id: &str, start: DateTime<Utc>, service: &str) -> SpanRow {
        SpanRow {
            trace_id: format!("trace-{id}"),
            span_id: id.into(),
            parent_span_id: None,
            name: "GET /".into(),
            kind: 2,
            start_time: start,
            end_time: start + Duration::milliseconds(1),
            duration_ns: 1_000_000,
            status_code: 1,
            service_name: service.into(),
            attributes: BTreeMap::new(),
        }
    }

    #[test]
    fn dry_run_reports_without_deleting() {
        let store = Store::open_in_memory().unwrap();
        let now = Utc::now();
        let old = now - Duration::hours(48);
        store
            .insert_spans(&[span("old", old, "test-svc"), span("new", now, "test-svc")])
            .unwrap();

        let cutoff = now - Duration::hours(24);
        let reports = store.prune(cutoff, "", true).unwrap();
        let traces = reports
            .iter()
            .find(|r| r.signal == SignalKind::Traces)
            .unwrap();
        assert_eq!(traces.deleted, 1);

        assert_eq!(store.query_spans(&QueryOptions::default()).unwrap().len(), 2);
    }

    #[test]
    fn prune_removes_only_rows_before_cutoff() {
        let store = Store::open_in_memory().unwrap();
        let now = Utc::now();
        let old = now - Duration::hours(48);
        store
            .insert_spans(&[span("old", old, "test-svc"), span("new", now, "test-svc")])
            .unwrap();

        let cutoff = now - Duration::hours(24);
        let reports = store.prune(cutoff, "", false).unwrap();
        let traces = reports
            .iter()
            .find(|r| r.signal == SignalKind::Traces)
            .unwrap();
        assert_eq!(traces.deleted, 1);

        let remaining = store.query_spans(&QueryOptions::default()).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].span_id, "new");
        assert!(remaining.iter().all(|s| s.start_time >= cutoff));
    }

    #[test]
    fn prune_can_scope_to_one_service() {
        let store = Store::open_in_memory().unwrap();
        let old = Utc::now() - Duration::hours(48);
        store
            .insert_spans(&[span("a", old, "svc-a"), span("b", old, "svc-b")])
            .unwrap();

        let reports = store.prune(Utc::now(), "svc-a", false).unwrap();
        let traces = reports
            .iter()
            .find(|r| r.signal == SignalKind::Traces)
            .unwrap();
        assert_eq!(traces.deleted, 1);
        assert_eq!(traces.service_name, "svc-a");

        let remaining = store.query_spans(&QueryOptions::default()).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].service_name, "svc-b");
    }

    #[test]
    fn report_covers_every_signal_with_rfc3339_cutoff() {
        let store = Store::open_in_memory().unwrap();
        let reports = store.prune(Utc::now(), "", true).unwrap();
        assert_eq!(reports.len(), 3);
        for report in reports {
            assert_eq!(report.deleted, 0);
            assert!(DateTime::parse_from_rfc3339(&report.cutoff).is_ok());
        }
    }
}
