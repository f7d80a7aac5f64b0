use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDateTime;
use duckdb::params_from_iter;
use duckdb::types::Value;
use lotel_core::error::{LotelError, Result};
use lotel_core::filter::QueryOptions;
use lotel_core::model::log::LogRow;
use lotel_core::model::metric::{MetricAggregation, MetricRow, MetricType};
use lotel_core::model::span::SpanRow;

use crate::Store;

impl Store {
    /// Spans matching the filter, ordered ascending by `start_time`. Order
    /// within a tied timestamp is driver order; the limit applies after
    /// ordering.
    pub fn query_spans(&self, opts: &QueryOptions) -> Result<Vec<SpanRow>> {
        let (conditions, args) = filter_conditions(opts, "start_time");
        let sql = format!(
            "SELECT trace_id, span_id, parent_span_id, name, kind, start_time, end_time,
                    duration_ns, status_code, service_name, CAST(attributes AS VARCHAR)
             FROM traces{}
             ORDER BY start_time ASC{}",
            where_sql(&conditions),
            limit_sql(opts),
        );

        let conn = self.conn();
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| LotelError::Store(format!("prepare traces query failed: {e}")))?;

        let rows = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                Ok(SpanRow {
                    trace_id: row.get(0)?,
                    span_id: row.get(1)?,
                    parent_span_id: row.get(2)?,
                    name: row.get(3)?,
                    kind: row.get(4)?,
                    start_time: row.get::<_, NaiveDateTime>(5)?.and_utc(),
                    end_time: row.get::<_, NaiveDateTime>(6)?.and_utc(),
                    duration_ns: row.get(7)?,
                    status_code: row.get(8)?,
                    service_name: row.get(9)?,
                    attributes: parse_attrs(row.get::<_, Option<String>>(10)?),
                })
            })
            .map_err(|e| LotelError::Store(format!("query traces failed: {e}")))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| LotelError::Store(format!("map trace row failed: {e}")))?);
        }
        Ok(out)
    }

    /// Metric data points matching the filter, ordered ascending by
    /// `timestamp`.
    pub fn query_metrics(&self, opts: &QueryOptions) -> Result<Vec<MetricRow>> {
        let (conditions, args) = filter_conditions(opts, "timestamp");
        let sql = format!(
            "SELECT metric_name, metric_type, value, timestamp, service_name,
                    aggregation_temporality, is_monotonic, unit, CAST(attributes AS VARCHAR)
             FROM metrics{}
             ORDER BY timestamp ASC{}",
            where_sql(&conditions),
            limit_sql(opts),
        );

        let conn = self.conn();
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| LotelError::Store(format!("prepare metrics query failed: {e}")))?;

        let rows = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, NaiveDateTime>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<i32>>(5)?,
                    row.get::<_, Option<bool>>(6)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, Option<String>>(8)?,
                ))
            })
            .map_err(|e| LotelError::Store(format!("query metrics failed: {e}")))?;

        let mut out = Vec::new();
        for row in rows {
            let (name, ty, value, ts, service, temporality, monotonic, unit, attrs) =
                row.map_err(|e| LotelError::Store(format!("map metric row failed: {e}")))?;
            out.push(MetricRow {
                metric_name: name,
                metric_type: MetricType::from_str(&ty)?,
                value,
                timestamp: ts.and_utc(),
                service_name: service,
                aggregation_temporality: temporality,
                is_monotonic: monotonic,
                unit: unit.unwrap_or_default(),
                attributes: parse_attrs(attrs),
            });
        }
        Ok(out)
    }

    /// Log records matching the filter, ordered ascending by `timestamp`.
    pub fn query_logs(&self, opts: &QueryOptions) -> Result<Vec<LogRow>> {
        let (conditions, args) = filter_conditions(opts, "timestamp");
        let sql = format!(
            "SELECT timestamp, severity, severity_number, body, service_name,
                    trace_id, span_id, CAST(attributes AS VARCHAR)
             FROM logs{}
             ORDER BY timestamp ASC{}",
            where_sql(&conditions),
            limit_sql(opts),
        );

        let conn = self.conn();
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| LotelError::Store(format!("prepare logs query failed: {e}")))?;

        let rows = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                Ok(LogRow {
                    timestamp: row.get::<_, NaiveDateTime>(0)?.and_utc(),
                    severity: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    severity_number: row.get(2)?,
                    body: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    service_name: row.get(4)?,
                    trace_id: row.get(5)?,
                    span_id: row.get(6)?,
                    attributes: parse_attrs(row.get::<_, Option<String>>(7)?),
                })
            })
            .map_err(|e| LotelError::Store(format!("query logs failed: {e}")))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| LotelError::Store(format!("map log row failed: {e}")))?);
        }
        Ok(out)
    }

    /// Unweighted count/avg/min/max over the `value` column of the named
    /// metric. No rows means `count = 0` with the statistics absent. The
    /// mean is temporality-blind: callers mixing cumulative and delta points
    /// must scope the filter themselves.
    pub fn aggregate_metrics(
        &self,
        opts: &QueryOptions,
        metric_name: &str,
    ) -> Result<MetricAggregation> {
        let mut conditions = vec!["metric_name = ?".to_string()];
        let mut args = vec![Value::Text(metric_name.to_string())];
        let (extra, extra_args) = filter_conditions(opts, "timestamp");
        conditions.extend(extra);
        args.extend(extra_args);

        let sql = format!(
            "SELECT COUNT(*), AVG(value), MIN(value), MAX(value) FROM metrics{}",
            where_sql(&conditions),
        );

        let conn = self.conn();
        let (count, avg, min, max) = conn
            .query_row(&sql, params_from_iter(args.iter()), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<f64>>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                ))
            })
            .map_err(|e| LotelError::Store(format!("aggregate metrics failed: {e}")))?;

        Ok(MetricAggregation {
            metric_name: metric_name.to_string(),
            service_name: opts.service.clone().unwrap_or_default(),
            count,
            avg,
            min,
            max,
        })
    }
}

fn filter_conditions(opts: &QueryOptions, time_col: &str) -> (Vec<String>, Vec<Value>) {
    let mut conditions = Vec::new();
    let mut args = Vec::new();

    if let Some(service) = &opts.service
        && !service.is_empty()
    {
        conditions.push("service_name = ?".to_string());
        args.push(Value::Text(service.clone()));
    }
    if let Some(since) = opts.since {
        conditions.push(format!("{time_col} >= ?"));
        args.push(Value::Text(since.to_rfc3339()));
    }
    if let Some(until) = opts.until {
        conditions.push(format!("{time_col} <= ?"));
        args.push(Value::Text(until.to_rfc3339()));
    }

    (conditions, args)
}

fn where_sql(conditions: &[String]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    }
}

fn limit_sql(opts: &QueryOptions) -> String {
    match opts.limit {
        Some(limit) if limit > 0 => format!(" LIMIT {limit}"),
        _ => String::new(),
    }
}

fn parse_attrs(raw: Option<String>) -> BTreeMap<String, String> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use lotel_core::model::metric::MetricType;

    use super::*;

    fn span(id: &str, start: DateTime<Utc>, service: &str) -> SpanRow {
        SpanRow {
            trace_id: "aaaa".into(),
            span_id: id.into(),
            parent_span_id: None,
            name: "GET /api".into(),
            kind: 2,
            start_time: start,
            end_time: start + Duration::milliseconds(10),
            duration_ns: 10_000_000,
            status_code: 1,
            service_name: service.into(),
            attributes: BTreeMap::from([("http.method".to_string(), "GET".to_string())]),
        }
    }

    fn gauge(name: &str, service: &str, value: f64, ts: DateTime<Utc>) -> MetricRow {
        MetricRow {
            metric_name: name.into(),
            metric_type: MetricType::Gauge,
            value,
            timestamp: ts,
            service_name: service.into(),
            aggregation_temporality: None,
            is_monotonic: None,
            unit: String::new(),
            attributes: BTreeMap::new(),
        }
    }

    #[test]
    fn spans_come_back_ordered_and_filtered() {
        let store = Store::open_in_memory().unwrap();
        let base = Utc.with_ymd_and_hms(2026, 2, 14, 12, 0, 0).unwrap();
        // Inserted out of order on purpose.
        store
            .insert_spans(&[
                span("2222", base + Duration::seconds(5), "api"),
                span("1111", base, "api"),
                span("3333", base + Duration::seconds(2), "worker"),
            ])
            .unwrap();

        let rows = store.query_spans(&QueryOptions::for_service("api")).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].span_id, "1111");
        assert_eq!(rows[1].span_id, "2222");
        assert_eq!(rows[0].attributes["http.method"], "GET");

        assert!(
            store
                .query_spans(&QueryOptions::for_service("nonexistent"))
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn limit_applies_after_ordering() {
        let store = Store::open_in_memory().unwrap();
        let base = Utc.with_ymd_and_hms(2026, 2, 14, 12, 0, 0).unwrap();
        store
            .insert_spans(&[
                span("late", base + Duration::seconds(30), "api"),
                span("early", base, "api"),
            ])
            .unwrap();

        let rows = store
            .query_spans(&QueryOptions {
                limit: Some(1),
                ..QueryOptions::default()
            })
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].span_id, "early");
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let store = Store::open_in_memory().unwrap();
        let base = Utc.with_ymd_and_hms(2026, 2, 14, 12, 0, 0).unwrap();
        store
            .insert_logs(&[
                LogRow {
                    timestamp: base,
                    severity: "INFO".into(),
                    severity_number: 9,
                    body: "at-bound".into(),
                    service_name: "api".into(),
                    trace_id: None,
                    span_id: None,
                    attributes: BTreeMap::new(),
                },
                LogRow {
                    timestamp: base + Duration::hours(2),
                    severity: "INFO".into(),
                    severity_number: 9,
                    body: "outside".into(),
                    service_name: "api".into(),
                    trace_id: None,
                    span_id: None,
                    attributes: BTreeMap::new(),
                },
            ])
            .unwrap();

        let rows = store
            .query_logs(&QueryOptions {
                since: Some(base),
                until: Some(base + Duration::hours(1)),
                ..QueryOptions::default()
            })
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].body, "at-bound");
    }

    #[test]
    fn metric_rows_round_trip_temporality() {
        let store = Store::open_in_memory().unwrap();
        let ts = Utc.with_ymd_and_hms(2026, 2, 14, 12, 0, 0).unwrap();
        store
            .insert_metrics(&[MetricRow {
                metric_name: "http_requests_total".into(),
                metric_type: MetricType::Sum,
                value: 42.0,
                timestamp: ts,
                service_name: "api".into(),
                aggregation_temporality: Some(2),
                is_monotonic: Some(true),
                unit: "1".into(),
                attributes: BTreeMap::new(),
            }])
            .unwrap();

        let rows = store.query_metrics(&QueryOptions::default()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].metric_type, MetricType::Sum);
        assert_eq!(rows[0].aggregation_temporality, Some(2));
        assert_eq!(rows[0].is_monotonic, Some(true));
        assert_eq!(rows[0].unit, "1");
    }

    #[test]
    fn aggregate_over_window_and_service() {
        let store = Store::open_in_memory().unwrap();
        let base = Utc.with_ymd_and_hms(2026, 2, 14, 12, 0, 0).unwrap();
        store
            .insert_metrics(&[
                gauge("cpu_usage", "test-svc", 10.0, base),
                gauge("cpu_usage", "test-svc", 30.0, base + Duration::hours(1)),
                gauge("cpu_usage", "test-svc", 50.0, base + Duration::hours(2)),
                gauge("cpu_usage", "other-svc", 100.0, base + Duration::hours(1)),
            ])
            .unwrap();

        let agg = store
            .aggregate_metrics(&QueryOptions::for_service("test-svc"), "cpu_usage")
            .unwrap();
        assert_eq!(agg.count, 3);
        assert_eq!(agg.avg, Some(30.0));
        assert_eq!(agg.min, Some(10.0));
        assert_eq!(agg.max, Some(50.0));

        let windowed = store
            .aggregate_metrics(
                &QueryOptions {
                    service: Some("test-svc".into()),
                    since: Some(base + Duration::minutes(30)),
                    until: Some(base + Duration::minutes(90)),
                    limit: None,
                },
                "cpu_usage",
            )
            .unwrap();
        assert_eq!(windowed.count, 1);
        assert_eq!(windowed.avg, Some(30.0));
    }

    #[test]
    fn empty_aggregate_omits_statistics() {
        let store = Store::open_in_memory().unwrap();
        let agg = store
            .aggregate_metrics(&QueryOptions::default(), "no_such_metric")
            .unwrap();
        assert_eq!(agg.count, 0);
        assert_eq!(agg.avg, None);
        assert_eq!(agg.min, None);
        assert_eq!(agg.max, None);
    }
}
