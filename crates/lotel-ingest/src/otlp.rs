//! Serde model for the OTLP-JSON export batches the collector's file
//! exporter writes, one batch per line, plus the flattening into normalized
//! rows. Only the fields the tables need are decoded; everything else in a
//! batch is ignored.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use lotel_core::model::log::LogRow;
use lotel_core::model::metric::{MetricRow, MetricType};
use lotel_core::model::span::SpanRow;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceExport {
    #[serde(default)]
    pub resource_spans: Vec<ResourceSpans>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpans {
    #[serde(default)]
    pub resource: ResourceBlock,
    #[serde(default)]
    pub scope_spans: Vec<ScopeSpans>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceBlock {
    #[serde(default)]
    pub attributes: Vec<OtlpAttr>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeSpans {
    #[serde(default)]
    pub spans: Vec<OtlpSpan>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtlpSpan {
    #[serde(default)]
    pub trace_id: String,
    #[serde(default)]
    pub span_id: String,
    #[serde(default)]
    pub parent_span_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: i32,
    #[serde(default)]
    pub start_time_unix_nano: OtlpNano,
    #[serde(default)]
    pub end_time_unix_nano: OtlpNano,
    #[serde(default)]
    pub status: SpanStatus,
    #[serde(default)]
    pub attributes: Vec<OtlpAttr>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanStatus {
    #[serde(default)]
    pub code: i32,
}

impl OtlpSpan {
    pub fn to_row(&self, service: &str) -> SpanRow {
        // Duration is only meaningful when the exporter stamped both ends.
        let duration_ns = if self.start_time_unix_nano.is_set() && self.end_time_unix_nano.is_set()
        {
            self.end_time_unix_nano.0 - self.start_time_unix_nano.0
        } else {
            0
        };

        SpanRow {
            trace_id: self.trace_id.clone(),
            span_id: self.span_id.clone(),
            parent_span_id: nonempty(&self.parent_span_id),
            name: self.name.clone(),
            kind: self.kind,
            start_time: self.start_time_unix_nano.to_datetime(),
            end_time: self.end_time_unix_nano.to_datetime(),
            duration_ns,
            status_code: self.status.code,
            service_name: service.to_string(),
            attributes: flatten_attrs(&self.attributes),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricExport {
    #[serde(default)]
    pub resource_metrics: Vec<ResourceMetrics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetrics {
    #[serde(default)]
    pub resource: ResourceBlock,
    #[serde(default)]
    pub scope_metrics: Vec<ScopeMetrics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeMetrics {
    #[serde(default)]
    pub metrics: Vec<OtlpMetric>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtlpMetric {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub unit: String,
    pub sum: Option<OtlpSum>,
    pub gauge: Option<OtlpGauge>,
    pub histogram: Option<OtlpHistogram>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtlpSum {
    #[serde(default)]
    pub data_points: Vec<NumberPoint>,
    #[serde(default)]
    pub aggregation_temporality: i32,
    #[serde(default)]
    pub is_monotonic: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtlpGauge {
    #[serde(default)]
    pub data_points: Vec<NumberPoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtlpHistogram {
    #[serde(default)]
    pub data_points: Vec<HistogramPoint>,
    #[serde(default)]
    pub aggregation_temporality: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberPoint {
    #[serde(default)]
    pub attributes: Vec<OtlpAttr>,
    #[serde(default)]
    pub time_unix_nano: OtlpNano,
    pub as_int: Option<String>,
    pub as_double: Option<f64>,
}

impl NumberPoint {
    /// `asDouble` wins, else the decimal-string `asInt`, else zero.
    pub fn value(&self) -> f64 {
        if let Some(v) = self.as_double {
            return v;
        }
        self.as_int
            .as_deref()
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramPoint {
    #[serde(default)]
    pub attributes: Vec<OtlpAttr>,
    #[serde(default)]
    pub time_unix_nano: OtlpNano,
    pub sum: Option<f64>,
}

impl OtlpMetric {
    /// Extracts zero or more normalized data points from whichever metric
    /// shapes are present. Gauges carry neither temporality nor
    /// monotonicity; histograms contribute their point-level `sum`.
    pub fn data_points(&self, service: &str) -> Vec<MetricRow> {
        let mut rows = Vec::new();

        if let Some(sum) = &self.sum {
            for point in &sum.data_points {
                rows.push(MetricRow {
                    metric_name: self.name.clone(),
                    metric_type: MetricType::Sum,
                    value: point.value(),
                    timestamp: point.time_unix_nano.to_datetime(),
                    service_name: service.to_string(),
                    aggregation_temporality: Some(sum.aggregation_temporality),
                    is_monotonic: Some(sum.is_monotonic),
                    unit: self.unit.clone(),
                    attributes: flatten_attrs(&point.attributes),
                });
            }
        }

        if let Some(gauge) = &self.gauge {
            for point in &gauge.data_points {
                rows.push(MetricRow {
                    metric_name: self.name.clone(),
                    metric_type: MetricType::Gauge,
                    value: point.value(),
                    timestamp: point.time_unix_nano.to_datetime(),
                    service_name: service.to_string(),
                    aggregation_temporality: None,
                    is_monotonic: None,
                    unit: self.unit.clone(),
                    attributes: flatten_attrs(&point.attributes),
                });
            }
        }

        if let Some(histogram) = &self.histogram {
            for point in &histogram.data_points {
                rows.push(MetricRow {
                    metric_name: self.name.clone(),
                    metric_type: MetricType::Histogram,
                    value: point.sum.unwrap_or(0.0),
                    timestamp: point.time_unix_nano.to_datetime(),
                    service_name: service.to_string(),
                    aggregation_temporality: Some(histogram.aggregation_temporality),
                    is_monotonic: None,
                    unit: self.unit.clone(),
                    attributes: flatten_attrs(&point.attributes),
                });
            }
        }

        rows
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogExport {
    #[serde(default)]
    pub resource_logs: Vec<ResourceLogs>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLogs {
    #[serde(default)]
    pub resource: ResourceBlock,
    #[serde(default)]
    pub scope_logs: Vec<ScopeLogs>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeLogs {
    #[serde(default)]
    pub log_records: Vec<OtlpLogRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtlpLogRecord {
    #[serde(default)]
    pub time_unix_nano: OtlpNano,
    #[serde(default)]
    pub severity_text: String,
    #[serde(default)]
    pub severity_number: i32,
    #[serde(default)]
    pub body: OtlpValue,
    #[serde(default)]
    pub trace_id: String,
    #[serde(default)]
    pub span_id: String,
    #[serde(default)]
    pub attributes: Vec<OtlpAttr>,
}

impl OtlpLogRecord {
    pub fn to_row(&self, service: &str) -> LogRow {
        LogRow {
            timestamp: self.time_unix_nano.to_datetime(),
            severity: self.severity_text.clone(),
            severity_number: self.severity_number,
            body: self.body.render(),
            service_name: service.to_string(),
            trace_id: nonempty(&self.trace_id),
            span_id: nonempty(&self.span_id),
            attributes: flatten_attrs(&self.attributes),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OtlpAttr {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: OtlpValue,
}

/// OTLP tagged value union. Protojson serializes 64-bit integers as decimal
/// strings, so `intValue` is kept verbatim.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtlpValue {
    pub string_value: Option<String>,
    pub int_value: Option<String>,
    pub bool_value: Option<bool>,
    pub double_value: Option<f64>,
}

impl OtlpValue {
    /// String coercion used for attribute maps and log bodies. A value with
    /// no populated variant renders empty.
    pub fn render(&self) -> String {
        if let Some(s) = &self.string_value {
            return s.clone();
        }
        if let Some(i) = &self.int_value {
            return i.clone();
        }
        if let Some(b) = self.bool_value {
            return b.to_string();
        }
        if let Some(d) = self.double_value {
            return d.to_string();
        }
        String::new()
    }
}

/// UNIX-nanosecond timestamp, emitted by exporters as either a JSON number
/// or a decimal string. Zero means "not stamped".
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OtlpNano(pub i64);

impl OtlpNano {
    pub fn is_set(self) -> bool {
        self.0 != 0
    }

    /// Zero maps to the zero instant (Unix epoch); everything is UTC.
    pub fn to_datetime(self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.0)
    }
}

impl<'de> Deserialize<'de> for OtlpNano {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct NanoVisitor;

        impl Visitor<'_> for NanoVisitor {
            type Value = OtlpNano;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a nanosecond timestamp as integer or decimal string")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<OtlpNano, E> {
                Ok(OtlpNano(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<OtlpNano, E> {
                Ok(OtlpNano(v as i64))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<OtlpNano, E> {
                Ok(OtlpNano(v.parse().unwrap_or_default()))
            }
        }

        deserializer.deserialize_any(NanoVisitor)
    }
}

pub fn service_name(resource: &ResourceBlock) -> String {
    for attr in &resource.attributes {
        if attr.key == "service.name" {
            return attr.value.render();
        }
    }
    "unknown".to_string()
}

pub fn flatten_attrs(attrs: &[OtlpAttr]) -> BTreeMap<String, String> {
    attrs
        .iter()
        .map(|attr| (attr.key.clone(), attr.value.render()))
        .collect()
}

fn nonempty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
