use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One normalized log record. Trace correlation ids are stored as NULL when
/// the emitting instrumentation left them empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogRow {
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub severity: String,
    pub severity_number: i32,
    pub body: String,
    pub service_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub attributes: BTreeMap<String, String>,
}
