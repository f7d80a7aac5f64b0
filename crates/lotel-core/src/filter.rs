use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Common filter accepted by every read operation. Empty strings and absent
/// bounds mean "no constraint"; bounds are inclusive on the signal's primary
/// timestamp column.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryOptions {
    pub service: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl QueryOptions {
    pub fn for_service(service: &str) -> Self {
        Self {
            service: some_nonempty(service),
            ..Self::default()
        }
    }
}

/// Maps the CLI convention of "empty string means unset" onto an option.
pub fn some_nonempty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
