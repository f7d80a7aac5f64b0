use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{LotelError, Result};

/// Parses an absolute RFC3339 instant or a relative duration such as `1h`,
/// `24h`, or `7d`; relative values are interpreted as `now - duration`.
pub fn parse_time_or_relative(input: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(ts.with_timezone(&Utc));
    }

    if let Ok(duration) = humantime::parse_duration(input) {
        return Ok(Utc::now()
            - chrono::Duration::from_std(duration)
                .map_err(|e| LotelError::Parse(format!("duration out of range: {e}")))?);
    }

    Err(LotelError::Parse(format!(
        "cannot parse {input:?} as RFC3339 or relative duration"
    )))
}

pub fn parse_duration_str(input: &str) -> Result<Duration> {
    humantime::parse_duration(input)
        .map_err(|e| LotelError::Parse(format!("invalid duration {input:?}: {e}")))
}
