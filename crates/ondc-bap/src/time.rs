//! Time utilities.
//!
//! ONDC payloads carry RFC 3339 UTC timestamps with millisecond
//! precision and a `Z` suffix; authorization headers use Unix seconds.

use chrono::{DateTime, SecondsFormat, Utc};

/// Current time as Unix seconds.
pub fn now_unix() -> i64 {
    Utc::now().timestamp()
}

/// Format as `2025-08-21T00:55:51.123Z`.
pub fn to_ondc_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}
