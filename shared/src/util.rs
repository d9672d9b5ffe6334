use chrono::{Local, TimeZone};

/// Current Unix timestamp in milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Calendar day (`YYYY-MM-DD`, local time zone) of a millisecond timestamp.
///
/// Day boundaries follow the operator's wall clock: a shift that crosses
/// midnight splits into two days, which is what the reporting side expects.
pub fn day_of(ts_millis: i64) -> String {
    Local
        .timestamp_millis_opt(ts_millis)
        .single()
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Today's calendar day (`YYYY-MM-DD`, local time zone).
pub fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}
