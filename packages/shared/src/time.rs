//! Time helpers. The hub runs on Korea/Japan standard time (UTC+9).

use chrono::{DateTime, FixedOffset, Offset, Utc};

/// UTC+9 offset in seconds.
const UTC_PLUS_9_SECS: i32 = 9 * 3600;

/// Display format of the `sendTime` field on outbound chat frames.
pub const SEND_TIME_FORMAT: &str = "%Y.%m.%d %H:%M";

fn jst_offset() -> FixedOffset {
    FixedOffset::east_opt(UTC_PLUS_9_SECS).unwrap_or_else(|| Utc.fix())
}

fn to_jst(timestamp_millis: i64) -> DateTime<FixedOffset> {
    DateTime::from_timestamp_millis(timestamp_millis)
        .unwrap_or_default()
        .with_timezone(&jst_offset())
}

/// Get current Unix timestamp in JST (milliseconds)
pub fn get_jst_timestamp() -> i64 {
    let now_jst: DateTime<FixedOffset> = Utc::now().with_timezone(&jst_offset());
    now_jst.timestamp_millis()
}

/// Convert a Unix timestamp (milliseconds) to an RFC 3339 string in JST.
pub fn timestamp_to_jst_rfc3339(timestamp_millis: i64) -> String {
    to_jst(timestamp_millis).to_rfc3339()
}

/// Format a Unix timestamp (milliseconds) as `yyyy.MM.dd HH:mm` in JST.
pub fn format_send_time(timestamp_millis: i64) -> String {
    to_jst(timestamp_millis).format(SEND_TIME_FORMAT).to_string()
}
