//! Time helpers shared by the session controller and the reporter.

use chrono::Utc;

/// Milliseconds since the Unix epoch, as stored in `RunRecord::started_at`.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Render an elapsed second count as `HH:MM:SS`.
///
/// Hours are not wrapped, so a run longer than a day renders as `25:00:00`.
pub fn format_elapsed(seconds: u64) -> String {
    let hrs = seconds / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}:{:02}", hrs, mins, secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "00:00:00");
        assert_eq!(format_elapsed(37), "00:00:37");
        assert_eq!(format_elapsed(3661), "01:01:01");
        assert_eq!(format_elapsed(90_000), "25:00:00");
    }

    #[test]
    fn test_now_millis_is_recent() {
        // 2020-01-01T00:00:00Z
        assert!(now_millis() > 1_577_836_800_000);
    }
}
