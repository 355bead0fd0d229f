use chrono::{DateTime, Duration, Utc};

/// Hours behind UTC used for trace timestamps. No daylight-saving shift.
pub const REPORTING_OFFSET_HOURS: i64 = 6;

/// Current time rendered with [`format_reporting_timestamp`].
pub fn reporting_timestamp() -> String {
    format_reporting_timestamp(Utc::now())
}

/// Render `now` shifted to UTC-06:00 as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
///
/// The trailing `Z` is kept even though the wall clock is not UTC;
/// downstream consumers parse this exact shape.
pub fn format_reporting_timestamp(now: DateTime<Utc>) -> String {
    (now - Duration::hours(REPORTING_OFFSET_HOURS))
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn shifts_six_hours_and_keeps_millis() {
        let utc = Utc.with_ymd_and_hms(2024, 3, 10, 4, 5, 6).unwrap()
            + Duration::microseconds(789_654);
        assert_eq!(format_reporting_timestamp(utc), "2024-03-09T22:05:06.789Z");
    }

    #[test]
    fn summer_dates_use_the_same_offset() {
        let utc = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();
        assert_eq!(format_reporting_timestamp(utc), "2024-07-01T06:00:00.000Z");
    }

    #[test]
    fn current_timestamp_has_fixed_width() {
        let ts = reporting_timestamp();
        assert_eq!(ts.len(), "2024-01-01T00:00:00.000Z".len());
        assert!(ts.ends_with('Z'));
    }
}
