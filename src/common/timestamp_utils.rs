use chrono::{DateTime, Local};

pub const DISPLAY_TIMESTAMP_FORMAT: &str = "%H:%M:%S %d/%m/%Y";

/// Seconds between two instants, rounded to centiseconds, never negative.
pub fn duration_seconds_between(start: &DateTime<Local>, end: &DateTime<Local>) -> f64 {
    let millis = (*end - *start).num_milliseconds().max(0);
    ((millis + 5) / 10) as f64 / 100.0
}

/// `HH:MM:SS`, rounding to the nearest second.
pub fn format_hms(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

pub fn format_for_display(ts: &DateTime<Local>) -> String {
    ts.format(DISPLAY_TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_hms() {
        assert_eq!(format_hms(0.0), "00:00:00");
        assert_eq!(format_hms(50.4), "00:00:50");
        assert_eq!(format_hms(3725.6), "01:02:06");
    }

    #[test]
    fn duration_is_clamped_and_rounded() {
        let start = Local.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let end = start + chrono::Duration::milliseconds(12_345);
        assert_eq!(duration_seconds_between(&start, &end), 12.35);
        assert_eq!(duration_seconds_between(&end, &start), 0.0);
    }

    #[test]
    fn display_format_matches_day_first_layout() {
        let ts = Local.with_ymd_and_hms(2025, 3, 1, 9, 5, 7).unwrap();
        assert_eq!(format_for_display(&ts), "09:05:07 01/03/2025");
    }
}
