//! Clock formatting and strip time ranges.

use serde::{Deserialize, Serialize};

/// Formats seconds as `[H:]MM:SS`; hours are omitted when zero.
pub fn seconds_to_hms(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = total % 3600 / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}

fn whole(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.floor() as u64
    } else {
        0
    }
}

/// Converts an hours/minutes/seconds triple to milliseconds. Each part is
/// floored; non-finite or negative parts count as zero.
pub fn hms_to_milliseconds(hours: f64, minutes: f64, seconds: f64) -> u64 {
    whole(hours) * 3_600_000 + whole(minutes) * 60_000 + whole(seconds) * 1000
}

/// Millisecond range `[media_start_time, media_end_time)` of a strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StripTimes {
    pub media_start_time: u64,
    pub media_end_time: u64,
}

impl StripTimes {
    pub fn span_ms(&self) -> u64 {
        self.media_end_time.saturating_sub(self.media_start_time)
    }

    /// Playback duration at `speed`.
    pub fn duration_ms(&self, speed: f64) -> f64 {
        if speed > 0.0 {
            self.span_ms() as f64 / speed
        } else {
            self.span_ms() as f64
        }
    }

    /// Wall-clock label for a position `current_time_ms` into the strip.
    pub fn clock_at(&self, current_time_ms: f64) -> String {
        seconds_to_hms((current_time_ms + self.media_start_time as f64) / 1000.0)
    }

    pub fn total_label(&self) -> String {
        seconds_to_hms(self.media_end_time as f64 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_to_hms() {
        assert_eq!(seconds_to_hms(605.0), "10:05");
        assert_eq!(seconds_to_hms(610.0), "10:10");
        assert_eq!(seconds_to_hms(0.0), "00:00");
        assert_eq!(seconds_to_hms(59.99), "00:59");
        assert_eq!(seconds_to_hms(3600.0), "1:00:00");
        assert_eq!(seconds_to_hms(3725.0), "1:02:05");
        assert_eq!(seconds_to_hms(-4.0), "00:00");
        assert_eq!(seconds_to_hms(f64::NAN), "00:00");
    }

    #[test]
    fn test_hms_to_milliseconds() {
        assert_eq!(hms_to_milliseconds(0.0, 10.0, 0.0), 600_000);
        assert_eq!(hms_to_milliseconds(0.0, 12.0, 0.0), 720_000);
        assert_eq!(hms_to_milliseconds(1.9, 0.0, 1.5), 3_601_000);
        assert_eq!(hms_to_milliseconds(f64::NAN, 1.0, 0.0), 60_000);
    }

    #[test]
    fn test_strip_times() {
        let times = StripTimes {
            media_start_time: 600_000,
            media_end_time: 720_000,
        };
        assert_eq!(times.duration_ms(1.0), 120_000.0);
        assert_eq!(times.duration_ms(2.0), 60_000.0);
        assert_eq!(times.clock_at(5_000.0), "10:05");
        assert_eq!(times.clock_at(60_000.0), "11:00");
        assert_eq!(times.total_label(), "12:00");
    }
}
