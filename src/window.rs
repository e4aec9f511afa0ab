//! Reservation-window computation.
//!
//! A rental reservation carries its day and start time as free-text custom
//! fields, interpreted as wall-clock time in the club's zone (Europe/Paris).
//! From those and "now" we derive the [start, end) validity window for the
//! lock PIN:
//!
//! - a reservation whose start is 75 minutes or more in the past is stale
//!   and rejected;
//! - a start in the past but within the grace window snaps to the top of
//!   the current hour;
//! - a future start requested exactly on the hour opens one hour early, so
//!   a payer arriving a few minutes ahead of time isn't locked out; any
//!   other future start keeps its hour;
//! - minutes are always truncated to zero, and the window spans 5 hours.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Europe::Paris;
use chrono_tz::Tz;
use thiserror::Error;

/// A reservation starting this many minutes in the past is rejected.
pub const STALE_AFTER_MINUTES: i64 = 75;

/// PIN validity duration.
pub const WINDOW_HOURS: i64 = 5;

/// Why a reservation could not be turned into an access window.
#[derive(Debug, Error)]
pub enum WindowError {
    #[error("missing custom field {0:?} in matched item")]
    MissingField(&'static str),
    #[error("unparseable reservation {0}")]
    Unparseable(String),
    #[error("reservation start is {0} minutes in the past (limit {STALE_AFTER_MINUTES})")]
    Stale(i64),
}

/// Validity window for a lock PIN, in the club's local zone.
///
/// Invariants: `start` is on an hour boundary and `end - start` is exactly
/// [`WINDOW_HOURS`] hours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessWindow {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl AccessWindow {
    /// Format a bound the way the lock vendor expects:
    /// `YYYY-MM-DDTHH:00:00±HH:MM`, hour granularity, explicit UTC offset.
    pub fn vendor_format(bound: &DateTime<Tz>) -> String {
        bound.format("%Y-%m-%dT%H:00:00%:z").to_string()
    }

    pub fn start_str(&self) -> String {
        Self::vendor_format(&self.start)
    }

    pub fn end_str(&self) -> String {
        Self::vendor_format(&self.end)
    }
}

/// Compute the PIN validity window for a reservation.
///
/// `day_text` is `dd/mm/yyyy`, `time_text` is `HH:mm`, both wall-clock in
/// Europe/Paris. `now` is the instant of the webhook call.
pub fn compute_window(
    day_text: &str,
    time_text: &str,
    now: DateTime<Utc>,
) -> Result<AccessWindow, WindowError> {
    let date = NaiveDate::parse_from_str(day_text.trim(), "%d/%m/%Y")
        .map_err(|_| WindowError::Unparseable(format!("day {day_text:?}")))?;
    let time = NaiveTime::parse_from_str(time_text.trim(), "%H:%M")
        .map_err(|_| WindowError::Unparseable(format!("time {time_text:?}")))?;

    let requested = local_datetime(date, time)?;
    let diff = now.signed_duration_since(requested);

    if diff >= Duration::minutes(STALE_AFTER_MINUTES) {
        return Err(WindowError::Stale(diff.num_minutes()));
    }

    let start = if diff >= Duration::zero() {
        // Started already but still within the grace window: the PIN
        // becomes valid at the top of the current hour. Date and hour both
        // come from "now" so a grace window crossing midnight doesn't
        // produce a day-old start.
        let now_paris = now.with_timezone(&Paris);
        local_hour(now_paris.date_naive(), now_paris.hour())?
    } else if requested.minute() == 0 {
        // On-the-hour future start: open one hour early.
        let shifted = requested - Duration::hours(1);
        local_hour(shifted.date_naive(), shifted.hour())?
    } else {
        local_hour(date, requested.hour())?
    };

    Ok(AccessWindow {
        end: start + Duration::hours(WINDOW_HOURS),
        start,
    })
}

/// Resolve a Paris wall-clock moment to an instant. Ambiguous local times
/// (DST fall-back) take the earlier offset; nonexistent ones (spring-forward
/// gap) are rejected.
fn local_datetime(date: NaiveDate, time: NaiveTime) -> Result<DateTime<Tz>, WindowError> {
    Paris
        .from_local_datetime(&date.and_time(time))
        .earliest()
        .ok_or_else(|| WindowError::Unparseable(format!("nonexistent local time {date} {time}")))
}

fn local_hour(date: NaiveDate, hour: u32) -> Result<DateTime<Tz>, WindowError> {
    let time = NaiveTime::from_hms_opt(hour, 0, 0)
        .ok_or_else(|| WindowError::Unparseable(format!("hour {hour}")))?;
    local_datetime(date, time)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paris(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
        Paris.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn utc_now(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        paris(y, m, d, h, min).with_timezone(&Utc)
    }

    #[test]
    fn grace_window_snaps_to_current_hour() {
        // Reservation at 14:00, webhook arrives 14:37 — 37 minutes late.
        let now = utc_now(2025, 6, 10, 14, 37);
        let w = compute_window("10/06/2025", "14:00", now).unwrap();
        assert_eq!(w.start, paris(2025, 6, 10, 14, 0));
    }

    #[test]
    fn grace_window_covers_up_to_74_minutes() {
        // Reservation at 13:30, webhook at 14:44 — 74 minutes late.
        let now = utc_now(2025, 6, 10, 14, 44);
        let w = compute_window("10/06/2025", "13:30", now).unwrap();
        assert_eq!(w.start, paris(2025, 6, 10, 14, 0));
        assert_eq!(w.start.minute(), 0);
    }

    #[test]
    fn grace_window_across_midnight_starts_at_current_hour() {
        // Reservation at 23:30, webhook arrives 00:30 the next day — 60
        // minutes late, still within the grace window. The start must be
        // the top of the current hour, not a day-old window on the
        // requested date.
        let now = utc_now(2025, 6, 11, 0, 30);
        let w = compute_window("10/06/2025", "23:30", now).unwrap();
        assert_eq!(w.start, paris(2025, 6, 11, 0, 0));
    }

    #[test]
    fn stale_at_exactly_75_minutes() {
        let now = utc_now(2025, 6, 10, 14, 45);
        let err = compute_window("10/06/2025", "13:30", now).unwrap_err();
        assert!(matches!(err, WindowError::Stale(75)), "got {err:?}");
    }

    #[test]
    fn stale_two_hours_in_the_past() {
        let now = utc_now(2025, 6, 10, 16, 0);
        let err = compute_window("10/06/2025", "14:00", now).unwrap_err();
        assert!(matches!(err, WindowError::Stale(120)), "got {err:?}");
    }

    #[test]
    fn future_on_the_hour_opens_one_hour_early() {
        let now = utc_now(2025, 6, 10, 8, 0);
        let w = compute_window("10/06/2025", "10:00", now).unwrap();
        assert_eq!(w.start, paris(2025, 6, 10, 9, 0));
    }

    #[test]
    fn future_off_the_hour_keeps_its_hour() {
        let now = utc_now(2025, 6, 10, 8, 0);
        let w = compute_window("10/06/2025", "10:30", now).unwrap();
        assert_eq!(w.start, paris(2025, 6, 10, 10, 0));
    }

    #[test]
    fn seconds_before_an_on_the_hour_start_still_counts_as_future() {
        // 09:59:30 for a 10:00 reservation: not yet started, so the
        // one-hour-early rule applies, not the grace-window snap.
        let now = paris(2025, 6, 10, 9, 59)
            .with_timezone(&Utc)
            .checked_add_signed(Duration::seconds(30))
            .unwrap();
        let w = compute_window("10/06/2025", "10:00", now).unwrap();
        assert_eq!(w.start, paris(2025, 6, 10, 9, 0));
    }

    #[test]
    fn midnight_start_rolls_back_to_previous_day() {
        let now = utc_now(2025, 6, 10, 22, 0);
        let w = compute_window("11/06/2025", "00:00", now).unwrap();
        assert_eq!(w.start, paris(2025, 6, 10, 23, 0));
    }

    #[test]
    fn window_always_spans_five_hours() {
        let now = utc_now(2025, 6, 10, 8, 0);
        for time in ["10:00", "10:30", "23:45"] {
            let w = compute_window("10/06/2025", time, now).unwrap();
            assert_eq!(w.end - w.start, Duration::hours(WINDOW_HOURS));
        }
    }

    #[test]
    fn vendor_format_carries_paris_offset() {
        // CET in January, CEST in July.
        let now = utc_now(2025, 1, 10, 8, 0);
        let w = compute_window("10/01/2025", "10:30", now).unwrap();
        assert_eq!(w.start_str(), "2025-01-10T10:00:00+01:00");
        assert_eq!(w.end_str(), "2025-01-10T15:00:00+01:00");

        let now = utc_now(2025, 7, 10, 8, 0);
        let w = compute_window("10/07/2025", "10:30", now).unwrap();
        assert_eq!(w.start_str(), "2025-07-10T10:00:00+02:00");
    }

    #[test]
    fn malformed_fields_are_rejected() {
        let now = utc_now(2025, 6, 10, 8, 0);
        for (day, time) in [
            ("2025-06-10", "10:00"),
            ("10/06/2025", "10h00"),
            ("", "10:00"),
            ("10/06/2025", ""),
            ("32/06/2025", "10:00"),
            ("10/06/2025", "25:00"),
        ] {
            let err = compute_window(day, time, now).unwrap_err();
            assert!(
                matches!(err, WindowError::Unparseable(_)),
                "{day:?} {time:?} gave {err:?}"
            );
        }
    }
}
