//! Window matcher — local-time→UTC conversion, overlap tests, recurrence.
//!
//! One primitive shared by the holiday, maintenance, and news classifiers:
//! a plain UTC interval plus the two matching rules the cascade uses
//! (span overlap for weekend/holiday, ≥50 %-overlap-or-center for
//! maintenance, start containment for news).

use chrono::{DateTime, Datelike, Duration, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::domain::Gap;

/// Minimum weekly recurrence for a maintenance window to be eligible.
/// One-off scheduled closures fall through to the next cascade stage.
pub const MIN_RECURRENCE: usize = 8;

/// Half-open UTC interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtcWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl UtcWindow {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }

    /// Strict interval overlap with `[start, end)`.
    pub fn overlaps_span(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end && end > self.start
    }

    pub fn overlap_secs(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
        let lo = self.start.max(start);
        let hi = self.end.min(end);
        (hi - lo).num_seconds().max(0)
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Maintenance matching rule: the window claims the gap when it covers at
    /// least half of it, or when the gap's temporal center lies inside.
    pub fn matches_gap(&self, gap: &Gap) -> bool {
        let overlap = self.overlap_secs(gap.start_ts, gap.end_ts);
        2 * overlap >= gap.length_secs() || self.contains(gap.center())
    }
}

/// True if any window in the slice strictly overlaps the gap's span.
/// This is the weekend/holiday rule.
pub fn any_span_overlap(windows: &[UtcWindow], gap: &Gap) -> bool {
    windows.iter().any(|w| w.overlaps_span(gap.start_ts, gap.end_ts))
}

/// Resolve a local wall-clock instant to UTC.
///
/// Ambiguous instants (fall-back hour) resolve to the earlier offset. An
/// instant inside a spring-forward gap does not exist locally; it shifts
/// forward one hour to the nearest valid instant instead of failing.
pub fn local_to_utc(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        chrono::LocalResult::Single(dt) => dt.with_timezone(&Utc),
        chrono::LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        chrono::LocalResult::None => {
            let shifted = local + Duration::hours(1);
            match tz.from_local_datetime(&shifted) {
                chrono::LocalResult::Single(dt) => dt.with_timezone(&Utc),
                chrono::LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
                // Double-gap transitions do not occur in the IANA database.
                chrono::LocalResult::None => shifted.and_utc(),
            }
        }
    }
}

/// A point in the week: weekday plus minute-of-day. Parsed from tokens like
/// `"Fri 22:00"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekTime {
    pub weekday: Weekday,
    pub minute_of_day: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid week-time token {0:?}, expected e.g. \"Fri 22:00\"")]
pub struct WeekTimeParseError(pub String);

impl FromStr for WeekTime {
    type Err = WeekTimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || WeekTimeParseError(s.to_string());
        let (day, time) = s.trim().split_once(' ').ok_or_else(err)?;
        let weekday = match day {
            "Mon" => Weekday::Mon,
            "Tue" => Weekday::Tue,
            "Wed" => Weekday::Wed,
            "Thu" => Weekday::Thu,
            "Fri" => Weekday::Fri,
            "Sat" => Weekday::Sat,
            "Sun" => Weekday::Sun,
            _ => return Err(err()),
        };
        let (hh, mm) = time.trim().split_once(':').ok_or_else(err)?;
        let hh: u32 = hh.parse().map_err(|_| err())?;
        let mm: u32 = mm.parse().map_err(|_| err())?;
        if hh > 23 || mm > 59 {
            return Err(err());
        }
        Ok(WeekTime {
            weekday,
            minute_of_day: hh * 60 + mm,
        })
    }
}

impl WeekTime {
    fn offset_from_week_start(&self) -> Duration {
        Duration::days(self.weekday.num_days_from_monday() as i64)
            + Duration::minutes(self.minute_of_day as i64)
    }
}

/// The recurring weekly market-closed window, anchored to UTC weeks
/// (Monday 00:00). The default FX closure is `Fri 22:00 → Sun 22:00` UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklyWindow {
    pub start: WeekTime,
    pub end: WeekTime,
}

impl WeeklyWindow {
    /// Length of one occurrence; an end token at or before the start token
    /// wraps into the following week.
    pub fn expected_length(&self) -> Duration {
        let mut len = self.end.offset_from_week_start() - self.start.offset_from_week_start();
        if len <= Duration::zero() {
            len = len + Duration::days(7);
        }
        len
    }

    /// All occurrences overlapping `[span_start, span_end)`, ascending.
    pub fn occurrences(&self, span_start: DateTime<Utc>, span_end: DateTime<Utc>) -> Vec<UtcWindow> {
        let mut wins = Vec::new();
        let first_monday = monday_of(span_start) - Duration::days(7);
        let mut week_start = first_monday;
        while week_start < span_end + Duration::days(7) {
            let ws = week_start + self.start.offset_from_week_start();
            let we = ws + self.expected_length();
            if ws < span_end && we > span_start {
                wins.push(UtcWindow { start: ws, end: we });
            }
            week_start += Duration::days(7);
        }
        wins
    }
}

fn monday_of(ts: DateTime<Utc>) -> DateTime<Utc> {
    let days = ts.weekday().num_days_from_monday() as i64;
    ts.date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always valid")
        .and_utc()
        - Duration::days(days)
}

/// A recurring exchange maintenance interval in local wall-clock time.
///
/// The window is a time-of-week pattern; each weekly occurrence is converted
/// to UTC through the IANA timezone, so DST transitions move the UTC position
/// of the window exactly as the venue's clock does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TechWindow {
    pub weekday: Weekday,
    pub start_minute: u32,
    pub end_minute: u32,
    pub tz: Tz,
}

impl TechWindow {
    /// Weekly occurrences overlapping `[span_start, span_end)`, ascending.
    pub fn occurrences(&self, span_start: DateTime<Utc>, span_end: DateTime<Utc>) -> Vec<UtcWindow> {
        let mut wins = Vec::new();
        let mut date = span_start.date_naive() - Duration::days(7);
        let last = span_end.date_naive() + Duration::days(7);
        while date <= last {
            if date.weekday() == self.weekday {
                let local_start = date.and_time(minute_to_time(self.start_minute));
                let end_date = if self.end_minute > self.start_minute {
                    date
                } else {
                    date + Duration::days(1)
                };
                let local_end = end_date.and_time(minute_to_time(self.end_minute));
                let w = UtcWindow {
                    start: local_to_utc(self.tz, local_start),
                    end: local_to_utc(self.tz, local_end),
                };
                if w.start < w.end && w.start < span_end && w.end > span_start {
                    wins.push(w);
                }
                date += Duration::days(7);
            } else {
                date += Duration::days(1);
            }
        }
        wins
    }

    /// The recurrence filter: occurrences within the dataset span, or `None`
    /// when the pattern repeats fewer than [`MIN_RECURRENCE`] times.
    pub fn eligible_occurrences(
        &self,
        span_start: DateTime<Utc>,
        span_end: DateTime<Utc>,
    ) -> Option<Vec<UtcWindow>> {
        let wins = self.occurrences(span_start, span_end);
        if wins.len() >= MIN_RECURRENCE {
            Some(wins)
        } else {
            None
        }
    }
}

fn minute_to_time(minute_of_day: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(minute_of_day / 60, minute_of_day % 60, 0)
        .expect("minute_of_day is < 1440 by construction")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::New_York;
    use chrono_tz::Europe::Berlin;

    fn gap(start: DateTime<Utc>, secs: i64) -> Gap {
        Gap {
            start_ts: start,
            end_ts: start + Duration::seconds(secs),
        }
    }

    fn window(start: DateTime<Utc>, secs: i64) -> UtcWindow {
        UtcWindow {
            start,
            end: start + Duration::seconds(secs),
        }
    }

    #[test]
    fn exactly_half_overlap_matches() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 3, 22, 0, 0).unwrap();
        // Gap [t0, t0+1000); window covers [t0+500, t0+1500): overlap 500/1000.
        let g = gap(t0, 1000);
        let w = window(t0 + Duration::seconds(500), 1000);
        assert!(w.matches_gap(&g));
    }

    #[test]
    fn just_under_half_with_center_outside_does_not_match() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 3, 22, 0, 0).unwrap();
        // Gap of 100000s; window overlaps the first 49999s. Center (t0+50000)
        // is outside the window.
        let g = gap(t0, 100_000);
        let w = window(t0 - Duration::seconds(1), 50_000);
        assert_eq!(w.overlap_secs(g.start_ts, g.end_ts), 49_999);
        assert!(!w.matches_gap(&g));
    }

    #[test]
    fn center_containment_matches_small_overlap() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 3, 22, 0, 0).unwrap();
        // Window sits around the center but covers well under half the gap.
        let g = gap(t0, 10_000);
        let w = window(t0 + Duration::seconds(4_900), 300);
        assert!(w.matches_gap(&g));
    }

    #[test]
    fn week_time_parses_tokens() {
        let wt: WeekTime = "Fri 22:00".parse().unwrap();
        assert_eq!(wt.weekday, Weekday::Fri);
        assert_eq!(wt.minute_of_day, 22 * 60);
        assert!("Noday 22:00".parse::<WeekTime>().is_err());
        assert!("Fri 24:00".parse::<WeekTime>().is_err());
        assert!("Fri".parse::<WeekTime>().is_err());
    }

    #[test]
    fn weekly_window_length_wraps_past_week_end() {
        let w = WeeklyWindow {
            start: "Fri 22:00".parse().unwrap(),
            end: "Sun 22:00".parse().unwrap(),
        };
        assert_eq!(w.expected_length(), Duration::hours(48));
    }

    #[test]
    fn weekly_occurrences_cover_span() {
        let w = WeeklyWindow {
            start: "Fri 22:00".parse().unwrap(),
            end: "Sun 22:00".parse().unwrap(),
        };
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let occ = w.occurrences(start, end);
        // Jan 2024 spans weekends of Jan 5, 12, 19, 26 (Dec 29 closure ends
        // Dec 31 22:00, before the span).
        assert_eq!(occ.len(), 4);
        assert_eq!(
            occ[0].start,
            Utc.with_ymd_and_hms(2024, 1, 5, 22, 0, 0).unwrap()
        );
        for pair in occ.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
    }

    #[test]
    fn spring_forward_instant_shifts_to_nearest_valid() {
        // 2024-03-31 02:30 does not exist in Berlin (jump 02:00→03:00).
        let local = NaiveDateTime::parse_from_str("2024-03-31 02:30:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let utc = local_to_utc(Berlin, local);
        // Shifted to 03:30 CEST = 01:30 UTC.
        assert_eq!(utc, Utc.with_ymd_and_hms(2024, 3, 31, 1, 30, 0).unwrap());
    }

    #[test]
    fn ambiguous_instant_resolves_to_earlier_offset() {
        // 2024-11-03 01:30 occurs twice in New York; earliest is EDT (UTC-4).
        let local = NaiveDateTime::parse_from_str("2024-11-03 01:30:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let utc = local_to_utc(New_York, local);
        assert_eq!(utc, Utc.with_ymd_and_hms(2024, 11, 3, 5, 30, 0).unwrap());
    }

    #[test]
    fn tech_window_follows_local_clock_across_dst() {
        // Sunday 17:00–18:00 New York. In winter that is 22:00 UTC, in
        // summer 21:00 UTC.
        let tw = TechWindow {
            weekday: Weekday::Sun,
            start_minute: 17 * 60,
            end_minute: 18 * 60,
            tz: New_York,
        };
        let jan = tw.occurrences(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap(),
        );
        assert_eq!(jan[0].start, Utc.with_ymd_and_hms(2024, 1, 7, 22, 0, 0).unwrap());
        let jul = tw.occurrences(
            Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 7, 15, 0, 0, 0).unwrap(),
        );
        assert_eq!(jul[0].start, Utc.with_ymd_and_hms(2024, 7, 7, 21, 0, 0).unwrap());
    }

    #[test]
    fn seven_occurrences_are_not_eligible() {
        let tw = TechWindow {
            weekday: Weekday::Fri,
            start_minute: 22 * 60,
            end_minute: 23 * 60,
            tz: chrono_tz::UTC,
        };
        // Span covering exactly 7 Fridays.
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 2, 19, 0, 0, 0).unwrap();
        assert_eq!(tw.occurrences(start, end).len(), 7);
        assert!(tw.eligible_occurrences(start, end).is_none());
    }

    #[test]
    fn eight_occurrences_are_eligible() {
        let tw = TechWindow {
            weekday: Weekday::Fri,
            start_minute: 22 * 60,
            end_minute: 23 * 60,
            tz: chrono_tz::UTC,
        };
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 2, 26, 0, 0, 0).unwrap();
        let wins = tw.eligible_occurrences(start, end).unwrap();
        assert_eq!(wins.len(), 8);
    }

    #[test]
    fn midnight_crossing_window_ends_next_day() {
        let tw = TechWindow {
            weekday: Weekday::Fri,
            start_minute: 23 * 60 + 30,
            end_minute: 30,
            tz: chrono_tz::UTC,
        };
        let occ = tw.occurrences(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap(),
        );
        assert_eq!(occ[0].start, Utc.with_ymd_and_hms(2024, 1, 5, 23, 30, 0).unwrap());
        assert_eq!(occ[0].end, Utc.with_ymd_and_hms(2024, 1, 6, 0, 30, 0).unwrap());
    }
}
