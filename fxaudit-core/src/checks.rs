//! Extra checks — read-only detectors that attach flags, never labels.
//!
//! Each detector inspects already-classified data and marks expected or
//! suspect patterns. None of them can change a cascade label: a flag is a
//! commentary, not a reclassification.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use chrono_tz::America::New_York;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::domain::{ClassifiedGap, GapFlag, GapLabel, MinuteBar};

/// Default multiplier for the data-glitch range test.
pub const DEFAULT_GLITCH_MULTIPLIER: f64 = 30.0;

/// Theoretical maximum number of distinct 1-minute bars in a calendar week.
pub const WEEK_MINUTE_CAP: usize = 7 * 24 * 60;

/// A bar whose candle range is implausibly wide against its day's median.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlitchBar {
    pub timestamp_utc: DateTime<Utc>,
    pub range: f64,
    pub median_range: f64,
    pub ratio: f64,
}

/// An ISO week carrying more minute bars than a week can hold — an
/// upsampling or duplication signal from upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverfilledWeek {
    pub iso_year: i32,
    pub iso_week: u32,
    pub bar_count: usize,
}

/// UTC instants at which `tz` changes its UTC offset inside `[start, end)`.
///
/// Hour-granularity scan; every IANA transition falls on a whole local hour,
/// so nothing is missed.
pub fn dst_transitions(tz: Tz, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    use chrono::Offset;
    let mut out = Vec::new();
    let mut t = start;
    let mut prev_offset = tz.offset_from_utc_datetime(&t.naive_utc()).fix();
    while t < end {
        let next = t + Duration::hours(1);
        let offset = tz.offset_from_utc_datetime(&next.naive_utc()).fix();
        if offset != prev_offset {
            out.push(next);
            prev_offset = offset;
        }
        t = next;
    }
    out
}

/// Flag weekend gaps whose length deviates from the expected weekly closure
/// by roughly one hour around a DST transition. Such gaps are
/// clock-shift-explained, not data loss.
pub fn flag_dst_effect(
    gaps: &mut [ClassifiedGap],
    expected_weekend: Duration,
    transitions: &[DateTime<Utc>],
) {
    // A DST hop moves the closure length by ±60 minutes; accept a ±15 minute
    // band around that shift.
    let near = Duration::days(3);
    for cg in gaps.iter_mut().filter(|g| g.label == GapLabel::Weekend) {
        let deviation = (cg.gap.length() - expected_weekend).abs();
        let off_by_one_hour =
            deviation >= Duration::minutes(45) && deviation <= Duration::minutes(75);
        let near_transition = transitions
            .iter()
            .any(|t| *t >= cg.gap.start_ts - near && *t <= cg.gap.end_ts + near);
        if off_by_one_hour && near_transition && !cg.has_flag(GapFlag::DstShift) {
            cg.flags.push(GapFlag::DstShift);
        }
    }
}

/// Flag gaps starting at the 17:00 New York trading-day rollover. The daily
/// settlement pause there is an expected technical profile.
pub fn flag_ny_rollover(gaps: &mut [ClassifiedGap]) {
    for cg in gaps.iter_mut() {
        let local = cg.gap.start_ts.with_timezone(&New_York);
        if local.hour() == 17 && local.minute() < 5 && !cg.has_flag(GapFlag::NyRollover) {
            cg.flags.push(GapFlag::NyRollover);
        }
    }
}

/// Count bars per ISO week and report weeks exceeding the theoretical
/// maximum. Input need not be pre-validated; the detector is exactly how
/// duplicated or sub-minute upstream data gets surfaced.
pub fn overfilled_weeks(bars: &[MinuteBar]) -> Vec<OverfilledWeek> {
    use std::collections::BTreeMap;
    let mut counts: BTreeMap<(i32, u32), usize> = BTreeMap::new();
    for bar in bars {
        let iso = bar.timestamp_utc.iso_week();
        *counts.entry((iso.year(), iso.week())).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .filter(|(_, n)| *n > WEEK_MINUTE_CAP)
        .map(|((iso_year, iso_week), bar_count)| OverfilledWeek {
            iso_year,
            iso_week,
            bar_count,
        })
        .collect()
}

/// Flag bars whose `(high - low)` range exceeds `multiplier` times the median
/// range of their UTC day. Suspect candles are surfaced, never removed.
pub fn glitch_bars(bars: &[MinuteBar], multiplier: f64) -> Vec<GlitchBar> {
    let mut out = Vec::new();
    let mut day_start = 0usize;
    while day_start < bars.len() {
        let day = bars[day_start].timestamp_utc.date_naive();
        let day_end = bars[day_start..]
            .iter()
            .position(|b| b.timestamp_utc.date_naive() != day)
            .map(|p| day_start + p)
            .unwrap_or(bars.len());
        let slice = &bars[day_start..day_end];

        let mut ranges: Vec<f64> = slice.iter().map(MinuteBar::range).collect();
        ranges.sort_by(|a, b| a.partial_cmp(b).expect("validated ranges are finite"));
        let median = median_of_sorted(&ranges);

        if median > 0.0 {
            for bar in slice {
                let range = bar.range();
                if range > multiplier * median {
                    out.push(GlitchBar {
                        timestamp_utc: bar.timestamp_utc,
                        range,
                        median_range: median,
                        ratio: range / median,
                    });
                }
            }
        }
        day_start = day_end;
    }
    out
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
