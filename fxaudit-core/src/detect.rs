//! Gap detector — adjacent-pair scan over one period slice.

use chrono::Duration;

use crate::domain::{Gap, MinuteBar};

/// Expected spacing of a 1-minute series. A delta of exactly this value is
/// continuous data; only a strictly larger delta is a gap.
pub const BAR_INTERVAL_SECS: i64 = 60;

/// Scan a period-bounded, sorted, duplicate-free bar slice and emit gaps,
/// ascending by start.
///
/// Only pairs strictly inside the slice are compared; the first and last
/// bars are never compared against bars outside it, so a gap can never leak
/// across a period boundary.
pub fn find_gaps(bars: &[MinuteBar]) -> Vec<Gap> {
    let mut gaps = Vec::new();
    for pair in bars.windows(2) {
        let delta = pair[1].timestamp_utc - pair[0].timestamp_utc;
        if delta > Duration::seconds(BAR_INTERVAL_SECS) {
            gaps.push(Gap {
                start_ts: pair[0].timestamp_utc,
                end_ts: pair[1].timestamp_utc,
            });
        }
    }
    gaps
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use proptest::prelude::*;

    fn bar(ts: DateTime<Utc>) -> MinuteBar {
        MinuteBar {
            timestamp_utc: ts,
            open: 1.1,
            high: 1.2,
            low: 1.0,
            close: 1.15,
            volume: 1.0,
        }
    }

    fn bars_at(offsets_secs: &[i64]) -> Vec<MinuteBar> {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        offsets_secs
            .iter()
            .map(|s| bar(t0 + Duration::seconds(*s)))
            .collect()
    }

    #[test]
    fn sixty_seconds_is_not_a_gap() {
        let gaps = find_gaps(&bars_at(&[0, 60, 120]));
        assert!(gaps.is_empty());
    }

    #[test]
    fn sixty_one_seconds_is_a_gap() {
        let gaps = find_gaps(&bars_at(&[0, 61]));
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].length_secs(), 61);
    }

    #[test]
    fn five_minute_hole_is_one_gap() {
        // 12:00 bar followed by 12:05 bar: one 300-second gap.
        let gaps = find_gaps(&bars_at(&[0, 60, 120, 420, 480]));
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].length_secs(), 300);
    }

    #[test]
    fn gaps_are_ascending() {
        let gaps = find_gaps(&bars_at(&[0, 200, 260, 600]));
        assert_eq!(gaps.len(), 2);
        assert!(gaps[0].start_ts < gaps[1].start_ts);
    }

    #[test]
    fn empty_and_single_bar_have_no_gaps() {
        assert!(find_gaps(&[]).is_empty());
        assert!(find_gaps(&bars_at(&[0])).is_empty());
    }

    proptest! {
        /// Every emitted gap is strictly longer than one bar interval and
        /// starts at an input bar timestamp.
        #[test]
        fn gaps_are_strictly_longer_than_interval(offsets in prop::collection::btree_set(0i64..100_000, 1..200)) {
            let offsets: Vec<i64> = offsets.iter().map(|s| s * 60).collect();
            let bars = bars_at(&offsets);
            for gap in find_gaps(&bars) {
                prop_assert!(gap.length_secs() > BAR_INTERVAL_SECS);
                prop_assert!(bars.iter().any(|b| b.timestamp_utc == gap.start_ts));
            }
        }
    }
}
