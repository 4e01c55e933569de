//! Cascade classifier — ordered, first-match-wins labeling of gaps.
//!
//! The cascade is data, not control flow: an ordered list of
//! `(window set, matching rule, label)` entries evaluated in declaration
//! order. The first matching entry labels the gap; a gap matching nothing is
//! an `Anomaly`. Ordering is therefore explicit and testable in isolation,
//! and no gap can end up with zero or two labels.

use crate::domain::{ClassifiedGap, Gap, GapLabel};
use crate::window::{any_span_overlap, UtcWindow};

/// How a rule's windows are compared against a gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    /// Any strict interval overlap between gap span and window.
    /// Used for weekend and holiday stages.
    SpanOverlap,
    /// ≥50 % of the gap covered, or the gap's center inside the window.
    /// Used for maintenance windows.
    OverlapOrCenter,
    /// The gap's reference instant (its start) inside the window.
    /// Used for news events.
    StartContained,
}

/// One cascade stage: a label and the windows that justify it.
#[derive(Debug, Clone)]
pub struct CascadeRule {
    pub label: GapLabel,
    pub rule: MatchRule,
    pub windows: Vec<UtcWindow>,
}

impl CascadeRule {
    pub fn matches(&self, gap: &Gap) -> bool {
        match self.rule {
            MatchRule::SpanOverlap => any_span_overlap(&self.windows, gap),
            MatchRule::OverlapOrCenter => self.windows.iter().any(|w| w.matches_gap(gap)),
            MatchRule::StartContained => self.windows.iter().any(|w| w.contains(gap.start_ts)),
        }
    }
}

/// The ordered rule table. `classify` walks it top to bottom.
#[derive(Debug, Clone)]
pub struct Cascade {
    rules: Vec<CascadeRule>,
}

impl Cascade {
    /// Build the standard FX cascade in its fixed priority order:
    /// weekend → holiday → maintenance → news. Maintenance windows passed
    /// here must already have survived the recurrence filter.
    pub fn fx(
        weekend: Vec<UtcWindow>,
        holiday: Vec<UtcWindow>,
        maintenance: Vec<UtcWindow>,
        news: Vec<UtcWindow>,
    ) -> Self {
        Self {
            rules: vec![
                CascadeRule {
                    label: GapLabel::Weekend,
                    rule: MatchRule::SpanOverlap,
                    windows: weekend,
                },
                CascadeRule {
                    label: GapLabel::Holiday,
                    rule: MatchRule::SpanOverlap,
                    windows: holiday,
                },
                CascadeRule {
                    label: GapLabel::Maintenance,
                    rule: MatchRule::OverlapOrCenter,
                    windows: maintenance,
                },
                CascadeRule {
                    label: GapLabel::News,
                    rule: MatchRule::StartContained,
                    windows: news,
                },
            ],
        }
    }

    pub fn rules(&self) -> &[CascadeRule] {
        &self.rules
    }

    /// First matching rule wins; no rule matching means `Anomaly`.
    pub fn classify(&self, gap: &Gap) -> GapLabel {
        self.rules
            .iter()
            .find(|r| r.matches(gap))
            .map(|r| r.label)
            .unwrap_or(GapLabel::Anomaly)
    }

    /// Classify every gap, preserving order. Every input gap appears in the
    /// output exactly once.
    pub fn classify_all(&self, gaps: &[Gap]) -> Vec<ClassifiedGap> {
        gaps.iter()
            .map(|g| ClassifiedGap::new(*g, self.classify(g)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn ts(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, d, h, m, 0).unwrap()
    }

    fn win(start: DateTime<Utc>, hours: i64) -> UtcWindow {
        UtcWindow {
            start,
            end: start + Duration::hours(hours),
        }
    }

    fn gap(start: DateTime<Utc>, minutes: i64) -> Gap {
        Gap {
            start_ts: start,
            end_ts: start + Duration::minutes(minutes),
        }
    }

    #[test]
    fn unmatched_gap_is_anomaly() {
        let cascade = Cascade::fx(vec![], vec![], vec![], vec![]);
        assert_eq!(cascade.classify(&gap(ts(5, 12, 0), 5)), GapLabel::Anomaly);
    }

    #[test]
    fn holiday_beats_maintenance() {
        // A gap overlapping both a holiday day and a maintenance window must
        // take the earlier stage's label.
        let g = gap(ts(7, 22, 0), 120);
        let holiday = win(ts(7, 0, 0), 24);
        let maint = win(ts(7, 22, 0), 2);
        let cascade = Cascade::fx(vec![], vec![holiday], vec![maint], vec![]);
        assert!(maint.matches_gap(&g));
        assert_eq!(cascade.classify(&g), GapLabel::Holiday);
    }

    #[test]
    fn weekend_beats_holiday_on_weekend() {
        // Holiday falling inside the weekly closure: the stated priority
        // order resolves the tie — weekend wins.
        let g = gap(ts(8, 10, 0), 60);
        let weekend = win(ts(7, 22, 0), 48);
        let holiday = win(ts(8, 0, 0), 24);
        let cascade = Cascade::fx(vec![weekend], vec![holiday], vec![], vec![]);
        assert_eq!(cascade.classify(&g), GapLabel::Weekend);
    }

    #[test]
    fn news_matches_on_start_containment_only() {
        // ±15-minute window around 12:30. A gap starting inside matches.
        let news = UtcWindow {
            start: ts(5, 12, 15),
            end: ts(5, 12, 45),
        };
        let cascade = Cascade::fx(vec![], vec![], vec![], vec![news]);
        assert_eq!(cascade.classify(&gap(ts(5, 12, 20), 90)), GapLabel::News);
        // Starting just before the window: no match even though the gap
        // runs through it.
        assert_eq!(cascade.classify(&gap(ts(5, 12, 10), 90)), GapLabel::Anomaly);
    }

    #[test]
    fn every_gap_gets_exactly_one_label() {
        let weekend = win(ts(7, 22, 0), 48);
        let cascade = Cascade::fx(vec![weekend], vec![], vec![], vec![]);
        let gaps = vec![gap(ts(7, 23, 0), 30), gap(ts(5, 1, 0), 5)];
        let classified = cascade.classify_all(&gaps);
        assert_eq!(classified.len(), gaps.len());
        assert_eq!(classified[0].label, GapLabel::Weekend);
        assert_eq!(classified[1].label, GapLabel::Anomaly);
    }
}
