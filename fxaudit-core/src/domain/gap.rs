//! Gap records and the cascade label set.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A timing gap between two temporally adjacent bars inside one slicing
/// window. Derived per run, never persisted independently of its
/// classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    pub start_ts: DateTime<Utc>,
    pub end_ts: DateTime<Utc>,
}

impl Gap {
    pub fn length(&self) -> Duration {
        self.end_ts - self.start_ts
    }

    pub fn length_secs(&self) -> i64 {
        (self.end_ts - self.start_ts).num_seconds()
    }

    /// Temporal midpoint, used by the overlap-or-center matching rule.
    pub fn center(&self) -> DateTime<Utc> {
        self.start_ts + self.length() / 2
    }
}

/// Terminal cascade labels, in priority order. Every gap receives exactly
/// one; `Anomaly` is the always-reachable residual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapLabel {
    Weekend,
    Holiday,
    Maintenance,
    News,
    Anomaly,
}

impl GapLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            GapLabel::Weekend => "weekend",
            GapLabel::Holiday => "holiday",
            GapLabel::Maintenance => "maintenance",
            GapLabel::News => "news",
            GapLabel::Anomaly => "anomaly",
        }
    }
}

/// Informational flags attached by the extra-checks module. A flag never
/// changes the cascade label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapFlag {
    /// Weekend gap whose length deviation is explained by a DST transition.
    DstShift,
    /// Gap at the 17:00 New York trading-day rollover.
    NyRollover,
}

/// A gap with its single cascade label and any informational flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedGap {
    pub gap: Gap,
    pub label: GapLabel,
    pub flags: Vec<GapFlag>,
}

impl ClassifiedGap {
    pub fn new(gap: Gap, label: GapLabel) -> Self {
        Self {
            gap,
            label,
            flags: Vec::new(),
        }
    }

    pub fn has_flag(&self, flag: GapFlag) -> bool {
        self.flags.contains(&flag)
    }
}
