//! Economic calendar events (external input, UTC).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::window::UtcWindow;

/// Time confidence of an event's timestamp. Consumed, never computed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Certainty {
    Confirmed,
    Estimated,
    Secondary,
}

/// Importance tier. The calendar builder upstream already drops `low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Medium,
    High,
}

/// Timestamp precision: an hour-precision event induces a ±15-minute UTC
/// window; an all-day event covers its full UTC calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPrecision {
    Hour,
    AllDay,
}

/// One scheduled news event from the economic calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub datetime_utc: DateTime<Utc>,
    pub title: String,
    pub country: String,
    pub importance: Importance,
    pub certainty: Certainty,
    pub precision: EventPrecision,
}

impl CalendarEvent {
    /// The UTC window this event explains gaps within. Hour precision uses a
    /// fixed ±15-minute band around the published instant.
    pub fn window(&self) -> UtcWindow {
        match self.precision {
            EventPrecision::Hour => UtcWindow {
                start: self.datetime_utc - Duration::minutes(15),
                end: self.datetime_utc + Duration::minutes(15),
            },
            EventPrecision::AllDay => {
                let day = self
                    .datetime_utc
                    .date_naive()
                    .and_hms_opt(0, 0, 0)
                    .expect("midnight is always valid")
                    .and_utc();
                UtcWindow {
                    start: day,
                    end: day + Duration::days(1),
                }
            }
        }
    }
}
