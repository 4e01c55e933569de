//! Domain types: bars, gaps, calendar events.

pub mod bar;
pub mod event;
pub mod gap;

pub use bar::{validate_series, MinuteBar, SeriesError};
pub use event::{CalendarEvent, Certainty, EventPrecision, Importance};
pub use gap::{ClassifiedGap, Gap, GapFlag, GapLabel};
