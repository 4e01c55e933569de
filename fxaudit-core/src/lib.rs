//! FxAudit Core — gap detection, cascade classification, and scoring for
//! 1-minute FX bar datasets.
//!
//! Pure logic only: no IO, no wall clock, no randomness. The crate provides:
//! - Domain types (minute bars, gaps, calendar events)
//! - Half-open period bounds for year/quarter/month slicing
//! - The gap detector (Δt > 60 s, strict)
//! - The window matcher (local→UTC with DST, overlap rules, recurrence)
//! - The weekend → holiday → maintenance → news → anomaly cascade
//! - Read-only extra checks (DST shift, NY rollover, fill, data glitches)
//! - The weighted scorecard

pub mod cascade;
pub mod checks;
pub mod detect;
pub mod domain;
pub mod holidays;
pub mod period;
pub mod score;
pub mod session;
pub mod window;

pub use cascade::{Cascade, CascadeRule, MatchRule};
pub use checks::{
    dst_transitions, flag_dst_effect, flag_ny_rollover, glitch_bars, overfilled_weeks, GlitchBar,
    OverfilledWeek, DEFAULT_GLITCH_MULTIPLIER,
};
pub use detect::{find_gaps, BAR_INTERVAL_SECS};
pub use domain::{
    validate_series, CalendarEvent, Certainty, ClassifiedGap, EventPrecision, Gap, GapFlag,
    GapLabel, Importance, MinuteBar, SeriesError,
};
pub use holidays::{easter_sunday, holiday_windows, Holiday, HolidayPolicy};
pub use period::{Period, PeriodError, PeriodKind};
pub use score::{build_scorecard, MetricOutcome, MetricSpec, ScoreCard, ScoreError};
pub use session::Session;
pub use window::{
    any_span_overlap, local_to_utc, TechWindow, UtcWindow, WeekTime, WeekTimeParseError,
    WeeklyWindow, MIN_RECURRENCE,
};
