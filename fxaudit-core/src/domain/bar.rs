//! MinuteBar — the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One 1-minute OHLCV bar, timestamped in UTC.
///
/// Volume is carried through from the source but unused by the engine.
/// A bar is immutable once it has passed [`validate_series`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinuteBar {
    pub timestamp_utc: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl MinuteBar {
    /// Returns true if any price field is NaN or infinite.
    pub fn is_void(&self) -> bool {
        !(self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite())
    }

    /// OHLC sanity: `0 < low <= high`, open and close inside `[low, high]`.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.low > 0.0
            && self.high >= self.low
            && self.open >= self.low
            && self.open <= self.high
            && self.close >= self.low
            && self.close <= self.high
    }

    /// High-low range of the candle.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Malformed-Input conditions for a bar series. All are fatal for the run;
/// no autofix is attempted on malformed data.
#[derive(Debug, Error)]
pub enum SeriesError {
    #[error("bar {index} at {timestamp} fails OHLC sanity (o={open} h={high} l={low} c={close})")]
    InsaneBar {
        index: usize,
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },
    #[error("bars {prev_index} and {index} are not strictly increasing ({prev} >= {current})")]
    NotStrictlyIncreasing {
        prev_index: usize,
        index: usize,
        prev: DateTime<Utc>,
        current: DateTime<Utc>,
    },
    #[error("empty bar series")]
    Empty,
}

/// Validate a full bar series: every bar sane, timestamps strictly
/// increasing (which also rules out duplicates).
pub fn validate_series(bars: &[MinuteBar]) -> Result<(), SeriesError> {
    if bars.is_empty() {
        return Err(SeriesError::Empty);
    }
    for (i, bar) in bars.iter().enumerate() {
        if !bar.is_sane() {
            return Err(SeriesError::InsaneBar {
                index: i,
                timestamp: bar.timestamp_utc,
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
            });
        }
        if i > 0 && bars[i - 1].timestamp_utc >= bar.timestamp_utc {
            return Err(SeriesError::NotStrictlyIncreasing {
                prev_index: i - 1,
                index: i,
                prev: bars[i - 1].timestamp_utc,
                current: bar.timestamp_utc,
            });
        }
    }
    Ok(())
}
