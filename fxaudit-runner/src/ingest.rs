//! CSV ingestion — bar series and economic calendar.
//!
//! Bars must arrive pre-sorted, duplicate-free, strictly UTC; anything else
//! is Malformed-Input and fatal (no autofix on malformed data). Calendar
//! rows are filtered to medium/high impact, sorted, and deduplicated by
//! timestamp, mirroring what the upstream calendar builder emits.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use flate2::read::GzDecoder;
use thiserror::Error;

use fxaudit_core::domain::{
    validate_series, CalendarEvent, Certainty, EventPrecision, Importance, MinuteBar, SeriesError,
};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing required column {0:?}")]
    MissingColumn(&'static str),
    #[error("record {line}: bad timestamp {value:?}")]
    BadTimestamp { line: u64, value: String },
    #[error("record {line}: field {field} is not a number: {value:?}")]
    BadNumber {
        line: u64,
        field: &'static str,
        value: String,
    },
    #[error("malformed bar series: {0}")]
    Malformed(#[from] SeriesError),
}

/// Parse `2024-01-02T03:04:00Z` (RFC 3339) or `2024-01-02 03:04:00`
/// (naive, interpreted as UTC).
fn parse_utc(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|n| n.and_utc())
}

fn open_reader(path: &Path) -> Result<Box<dyn Read>, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let buf = BufReader::new(file);
    if path.extension().is_some_and(|e| e == "gz") {
        Ok(Box::new(GzDecoder::new(buf)))
    } else {
        Ok(Box::new(buf))
    }
}

fn column_index(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.contains(&h.trim().to_ascii_lowercase().as_str()))
}

/// Load and validate a 1-minute bar series. Transparently decompresses
/// `.gz` files.
pub fn load_bars(path: &Path) -> Result<Vec<MinuteBar>, LoadError> {
    let mut reader = csv::Reader::from_reader(open_reader(path)?);
    let headers = reader.headers()?.clone();

    let ts = column_index(&headers, &["datetime_utc", "datetime", "timestamp"])
        .ok_or(LoadError::MissingColumn("datetime_utc"))?;
    let open = column_index(&headers, &["open"]).ok_or(LoadError::MissingColumn("open"))?;
    let high = column_index(&headers, &["high"]).ok_or(LoadError::MissingColumn("high"))?;
    let low = column_index(&headers, &["low"]).ok_or(LoadError::MissingColumn("low"))?;
    let close = column_index(&headers, &["close"]).ok_or(LoadError::MissingColumn("close"))?;
    let volume = column_index(&headers, &["volume"]);

    let mut bars = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let raw_ts = record.get(ts).unwrap_or("");
        let timestamp_utc = parse_utc(raw_ts).ok_or_else(|| LoadError::BadTimestamp {
            line,
            value: raw_ts.to_string(),
        })?;
        bars.push(MinuteBar {
            timestamp_utc,
            open: parse_f64(&record, open, "open", line)?,
            high: parse_f64(&record, high, "high", line)?,
            low: parse_f64(&record, low, "low", line)?,
            close: parse_f64(&record, close, "close", line)?,
            volume: match volume {
                Some(i) => parse_f64(&record, i, "volume", line)?,
                None => 0.0,
            },
        });
    }

    validate_series(&bars)?;
    Ok(bars)
}

fn parse_f64(
    record: &csv::StringRecord,
    index: usize,
    field: &'static str,
    line: u64,
) -> Result<f64, LoadError> {
    let raw = record.get(index).unwrap_or("");
    raw.trim().parse::<f64>().map_err(|_| LoadError::BadNumber {
        line,
        field,
        value: raw.to_string(),
    })
}

fn parse_importance(raw: &str) -> Option<Importance> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "high" => Some(Importance::High),
        "medium" => Some(Importance::Medium),
        _ => None,
    }
}

fn parse_certainty(raw: &str) -> Certainty {
    match raw.trim().to_ascii_lowercase().as_str() {
        "estimated" => Certainty::Estimated,
        "secondary" => Certainty::Secondary,
        _ => Certainty::Confirmed,
    }
}

/// Load calendar events. Rows with an impact outside medium/high or an
/// unparseable timestamp are dropped; the remainder is sorted and
/// deduplicated by timestamp (first occurrence kept). An event stamped at
/// UTC midnight is all-day; anything else is hour-precision.
pub fn load_calendar(path: &Path) -> Result<Vec<CalendarEvent>, LoadError> {
    let mut reader = csv::Reader::from_reader(open_reader(path)?);
    let headers = reader.headers()?.clone();

    let ts = column_index(&headers, &["datetime_utc", "datetime"])
        .ok_or(LoadError::MissingColumn("datetime_utc"))?;
    let title = column_index(&headers, &["event", "title"]);
    let country = column_index(&headers, &["country"]);
    let impact = column_index(&headers, &["impact", "importance"])
        .ok_or(LoadError::MissingColumn("impact"))?;
    let certainty = column_index(&headers, &["certainty"]);

    let mut events = Vec::new();
    for record in reader.records() {
        let record = record?;
        let Some(datetime_utc) = record.get(ts).and_then(parse_utc) else {
            continue;
        };
        let Some(importance) = record.get(impact).and_then(|v| parse_importance(v)) else {
            continue;
        };
        let precision = if datetime_utc.time().num_seconds_from_midnight() == 0 {
            EventPrecision::AllDay
        } else {
            EventPrecision::Hour
        };
        events.push(CalendarEvent {
            datetime_utc,
            title: get_or_empty(&record, title),
            country: get_or_empty(&record, country),
            importance,
            certainty: certainty
                .and_then(|i| record.get(i))
                .map(parse_certainty)
                .unwrap_or(Certainty::Confirmed),
            precision,
        });
    }

    events.sort_by_key(|e| e.datetime_utc);
    events.dedup_by_key(|e| e.datetime_utc);
    Ok(events)
}

fn get_or_empty(record: &csv::StringRecord, index: Option<usize>) -> String {
    index
        .and_then(|i| record.get(i))
        .unwrap_or("")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn loads_valid_bars() {
        let f = write_temp(
            "datetime_utc,open,high,low,close,volume\n\
             2024-01-02 00:00:00,1.1,1.2,1.0,1.15,10\n\
             2024-01-02T00:01:00Z,1.15,1.2,1.1,1.18,12\n",
        );
        let bars = load_bars(f.path()).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].timestamp_utc - bars[0].timestamp_utc, chrono::Duration::minutes(1));
    }

    #[test]
    fn duplicate_timestamps_are_malformed() {
        let f = write_temp(
            "datetime_utc,open,high,low,close,volume\n\
             2024-01-02 00:00:00,1.1,1.2,1.0,1.15,10\n\
             2024-01-02 00:00:00,1.1,1.2,1.0,1.15,10\n",
        );
        assert!(matches!(load_bars(f.path()), Err(LoadError::Malformed(_))));
    }

    #[test]
    fn inverted_ohlc_is_malformed() {
        let f = write_temp(
            "datetime_utc,open,high,low,close,volume\n\
             2024-01-02 00:00:00,1.1,0.9,1.0,1.05,10\n",
        );
        assert!(matches!(load_bars(f.path()), Err(LoadError::Malformed(_))));
    }

    #[test]
    fn non_numeric_price_is_rejected() {
        let f = write_temp(
            "datetime_utc,open,high,low,close,volume\n\
             2024-01-02 00:00:00,abc,1.2,1.0,1.15,10\n",
        );
        assert!(matches!(
            load_bars(f.path()),
            Err(LoadError::BadNumber { field: "open", .. })
        ));
    }

    #[test]
    fn calendar_filters_and_classifies_precision() {
        let f = write_temp(
            "datetime_utc,event,country,impact,certainty\n\
             2024-06-07T12:30:00Z,NFP,US,High,confirmed\n\
             2024-06-10T00:00:00Z,Bank Holiday,GB,medium,estimated\n\
             2024-06-11T09:00:00Z,Minor print,DE,low,confirmed\n",
        );
        let events = load_calendar(f.path()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].precision, EventPrecision::Hour);
        assert_eq!(events[0].importance, Importance::High);
        assert_eq!(events[1].precision, EventPrecision::AllDay);
        assert_eq!(events[1].certainty, Certainty::Estimated);
    }

    #[test]
    fn calendar_dedups_by_timestamp() {
        let f = write_temp(
            "datetime_utc,event,country,impact\n\
             2024-06-07T12:30:00Z,NFP,US,high\n\
             2024-06-07T12:30:00Z,NFP repeat,US,high\n",
        );
        let events = load_calendar(f.path()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "NFP");
    }

    #[test]
    fn gz_input_is_transparent() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bars.csv.gz");
        let mut enc = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        enc.write_all(
            b"datetime_utc,open,high,low,close,volume\n\
              2024-01-02 00:00:00,1.1,1.2,1.0,1.15,10\n",
        )
        .unwrap();
        enc.finish().unwrap();
        let bars = load_bars(&path).unwrap();
        assert_eq!(bars.len(), 1);
    }
}
