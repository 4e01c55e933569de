//! Audit run configuration (TOML) and its resolution into engine rules.
//!
//! The raw [`AuditConfig`] is plain serde data: timezone names and window
//! tokens stay strings so a config file round-trips untouched and hashes
//! stably. [`AuditConfig::resolve`] turns it into engine types, falling back
//! to UTC (with a recorded warning) when a timezone name does not resolve —
//! a bad timezone never aborts the run.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fxaudit_core::score::MetricSpec;
use fxaudit_core::window::{TechWindow, UtcWindow, WeekTime, WeeklyWindow};
use fxaudit_core::HolidayPolicy;

/// Unique identifier for an audit run (content-addressable hash).
pub type RunId = String;

/// Top-level configuration document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditConfig {
    /// Instrument symbol, used in artifact paths.
    pub symbol: String,

    /// The audited calendar year.
    pub year: i32,

    /// IANA timezone of the trading venue's clock; drives the DST-effect
    /// check. Defaults to New York.
    #[serde(default = "default_session_tz")]
    pub session_tz: String,

    /// Weekly market-closed window, UTC-anchored tokens.
    #[serde(default)]
    pub weekly_closure: WeeklyClosureConfig,

    /// Holiday policy.
    #[serde(default)]
    pub holidays: HolidaysConfig,

    /// Recurring maintenance window definitions.
    #[serde(default)]
    pub maintenance: Vec<MaintenanceConfig>,

    /// Extra-check knobs.
    #[serde(default)]
    pub checks: ChecksConfig,

    /// Designated partial year: months that get their own monthly artifacts
    /// in addition to the enclosing quarter's.
    #[serde(default)]
    pub partial: PartialYearConfig,

    /// Scorecard weights and targets.
    pub scoring: ScoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeeklyClosureConfig {
    pub start: String,
    pub end: String,
}

impl Default for WeeklyClosureConfig {
    fn default() -> Self {
        Self {
            start: "Fri 22:00".to_string(),
            end: "Sun 22:00".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HolidaysConfig {
    #[serde(default)]
    pub extended: bool,
    /// Explicit closures as `"<rfc3339> -> <rfc3339>"` ranges.
    #[serde(default)]
    pub extra_closures: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaintenanceConfig {
    /// Three-letter weekday token (`Mon`..`Sun`).
    pub weekday: String,
    /// Local start time `HH:MM`.
    pub start: String,
    /// Local end time `HH:MM`; at or before `start` means the window crosses
    /// midnight.
    pub end: String,
    /// IANA timezone of the window's wall clock.
    pub tz: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChecksConfig {
    pub glitch_multiplier: f64,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            glitch_multiplier: fxaudit_core::DEFAULT_GLITCH_MULTIPLIER,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PartialYearConfig {
    #[serde(default)]
    pub months: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoringConfig {
    pub weights: BTreeMap<String, f64>,
    pub targets: BTreeMap<String, f64>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid weekly closure token: {0}")]
    WeeklyToken(#[from] fxaudit_core::WeekTimeParseError),
    #[error("invalid weekday token {0:?}")]
    Weekday(String),
    #[error("invalid time token {0:?}, expected HH:MM")]
    Time(String),
    #[error("invalid extra closure {0:?}, expected \"<rfc3339> -> <rfc3339>\"")]
    ExtraClosure(String),
    #[error("scoring metric {0:?} has a weight but no target")]
    MissingTarget(String),
    #[error("partial-year month {0} is out of range 1..=12")]
    PartialMonth(u32),
}

/// A recoverable condition recorded during resolution or a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunWarning {
    pub message: String,
}

/// Engine-ready rules resolved from an [`AuditConfig`].
#[derive(Debug, Clone)]
pub struct ResolvedRules {
    pub weekly: WeeklyWindow,
    pub holiday_policy: HolidayPolicy,
    pub maintenance: Vec<TechWindow>,
    pub session_tz: Tz,
    pub glitch_multiplier: f64,
    pub metric_specs: BTreeMap<String, MetricSpec>,
    pub warnings: Vec<RunWarning>,
}

impl AuditConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Deterministic content hash of the configuration. Two runs with an
    /// identical config share a RunId, so their artifacts are comparable.
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_string(self).expect("AuditConfig serialization cannot fail");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }

    /// Resolve string tokens into engine types. Timezone names that fail to
    /// resolve fall back to UTC with a recorded warning; everything else
    /// malformed is a hard [`ConfigError`].
    pub fn resolve(&self) -> Result<ResolvedRules, ConfigError> {
        let mut warnings = Vec::new();

        let weekly = WeeklyWindow {
            start: WeekTime::from_str(&self.weekly_closure.start)?,
            end: WeekTime::from_str(&self.weekly_closure.end)?,
        };

        let mut extra = Vec::new();
        for raw in &self.holidays.extra_closures {
            extra.push(parse_closure_range(raw)?);
        }
        let holiday_policy = HolidayPolicy {
            extended: self.holidays.extended,
            extra_closures: extra,
        };

        let mut maintenance = Vec::new();
        for m in &self.maintenance {
            maintenance.push(TechWindow {
                weekday: parse_weekday(&m.weekday)?,
                start_minute: parse_hhmm(&m.start)?,
                end_minute: parse_hhmm(&m.end)?,
                tz: resolve_tz(&m.tz, &mut warnings),
            });
        }

        let session_tz = resolve_tz(&self.session_tz, &mut warnings);

        let mut metric_specs = BTreeMap::new();
        for (name, weight) in &self.scoring.weights {
            let target = *self
                .scoring
                .targets
                .get(name)
                .ok_or_else(|| ConfigError::MissingTarget(name.clone()))?;
            metric_specs.insert(
                name.clone(),
                MetricSpec {
                    weight: *weight,
                    target,
                },
            );
        }

        for m in &self.partial.months {
            if !(1..=12).contains(m) {
                return Err(ConfigError::PartialMonth(*m));
            }
        }

        Ok(ResolvedRules {
            weekly,
            holiday_policy,
            maintenance,
            session_tz,
            glitch_multiplier: self.checks.glitch_multiplier,
            metric_specs,
            warnings,
        })
    }
}

fn default_session_tz() -> String {
    "America/New_York".to_string()
}

/// Timezone-Resolution-Failure recovery: fall back to UTC, record a warning.
fn resolve_tz(name: &str, warnings: &mut Vec<RunWarning>) -> Tz {
    match name.parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            warnings.push(RunWarning {
                message: format!("unknown timezone {name:?}, falling back to UTC"),
            });
            chrono_tz::UTC
        }
    }
}

fn parse_weekday(token: &str) -> Result<Weekday, ConfigError> {
    match token {
        "Mon" => Ok(Weekday::Mon),
        "Tue" => Ok(Weekday::Tue),
        "Wed" => Ok(Weekday::Wed),
        "Thu" => Ok(Weekday::Thu),
        "Fri" => Ok(Weekday::Fri),
        "Sat" => Ok(Weekday::Sat),
        "Sun" => Ok(Weekday::Sun),
        other => Err(ConfigError::Weekday(other.to_string())),
    }
}

fn parse_hhmm(token: &str) -> Result<u32, ConfigError> {
    let err = || ConfigError::Time(token.to_string());
    let (hh, mm) = token.split_once(':').ok_or_else(err)?;
    let hh: u32 = hh.parse().map_err(|_| err())?;
    let mm: u32 = mm.parse().map_err(|_| err())?;
    if hh > 23 || mm > 59 {
        return Err(err());
    }
    Ok(hh * 60 + mm)
}

fn parse_closure_range(raw: &str) -> Result<UtcWindow, ConfigError> {
    let err = || ConfigError::ExtraClosure(raw.to_string());
    let (a, b) = raw.split_once("->").ok_or_else(err)?;
    let start = parse_rfc3339(a.trim()).ok_or_else(err)?;
    let end = parse_rfc3339(b.trim()).ok_or_else(err)?;
    if end <= start {
        return Err(err());
    }
    Ok(UtcWindow { start, end })
}

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
symbol = "EURUSD"
year = 2024

[weekly_closure]
start = "Fri 22:00"
end = "Sun 22:00"

[holidays]
extended = true
extra_closures = ["2024-07-04T00:00:00Z -> 2024-07-05T00:00:00Z"]

[[maintenance]]
weekday = "Sat"
start = "05:00"
end = "07:00"
tz = "America/New_York"

[checks]
glitch_multiplier = 25.0

[partial]
months = [7]

[scoring.weights]
anomaly_share = 0.6
glitch_share = 0.4

[scoring.targets]
anomaly_share = 0.25
glitch_share = 0.01
"#;

    #[test]
    fn sample_config_parses_and_resolves() {
        let cfg = AuditConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(cfg.symbol, "EURUSD");
        assert_eq!(cfg.session_tz, "America/New_York");
        let rules = cfg.resolve().unwrap();
        assert!(rules.warnings.is_empty());
        assert_eq!(rules.maintenance.len(), 1);
        assert_eq!(rules.maintenance[0].start_minute, 5 * 60);
        assert_eq!(rules.glitch_multiplier, 25.0);
        assert_eq!(rules.metric_specs.len(), 2);
        assert_eq!(rules.holiday_policy.extra_closures.len(), 1);
    }

    #[test]
    fn run_id_is_deterministic_and_config_sensitive() {
        let cfg = AuditConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(cfg.run_id(), cfg.run_id());
        let mut other = cfg.clone();
        other.year = 2023;
        assert_ne!(cfg.run_id(), other.run_id());
    }

    #[test]
    fn unknown_timezone_falls_back_to_utc_with_warning() {
        let mut cfg = AuditConfig::from_toml_str(SAMPLE).unwrap();
        cfg.session_tz = "Mars/Olympus_Mons".to_string();
        let rules = cfg.resolve().unwrap();
        assert_eq!(rules.session_tz, chrono_tz::UTC);
        assert_eq!(rules.warnings.len(), 1);
        assert!(rules.warnings[0].message.contains("Mars/Olympus_Mons"));
    }

    #[test]
    fn weight_without_target_is_rejected() {
        let mut cfg = AuditConfig::from_toml_str(SAMPLE).unwrap();
        cfg.scoring.targets.remove("glitch_share");
        assert!(matches!(
            cfg.resolve(),
            Err(ConfigError::MissingTarget(name)) if name == "glitch_share"
        ));
    }

    #[test]
    fn bad_closure_range_is_rejected() {
        let mut cfg = AuditConfig::from_toml_str(SAMPLE).unwrap();
        cfg.holidays.extra_closures = vec!["not a range".to_string()];
        assert!(matches!(cfg.resolve(), Err(ConfigError::ExtraClosure(_))));
    }

    #[test]
    fn partial_month_out_of_range_is_rejected() {
        let mut cfg = AuditConfig::from_toml_str(SAMPLE).unwrap();
        cfg.partial.months = vec![13];
        assert!(matches!(cfg.resolve(), Err(ConfigError::PartialMonth(13))));
    }

    #[test]
    fn defaults_cover_optional_sections() {
        let minimal = r#"
symbol = "EURUSD"
year = 2024

[scoring.weights]
anomaly_share = 1.0

[scoring.targets]
anomaly_share = 0.25
"#;
        let cfg = AuditConfig::from_toml_str(minimal).unwrap();
        assert_eq!(cfg.weekly_closure, WeeklyClosureConfig::default());
        assert_eq!(cfg.checks.glitch_multiplier, 30.0);
        assert!(cfg.maintenance.is_empty());
        assert!(cfg.partial.months.is_empty());
    }
}
