//! Per-period audit pipeline.
//!
//! One period is a single-threaded, synchronous computation:
//! slice → detect → classify → extra-checks → score → artifacts. Periods
//! have no data dependency on each other, so quarters (and partial-year
//! months) run in parallel over the same read-only bar slice.
//!
//! All-or-nothing: the report is rendered and the manifest assembled before
//! any file is written, so a failing placeholder or score aborts the period
//! without leaving partial artifacts behind.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use thiserror::Error;

use fxaudit_core::checks::{
    dst_transitions, flag_dst_effect, flag_ny_rollover, glitch_bars, overfilled_weeks, GlitchBar,
    OverfilledWeek,
};
use fxaudit_core::detect::find_gaps;
use fxaudit_core::domain::{CalendarEvent, ClassifiedGap, GapLabel, MinuteBar};
use fxaudit_core::holidays::holiday_windows;
use fxaudit_core::period::{Period, PeriodError};
use fxaudit_core::score::{build_scorecard, ScoreCard, ScoreError};
use fxaudit_core::window::UtcWindow;
use fxaudit_core::Cascade;

use crate::artifacts::{
    bars_to_csv, gzip_deterministic, render_anomaly_chart, sha256_hex, tar_gz_deterministic,
    Manifest,
};
use crate::config::{AuditConfig, ConfigError, ResolvedRules, RunWarning};
use crate::report::{
    self, MaintenanceCheckRow, ReportContext, ReportError, GAP_SUMMARY_TEMPLATE,
};

// ─── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Period(#[from] PeriodError),
    #[error(transparent)]
    Score(#[from] ScoreError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error(
        "boundary violation: {left} ends at {left_end} but {right} starts at {right_start}"
    )]
    Boundary {
        left: String,
        left_end: DateTime<Utc>,
        right: String,
        right_start: DateTime<Utc>,
    },
    #[error("no bars inside the audited year {0}")]
    EmptyYear(i32),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Results ─────────────────────────────────────────────────────────

/// Outcome of one period's audit.
#[derive(Debug)]
pub struct PeriodReport {
    pub period: Period,
    pub classified: Vec<ClassifiedGap>,
    pub glitches: Vec<GlitchBar>,
    pub overfilled: Vec<OverfilledWeek>,
    pub scorecard: ScoreCard,
    pub autofix_triggered: bool,
    pub artifact_dir: PathBuf,
    pub manifest: Manifest,
}

/// Outcome of the whole run.
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: String,
    /// Max observed input bar timestamp — the run's analysis clock.
    pub analysis_ts: DateTime<Utc>,
    pub warnings: Vec<RunWarning>,
    pub periods: Vec<PeriodReport>,
}

// ─── Shared rule state ───────────────────────────────────────────────

/// Windows and metadata resolved once per run and shared read-only by the
/// period workers.
struct RuleSet {
    weekend: Vec<UtcWindow>,
    holiday: Vec<UtcWindow>,
    /// Per configured maintenance window: description, total occurrences in
    /// the dataset span, and its UTC occurrences when eligible.
    maintenance: Vec<MaintenanceEntry>,
    news: Vec<UtcWindow>,
    transitions: Vec<DateTime<Utc>>,
    expected_weekend: Duration,
    glitch_multiplier: f64,
    metric_specs: BTreeMap<String, fxaudit_core::score::MetricSpec>,
}

struct MaintenanceEntry {
    description: String,
    occurrences: usize,
    eligible_windows: Option<Vec<UtcWindow>>,
}

fn build_rules(
    cfg: &AuditConfig,
    rules: &ResolvedRules,
    bars: &[MinuteBar],
    events: &[CalendarEvent],
) -> RuleSet {
    let data_start = bars.first().map(|b| b.timestamp_utc).unwrap_or_default();
    let data_end = bars
        .last()
        .map(|b| b.timestamp_utc + Duration::minutes(1))
        .unwrap_or_default();

    let margin = Duration::days(7);
    let weekend = rules.weekly.occurrences(data_start - margin, data_end + margin);

    // Holidays of the adjacent years too: a Q4 gap can run into the next
    // year's New Year closure.
    let mut holiday = Vec::new();
    for year in (cfg.year - 1)..=(cfg.year + 1) {
        holiday.extend(holiday_windows(year, &rules.holiday_policy));
    }
    holiday.sort_by_key(|w| w.start);

    let maintenance = rules
        .maintenance
        .iter()
        .map(|tw| {
            let occurrences = tw.occurrences(data_start, data_end).len();
            MaintenanceEntry {
                description: format!(
                    "{:?} {:02}:{:02}-{:02}:{:02} {}",
                    tw.weekday,
                    tw.start_minute / 60,
                    tw.start_minute % 60,
                    tw.end_minute / 60,
                    tw.end_minute % 60,
                    tw.tz
                ),
                occurrences,
                eligible_windows: tw.eligible_occurrences(data_start, data_end),
            }
        })
        .collect();

    let news = events.iter().map(CalendarEvent::window).collect();

    let transitions = dst_transitions(rules.session_tz, data_start - margin, data_end + margin);

    RuleSet {
        weekend,
        holiday,
        maintenance,
        news,
        transitions,
        expected_weekend: rules.weekly.expected_length(),
        glitch_multiplier: rules.glitch_multiplier,
        metric_specs: rules.metric_specs.clone(),
    }
}

impl RuleSet {
    fn cascade(&self) -> Cascade {
        let maintenance: Vec<UtcWindow> = self
            .maintenance
            .iter()
            .filter_map(|m| m.eligible_windows.as_deref())
            .flatten()
            .copied()
            .collect();
        Cascade::fx(
            self.weekend.clone(),
            self.holiday.clone(),
            maintenance,
            self.news.clone(),
        )
    }

    /// True if the bar sits inside a weekend or holiday closure — a row a
    /// clean session-only file must not contain.
    fn in_closed_session(&self, bar: &MinuteBar) -> bool {
        self.weekend.iter().any(|w| w.contains(bar.timestamp_utc))
            || self.holiday.iter().any(|w| w.contains(bar.timestamp_utc))
    }
}

// ─── Entry point ─────────────────────────────────────────────────────

/// Run the full audit: four quarters plus any designated partial-year
/// months, artifacts under `out_dir/<period label>/`.
///
/// `input_digests` declares the run's external inputs (source files, config)
/// for inclusion in every period manifest.
pub fn run_audit(
    cfg: &AuditConfig,
    bars: &[MinuteBar],
    events: &[CalendarEvent],
    input_digests: &BTreeMap<String, String>,
    out_dir: &Path,
) -> Result<RunSummary, PipelineError> {
    let resolved = cfg.resolve()?;

    let year = Period::year(cfg.year)?;
    let quarters: Vec<Period> = (1..=4)
        .map(|q| Period::quarter(cfg.year, q))
        .collect::<Result<_, _>>()?;
    check_tiling(&year, &quarters)?;

    let year_bars = year.slice(bars);
    if year_bars.is_empty() {
        return Err(PipelineError::EmptyYear(cfg.year));
    }
    let analysis_ts = bars
        .last()
        .map(|b| b.timestamp_utc)
        .expect("non-empty by the check above");

    let rules = build_rules(cfg, &resolved, bars, events);

    // The year report plus the four quarters. Quarterly output is never
    // altered by the partial-year months; those month windows are simply
    // computed alongside their enclosing quarters.
    let mut periods = vec![year];
    periods.extend(quarters);
    for m in &cfg.partial.months {
        periods.push(Period::month(cfg.year, *m)?);
    }

    let run_id = cfg.run_id();
    let reports: Result<Vec<PeriodReport>, PipelineError> = periods
        .par_iter()
        .map(|period| {
            process_period(
                period, cfg, &rules, bars, input_digests, &run_id, analysis_ts, out_dir,
            )
        })
        .collect();

    Ok(RunSummary {
        run_id,
        analysis_ts,
        warnings: resolved.warnings,
        periods: reports?,
    })
}

/// Quarters must tile the year exactly: no overlap, no missing coverage at
/// the seams. Violations surface with the offending bounds.
fn check_tiling(year: &Period, quarters: &[Period]) -> Result<(), PipelineError> {
    let mut prev_end = year.start;
    let mut prev_label = year.label.clone();
    for q in quarters {
        if q.start != prev_end {
            return Err(PipelineError::Boundary {
                left: prev_label,
                left_end: prev_end,
                right: q.label.clone(),
                right_start: q.start,
            });
        }
        prev_end = q.end;
        prev_label = q.label.clone();
    }
    if prev_end != year.end {
        return Err(PipelineError::Boundary {
            left: prev_label,
            left_end: prev_end,
            right: year.label.clone(),
            right_start: year.end,
        });
    }
    Ok(())
}

// ─── Per-period worker ───────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn process_period(
    period: &Period,
    cfg: &AuditConfig,
    rules: &RuleSet,
    bars: &[MinuteBar],
    input_digests: &BTreeMap<String, String>,
    run_id: &str,
    analysis_ts: DateTime<Utc>,
    out_dir: &Path,
) -> Result<PeriodReport, PipelineError> {
    let slice = period.slice(bars);

    // Detect and classify.
    let gaps = find_gaps(slice);
    let cascade = rules.cascade();
    let mut classified = cascade.classify_all(&gaps);

    // Read-only extra checks.
    flag_dst_effect(&mut classified, rules.expected_weekend, &rules.transitions);
    flag_ny_rollover(&mut classified);
    let glitches = glitch_bars(slice, rules.glitch_multiplier);
    let overfilled = overfilled_weeks(slice);

    // Slice validation: session-closed rows in the source trigger the
    // deterministic autofix (cleaned, gap-preserving resplit). Malformed
    // input never reaches this point — ingestion already rejected it.
    let clean: Vec<MinuteBar> = slice
        .iter()
        .filter(|b| !rules.in_closed_session(b))
        .cloned()
        .collect();
    let autofix_triggered = clean.len() != slice.len();

    // Score.
    let values = metric_values(slice, &classified, &glitches, &overfilled, autofix_triggered);
    let scorecard = build_scorecard(&values, &rules.metric_specs)?;

    // Stage every artifact in memory; nothing touches disk until the report
    // has rendered and the manifest is complete.
    let mut staged: Vec<(String, Vec<u8>)> = Vec::new();

    let raw_csv = bars_to_csv(slice);
    staged.push((
        format!("{}.csv.gz", period.label),
        gzip_deterministic(raw_csv.as_bytes())?,
    ));
    if autofix_triggered {
        let clean_csv = bars_to_csv(&clean);
        staged.push((
            format!("{}_clean.csv.gz", period.label),
            gzip_deterministic(clean_csv.as_bytes())?,
        ));
    }

    let svg = render_anomaly_chart(period, &classified);
    staged.push(("anomalies.svgz".to_string(), gzip_deterministic(svg.as_bytes())?));

    let maintenance_rows: Vec<MaintenanceCheckRow> = rules
        .maintenance
        .iter()
        .map(|entry| MaintenanceCheckRow {
            description: entry.description.clone(),
            occurrences: entry.occurrences,
            eligible: entry.eligible_windows.is_some(),
            matched_gaps: entry
                .eligible_windows
                .as_deref()
                .map(|wins| {
                    classified
                        .iter()
                        .filter(|c| wins.iter().any(|w| w.matches_gap(&c.gap)))
                        .count()
                })
                .unwrap_or(0),
        })
        .collect();

    let context = ReportContext {
        symbol: cfg.symbol.clone(),
        period: period.label.clone(),
        analysis_timestamp: report::format_analysis_ts(analysis_ts),
        run_id: run_id.to_string(),
        gap_classification: report::classification_section(&classified),
        durations_section: report::durations_section(&classified),
        sessions_table: report::sessions_section(&classified),
        monthly_table: report::monthly_section(slice, &classified),
        extreme_candles: report::extreme_candles_section(&glitches),
        maintenance_check: report::maintenance_section(&maintenance_rows),
        scorecard: report::scorecard_section(&scorecard),
        gap_table: report::gap_table_section(&classified),
    };
    // Template failure aborts before any write.
    let summary = report::render(GAP_SUMMARY_TEMPLATE, &context)?;
    staged.push(("summary.md".to_string(), summary.into_bytes()));

    // Manifest: declared inputs plus every staged artifact.
    let mut manifest = Manifest::default();
    for (name, digest) in input_digests {
        manifest.insert(name.clone(), digest.clone());
    }
    for (name, bytes) in &staged {
        manifest.insert(name.clone(), sha256_hex(bytes));
    }

    // Single write phase: artifacts, manifest, then the bundle over both.
    let artifact_dir = out_dir.join(&period.label);
    std::fs::create_dir_all(&artifact_dir)?;
    for (name, bytes) in &staged {
        std::fs::write(artifact_dir.join(name), bytes)?;
    }
    std::fs::write(artifact_dir.join("manifest.json"), manifest.to_json())?;

    let mut bundle_inputs = staged;
    bundle_inputs.push(("manifest.json".to_string(), manifest.to_json().into_bytes()));
    let bundle = tar_gz_deterministic(&bundle_inputs)?;
    std::fs::write(artifact_dir.join("bundle.tar.gz"), bundle)?;

    Ok(PeriodReport {
        period: period.clone(),
        classified,
        glitches,
        overfilled,
        scorecard,
        autofix_triggered,
        artifact_dir,
        manifest,
    })
}

/// The standard metric inputs. Scoring only consumes the ones the config
/// weights; asking for anything else is an invalid configuration.
fn metric_values(
    bars: &[MinuteBar],
    classified: &[ClassifiedGap],
    glitches: &[GlitchBar],
    overfilled: &[OverfilledWeek],
    autofix_triggered: bool,
) -> BTreeMap<String, f64> {
    let total_gaps = classified.len();
    let anomalies = classified
        .iter()
        .filter(|c| c.label == GapLabel::Anomaly)
        .count();
    let mut values = BTreeMap::new();
    values.insert(
        "anomaly_share".to_string(),
        if total_gaps > 0 {
            anomalies as f64 / total_gaps as f64
        } else {
            0.0
        },
    );
    values.insert(
        "glitch_share".to_string(),
        if bars.is_empty() {
            0.0
        } else {
            glitches.len() as f64 / bars.len() as f64
        },
    );
    values.insert("overfilled_weeks".to_string(), overfilled.len() as f64);
    values.insert(
        "autofix".to_string(),
        if autofix_triggered { 1.0 } else { 0.0 },
    );
    values
}
