//! Gap-summary report — typed context and strict template rendering.
//!
//! The context is a plain struct with statically enumerable fields; the
//! renderer substitutes `{{name}}` placeholders and then refuses to emit
//! anything if a placeholder survives. There is no late-bound key lookup:
//! a template asking for a section the context does not declare is a fatal
//! Template-Resolution-Failure, never a silent blank.

use std::collections::BTreeMap;
use thiserror::Error;

use chrono::{DateTime, Datelike, Utc};
use fxaudit_core::checks::GlitchBar;
use fxaudit_core::domain::{ClassifiedGap, GapLabel, MinuteBar};
use fxaudit_core::score::ScoreCard;
use fxaudit_core::session::Session;

/// Built-in summary template.
pub const GAP_SUMMARY_TEMPLATE: &str = include_str!("../templates/gap_summary.md");

/// Everything the summary template can reference, one field per placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportContext {
    pub symbol: String,
    pub period: String,
    /// Max observed input bar timestamp — never wall clock.
    pub analysis_timestamp: String,
    pub run_id: String,
    pub gap_classification: String,
    pub durations_section: String,
    pub sessions_table: String,
    pub monthly_table: String,
    pub extreme_candles: String,
    pub maintenance_check: String,
    pub scorecard: String,
    pub gap_table: String,
}

impl ReportContext {
    /// The statically enumerable placeholder set.
    pub fn fields(&self) -> [(&'static str, &str); 12] {
        [
            ("symbol", &self.symbol),
            ("period", &self.period),
            ("analysis_timestamp", &self.analysis_timestamp),
            ("run_id", &self.run_id),
            ("gap_classification", &self.gap_classification),
            ("durations_section", &self.durations_section),
            ("sessions_table", &self.sessions_table),
            ("monthly_table", &self.monthly_table),
            ("extreme_candles", &self.extreme_candles),
            ("maintenance_check", &self.maintenance_check),
            ("scorecard", &self.scorecard),
            ("gap_table", &self.gap_table),
        ]
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReportError {
    #[error("unresolved template placeholders: {0:?}")]
    UnresolvedPlaceholders(Vec<String>),
}

/// Substitute every context field, then fail on any surviving `{{...}}`.
pub fn render(template: &str, ctx: &ReportContext) -> Result<String, ReportError> {
    let mut out = template.to_string();
    for (name, value) in ctx.fields() {
        out = out.replace(&format!("{{{{{name}}}}}"), value);
    }
    let leftovers = scan_placeholders(&out);
    if leftovers.is_empty() {
        Ok(out)
    } else {
        Err(ReportError::UnresolvedPlaceholders(leftovers))
    }
}

fn scan_placeholders(text: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        let tail = &rest[start + 2..];
        match tail.find("}}") {
            Some(end) => {
                let name = tail[..end].to_string();
                if !found.contains(&name) {
                    found.push(name);
                }
                rest = &tail[end + 2..];
            }
            None => break,
        }
    }
    found
}

// ── Section builders ─────────────────────────────────────────────────

pub fn classification_section(classified: &[ClassifiedGap]) -> String {
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for label in [
        GapLabel::Weekend,
        GapLabel::Holiday,
        GapLabel::Maintenance,
        GapLabel::News,
        GapLabel::Anomaly,
    ] {
        counts.insert(label.as_str(), 0);
    }
    for cg in classified {
        *counts.entry(cg.label.as_str()).or_insert(0) += 1;
    }
    let mut out = String::from("| Label | Count |\n|---|---:|\n");
    // Fixed cascade order, not BTreeMap order.
    for label in ["weekend", "holiday", "maintenance", "news", "anomaly"] {
        out.push_str(&format!("| {} | {} |\n", label, counts[label]));
    }
    out.push_str(&format!("| total | {} |\n", classified.len()));
    out
}

/// Histogram over gaps the cascade did not explain as weekend or holiday.
pub fn durations_section(classified: &[ClassifiedGap]) -> String {
    let mut secs: Vec<i64> = classified
        .iter()
        .filter(|c| !matches!(c.label, GapLabel::Weekend | GapLabel::Holiday))
        .map(|c| c.gap.length_secs())
        .collect();
    secs.sort_unstable();
    if secs.is_empty() {
        return "_No gaps_".to_string();
    }
    let bucket = |lo: i64, hi: i64| secs.iter().filter(|s| **s > lo && **s <= hi).count();
    let over_hour = secs.iter().filter(|s| **s > 3600).count();
    let pct = |q: f64| -> i64 {
        let rank = ((q * secs.len() as f64).ceil() as usize).clamp(1, secs.len());
        secs[rank - 1]
    };
    let max = *secs.last().expect("non-empty");
    format!(
        "**Buckets (counts)**  \n\
         - 1-2 min: {}\n- 2-5 min: {}\n- 6-60 min: {}\n- >60 min: {}\n\n\
         **Percentiles (sec)**  p50={}, p90={}, p99={}, max={} (~{:.2} hours).",
        bucket(60, 120),
        bucket(120, 300),
        bucket(300, 3600),
        over_hour,
        pct(0.50),
        pct(0.90),
        pct(0.99),
        max,
        max as f64 / 3600.0,
    )
}

/// Session attribution of anomaly gap starts.
pub fn sessions_section(classified: &[ClassifiedGap]) -> String {
    let mut counts: BTreeMap<Session, usize> = BTreeMap::new();
    for cg in classified.iter().filter(|c| c.label == GapLabel::Anomaly) {
        *counts.entry(Session::of(cg.gap.start_ts)).or_insert(0) += 1;
    }
    if counts.is_empty() {
        return "_No anomaly gaps_".to_string();
    }
    let total: usize = counts.values().sum();
    let mut out = String::from("| Session | Count | % |\n|---|---:|---:|\n");
    for (session, count) in &counts {
        out.push_str(&format!(
            "| {} | {} | {:.2}% |\n",
            session.label(),
            count,
            100.0 * *count as f64 / total as f64
        ));
    }
    out
}

/// Rows and gap counts per month of the period slice.
pub fn monthly_section(bars: &[MinuteBar], classified: &[ClassifiedGap]) -> String {
    let mut rows: BTreeMap<(i32, u32), (usize, usize)> = BTreeMap::new();
    for bar in bars {
        rows.entry((bar.timestamp_utc.year(), bar.timestamp_utc.month()))
            .or_insert((0, 0))
            .0 += 1;
    }
    for cg in classified {
        rows.entry((cg.gap.start_ts.year(), cg.gap.start_ts.month()))
            .or_insert((0, 0))
            .1 += 1;
    }
    if rows.is_empty() {
        return "_No data_".to_string();
    }
    let mut out = String::from("| Month | Rows | Gaps |\n|---|---:|---:|\n");
    for ((year, month), (bars, gaps)) in &rows {
        out.push_str(&format!("| {year}-{month:02} | {bars} | {gaps} |\n"));
    }
    out
}

/// Widest-range suspect candles, worst first, capped at five.
pub fn extreme_candles_section(glitches: &[GlitchBar]) -> String {
    if glitches.is_empty() {
        return "_No suspect candles_".to_string();
    }
    let mut sorted: Vec<&GlitchBar> = glitches.iter().collect();
    sorted.sort_by(|a, b| {
        b.ratio
            .partial_cmp(&a.ratio)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.timestamp_utc.cmp(&b.timestamp_utc))
    });
    let mut out = String::from("| Timestamp (UTC) | Range | Day median | Ratio |\n|---|---:|---:|---:|\n");
    for g in sorted.iter().take(5) {
        out.push_str(&format!(
            "| {} | {:.5} | {:.5} | {:.1}x |\n",
            g.timestamp_utc.to_rfc3339(),
            g.range,
            g.median_range,
            g.ratio
        ));
    }
    out
}

/// One row per configured maintenance window: recurrence and match counts.
pub struct MaintenanceCheckRow {
    pub description: String,
    pub occurrences: usize,
    pub eligible: bool,
    pub matched_gaps: usize,
}

pub fn maintenance_section(rows: &[MaintenanceCheckRow]) -> String {
    if rows.is_empty() {
        return "_No maintenance windows configured_".to_string();
    }
    let mut out =
        String::from("| Window | Occurrences | Eligible | Matched gaps |\n|---|---:|---|---:|\n");
    for row in rows {
        out.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            row.description,
            row.occurrences,
            if row.eligible { "yes" } else { "no (needs 8)" },
            row.matched_gaps
        ));
    }
    out
}

pub fn scorecard_section(card: &ScoreCard) -> String {
    let mut out = format!("**Score (0-100): {:.1}**\n\n", card.total);
    out.push_str("| Component | Value | Target | Weight | Score |\n|---|---:|---:|---:|---:|\n");
    for (name, outcome) in &card.components {
        out.push_str(&format!(
            "| {} | {:.4} | {:.4} | {:.2} | {:.1} |\n",
            name, outcome.value, outcome.target, outcome.weight, outcome.score
        ));
    }
    out
}

/// Full gap listing with labels and flags.
pub fn gap_table_section(classified: &[ClassifiedGap]) -> String {
    if classified.is_empty() {
        return "_No gaps_".to_string();
    }
    let mut out =
        String::from("| # | Start UTC | End UTC | Secs | Label | Flags |\n|---:|---|---|---:|---|---|\n");
    for (i, cg) in classified.iter().enumerate() {
        let flags = if cg.flags.is_empty() {
            String::new()
        } else {
            cg.flags
                .iter()
                .map(|f| format!("{f:?}"))
                .collect::<Vec<_>>()
                .join(", ")
        };
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            i + 1,
            cg.gap.start_ts.to_rfc3339(),
            cg.gap.end_ts.to_rfc3339(),
            cg.gap.length_secs(),
            cg.label.as_str(),
            flags
        ));
    }
    out
}

/// RFC 3339 string for the report header.
pub fn format_analysis_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}
