//! End-to-end determinism: re-running the audit over unchanged inputs must
//! reproduce every artifact byte for byte, and the autofix resplit must be
//! just as reproducible.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Duration, TimeZone, Utc};
use fxaudit_core::domain::MinuteBar;
use fxaudit_runner::config::AuditConfig;
use fxaudit_runner::pipeline::run_audit;
use fxaudit_runner::sha256_file;

const CONFIG: &str = r#"
symbol = "EURUSD"
year = 2024

[scoring.weights]
anomaly_share = 0.5
glitch_share = 0.2
overfilled_weeks = 0.1
autofix = 0.2

[scoring.targets]
anomaly_share = 0.5
glitch_share = 0.01
overfilled_weeks = 1.0
autofix = 1.0
"#;

fn bar(ts: DateTime<Utc>) -> MinuteBar {
    MinuteBar {
        timestamp_utc: ts,
        open: 1.1,
        high: 1.101,
        low: 1.099,
        close: 1.1005,
        volume: 50.0,
    }
}

/// Minute bars covering `[start, end)`.
fn minute_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<MinuteBar> {
    let mut bars = Vec::new();
    let mut t = start;
    while t < end {
        bars.push(bar(t));
        t += Duration::minutes(1);
    }
    bars
}

fn weekday_bars_with_hole() -> Vec<MinuteBar> {
    // Tue Jan 2 and Wed Jan 3 2024, with a 5-minute hole on Jan 3 at noon.
    let mut bars = minute_range(
        Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap(),
    );
    bars.extend(minute_range(
        Utc.with_ymd_and_hms(2024, 1, 3, 12, 5, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 4, 0, 0, 0).unwrap(),
    ));
    bars
}

fn run_into(dir: &Path, bars: &[MinuteBar]) -> fxaudit_runner::pipeline::RunSummary {
    let cfg = AuditConfig::from_toml_str(CONFIG).unwrap();
    let inputs = BTreeMap::from([("bars.csv".to_string(), "feed".to_string())]);
    run_audit(&cfg, bars, &[], &inputs, dir).unwrap()
}

#[test]
fn rerun_reproduces_identical_artifacts() {
    let bars = weekday_bars_with_hole();
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();

    let sum_a = run_into(dir_a.path(), &bars);
    let sum_b = run_into(dir_b.path(), &bars);

    assert_eq!(sum_a.run_id, sum_b.run_id);
    // Year + four quarters.
    assert_eq!(sum_a.periods.len(), 5);

    for (pa, pb) in sum_a.periods.iter().zip(&sum_b.periods) {
        assert_eq!(pa.manifest, pb.manifest, "manifest differs for {}", pa.period.label);
        for artifact in pa.manifest.entries.keys() {
            let fa = pa.artifact_dir.join(artifact);
            if !fa.is_file() {
                continue; // declared input, not written by the run
            }
            assert_eq!(
                sha256_file(&fa).unwrap(),
                sha256_file(&pb.artifact_dir.join(artifact)).unwrap(),
                "artifact {artifact} differs for {}",
                pa.period.label
            );
        }
        assert_eq!(
            sha256_file(&pa.artifact_dir.join("bundle.tar.gz")).unwrap(),
            sha256_file(&pb.artifact_dir.join("bundle.tar.gz")).unwrap()
        );
    }
}

#[test]
fn analysis_timestamp_is_max_observed_bar() {
    let bars = weekday_bars_with_hole();
    let dir = tempfile::tempdir().unwrap();
    let summary = run_into(dir.path(), &bars);
    assert_eq!(summary.analysis_ts, bars.last().unwrap().timestamp_utc);
}

#[test]
fn autofix_strips_weekend_rows_and_reruns_identically() {
    let mut bars = weekday_bars_with_hole();
    // Rows inside the Fri 22:00 → Sun 22:00 closure (Sat Jan 6 noon):
    // the source is unclean, autofix must kick in.
    bars.extend(minute_range(
        Utc.with_ymd_and_hms(2024, 1, 6, 12, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 6, 12, 30, 0).unwrap(),
    ));

    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let sum_a = run_into(dir_a.path(), &bars);
    let sum_b = run_into(dir_b.path(), &bars);

    let q1_a = &sum_a.periods[1];
    assert_eq!(q1_a.period.label, "2024Q1");
    assert!(q1_a.autofix_triggered);

    let clean = q1_a.artifact_dir.join("2024Q1_clean.csv.gz");
    assert!(clean.is_file());
    // Identical autofix output across reruns.
    assert_eq!(
        sha256_file(&clean).unwrap(),
        sha256_file(&sum_b.periods[1].artifact_dir.join("2024Q1_clean.csv.gz")).unwrap()
    );
    // The raw slice is still written untouched alongside the clean one.
    assert!(q1_a.artifact_dir.join("2024Q1.csv.gz").is_file());
}

#[test]
fn clean_input_does_not_trigger_autofix() {
    let bars = weekday_bars_with_hole();
    let dir = tempfile::tempdir().unwrap();
    let summary = run_into(dir.path(), &bars);
    let q1 = &summary.periods[1];
    assert!(!q1.autofix_triggered);
    assert!(!q1.artifact_dir.join("2024Q1_clean.csv.gz").exists());
}

#[test]
fn manifest_covers_declared_inputs_and_outputs() {
    let bars = weekday_bars_with_hole();
    let dir = tempfile::tempdir().unwrap();
    let summary = run_into(dir.path(), &bars);
    let q1 = &summary.periods[1];
    assert_eq!(q1.manifest.entries.get("bars.csv"), Some(&"feed".to_string()));
    assert!(q1.manifest.entries.contains_key("2024Q1.csv.gz"));
    assert!(q1.manifest.entries.contains_key("anomalies.svgz"));
    assert!(q1.manifest.entries.contains_key("summary.md"));
    // The bundle wraps the manifest, so it cannot be inside it.
    assert!(!q1.manifest.entries.contains_key("bundle.tar.gz"));
}
