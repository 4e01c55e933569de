//! FxAudit CLI — run and verify commands.
//!
//! Commands:
//! - `run` — audit a year of minute bars against a TOML config and emit
//!   deterministic artifacts per period
//! - `verify` — recompute SHA-256 digests against a period's manifest

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use fxaudit_runner::pipeline::run_audit;
use fxaudit_runner::{load_bars, load_calendar, sha256_file, AuditConfig, Manifest};

#[derive(Parser)]
#[command(name = "fxaudit", about = "FxAudit CLI — FX minute-bar gap audit")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Audit one year of minute bars and write per-period artifacts.
    Run {
        /// Path to the TOML configuration.
        #[arg(long)]
        config: PathBuf,

        /// Bar CSV (plain or .gz): datetime_utc,open,high,low,close,volume.
        #[arg(long)]
        bars: PathBuf,

        /// Economic calendar CSV (optional).
        #[arg(long)]
        calendar: Option<PathBuf>,

        /// Output directory. Defaults to ./out.
        #[arg(long, default_value = "out")]
        out: PathBuf,
    },
    /// Verify a period's artifacts against its manifest.
    Verify {
        /// Period artifact directory containing manifest.json.
        #[arg(long)]
        dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            config,
            bars,
            calendar,
            out,
        } => run_cmd(config, bars, calendar, out),
        Commands::Verify { dir } => verify_cmd(dir),
    }
}

fn run_cmd(
    config_path: PathBuf,
    bars_path: PathBuf,
    calendar_path: Option<PathBuf>,
    out: PathBuf,
) -> Result<()> {
    let cfg = AuditConfig::load(&config_path)?;
    let bars = load_bars(&bars_path)
        .with_context(|| format!("failed to load bars from {}", bars_path.display()))?;
    let events = match &calendar_path {
        Some(path) => load_calendar(path)
            .with_context(|| format!("failed to load calendar from {}", path.display()))?,
        None => Vec::new(),
    };

    // Declared inputs, hashed up front so every period manifest covers them.
    let mut inputs = BTreeMap::new();
    inputs.insert(display_key(&bars_path), sha256_file(&bars_path)?);
    inputs.insert(display_key(&config_path), sha256_file(&config_path)?);
    if let Some(path) = &calendar_path {
        inputs.insert(display_key(path), sha256_file(path)?);
    }

    let out_dir = out.join(format!("{}_{}", cfg.symbol, cfg.year));
    let summary = run_audit(&cfg, &bars, &events, &inputs, &out_dir)?;

    for warning in &summary.warnings {
        eprintln!("warning: {}", warning.message);
    }

    println!("run {}", summary.run_id);
    println!("analysis timestamp: {}", summary.analysis_ts.to_rfc3339());
    println!("{:<10} {:>6} {:>9} {:>7} {:>8}", "period", "gaps", "anomalies", "score", "autofix");
    for report in &summary.periods {
        let anomalies = report
            .classified
            .iter()
            .filter(|c| c.label == fxaudit_core::GapLabel::Anomaly)
            .count();
        println!(
            "{:<10} {:>6} {:>9} {:>7.1} {:>8}",
            report.period.label,
            report.classified.len(),
            anomalies,
            report.scorecard.total,
            if report.autofix_triggered { "yes" } else { "no" }
        );
    }
    println!("artifacts under {}", out_dir.display());
    Ok(())
}

fn verify_cmd(dir: PathBuf) -> Result<()> {
    let manifest = Manifest::load(&dir.join("manifest.json"))?;
    let mismatches = manifest.verify(&dir)?;
    if mismatches.is_empty() {
        println!("ok: {} entries verified", manifest.entries.len());
        return Ok(());
    }
    for m in &mismatches {
        match &m.actual {
            Some(actual) => eprintln!("mismatch: {} expected {} got {}", m.path, m.expected, actual),
            None => eprintln!("missing: {}", m.path),
        }
    }
    bail!("{} of {} entries failed verification", mismatches.len(), manifest.entries.len());
}

fn display_key(path: &Path) -> String {
    path.display().to_string()
}
