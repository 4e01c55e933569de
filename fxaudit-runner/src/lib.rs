//! FxAudit Runner — pipeline orchestration on top of `fxaudit-core`.
//!
//! This crate provides:
//! - TOML configuration with a deterministic blake3 run id
//! - Bar and calendar CSV ingestion with the Malformed-Input taxonomy
//! - The per-period audit pipeline (quarters in parallel, autofix slicing)
//! - Deterministic artifact writing (gzip mtime 0, normalized tar, SVG)
//! - SHA-256 manifesting and strict report templating

pub mod artifacts;
pub mod config;
pub mod ingest;
pub mod pipeline;
pub mod report;

pub use artifacts::{
    bars_to_csv, gzip_deterministic, render_anomaly_chart, sha256_file, sha256_hex,
    tar_gz_deterministic, DigestMismatch, Manifest,
};
pub use config::{AuditConfig, ConfigError, ResolvedRules, RunId, RunWarning};
pub use ingest::{load_bars, load_calendar, LoadError};
pub use pipeline::{run_audit, PeriodReport, PipelineError, RunSummary};
pub use report::{render, ReportContext, ReportError, GAP_SUMMARY_TEMPLATE};
