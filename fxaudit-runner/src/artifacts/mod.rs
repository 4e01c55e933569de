//! Deterministic artifact writing and SHA-256 manifesting.

pub mod chart;
pub mod encode;

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use fxaudit_core::domain::MinuteBar;

pub use chart::render_anomaly_chart;
pub use encode::{gzip_deterministic, tar_gz_deterministic};

/// SHA-256 of an in-memory buffer, lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex_string(&hasher.finalize())
}

/// Streaming SHA-256 of a file on disk.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {} for hashing", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 65536];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex_string(&hasher.finalize()))
}

fn hex_string(digest: &[u8]) -> String {
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Mapping from artifact path (relative to the manifest's directory, or a
/// declared input path) to its SHA-256 digest. Immutable once written:
/// recomputing over unchanged inputs must reproduce every digest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub entries: BTreeMap<String, String>,
}

/// One digest mismatch found by [`Manifest::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestMismatch {
    pub path: String,
    pub expected: String,
    pub actual: Option<String>,
}

impl Manifest {
    pub fn insert(&mut self, path: impl Into<String>, digest: impl Into<String>) {
        self.entries.insert(path.into(), digest.into());
    }

    /// Serialize to pretty JSON; `BTreeMap` keeps key order stable.
    pub fn to_json(&self) -> String {
        let mut json =
            serde_json::to_string_pretty(self).expect("Manifest serialization cannot fail");
        json.push('\n');
        json
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json())
            .with_context(|| format!("failed to write manifest {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse manifest {}", path.display()))
    }

    /// Recompute every entry and report mismatches. Entries resolve against
    /// `base_dir` first (artifact names), then as given (declared input
    /// paths). Missing files surface as `actual: None`.
    pub fn verify(&self, base_dir: &Path) -> Result<Vec<DigestMismatch>> {
        let mut mismatches = Vec::new();
        for (rel, expected) in &self.entries {
            let mut full = base_dir.join(rel);
            if !full.is_file() && Path::new(rel).is_file() {
                full = PathBuf::from(rel);
            }
            match sha256_file(&full) {
                Ok(actual) if actual == *expected => {}
                Ok(actual) => mismatches.push(DigestMismatch {
                    path: rel.clone(),
                    expected: expected.clone(),
                    actual: Some(actual),
                }),
                Err(_) => mismatches.push(DigestMismatch {
                    path: rel.clone(),
                    expected: expected.clone(),
                    actual: None,
                }),
            }
        }
        Ok(mismatches)
    }
}

/// Serialize bars to the canonical CSV layout. Timestamps are second
/// precision; floats use Rust's shortest round-trip formatting, which is
/// stable for equal values.
pub fn bars_to_csv(bars: &[MinuteBar]) -> String {
    let mut out = String::from("datetime_utc,open,high,low,close,volume\n");
    for bar in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            bar.timestamp_utc.format("%Y-%m-%d %H:%M:%S"),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume
        ));
    }
    out
}
