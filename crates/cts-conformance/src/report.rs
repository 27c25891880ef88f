//! Human and machine summaries of a finished run.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use cts_config::{RedisVersion, RunOptions};
use serde::Serialize;
use thiserror::Error;

use crate::ledger::{RunLedger, TestOutcome, VersionBucket};
use crate::runner::RunOutput;

pub const REPORT_HEADER: &str = "-------- The result of tests --------";
pub const JSON_SCHEMA_VERSION: &str = "redis_compatibility_report/v1";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Text report: header, summary line(s), and optionally the failures.
///
/// With a version filter every bucket is folded into a single summary line
/// labelled with the filter; otherwise there is one line per version.
#[must_use]
pub fn render_text(ledger: &RunLedger, options: &RunOptions) -> String {
    let mut out = String::new();
    out.push_str(REPORT_HEADER);
    out.push('\n');
    match options.version {
        Some(version) => {
            let combined = ledger.combined();
            summary_line(&mut out, version.as_str(), &combined);
            if options.show_failed {
                failure_block(&mut out, version.as_str(), &combined.failed);
            }
        }
        None => {
            for (version, bucket) in ledger.iter() {
                summary_line(&mut out, version, bucket);
            }
            if options.show_failed {
                for (version, bucket) in ledger.iter() {
                    failure_block(&mut out, version, &bucket.failed);
                }
            }
        }
    }
    out
}

fn summary_line(out: &mut String, label: &str, bucket: &VersionBucket) {
    let _ = writeln!(
        out,
        "Summary: version: {label}, total tests: {}, passed: {}, rate: {:.2}%",
        bucket.total,
        bucket.passed,
        bucket.pass_rate()
    );
}

fn failure_block(out: &mut String, label: &str, failed: &[TestOutcome]) {
    if failed.is_empty() {
        return;
    }
    let _ = writeln!(out, "This is failed tests for {label}:");
    for outcome in failed {
        let _ = writeln!(out, "{outcome}");
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VersionSummary {
    pub version: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonReport {
    pub schema_version: String,
    pub corpus_sha256: String,
    pub version_filter: Option<String>,
    pub total: usize,
    pub passed: usize,
    pub pass_rate: f64,
    pub versions: Vec<VersionSummary>,
    pub run: RunOutput,
}

impl JsonReport {
    #[must_use]
    pub fn new(output: &RunOutput, corpus_sha256: &str, filter: Option<RedisVersion>) -> Self {
        let combined = output.ledger.combined();
        let versions = output
            .ledger
            .iter()
            .map(|(version, bucket)| VersionSummary {
                version: version.to_string(),
                total: bucket.total,
                passed: bucket.passed,
                failed: bucket.failed.len(),
                pass_rate: bucket.pass_rate(),
            })
            .collect();
        Self {
            schema_version: JSON_SCHEMA_VERSION.to_string(),
            corpus_sha256: corpus_sha256.to_string(),
            version_filter: filter.map(|version| version.as_str().to_string()),
            total: combined.total,
            passed: combined.passed,
            pass_rate: combined.pass_rate(),
            versions,
            run: output.clone(),
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), ReportError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| ReportError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let payload = serde_json::to_string_pretty(self)?;
        fs::write(path, format!("{payload}\n")).map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
