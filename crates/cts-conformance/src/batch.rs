//! Every configured database against every configured version, with HTML output.

use std::fs;
use std::path::{Path, PathBuf};

use cts_config::{BatchConfig, RedisVersion, RunOptions, TargetConfig};
use cts_protocol::{ConnectionError, Transport};
use serde::Serialize;
use tracing::{error, info};

use crate::corpus::Corpus;
use crate::html::{detail_file_name, detail_page, render_index};
use crate::report::{ReportError, render_text};
use crate::runner::run_corpus;

pub const INDEX_FILE: &str = "index.html";

/// Opens a transport for one database entry.
pub trait Connector {
    fn connect(&mut self, target: &TargetConfig) -> Result<Box<dyn Transport>, ConnectionError>;
}

/// Connects over the network using the entry's host, port, TLS and cluster settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkConnector;

impl Connector for NetworkConnector {
    fn connect(&mut self, target: &TargetConfig) -> Result<Box<dyn Transport>, ConnectionError> {
        cts_protocol::connect(&target.connection())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchRun {
    pub database: String,
    pub version: RedisVersion,
    pub total: usize,
    pub passed: usize,
    pub pass_rate: f64,
    pub detail: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub runs: Vec<BatchRun>,
    /// Databases whose connection failed; their remaining versions were not run.
    pub unreachable: Vec<String>,
    pub index: PathBuf,
}

impl BatchSummary {
    /// Lowest pass rate among the completed runs.
    #[must_use]
    pub fn min_pass_rate(&self) -> Option<f64> {
        self.runs.iter().map(|run| run.pass_rate).reduce(f64::min)
    }
}

pub fn run_batch(
    config: &BatchConfig,
    corpus: &Corpus,
    connector: &mut dyn Connector,
) -> Result<BatchSummary, ReportError> {
    recreate_dir(&config.dir)?;

    let mut runs = Vec::new();
    let mut unreachable = Vec::new();
    for (database, target) in &config.database {
        for &version in &config.specific_versions {
            info!(database = %database, version = %version, "start test");
            let mut transport = match connector.connect(target) {
                Ok(transport) => transport,
                Err(err) => {
                    error!(
                        database = %database,
                        addr = %format!("{}:{}", target.host, target.port),
                        error = %err,
                        "connect failed, skipping remaining versions"
                    );
                    unreachable.push(database.clone());
                    break;
                }
            };

            let options = RunOptions {
                version: Some(version),
                show_failed: true,
            };
            let output = run_corpus(&mut transport, corpus, &options);
            let page = detail_page(&output.transcript(), &render_text(&output.ledger, &options));
            let detail = config.dir.join(detail_file_name(database, version));
            write_file(&detail, &page)?;

            let combined = output.ledger.combined();
            runs.push(BatchRun {
                database: database.clone(),
                version,
                total: combined.total,
                passed: combined.passed,
                pass_rate: combined.pass_rate(),
                detail,
            });
        }
    }

    let index = config.dir.join(INDEX_FILE);
    let page = render_index(
        &config.dir,
        config.database.keys().map(String::as_str),
        &config.specific_versions,
    );
    write_file(&index, &page)?;
    Ok(BatchSummary {
        runs,
        unreachable,
        index,
    })
}

fn recreate_dir(dir: &Path) -> Result<(), ReportError> {
    if dir.exists() {
        info!(dir = %dir.display(), "output directory exists, recreating");
        fs::remove_dir_all(dir).map_err(|source| ReportError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    fs::create_dir_all(dir).map_err(|source| ReportError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

fn write_file(path: &Path, contents: &str) -> Result<(), ReportError> {
    fs::write(path, contents).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })
}
