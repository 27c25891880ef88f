//! Drives a corpus against one connected target.
//!
//! Every case goes through the same sequence: skip check, version gate, keyspace
//! reset, ordered execution with comparison after each command, then a single
//! ledger entry. Nothing a case does can abort the run.

use std::fmt;

use cts_config::{RedisVersion, RunOptions};
use cts_protocol::Transport;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::compare::compare;
use crate::corpus::{Corpus, CorpusEntry, TestCase};
use crate::ledger::{CaseOutcome, FailureReason, RunLedger, pass_rate};
use crate::materialize::materialize;
use crate::normalize::normalize;

/// What happened to one corpus entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum CaseStatus {
    Passed,
    Failed,
    Skipped,
    VersionSkipped,
    /// The case never reached the ledger: unreadable entry or failed reset.
    Aborted(String),
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => f.write_str("passed"),
            Self::Failed => f.write_str("failed"),
            Self::Skipped => f.write_str("skipped"),
            Self::VersionSkipped => f.write_str("version skipped"),
            Self::Aborted(reason) => write!(f, "aborted: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseEvent {
    pub name: String,
    pub status: CaseStatus,
}

impl fmt::Display for CaseEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "test: {} {}", self.name, self.status)
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunOutput {
    pub ledger: RunLedger,
    pub events: Vec<CaseEvent>,
}

impl RunOutput {
    /// One `test: <name> <status>` line per corpus entry.
    #[must_use]
    pub fn transcript(&self) -> String {
        self.events
            .iter()
            .map(|event| format!("{event}\n"))
            .collect()
    }

    /// Whether the overall pass rate reaches `min_rate` percent.
    #[must_use]
    pub fn meets_threshold(&self, min_rate: f64) -> bool {
        let combined = self.ledger.combined();
        pass_rate(combined.passed, combined.total) >= min_rate
    }
}

/// State owned by a single run: the target, the active filter and the ledger.
pub struct RunContext<'t, T: Transport + ?Sized> {
    transport: &'t mut T,
    version: Option<RedisVersion>,
    output: RunOutput,
}

impl<'t, T: Transport + ?Sized> RunContext<'t, T> {
    pub fn new(transport: &'t mut T, version: Option<RedisVersion>) -> Self {
        Self {
            transport,
            version,
            output: RunOutput::default(),
        }
    }

    pub fn run_entry(&mut self, index: usize, entry: &CorpusEntry) -> &CaseStatus {
        match entry {
            Ok(case) => self.run_case(case),
            Err(invalid) => {
                let name = invalid
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("#{index}"));
                warn!(case = %name, error = %invalid.error, "run test error");
                self.push(name, CaseStatus::Aborted(invalid.error.clone()))
            }
        }
    }

    pub fn run_case(&mut self, case: &TestCase) -> &CaseStatus {
        if case.skipped {
            info!(case = %case.name, "skipped");
            return self.push(case.name.clone(), CaseStatus::Skipped);
        }
        if let Some(version) = self.version
            && case.since.as_str() > version.as_str()
        {
            info!(case = %case.name, since = %case.since, filter = %version, "version skipped");
            return self.push(case.name.clone(), CaseStatus::VersionSkipped);
        }

        self.output.ledger.open(&case.since);
        if let Err(err) = self.transport.reset() {
            error!(case = %case.name, error = %err, "keyspace reset failed");
            return self.push(case.name.clone(), CaseStatus::Aborted(err.to_string()));
        }

        let outcome = execute_case(&mut *self.transport, case);
        let status = match &outcome {
            CaseOutcome::Pass => {
                info!(case = %case.name, since = %case.since, "passed");
                CaseStatus::Passed
            }
            CaseOutcome::Fail(reason) => {
                info!(case = %case.name, since = %case.since, reason = %reason, "failed");
                CaseStatus::Failed
            }
        };
        self.output
            .ledger
            .record(&case.since, &case.name, outcome);
        self.push(case.name.clone(), status)
    }

    fn push(&mut self, name: String, status: CaseStatus) -> &CaseStatus {
        self.output.events.push(CaseEvent { name, status });
        &self.output.events[self.output.events.len() - 1].status
    }

    #[must_use]
    pub fn finish(self) -> RunOutput {
        self.output
    }
}

/// Run the commands of one case in order, stopping at the first failure.
pub fn execute_case<T: Transport + ?Sized>(transport: &mut T, case: &TestCase) -> CaseOutcome {
    if case.command.len() != case.result.len() {
        return CaseOutcome::Fail(FailureReason::Malformed {
            detail: format!(
                "{} commands but {} results",
                case.command.len(),
                case.result.len()
            ),
        });
    }
    for (idx, (descriptor, expected)) in case.command.iter().zip(&case.result).enumerate() {
        let args = match materialize(case, descriptor) {
            Ok(args) => args,
            Err(err) => {
                return CaseOutcome::Fail(FailureReason::Malformed {
                    detail: format!("command {idx}: {err}"),
                });
            }
        };
        debug!(case = %case.name, command = idx, argc = args.len(), "execute");
        let actual = match transport.execute(&args) {
            Ok(reply) => normalize(reply),
            Err(err) => {
                return CaseOutcome::Fail(FailureReason::Execution {
                    command: idx,
                    error: err.to_string(),
                });
            }
        };
        if let Err(mismatch) = compare(actual, normalize(expected.clone()), case.sort_result) {
            return CaseOutcome::Fail(FailureReason::Mismatch {
                command: idx,
                expected: mismatch.expected.to_string(),
                result: mismatch.actual.to_string(),
            });
        }
    }
    CaseOutcome::Pass
}

/// One full pass over `corpus` with a fresh ledger.
pub fn run_corpus<T: Transport + ?Sized>(
    transport: &mut T,
    corpus: &Corpus,
    options: &RunOptions,
) -> RunOutput {
    let mut ctx = RunContext::new(transport, options.version);
    for (index, entry) in corpus.entries.iter().enumerate() {
        ctx.run_entry(index, entry);
    }
    ctx.finish()
}
