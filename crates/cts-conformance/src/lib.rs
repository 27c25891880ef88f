#![forbid(unsafe_code)]

//! Replays a declarative corpus against a Redis-compatible target and reports
//! per-version compatibility.

pub mod batch;
pub mod compare;
pub mod corpus;
pub mod html;
pub mod ledger;
pub mod materialize;
pub mod normalize;
pub mod report;
pub mod runner;

pub use batch::{BatchRun, BatchSummary, Connector, NetworkConnector, run_batch};
pub use compare::{Mismatch, compare, nested_sort};
pub use corpus::{CommandDescriptor, Corpus, CorpusEntry, CorpusError, InvalidCase, TestCase};
pub use ledger::{CaseOutcome, FailureReason, RunLedger, TestOutcome, VersionBucket, pass_rate};
pub use materialize::{MaterializeError, decode_escapes, materialize, split_quoted};
pub use normalize::normalize;
pub use report::{JsonReport, ReportError, render_text};
pub use runner::{CaseEvent, CaseStatus, RunContext, RunOutput, execute_case, run_corpus};
