//! Per-version pass/fail accounting for one run.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Why a case failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// Command `command` replied with something other than the expectation.
    Mismatch {
        command: usize,
        expected: String,
        result: String,
    },
    /// The transport failed or the server answered with an error.
    Execution { command: usize, error: String },
    /// The case itself cannot be executed as written.
    Malformed { detail: String },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mismatch {
                expected, result, ..
            } => write!(f, "expected: {expected}, result: {result}"),
            Self::Execution { error, .. } => f.write_str(error),
            Self::Malformed { detail } => write!(f, "malformed test case: {detail}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseOutcome {
    Pass,
    Fail(FailureReason),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestOutcome {
    pub name: String,
    pub reason: FailureReason,
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.reason)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VersionBucket {
    pub total: usize,
    pub passed: usize,
    pub failed: Vec<TestOutcome>,
}

impl VersionBucket {
    #[must_use]
    pub fn pass_rate(&self) -> f64 {
        pass_rate(self.passed, self.total)
    }
}

/// Percentage of passed cases; an empty population counts as 0%.
#[must_use]
pub fn pass_rate(passed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        passed as f64 / total as f64 * 100.0
    }
}

/// Buckets keyed by each case's `since` version, iterated in string order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RunLedger {
    buckets: BTreeMap<String, VersionBucket>,
}

impl RunLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the bucket for `version` if this is its first case.
    pub fn open(&mut self, version: &str) -> &mut VersionBucket {
        self.buckets.entry(version.to_string()).or_default()
    }

    pub fn record(&mut self, version: &str, name: &str, outcome: CaseOutcome) {
        let bucket = self.open(version);
        bucket.total += 1;
        match outcome {
            CaseOutcome::Pass => bucket.passed += 1,
            CaseOutcome::Fail(reason) => bucket.failed.push(TestOutcome {
                name: name.to_string(),
                reason,
            }),
        }
    }

    #[must_use]
    pub fn get(&self, version: &str) -> Option<&VersionBucket> {
        self.buckets.get(version)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VersionBucket)> {
        self.buckets
            .iter()
            .map(|(version, bucket)| (version.as_str(), bucket))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    /// All buckets folded into one.
    #[must_use]
    pub fn combined(&self) -> VersionBucket {
        self.buckets
            .values()
            .fold(VersionBucket::default(), |mut acc, bucket| {
                acc.total += bucket.total;
                acc.passed += bucket.passed;
                acc.failed.extend(bucket.failed.iter().cloned());
                acc
            })
    }
}
