use std::fmt;

use cts_protocol::{Reply, cmp_replies};

/// An actual reply that differs from the expected one.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub expected: Reply,
    pub actual: Reply,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected: {}, result: {}", self.expected, self.actual)
    }
}

/// Order-insensitive canonicalization of a sequence reply.
///
/// When at least one top-level element is itself a sequence, each such inner
/// sequence is sorted and the outer order is left alone. Otherwise the top-level
/// sequence is sorted. Non-sequence replies are untouched.
pub fn nested_sort(reply: &mut Reply) {
    let Reply::Seq(items) = reply else {
        return;
    };
    let mut nested = false;
    for item in items.iter_mut() {
        if let Reply::Seq(inner) = item {
            inner.sort_by(cmp_replies);
            nested = true;
        }
    }
    if !nested {
        items.sort_by(cmp_replies);
    }
}

/// Compare one normalized actual reply against its normalized expectation.
///
/// With `sort_result`, and only when the expectation is a sequence, both sides
/// go through [`nested_sort`] first.
pub fn compare(mut actual: Reply, mut expected: Reply, sort_result: bool) -> Result<(), Mismatch> {
    if sort_result && expected.is_seq() {
        nested_sort(&mut actual);
        nested_sort(&mut expected);
    }
    if actual == expected {
        Ok(())
    } else {
        Err(Mismatch { expected, actual })
    }
}
