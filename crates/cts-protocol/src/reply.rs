use std::cmp::Ordering;
use std::fmt;

/// A decoded server reply, or a literal expected reply from a corpus.
///
/// `Text` and `Bytes` are deliberately distinct: simple strings and corpus
/// literals arrive as text, bulk strings as bytes. Comparison code is expected to
/// canonicalize both sides before testing equality.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Nil,
    Int(i64),
    Double(f64),
    Bool(bool),
    Text(String),
    Bytes(Vec<u8>),
    Seq(Vec<Reply>),
    /// Key/value pairs in wire order.
    Map(Vec<(Reply, Reply)>),
}

impl Reply {
    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(value.into())
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    #[must_use]
    pub fn is_seq(&self) -> bool {
        matches!(self, Self::Seq(_))
    }

    /// Returns the payload of a `Text` or `Bytes` reply.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Text(text) => Some(text.as_bytes()),
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Int(_) => "integer",
            Self::Double(_) => "double",
            Self::Bool(_) => "boolean",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Seq(_) => "sequence",
            Self::Map(_) => "map",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Nil => 0,
            Self::Bool(_) => 1,
            Self::Int(_) => 2,
            Self::Double(_) => 3,
            Self::Text(_) => 4,
            Self::Bytes(_) => 5,
            Self::Seq(_) => 6,
            Self::Map(_) => 7,
        }
    }
}

/// Total order over replies: variant rank first, then value.
///
/// Doubles use `f64::total_cmp`, sequences and maps compare lexicographically.
#[must_use]
pub fn cmp_replies(left: &Reply, right: &Reply) -> Ordering {
    match (left, right) {
        (Reply::Nil, Reply::Nil) => Ordering::Equal,
        (Reply::Bool(a), Reply::Bool(b)) => a.cmp(b),
        (Reply::Int(a), Reply::Int(b)) => a.cmp(b),
        (Reply::Double(a), Reply::Double(b)) => a.total_cmp(b),
        (Reply::Text(a), Reply::Text(b)) => a.cmp(b),
        (Reply::Bytes(a), Reply::Bytes(b)) => a.cmp(b),
        (Reply::Seq(a), Reply::Seq(b)) => cmp_slices(a, b, cmp_replies),
        (Reply::Map(a), Reply::Map(b)) => cmp_slices(a, b, |(ka, va), (kb, vb)| {
            cmp_replies(ka, kb).then_with(|| cmp_replies(va, vb))
        }),
        _ => left.rank().cmp(&right.rank()),
    }
}

fn cmp_slices<T>(left: &[T], right: &[T], cmp: impl Fn(&T, &T) -> Ordering) -> Ordering {
    for (a, b) in left.iter().zip(right) {
        let ord = cmp(a, b);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    left.len().cmp(&right.len())
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => f.write_str("None"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Double(d) => write!(f, "{d:?}"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Text(text) => write!(f, "'{}'", text.escape_default()),
            Self::Bytes(bytes) => {
                f.write_str("b'")?;
                write_escaped_bytes(f, bytes)?;
                f.write_str("'")
            }
            Self::Seq(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(entries) => {
                f.write_str("{")?;
                for (idx, (key, value)) in entries.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

fn write_escaped_bytes(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for &byte in bytes {
        match byte {
            b'\\' => f.write_str("\\\\")?,
            b'\'' => f.write_str("\\'")?,
            b'\n' => f.write_str("\\n")?,
            b'\r' => f.write_str("\\r")?,
            b'\t' => f.write_str("\\t")?,
            0x20..=0x7e => write!(f, "{}", byte as char)?,
            _ => write!(f, "\\x{byte:02x}")?,
        }
    }
    Ok(())
}
