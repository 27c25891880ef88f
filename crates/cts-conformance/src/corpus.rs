//! Declarative test cases and the JSON corpus they are loaded from.

use std::fs;
use std::path::{Path, PathBuf};

use cts_protocol::Reply;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("cannot read corpus {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corpus is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corpus must be a JSON array of test cases, found {0}")]
    NotAnArray(&'static str),
}

/// One command as written in the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CommandDescriptor {
    /// A whole command line, e.g. `"SET k v"`.
    Line(String),
    /// Pre-split arguments, one element per argument.
    Argv(Vec<String>),
}

impl From<&str> for CommandDescriptor {
    fn from(line: &str) -> Self {
        Self::Line(line.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TestCase {
    pub name: String,
    /// Minimum Redis version the case applies to; compared as a plain string.
    pub since: String,
    pub command: Vec<CommandDescriptor>,
    #[serde(deserialize_with = "expected_replies")]
    pub result: Vec<Reply>,
    #[serde(default, deserialize_with = "flag_present")]
    pub skipped: bool,
    #[serde(default, deserialize_with = "flag_present")]
    pub command_binary: bool,
    #[serde(default, deserialize_with = "flag_present")]
    pub command_split: bool,
    #[serde(default, deserialize_with = "flag_present")]
    pub sort_result: bool,
}

impl TestCase {
    /// A case with no flags set.
    pub fn new(
        name: impl Into<String>,
        since: impl Into<String>,
        command: Vec<CommandDescriptor>,
        result: Vec<Reply>,
    ) -> Self {
        Self {
            name: name.into(),
            since: since.into(),
            command,
            result,
            skipped: false,
            command_binary: false,
            command_split: false,
            sort_result: false,
        }
    }
}

/// The key being present turns a flag on, whatever its value.
fn flag_present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    IgnoredAny::deserialize(deserializer).map(|_| true)
}

fn expected_replies<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Reply>, D::Error> {
    let values = Vec::<Value>::deserialize(deserializer)?;
    Ok(values.into_iter().map(json_to_reply).collect())
}

/// Map a JSON literal onto the reply model.
#[must_use]
pub fn json_to_reply(value: Value) -> Reply {
    match value {
        Value::Null => Reply::Nil,
        Value::Bool(flag) => Reply::Bool(flag),
        Value::Number(number) => number
            .as_i64()
            .map_or_else(|| Reply::Double(number.as_f64().unwrap_or(f64::NAN)), Reply::Int),
        Value::String(text) => Reply::Text(text),
        Value::Array(items) => Reply::Seq(items.into_iter().map(json_to_reply).collect()),
        Value::Object(entries) => Reply::Map(
            entries
                .into_iter()
                .map(|(key, value)| (Reply::Text(key), json_to_reply(value)))
                .collect(),
        ),
    }
}

/// A corpus entry that could not be read as a test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidCase {
    pub index: usize,
    pub name: Option<String>,
    pub error: String,
}

pub type CorpusEntry = Result<TestCase, InvalidCase>;

/// A loaded corpus. Entries keep their file order; malformed entries are kept
/// in place so the runner can report them without abandoning the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct Corpus {
    pub entries: Vec<CorpusEntry>,
    /// Hex SHA-256 of the raw corpus bytes.
    pub fingerprint: String,
}

impl Corpus {
    pub fn from_cases(cases: Vec<TestCase>) -> Self {
        Self {
            entries: cases.into_iter().map(Ok).collect(),
            fingerprint: String::new(),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, CorpusError> {
        let document: Value = serde_json::from_str(raw)?;
        let Value::Array(items) = document else {
            return Err(CorpusError::NotAnArray(json_kind(&document)));
        };
        let entries = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let name = item
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let skipped = item.get("skipped").is_some();
                match serde_json::from_value::<TestCase>(item) {
                    Ok(case) => Ok(case),
                    // A skipped entry never runs, so its other fields are not required.
                    Err(_) if skipped => Ok(TestCase {
                        skipped: true,
                        ..TestCase::new(
                            name.unwrap_or_else(|| format!("#{index}")),
                            "",
                            Vec::new(),
                            Vec::new(),
                        )
                    }),
                    Err(err) => Err(InvalidCase {
                        index,
                        name,
                        error: err.to_string(),
                    }),
                }
            })
            .collect();
        Ok(Self {
            entries,
            fingerprint: fingerprint(raw.as_bytes()),
        })
    }

    pub fn load(path: &Path) -> Result<Self, CorpusError> {
        let raw = fs::read_to_string(path).map_err(|source| CorpusError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw)
    }

    pub fn cases(&self) -> impl Iterator<Item = &TestCase> {
        self.entries.iter().filter_map(|entry| entry.as_ref().ok())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn fingerprint(raw: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw);
    format!("{:x}", hasher.finalize())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
