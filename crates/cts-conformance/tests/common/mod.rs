#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::PathBuf;

use cts_conformance::Corpus;
use cts_protocol::{Reply, Transport, TransportError};

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(name)
}

pub fn load_fixture(name: &str) -> Corpus {
    Corpus::load(&fixture_path(name)).expect("fixture loads")
}

#[derive(Debug, Clone)]
enum Value {
    Str(Vec<u8>),
    List(VecDeque<Vec<u8>>),
    Set(BTreeSet<Vec<u8>>),
    Hash(BTreeMap<Vec<u8>, Vec<u8>>),
}

/// A small in-memory keyspace answering like a RESP2 server.
///
/// Set members come back in descending order so that only order-insensitive
/// cases pass against it.
#[derive(Debug, Default)]
pub struct FakeRedis {
    keys: BTreeMap<Vec<u8>, Value>,
    pub commands: Vec<Vec<Vec<u8>>>,
    pub resets: usize,
    pub fail_resets: bool,
    /// Commands (uppercase) that fail as if the connection dropped.
    pub broken: BTreeSet<String>,
}

impl FakeRedis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn breaking(command: &str) -> Self {
        let mut fake = Self::default();
        fake.broken.insert(command.to_string());
        fake
    }

    fn dispatch(&mut self, name: &str, args: &[Vec<u8>]) -> Result<Reply, TransportError> {
        match (name, args) {
            ("PING", []) => Ok(Reply::text("PONG")),
            ("ECHO", [message]) => Ok(Reply::bytes(message.clone())),
            ("SET", [key, value]) => {
                self.keys.insert(key.clone(), Value::Str(value.clone()));
                Ok(Reply::text("OK"))
            }
            ("GET", [key]) => match self.keys.get(key) {
                None => Ok(Reply::Nil),
                Some(Value::Str(value)) => Ok(Reply::bytes(value.clone())),
                Some(_) => Err(wrong_type()),
            },
            ("APPEND", [key, suffix]) => {
                let entry = self
                    .keys
                    .entry(key.clone())
                    .or_insert_with(|| Value::Str(Vec::new()));
                let Value::Str(value) = entry else {
                    return Err(wrong_type());
                };
                value.extend_from_slice(suffix);
                Ok(Reply::Int(value.len() as i64))
            }
            ("STRLEN", [key]) => match self.keys.get(key) {
                None => Ok(Reply::Int(0)),
                Some(Value::Str(value)) => Ok(Reply::Int(value.len() as i64)),
                Some(_) => Err(wrong_type()),
            },
            ("INCR", [key]) => {
                let current = match self.keys.get(key) {
                    None => 0,
                    Some(Value::Str(value)) => std::str::from_utf8(value)
                        .ok()
                        .and_then(|text| text.parse::<i64>().ok())
                        .ok_or_else(|| {
                            server("ERR value is not an integer or out of range")
                        })?,
                    Some(_) => return Err(wrong_type()),
                };
                let next = current + 1;
                self.keys
                    .insert(key.clone(), Value::Str(next.to_string().into_bytes()));
                Ok(Reply::Int(next))
            }
            ("DEL", keys) if !keys.is_empty() => Ok(Reply::Int(
                keys.iter().filter(|key| self.keys.remove(*key).is_some()).count() as i64,
            )),
            ("EXISTS", keys) if !keys.is_empty() => Ok(Reply::Int(
                keys.iter().filter(|key| self.keys.contains_key(*key)).count() as i64,
            )),
            ("RPUSH" | "LPUSH", [key, items @ ..]) if !items.is_empty() => {
                let entry = self
                    .keys
                    .entry(key.clone())
                    .or_insert_with(|| Value::List(VecDeque::new()));
                let Value::List(list) = entry else {
                    return Err(wrong_type());
                };
                for item in items {
                    if name == "RPUSH" {
                        list.push_back(item.clone());
                    } else {
                        list.push_front(item.clone());
                    }
                }
                Ok(Reply::Int(list.len() as i64))
            }
            ("LRANGE", [key, start, stop]) => {
                let list = match self.keys.get(key) {
                    None => return Ok(Reply::Seq(Vec::new())),
                    Some(Value::List(list)) => list,
                    Some(_) => return Err(wrong_type()),
                };
                let len = list.len() as i64;
                let clamp = |raw: &[u8]| -> Result<i64, TransportError> {
                    let index = parse_int(raw)?;
                    Ok(if index < 0 { (len + index).max(0) } else { index })
                };
                let (start, stop) = (clamp(start)?, clamp(stop)?.min(len - 1));
                if start > stop {
                    return Ok(Reply::Seq(Vec::new()));
                }
                Ok(Reply::Seq(
                    list.iter()
                        .skip(start as usize)
                        .take((stop - start + 1) as usize)
                        .cloned()
                        .map(Reply::Bytes)
                        .collect(),
                ))
            }
            ("SADD", [key, members @ ..]) if !members.is_empty() => {
                let entry = self
                    .keys
                    .entry(key.clone())
                    .or_insert_with(|| Value::Set(BTreeSet::new()));
                let Value::Set(set) = entry else {
                    return Err(wrong_type());
                };
                Ok(Reply::Int(
                    members
                        .iter()
                        .filter(|member| set.insert((*member).clone()))
                        .count() as i64,
                ))
            }
            ("SMEMBERS", [key]) => match self.keys.get(key) {
                None => Ok(Reply::Seq(Vec::new())),
                Some(Value::Set(set)) => Ok(Reply::Seq(
                    set.iter().rev().cloned().map(Reply::Bytes).collect(),
                )),
                Some(_) => Err(wrong_type()),
            },
            ("HSET", [key, pairs @ ..]) if !pairs.is_empty() && pairs.len() % 2 == 0 => {
                let entry = self
                    .keys
                    .entry(key.clone())
                    .or_insert_with(|| Value::Hash(BTreeMap::new()));
                let Value::Hash(hash) = entry else {
                    return Err(wrong_type());
                };
                let added = pairs
                    .chunks(2)
                    .filter(|pair| hash.insert(pair[0].clone(), pair[1].clone()).is_none())
                    .count();
                Ok(Reply::Int(added as i64))
            }
            ("HGETALL", [key]) => match self.keys.get(key) {
                None => Ok(Reply::Seq(Vec::new())),
                Some(Value::Hash(hash)) => Ok(Reply::Seq(
                    hash.iter()
                        .flat_map(|(field, value)| [field.clone(), value.clone()])
                        .map(Reply::Bytes)
                        .collect(),
                )),
                Some(_) => Err(wrong_type()),
            },
            ("FLUSHALL", []) => {
                self.keys.clear();
                Ok(Reply::text("OK"))
            }
            _ => Err(server(&format!(
                "ERR unknown command '{}', or wrong number of arguments",
                name.to_ascii_lowercase()
            ))),
        }
    }
}

impl Transport for FakeRedis {
    fn reset(&mut self) -> Result<(), TransportError> {
        if self.fail_resets {
            return Err(TransportError::Closed);
        }
        self.resets += 1;
        self.keys.clear();
        Ok(())
    }

    fn execute(&mut self, args: &[Vec<u8>]) -> Result<Reply, TransportError> {
        self.commands.push(args.to_vec());
        let Some((name, rest)) = args.split_first() else {
            return Err(TransportError::EmptyCommand);
        };
        let name = String::from_utf8_lossy(name).to_ascii_uppercase();
        if self.broken.contains(&name) {
            return Err(TransportError::Closed);
        }
        self.dispatch(&name, rest)
    }
}

fn server(message: &str) -> TransportError {
    TransportError::Server(message.to_string())
}

fn wrong_type() -> TransportError {
    server("WRONGTYPE Operation against a key holding the wrong kind of value")
}

fn parse_int(raw: &[u8]) -> Result<i64, TransportError> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| server("ERR value is not an integer or out of range"))
}
