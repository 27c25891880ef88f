//! RESP2/RESP3 wire format: command encoding and blocking reply decoding.
//!
//! Commands always go out as an array of bulk strings. Replies are read one full
//! frame at a time from a buffered reader; error frames nested anywhere inside a
//! reply are surfaced only after the whole frame has been consumed so the
//! connection never desynchronizes.

use std::io::{BufRead, Read};

use crate::error::{RespError, TransportError};
use crate::reply::Reply;

/// Nesting bound for aggregate frames.
pub const MAX_DEPTH: usize = 128;

/// Append `*<n>\r\n` followed by one `$<len>\r\n<arg>\r\n` per argument.
pub fn encode_command(args: &[Vec<u8>], buf: &mut Vec<u8>) {
    buf.push(b'*');
    buf.extend_from_slice(args.len().to_string().as_bytes());
    buf.extend_from_slice(b"\r\n");
    for arg in args {
        buf.push(b'$');
        buf.extend_from_slice(arg.len().to_string().as_bytes());
        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(arg);
        buf.extend_from_slice(b"\r\n");
    }
}

/// Read exactly one reply frame.
///
/// A server error frame (`-` or `!`) becomes `TransportError::Server`.
pub fn read_reply<R: BufRead>(reader: &mut R) -> Result<Reply, TransportError> {
    match read_frame(reader, 0)? {
        Ok(reply) => Ok(reply),
        Err(message) => Err(TransportError::Server(message)),
    }
}

/// Outer `Err` aborts decoding; inner `Err` is a fully-consumed server error.
type Frame = Result<Reply, String>;

fn read_frame<R: BufRead>(reader: &mut R, depth: usize) -> Result<Frame, TransportError> {
    if depth > MAX_DEPTH {
        return Err(RespError::TooDeep(MAX_DEPTH).into());
    }
    let line = read_line(reader)?;
    let Some((&prefix, body)) = line.split_first() else {
        return Err(RespError::UnknownPrefix(b'\r').into());
    };
    let frame = match prefix {
        b'+' => Ok(text_or_bytes(body.to_vec())),
        b'-' => Err(String::from_utf8_lossy(body).into_owned()),
        b':' => Ok(Reply::Int(parse_integer(body)?)),
        b'$' => match parse_length(body)? {
            None => Ok(Reply::Nil),
            Some(len) => Ok(Reply::Bytes(read_blob(reader, len)?)),
        },
        b'*' | b'~' | b'>' => match parse_length(body)? {
            None => Ok(Reply::Nil),
            Some(count) => read_sequence(reader, count, depth)?,
        },
        b'%' => match parse_length(body)? {
            None => Ok(Reply::Nil),
            Some(count) => read_map(reader, count, depth)?,
        },
        b'|' => {
            let count = parse_length(body)?.unwrap_or(0);
            // Attributes annotate the next frame and are not part of the reply.
            let _ = read_map(reader, count, depth)?;
            read_frame(reader, depth + 1)?
        }
        b'_' => Ok(Reply::Nil),
        b',' => Ok(Reply::Double(parse_double(body)?)),
        b'#' => match body {
            b"t" => Ok(Reply::Bool(true)),
            b"f" => Ok(Reply::Bool(false)),
            other => {
                return Err(
                    RespError::InvalidBoolean(String::from_utf8_lossy(other).into_owned()).into(),
                );
            }
        },
        b'(' => {
            let digits = String::from_utf8_lossy(body).into_owned();
            Ok(digits
                .parse::<i64>()
                .map_or_else(|_| Reply::Text(digits), Reply::Int))
        }
        b'=' => match parse_length(body)? {
            None => Ok(Reply::Nil),
            Some(len) => {
                let blob = read_blob(reader, len)?;
                // Verbatim strings carry a three-letter format tag and a colon.
                let payload = if blob.len() >= 4 && blob[3] == b':' {
                    blob[4..].to_vec()
                } else {
                    blob
                };
                Ok(text_or_bytes(payload))
            }
        },
        b'!' => match parse_length(body)? {
            None => Err(String::new()),
            Some(len) => Err(String::from_utf8_lossy(&read_blob(reader, len)?).into_owned()),
        },
        other => return Err(RespError::UnknownPrefix(other).into()),
    };
    Ok(frame)
}

fn read_sequence<R: BufRead>(
    reader: &mut R,
    count: usize,
    depth: usize,
) -> Result<Frame, TransportError> {
    let mut items = Vec::with_capacity(count.min(1024));
    let mut first_error = None;
    for _ in 0..count {
        match read_frame(reader, depth + 1)? {
            Ok(item) => items.push(item),
            Err(message) => {
                first_error.get_or_insert(message);
            }
        }
    }
    Ok(first_error.map_or(Ok(Reply::Seq(items)), Err))
}

fn read_map<R: BufRead>(reader: &mut R, count: usize, depth: usize) -> Result<Frame, TransportError> {
    let mut entries = Vec::with_capacity(count.min(1024));
    let mut first_error = None;
    for _ in 0..count {
        let key = read_frame(reader, depth + 1)?;
        let value = read_frame(reader, depth + 1)?;
        match (key, value) {
            (Ok(key), Ok(value)) => entries.push((key, value)),
            (Err(message), _) | (_, Err(message)) => {
                first_error.get_or_insert(message);
            }
        }
    }
    Ok(first_error.map_or(Ok(Reply::Map(entries)), Err))
}

fn read_line<R: BufRead>(reader: &mut R) -> Result<Vec<u8>, TransportError> {
    let mut line = Vec::new();
    let read = reader.read_until(b'\n', &mut line)?;
    if read == 0 {
        return Err(TransportError::Closed);
    }
    if !line.ends_with(b"\r\n") {
        if line.ends_with(b"\n") {
            return Err(RespError::MissingCrlf.into());
        }
        return Err(TransportError::Closed);
    }
    line.truncate(line.len() - 2);
    Ok(line)
}

fn read_blob<R: BufRead>(reader: &mut R, len: usize) -> Result<Vec<u8>, TransportError> {
    let mut blob = Vec::with_capacity(len.min(64 * 1024));
    let want = len as u64 + 2;
    let got = reader.by_ref().take(want).read_to_end(&mut blob)?;
    if (got as u64) < want {
        return Err(TransportError::Closed);
    }
    if !blob.ends_with(b"\r\n") {
        return Err(RespError::MissingCrlf.into());
    }
    blob.truncate(len);
    Ok(blob)
}

fn parse_integer(body: &[u8]) -> Result<i64, RespError> {
    std::str::from_utf8(body)
        .ok()
        .and_then(|text| text.parse::<i64>().ok())
        .ok_or_else(|| RespError::InvalidInteger(String::from_utf8_lossy(body).into_owned()))
}

/// `-1` means a null aggregate or blob.
fn parse_length(body: &[u8]) -> Result<Option<usize>, RespError> {
    match parse_integer(body)? {
        -1 => Ok(None),
        len if len < 0 => Err(RespError::InvalidLength(len)),
        len => usize::try_from(len)
            .map(Some)
            .map_err(|_| RespError::InvalidLength(len)),
    }
}

fn parse_double(body: &[u8]) -> Result<f64, RespError> {
    std::str::from_utf8(body)
        .ok()
        .and_then(|text| text.parse::<f64>().ok())
        .ok_or_else(|| RespError::InvalidDouble(String::from_utf8_lossy(body).into_owned()))
}

fn text_or_bytes(raw: Vec<u8>) -> Reply {
    match String::from_utf8(raw) {
        Ok(text) => Reply::Text(text),
        Err(err) => Reply::Bytes(err.into_bytes()),
    }
}
