// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transaction log events and their record encoding
//!
//! One event is one line:
//!
//! ```text
//! sequence \t kind \t key \t value [\t crc32]
//! ```
//!
//! `kind` is `1` for delete and `2` for put. Keys and values are
//! percent-escaped so that tabs and line breaks never reach the file
//! unescaped. The trailing CRC32 field is optional; lines without it are
//! accepted as-is.

use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// Kind of state change recorded by an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Delete,
    Put,
}

impl EventKind {
    /// Numeric code written to the log
    pub fn code(self) -> u8 {
        match self {
            EventKind::Delete => 1,
            EventKind::Put => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(EventKind::Delete),
            2 => Some(EventKind::Put),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Delete => write!(f, "delete"),
            EventKind::Put => write!(f, "put"),
        }
    }
}

/// A single immutable state change with its assigned sequence number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub sequence: u64,
    pub kind: EventKind,
    pub key: String,
    /// Always empty for deletes
    pub value: String,
}

/// Errors decoding a single record line
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("expected 4 or 5 fields, found {0}")]
    FieldCount(usize),
    #[error("invalid sequence number {0:?}")]
    Sequence(String),
    #[error("unknown event kind {0:?}")]
    Kind(String),
    #[error("empty key")]
    EmptyKey,
    #[error("bad escape in {field}: {source}")]
    Escape {
        field: &'static str,
        source: EscapeError,
    },
    #[error("invalid checksum field {0:?}")]
    ChecksumField(String),
    #[error("checksum mismatch: stored {stored:08x}, computed {computed:08x}")]
    ChecksumMismatch { stored: u32, computed: u32 },
}

/// Errors reversing the percent-escaping of a field
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EscapeError {
    #[error("truncated escape at byte {0}")]
    Truncated(usize),
    #[error("invalid hex digits at byte {0}")]
    InvalidHex(usize),
    #[error("decoded bytes are not valid UTF-8")]
    InvalidUtf8,
}

impl Event {
    pub fn put(sequence: u64, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            sequence,
            kind: EventKind::Put,
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(sequence: u64, key: impl Into<String>) -> Self {
        Self {
            sequence,
            kind: EventKind::Delete,
            key: key.into(),
            value: String::new(),
        }
    }

    /// Encode as one record, without the trailing newline
    pub fn to_line(&self, checksum: bool) -> String {
        let mut line = format!(
            "{}\t{}\t{}\t{}",
            self.sequence,
            self.kind.code(),
            escape(&self.key),
            escape(&self.value)
        );
        if checksum {
            let crc = crc32fast::hash(line.as_bytes());
            line.push('\t');
            line.push_str(&format!("{:08x}", crc));
        }
        line
    }

    /// Decode one record (trailing line terminator already stripped)
    pub fn from_line(line: &str) -> Result<Self, DecodeError> {
        let fields: Vec<&str> = line.split('\t').collect();
        match fields.len() {
            4 => {}
            5 => verify_checksum(line)?,
            n => return Err(DecodeError::FieldCount(n)),
        }

        let sequence = fields[0]
            .parse::<u64>()
            .map_err(|_| DecodeError::Sequence(fields[0].to_string()))?;

        let kind = fields[1]
            .parse::<u8>()
            .ok()
            .and_then(EventKind::from_code)
            .ok_or_else(|| DecodeError::Kind(fields[1].to_string()))?;

        let key = unescape(fields[2]).map_err(|source| DecodeError::Escape {
            field: "key",
            source,
        })?;
        if key.is_empty() {
            return Err(DecodeError::EmptyKey);
        }

        let value = match kind {
            EventKind::Put => unescape(fields[3])
                .map_err(|source| DecodeError::Escape {
                    field: "value",
                    source,
                })?
                .into_owned(),
            EventKind::Delete => String::new(),
        };

        Ok(Self {
            sequence,
            kind,
            key: key.into_owned(),
            value,
        })
    }
}

fn verify_checksum(line: &str) -> Result<(), DecodeError> {
    let Some((body, stored)) = line.rsplit_once('\t') else {
        return Err(DecodeError::FieldCount(1));
    };
    if stored.len() != 8 {
        return Err(DecodeError::ChecksumField(stored.to_string()));
    }
    let stored = u32::from_str_radix(stored, 16)
        .map_err(|_| DecodeError::ChecksumField(stored.to_string()))?;
    let computed = crc32fast::hash(body.as_bytes());
    if stored != computed {
        return Err(DecodeError::ChecksumMismatch { stored, computed });
    }
    Ok(())
}

fn needs_escape(c: char) -> bool {
    matches!(c, '%' | '\t' | '\n' | '\r')
}

/// Percent-escape the characters that would break record framing
pub fn escape(raw: &str) -> Cow<'_, str> {
    if !raw.contains(needs_escape) {
        return Cow::Borrowed(raw);
    }

    let mut out = String::with_capacity(raw.len() + 8);
    for c in raw.chars() {
        match c {
            '%' => out.push_str("%25"),
            '\t' => out.push_str("%09"),
            '\n' => out.push_str("%0A"),
            '\r' => out.push_str("%0D"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Reverse [`escape`]. Any `%XX` sequence is decoded, not only the ones
/// `escape` produces.
pub fn unescape(encoded: &str) -> Result<Cow<'_, str>, EscapeError> {
    if !encoded.contains('%') {
        return Ok(Cow::Borrowed(encoded));
    }

    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        let digits = bytes.get(i + 1..i + 3).ok_or(EscapeError::Truncated(i))?;
        match (hex_value(digits[0]), hex_value(digits[1])) {
            (Some(hi), Some(lo)) => out.push((hi << 4) | lo),
            _ => return Err(EscapeError::InvalidHex(i)),
        }
        i += 3;
    }

    String::from_utf8(out)
        .map(Cow::Owned)
        .map_err(|_| EscapeError::InvalidUtf8)
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
