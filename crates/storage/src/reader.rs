// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sequential reader over transaction log records
//!
//! The reader validates every record as it goes: a malformed line, a
//! checksum mismatch or a sequence number that does not exceed its
//! predecessor ends iteration with an error. Nothing after the first error
//! is ever yielded.

use crate::error::RecoveryError;
use crate::event::{DecodeError, Event};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Iterator over the events of a transaction log, in record order
pub struct EventReader<R> {
    reader: R,
    line_number: u64,
    last_sequence: u64,
    finished: bool,
}

/// Boxed record source used for replay
pub type RecordSource = Box<dyn BufRead + Send>;

impl EventReader<RecordSource> {
    /// Read a log file. A missing file reads as an empty log.
    pub fn open(path: &Path) -> Result<Self, io::Error> {
        let reader: RecordSource = match File::open(path) {
            Ok(file) => Box::new(BufReader::new(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Box::new(io::empty()),
            Err(e) => return Err(e),
        };
        Ok(Self::new(reader))
    }
}

impl<R: BufRead> EventReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_number: 0,
            last_sequence: 0,
            finished: false,
        }
    }

    /// Highest sequence number yielded so far (0 before the first event)
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    fn read_event(&mut self) -> Option<Result<Event, RecoveryError>> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match self.reader.read_until(b'\n', &mut buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(RecoveryError::Io(e))),
            }
            self.line_number += 1;

            let mut record = buf.as_slice();
            if let Some(rest) = record.strip_suffix(b"\n") {
                record = rest.strip_suffix(b"\r").unwrap_or(rest);
            }
            if record.is_empty() {
                continue;
            }

            let line = match std::str::from_utf8(record) {
                Ok(line) => line,
                Err(e) => return Some(Err(self.malformed(e))),
            };

            let event = match Event::from_line(line) {
                Ok(event) => event,
                Err(DecodeError::ChecksumMismatch { .. }) => {
                    return Some(Err(RecoveryError::ChecksumMismatch {
                        line: self.line_number,
                    }));
                }
                Err(e) => return Some(Err(self.malformed(e))),
            };

            if event.sequence <= self.last_sequence {
                return Some(Err(RecoveryError::OutOfOrder {
                    line: self.line_number,
                    sequence: event.sequence,
                    previous: self.last_sequence,
                }));
            }

            self.last_sequence = event.sequence;
            return Some(Ok(event));
        }
    }

    fn malformed(&self, reason: impl ToString) -> RecoveryError {
        RecoveryError::Malformed {
            line: self.line_number,
            reason: reason.to_string(),
        }
    }
}

impl<R: BufRead> Iterator for EventReader<R> {
    type Item = Result<Event, RecoveryError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let item = self.read_event();
        if !matches!(item, Some(Ok(_))) {
            self.finished = true;
        }
        item
    }
}

#[cfg(test)]
#[path = "reader_tests.rs"]
mod tests;
