//! Streaming trace input.
//!
//! A trace is plain text, one request per line, three whitespace-separated
//! fields: `timestamp id size`. The timestamp is read and discarded, `id` is
//! a 64-bit integer and `size` a positive 64-bit integer. The trace is read
//! once, one request at a time, with a reusable line buffer so memory stays
//! independent of trace length.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use thiserror::Error;
use webcache_rs::Request;

/// Errors surfaced while streaming a trace.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("i/o error reading trace: {0}")]
    Io(#[from] io::Error),
    #[error("malformed trace line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

/// Pull iterator over the requests of a single trace file.
pub struct TraceReader {
    reader: BufReader<File>,
    line_buffer: String,
    line_num: usize,
    /// Set after the first error; the iterator then stays exhausted.
    finished: bool,
}

impl TraceReader {
    /// Opens a trace file for streaming.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(TraceReader {
            // 1MB buffer keeps syscall counts low on long traces
            reader: BufReader::with_capacity(1024 * 1024, file),
            line_buffer: String::with_capacity(256),
            line_num: 0,
            finished: false,
        })
    }

    /// Parses one line into a request. Blank lines yield `None`.
    fn parse_line(line: &str, line_num: usize) -> Result<Option<Request>, TraceError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let mut fields = line.split_whitespace();

        // Timestamp: validated, then discarded
        let ts = fields.next().ok_or_else(|| TraceError::Parse {
            line: line_num,
            reason: "missing timestamp".into(),
        })?;
        ts.parse::<i64>().map_err(|_| TraceError::Parse {
            line: line_num,
            reason: format!("invalid timestamp '{ts}'"),
        })?;

        let id = fields.next().ok_or_else(|| TraceError::Parse {
            line: line_num,
            reason: "missing id".into(),
        })?;
        let id = id.parse::<u64>().map_err(|_| TraceError::Parse {
            line: line_num,
            reason: format!("invalid id '{id}'"),
        })?;

        let size = fields.next().ok_or_else(|| TraceError::Parse {
            line: line_num,
            reason: "missing size".into(),
        })?;
        let size = size.parse::<u64>().map_err(|_| TraceError::Parse {
            line: line_num,
            reason: format!("invalid size '{size}'"),
        })?;
        if size == 0 {
            return Err(TraceError::Parse {
                line: line_num,
                reason: "size must be positive".into(),
            });
        }

        Ok(Some(Request::new(id, size)))
    }
}

impl Iterator for TraceReader {
    type Item = Result<Request, TraceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            self.line_buffer.clear();
            match self.reader.read_line(&mut self.line_buffer) {
                Ok(0) => return None, // EOF
                Ok(_) => {
                    self.line_num += 1;
                    match Self::parse_line(&self.line_buffer, self.line_num) {
                        Ok(Some(request)) => return Some(Ok(request)),
                        Ok(None) => {} // blank line
                        Err(e) => {
                            self.finished = true;
                            return Some(Err(e));
                        }
                    }
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(TraceError::Io(e)));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_trace(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_reads_whitespace_separated_fields() {
        let file = write_trace("0 1 100\n5 2 200\n\n9 1 100\n");
        let reqs: Vec<Request> = TraceReader::open(file.path())
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(
            reqs,
            vec![Request::new(1, 100), Request::new(2, 200), Request::new(1, 100)]
        );
    }

    #[test]
    fn test_stops_at_first_malformed_line() {
        let file = write_trace("0 1 100\n0 nonsense\n0 2 200\n");
        let mut reader = TraceReader::open(file.path()).unwrap();
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().is_none(), "reading stops after the error");
    }

    #[test]
    fn test_rejects_zero_size() {
        let file = write_trace("0 1 0\n");
        let mut reader = TraceReader::open(file.path()).unwrap();
        assert!(reader.next().unwrap().is_err());
    }

    #[test]
    fn test_empty_trace() {
        let file = write_trace("");
        let mut reader = TraceReader::open(file.path()).unwrap();
        assert!(reader.next().is_none());
    }
}
