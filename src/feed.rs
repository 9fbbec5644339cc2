//! Line-based reader for the comma-delimited network and location feeds.
//!
//! The format is simpler than full CSV: quote characters are
//! stripped, fields never span lines, and a missing trailing column reads as
//! an empty string.

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use crate::error::{Error, Result, ValidationError};

/// A single feed row split into columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    fields: Vec<String>,
}

impl Record {
    /// Split a raw line into a record.
    pub fn parse(line: &str) -> Self {
        let cleaned: String = line.chars().filter(|c| *c != '"' && *c != '\'').collect();
        let fields = cleaned.split(',').map(|f| f.trim().to_string()).collect();
        Self { fields }
    }

    /// Column value, or an empty string when the column is absent.
    pub fn get(&self, index: usize) -> &str {
        self.fields.get(index).map(String::as_str).unwrap_or("")
    }

    /// Number of columns in the row.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Options shared by both feeds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedOptions {
    /// Skip the first non-blank line (column header)
    pub has_header: bool,
}

/// Counters collected while building from a feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    /// Rows turned into entries
    pub accepted: usize,
    /// Malformed rows that were skipped
    pub skipped: usize,
}

/// A parsed row, or the reason the row could not be decoded.
pub type RowResult = std::result::Result<Record, ValidationError>;

/// Iterator over the rows of a feed, yielding `(line_number, row)`.
///
/// Lines are read as raw bytes, so an undecodable line only fails that row.
/// Only I/O errors end the iteration.
pub struct Records<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
    line: usize,
    header_pending: bool,
    failed: bool,
}

impl<R: Read> Iterator for Records<R> {
    type Item = io::Result<(usize, RowResult)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.failed {
                return None;
            }
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
            self.line += 1;

            let raw = trim_line_end(&self.buf);
            if raw.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            if self.header_pending {
                self.header_pending = false;
                log::debug!("skipping header: {}", String::from_utf8_lossy(raw));
                continue;
            }

            let row = std::str::from_utf8(raw)
                .map(Record::parse)
                .map_err(|e| ValidationError::InvalidEncoding(e.valid_up_to()));
            return Some(Ok((self.line, row)));
        }
    }
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Iterate over the rows of a feed.
///
/// Line numbers are 1-based and count blank and header lines, so they point
/// at the physical line in the source file.
pub fn records<R: Read>(reader: R, options: FeedOptions) -> Records<R> {
    Records {
        reader: BufReader::new(reader),
        buf: Vec::new(),
        line: 0,
        header_pending: options.has_header,
        failed: false,
    }
}

/// Open a feed file, decompressing it when the name ends in `.gz`.
pub fn open_feed(path: &Path) -> Result<Box<dyn Read + Send>> {
    let file = File::open(path).map_err(|source| Error::FeedIo {
        path: path.to_path_buf(),
        source,
    })?;
    let gzipped = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);
    if gzipped {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}
