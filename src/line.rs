//! Bounded-stack line buffer with heap overflow, and the line reader built
//! on top of it.
//!
//! A key file line is almost always under 82 bytes (80 columns of card data
//! plus CRLF); `ExtraString` keeps that common case on the stack via
//! `SmallVec`'s inline storage and only spills to the heap for the rare
//! over-long line, instead of allocating a `String` per line unconditionally.

use smallvec::SmallVec;
use std::fmt;
use std::io::{self, BufRead};
use std::ops::Deref;

/// A single line's bytes: inline up to 82 bytes, heap-backed beyond that.
#[derive(Clone)]
pub struct ExtraString {
    bytes: SmallVec<[u8; 82]>,
    had_cr: bool,
}

impl ExtraString {
    /// Whether the line was CRLF-terminated in the source file.
    pub fn had_cr(&self) -> bool {
        self.had_cr
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.bytes).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }
}

impl Deref for ExtraString {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Debug for ExtraString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtraString")
            .field("text", &self.as_str())
            .field("had_cr", &self.had_cr)
            .finish()
    }
}

/// Yields one logical line at a time from an underlying reader, stripping
/// the trailing `\n` and, when present, `\r`.
pub struct LineReader<R> {
    reader: R,
    line_number: usize,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(reader: R) -> Self {
        LineReader {
            reader,
            line_number: 0,
        }
    }

    /// 1-based number of the line most recently returned by `next_line`.
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Read the next logical line. Returns `None` at EOF.
    pub fn next_line(&mut self) -> io::Result<Option<ExtraString>> {
        let mut buf: SmallVec<[u8; 82]> = SmallVec::new();
        let mut byte = [0u8; 1];
        loop {
            let read = self.reader.read(&mut byte)?;
            if read == 0 {
                if buf.is_empty() {
                    return Ok(None);
                }
                break;
            }
            if byte[0] == b'\n' {
                break;
            }
            buf.push(byte[0]);
        }
        self.line_number += 1;
        let had_cr = buf.last() == Some(&b'\r');
        if had_cr {
            buf.pop();
        }
        Ok(Some(ExtraString { bytes: buf, had_cr }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn splits_crlf_lines() {
        let mut reader = LineReader::new(Cursor::new(b"first\r\nsecond\nthird".as_slice()));
        let l1 = reader.next_line().unwrap().unwrap();
        assert_eq!(l1.as_str(), "first");
        assert!(l1.had_cr());
        let l2 = reader.next_line().unwrap().unwrap();
        assert_eq!(l2.as_str(), "second");
        assert!(!l2.had_cr());
        let l3 = reader.next_line().unwrap().unwrap();
        assert_eq!(l3.as_str(), "third");
        assert!(reader.next_line().unwrap().is_none());
    }

    #[test]
    fn handles_overlong_lines() {
        let long_line = "x".repeat(200);
        let mut reader = LineReader::new(Cursor::new(long_line.clone().into_bytes()));
        let line = reader.next_line().unwrap().unwrap();
        assert_eq!(line.len(), 200);
        assert_eq!(line.as_str(), long_line);
    }

    #[test]
    fn empty_input_yields_no_lines() {
        let mut reader = LineReader::new(Cursor::new(b"".as_slice()));
        assert!(reader.next_line().unwrap().is_none());
    }
}
