//! Bounded read buffer with line-oriented consumption.
//!
//! The buffer holds a window of unconsumed connection bytes, always starting
//! at offset 0. Handlers look for a CRLF, process the line as a slice, then
//! `consume_to` the offset just past it. No line or body chunk in this
//! protocol may exceed `READ_BUF_SIZE`; a full buffer with nothing decodable
//! is a protocol error.

use tracing::trace;

use crate::error::{HttpError, Malformed};
use crate::transport::Connection;

pub const READ_BUF_SIZE: usize = 2048;

pub struct LineBuffer {
    data: [u8; READ_BUF_SIZE],
    len: usize,
    end_of_stream: bool,
    need_more_input: bool,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self {
            data: [0; READ_BUF_SIZE],
            len: 0,
            end_of_stream: false,
            need_more_input: false,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn remaining_capacity(&self) -> usize {
        READ_BUF_SIZE - self.len
    }

    /// The currently valid, unconsumed bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    pub fn needs_more_input(&self) -> bool {
        self.need_more_input
    }

    /// Ask the driving loop to read before the current stage runs again.
    pub fn request_more_input(&mut self) {
        self.need_more_input = true;
    }

    /// One read of up to `remaining_capacity()` bytes into the free region.
    ///
    /// A zero-byte read marks end-of-stream. Either way the need-more-input
    /// flag is cleared: an observed close is progress the stage handlers act on.
    pub fn fill_from<C: Connection + ?Sized>(&mut self, conn: &mut C) -> Result<usize, HttpError> {
        if self.remaining_capacity() == 0 {
            return Err(Malformed::BufferFull.into());
        }

        let n = conn
            .receive(&mut self.data[self.len..])
            .map_err(HttpError::Transport)?;
        if n == 0 {
            self.end_of_stream = true;
        } else {
            self.len += n;
        }
        self.need_more_input = false;
        trace!(read = n, buffered = self.len, "filled read buffer");
        Ok(n)
    }

    /// Locate the first line terminator.
    ///
    /// Returns the offset just past the CRLF, so the line content is
    /// `as_slice()[..end - 2]`. `Ok(None)` means more input is needed and the
    /// flag has been set. Once the stream has ended a missing CRLF is an error.
    pub fn find_line_end(&mut self) -> Result<Option<usize>, Malformed> {
        let valid = &self.data[..self.len];
        match valid.iter().position(|&b| b == b'\r') {
            Some(cr) if cr + 1 < valid.len() => {
                if valid[cr + 1] != b'\n' {
                    return Err(Malformed::BareCarriageReturn);
                }
                Ok(Some(cr + 2))
            }
            _ => {
                if self.end_of_stream {
                    return Err(Malformed::MissingCrlf);
                }
                self.need_more_input = true;
                Ok(None)
            }
        }
    }

    /// The line ending at `end` (as returned by `find_line_end`), without CRLF.
    pub fn line(&self, end: usize) -> &[u8] {
        &self.data[..end - 2]
    }

    /// Drop everything before `offset`, shifting the rest down to position 0.
    pub fn consume_to(&mut self, offset: usize) {
        debug_assert!(offset <= self.len, "consume past valid bytes");
        self.data.copy_within(offset..self.len, 0);
        self.len -= offset;
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;

    struct Chunks(VecDeque<Vec<u8>>);

    impl Connection for Chunks {
        fn send(&mut self, data: &[u8]) -> io::Result<usize> {
            Ok(data.len())
        }

        fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let Some(mut chunk) = self.0.pop_front() else {
                return Ok(0);
            };
            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            if n < chunk.len() {
                self.0.push_front(chunk.split_off(n));
            }
            Ok(n)
        }

        fn close(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn chunks(parts: &[&[u8]]) -> Chunks {
        Chunks(parts.iter().map(|p| p.to_vec()).collect())
    }

    #[test]
    fn starts_empty() {
        let buf = LineBuffer::new();
        assert!(buf.is_empty());
        assert_eq!(buf.remaining_capacity(), READ_BUF_SIZE);
        assert!(!buf.needs_more_input());
        assert!(!buf.end_of_stream());
    }

    #[test]
    fn fill_appends_and_clears_flag() {
        let mut conn = chunks(&[b"abc", b"def"]);
        let mut buf = LineBuffer::new();
        buf.request_more_input();
        assert_eq!(buf.fill_from(&mut conn).unwrap(), 3);
        assert!(!buf.needs_more_input());
        buf.fill_from(&mut conn).unwrap();
        assert_eq!(buf.as_slice(), b"abcdef");
        assert_eq!(buf.remaining_capacity(), READ_BUF_SIZE - 6);
    }

    #[test]
    fn zero_read_marks_end_of_stream() {
        let mut conn = chunks(&[]);
        let mut buf = LineBuffer::new();
        buf.request_more_input();
        assert_eq!(buf.fill_from(&mut conn).unwrap(), 0);
        assert!(buf.end_of_stream());
        assert!(!buf.needs_more_input());
    }

    #[test]
    fn fill_when_full_is_buffer_full() {
        let big = vec![b'x'; READ_BUF_SIZE];
        let mut conn = chunks(&[&big, b"more"]);
        let mut buf = LineBuffer::new();
        buf.fill_from(&mut conn).unwrap();
        assert_eq!(buf.remaining_capacity(), 0);
        let err = buf.fill_from(&mut conn).unwrap_err();
        assert!(matches!(err, HttpError::MalformedResponse(Malformed::BufferFull)));
    }

    #[test]
    fn finds_crlf_and_strips_it() {
        let mut conn = chunks(&[b"HTTP/1.0 200 OK\r\nrest"]);
        let mut buf = LineBuffer::new();
        buf.fill_from(&mut conn).unwrap();
        let end = buf.find_line_end().unwrap().unwrap();
        assert_eq!(end, 17);
        assert_eq!(buf.line(end), b"HTTP/1.0 200 OK");
        buf.consume_to(end);
        assert_eq!(buf.as_slice(), b"rest");
    }

    #[test]
    fn empty_line_is_found() {
        let mut conn = chunks(&[b"\r\nbody"]);
        let mut buf = LineBuffer::new();
        buf.fill_from(&mut conn).unwrap();
        let end = buf.find_line_end().unwrap().unwrap();
        assert_eq!(end, 2);
        assert!(buf.line(end).is_empty());
    }

    #[test]
    fn no_cr_requests_more_input() {
        let mut conn = chunks(&[b"HTTP/1.0 2"]);
        let mut buf = LineBuffer::new();
        buf.fill_from(&mut conn).unwrap();
        assert_eq!(buf.find_line_end().unwrap(), None);
        assert!(buf.needs_more_input());
    }

    #[test]
    fn trailing_cr_waits_for_lf() {
        let mut conn = chunks(&[b"HTTP/1.0 200 OK\r", b"\n"]);
        let mut buf = LineBuffer::new();
        buf.fill_from(&mut conn).unwrap();
        assert_eq!(buf.find_line_end().unwrap(), None);
        assert!(buf.needs_more_input());
        buf.fill_from(&mut conn).unwrap();
        assert_eq!(buf.find_line_end().unwrap(), Some(17));
    }

    #[test]
    fn bare_cr_is_malformed() {
        let mut conn = chunks(&[b"HTTP/1.0 200\rOK\r\n"]);
        let mut buf = LineBuffer::new();
        buf.fill_from(&mut conn).unwrap();
        assert_eq!(buf.find_line_end(), Err(Malformed::BareCarriageReturn));
    }

    #[test]
    fn partial_line_at_eof_is_malformed() {
        let mut conn = chunks(&[b"HTTP/1.0 200 OK"]);
        let mut buf = LineBuffer::new();
        buf.fill_from(&mut conn).unwrap();
        buf.fill_from(&mut conn).unwrap();
        assert!(buf.end_of_stream());
        assert_eq!(buf.find_line_end(), Err(Malformed::MissingCrlf));
    }

    #[test]
    fn trailing_cr_at_eof_is_malformed() {
        let mut conn = chunks(&[b"HTTP/1.0 200 OK\r"]);
        let mut buf = LineBuffer::new();
        buf.fill_from(&mut conn).unwrap();
        buf.fill_from(&mut conn).unwrap();
        assert_eq!(buf.find_line_end(), Err(Malformed::MissingCrlf));
    }

    #[test]
    fn consume_everything_empties_buffer() {
        let mut conn = chunks(&[b"abc"]);
        let mut buf = LineBuffer::new();
        buf.fill_from(&mut conn).unwrap();
        buf.consume_to(3);
        assert!(buf.is_empty());
        assert_eq!(buf.remaining_capacity(), READ_BUF_SIZE);
    }
}
