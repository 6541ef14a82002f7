//! Incremental response parser.
//!
//! # Design
//! A `Transaction` walks ResponseLine -> Headers -> Body -> Done, or diverts
//! to Error from any stage. The only network read happens in the driving
//! loop: when a stage handler cannot progress it sets the buffer's
//! need-more-input flag and returns, and the loop fills before dispatching
//! again. Every handler either consumes bytes, advances the stage, or asks
//! for input, so the loop cannot spin without progress. Once end-of-stream
//! has been seen no handler asks for input again.
//!
//! Only `Content-Length` is interpreted. Other headers are skipped without
//! being retained.

use tracing::{debug, trace, warn};

use crate::buffer::LineBuffer;
use crate::error::{HttpError, Malformed};
use crate::sink::BodySink;
use crate::transport::Connection;

const CONTENT_LENGTH: &[u8] = b"content-length:";

/// Current decode phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ResponseLine,
    Headers,
    Body,
    Done,
    Error,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Error)
    }
}

/// Decode state for one request/response cycle. Not reusable.
pub struct Transaction<'s, S: BodySink + ?Sized> {
    stage: Stage,
    status_code: Option<u16>,
    /// Zero means the body runs until the connection closes.
    content_length: u64,
    content_read: u64,
    buffer: LineBuffer,
    sink: &'s mut S,
    sink_open: bool,
}

impl<'s, S: BodySink + ?Sized> Transaction<'s, S> {
    pub fn new(sink: &'s mut S) -> Self {
        Self {
            stage: Stage::ResponseLine,
            status_code: None,
            content_length: 0,
            content_read: 0,
            buffer: LineBuffer::new(),
            sink,
            sink_open: false,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Declared body length, `None` when the body is EOF-delimited.
    pub fn content_length(&self) -> Option<u64> {
        (self.content_length != 0).then_some(self.content_length)
    }

    pub fn content_read(&self) -> u64 {
        self.content_read
    }

    pub fn end_of_stream(&self) -> bool {
        self.buffer.end_of_stream()
    }

    /// Drive the transaction to `Done` or `Error`.
    ///
    /// On failure the stage is `Error` and an opened sink has been closed.
    pub fn run<C: Connection + ?Sized>(&mut self, conn: &mut C) -> Result<(), HttpError> {
        let result = self.drive(conn);
        if let Err(err) = &result {
            debug!(stage = ?self.stage, error = %err, "transaction failed");
            self.stage = Stage::Error;
            self.release_sink();
        }
        result
    }

    fn drive<C: Connection + ?Sized>(&mut self, conn: &mut C) -> Result<(), HttpError> {
        while !self.stage.is_terminal() {
            if self.buffer.needs_more_input() {
                self.buffer.fill_from(conn)?;
            }

            match self.stage {
                Stage::ResponseLine => self.parse_response_line()?,
                Stage::Headers => self.parse_header()?,
                Stage::Body => self.parse_body()?,
                Stage::Done | Stage::Error => {}
            }
        }
        Ok(())
    }

    fn parse_response_line(&mut self) -> Result<(), HttpError> {
        let Some(end) = self.buffer.find_line_end()? else {
            return Ok(());
        };
        let code = parse_status_code(self.buffer.line(end))?;
        self.buffer.consume_to(end);

        debug!(status = code, "status line");
        self.status_code = Some(code);
        self.stage = Stage::Headers;
        Ok(())
    }

    fn parse_header(&mut self) -> Result<(), HttpError> {
        let Some(end) = self.buffer.find_line_end()? else {
            return Ok(());
        };

        if end == 2 {
            self.buffer.consume_to(end);
            self.sink.open().map_err(HttpError::Sink)?;
            self.sink_open = true;
            debug!(content_length = self.content_length, "headers complete");
            self.stage = Stage::Body;
            return Ok(());
        }

        if let Some(value) = content_length_value(self.buffer.line(end)) {
            self.content_length = parse_content_length(value)?;
        }
        self.buffer.consume_to(end);
        Ok(())
    }

    fn parse_body(&mut self) -> Result<(), HttpError> {
        let count = if self.content_length != 0 {
            let needed = self.content_length - self.content_read;
            if needed == 0 {
                return self.finish();
            }
            if self.buffer.is_empty() {
                if self.buffer.end_of_stream() {
                    return Err(HttpError::SizeMismatch {
                        expected: self.content_length,
                        received: self.content_read,
                    });
                }
                self.buffer.request_more_input();
                return Ok(());
            }
            // needed is bounded by the buffer length here, so it fits usize.
            (self.buffer.len() as u64).min(needed) as usize
        } else {
            if self.buffer.is_empty() {
                if self.buffer.end_of_stream() {
                    return self.finish();
                }
                self.buffer.request_more_input();
                return Ok(());
            }
            self.buffer.len()
        };

        self.sink
            .append(&self.buffer.as_slice()[..count])
            .map_err(HttpError::Sink)?;
        self.content_read += count as u64;
        self.buffer.consume_to(count);
        trace!(delivered = count, total = self.content_read, "body chunk");
        Ok(())
    }

    fn finish(&mut self) -> Result<(), HttpError> {
        self.sink_open = false;
        self.sink.close().map_err(HttpError::Sink)?;
        debug!(body_len = self.content_read, "response complete");
        self.stage = Stage::Done;
        Ok(())
    }

    fn release_sink(&mut self) {
        if self.sink_open {
            self.sink_open = false;
            if let Err(e) = self.sink.close() {
                warn!(error = %e, "could not close body sink after failure");
            }
        }
    }
}

impl<S: BodySink + ?Sized> Drop for Transaction<'_, S> {
    fn drop(&mut self) {
        self.release_sink();
    }
}

/// The first whitespace-delimited token after the version is the code.
fn parse_status_code(line: &[u8]) -> Result<u16, Malformed> {
    let mut tokens = line
        .split(|b| b.is_ascii_whitespace())
        .filter(|t| !t.is_empty());
    let _version = tokens.next().ok_or(Malformed::MissingStatusCode)?;
    let code = tokens.next().ok_or(Malformed::MissingStatusCode)?;
    parse_decimal(code)
        .and_then(|n| u16::try_from(n).ok())
        .ok_or(Malformed::MissingStatusCode)
}

fn content_length_value(line: &[u8]) -> Option<&[u8]> {
    if line.len() < CONTENT_LENGTH.len() {
        return None;
    }
    let (name, value) = line.split_at(CONTENT_LENGTH.len());
    name.eq_ignore_ascii_case(CONTENT_LENGTH).then_some(value)
}

/// A present Content-Length must be a positive integer.
fn parse_content_length(value: &[u8]) -> Result<u64, Malformed> {
    match parse_decimal(value.trim_ascii()) {
        Some(n) if n > 0 => Ok(n),
        _ => Err(Malformed::InvalidContentLength),
    }
}

fn parse_decimal(digits: &[u8]) -> Option<u64> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}
