//! Error types for the HTTP/1.0 client engine.
//!
//! # Design
//! One variant per failure category a caller can act on. Connect and
//! transport failures may be worth retrying around the whole request; build
//! and malformed-response failures are not. Every failure inside the response
//! parser collapses the transaction into its `Error` stage and surfaces here.

use std::io;

use thiserror::Error;

/// Errors returned by `HttpClient` requests and by `Transaction::run`.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The connection to the target could not be established.
    #[error("could not connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// A send or receive failed, stalled, or timed out.
    #[error("transport failure: {0}")]
    Transport(#[source] io::Error),

    /// The response violated the protocol framing.
    #[error("malformed response: {0}")]
    MalformedResponse(#[from] Malformed),

    /// The body sink could not be opened, written, or closed.
    #[error("body sink failure: {0}")]
    Sink(#[source] io::Error),

    /// The connection closed before the declared Content-Length arrived.
    #[error("response body ended after {received} of {expected} bytes")]
    SizeMismatch { expected: u64, received: u64 },

    /// The outgoing request could not be assembled. Nothing was sent.
    #[error("could not build request: {0}")]
    Build(String),
}

/// Structural reasons a response is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Malformed {
    /// The stream ended inside a line that has no CRLF.
    #[error("line is not terminated by CRLF")]
    MissingCrlf,

    /// A carriage return is followed by something other than a line feed.
    #[error("carriage return not followed by line feed")]
    BareCarriageReturn,

    /// The status line has no numeric code after the version token.
    #[error("status line has no status code")]
    MissingStatusCode,

    /// Content-Length is zero, negative, or not a number.
    #[error("invalid Content-Length value")]
    InvalidContentLength,

    /// A single line does not fit in the read buffer.
    #[error("line exceeds the read buffer")]
    BufferFull,
}

impl HttpError {
    /// Whether retrying the whole request could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HttpError::Connect { .. } | HttpError::Transport(_) | HttpError::SizeMismatch { .. }
        )
    }
}
