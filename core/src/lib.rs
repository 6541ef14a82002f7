//! Minimal incremental HTTP/1.0 client engine.
//!
//! # Overview
//! Sends one GET or POST per call over a fresh TCP connection, then decodes
//! the response incrementally: status line, headers, and a body delimited by
//! either `Content-Length` or connection close. The body is streamed into a
//! caller-supplied [`BodySink`], so memory use is bounded by the 2 KiB read
//! buffer no matter how large the response is.
//!
//! # Design
//! - Network I/O sits behind the [`Connection`] and [`Connector`] traits, so
//!   the decoder runs the same against TCP, scripted chunks in tests, or any
//!   other byte stream.
//! - [`Transaction`] is an explicit state machine driven by one read loop.
//!   Every read is followed by a dispatch to the current stage, and a stage
//!   that cannot progress asks for more input instead of blocking.
//! - [`HttpClient`] owns the configuration and connector only. It can be
//!   shared and reused; each call owns its connection and transaction.

pub mod buffer;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod parser;
pub mod sink;
pub mod transport;
pub mod types;

pub use buffer::{LineBuffer, READ_BUF_SIZE};
pub use client::HttpClient;
pub use config::{ClientConfig, ConfigError};
pub use error::{HttpError, Malformed};
pub use http::{HttpMethod, HttpRequest, RequestBuilder};
pub use parser::{Stage, Transaction};
pub use sink::{BodySink, FileSink, MemorySink};
pub use transport::{send_all, Connection, Connector, TcpConnection, TcpConnector};
pub use types::{Exchange, Response, Target};
