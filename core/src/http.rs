//! Request assembly.
//!
//! # Design
//! The request line and headers are accumulated into one in-memory image and
//! sent with a single `send_all`, followed by the literal body bytes for POST.
//! Some servers misbehave when the head trickles in over several small writes,
//! so the head is never streamed piecemeal.
//!
//! Building validates the target before anything touches the network. A build
//! failure is reported as `HttpError::Build`, distinct from a send failure.

use crate::error::HttpError;
use crate::transport::{send_all, Connection};
use crate::types::Target;

pub const HTTP_VERSION: &str = "HTTP/1.0";
const CRLF: &[u8] = b"\r\n";

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// Accumulates the pieces of one request.
#[derive(Debug, Clone)]
pub struct RequestBuilder<'a> {
    method: HttpMethod,
    target: &'a Target,
    user_agent: &'a str,
    content_type: &'a str,
    body: &'a [u8],
}

impl<'a> RequestBuilder<'a> {
    pub fn get(target: &'a Target, user_agent: &'a str) -> Self {
        Self {
            method: HttpMethod::Get,
            target,
            user_agent,
            content_type: "",
            body: &[],
        }
    }

    pub fn post(target: &'a Target, user_agent: &'a str, content_type: &'a str, body: &'a [u8]) -> Self {
        Self {
            method: HttpMethod::Post,
            target,
            user_agent,
            content_type,
            body,
        }
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn target(&self) -> &Target {
        self.target
    }

    /// Validate and render the request head.
    pub fn build(&self) -> Result<HttpRequest<'a>, HttpError> {
        check_token("host", &self.target.host)?;
        check_token("path", &self.target.path)?;
        check_header_value("User-Agent", self.user_agent)?;

        let mut head = Vec::with_capacity(128 + self.target.path.len() + self.target.host.len());
        head.extend_from_slice(self.method.as_str().as_bytes());
        head.push(b' ');
        head.extend_from_slice(self.target.path.as_bytes());
        head.push(b' ');
        head.extend_from_slice(HTTP_VERSION.as_bytes());
        head.extend_from_slice(CRLF);

        push_header(&mut head, "Host", &self.target.authority_host());
        push_header(&mut head, "User-Agent", self.user_agent);

        let body = match self.method {
            HttpMethod::Get => &[][..],
            HttpMethod::Post => {
                check_header_value("Content-Type", self.content_type)?;
                push_header(&mut head, "Content-Type", self.content_type);
                push_header(&mut head, "Content-Length", &self.body.len().to_string());
                self.body
            }
        };
        head.extend_from_slice(CRLF);

        Ok(HttpRequest { head, body })
    }
}

/// A rendered request: the head image plus the body to follow it.
#[derive(Debug, Clone)]
pub struct HttpRequest<'a> {
    head: Vec<u8>,
    body: &'a [u8],
}

impl HttpRequest<'_> {
    pub fn head(&self) -> &[u8] {
        &self.head
    }

    pub fn body(&self) -> &[u8] {
        self.body
    }

    /// Transmit the head in one write attempt, then the body.
    pub fn send<C: Connection + ?Sized>(&self, conn: &mut C) -> Result<(), HttpError> {
        send_all(conn, &self.head)?;
        if !self.body.is_empty() {
            send_all(conn, self.body)?;
        }
        Ok(())
    }
}

fn push_header(head: &mut Vec<u8>, name: &str, value: &str) {
    head.extend_from_slice(name.as_bytes());
    head.extend_from_slice(b": ");
    head.extend_from_slice(value.as_bytes());
    head.extend_from_slice(CRLF);
}

/// Host and path end up in the request line; whitespace or control bytes
/// would change the framing.
fn check_token(what: &str, value: &str) -> Result<(), HttpError> {
    if value.is_empty() {
        return Err(HttpError::Build(format!("{what} is empty")));
    }
    if value.bytes().any(|b| b.is_ascii_whitespace() || b.is_ascii_control()) {
        return Err(HttpError::Build(format!("{what} contains whitespace or control characters")));
    }
    Ok(())
}

fn check_header_value(name: &str, value: &str) -> Result<(), HttpError> {
    if value.bytes().any(|b| b == b'\r' || b == b'\n') {
        return Err(HttpError::Build(format!("{name} contains a line break")));
    }
    Ok(())
}
