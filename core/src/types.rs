//! Request targets and completed-response summaries.
//!
//! # Design
//! `Target` is supplied by the caller and never mutated by the engine. It can
//! be built from parts (the way a preferences form hands over host, port and
//! path separately) or parsed from an `http://` URL.

use std::borrow::Cow;
use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HttpError;

/// Where a request is sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_port() -> u16 {
    80
}

fn default_path() -> String {
    "/".to_string()
}

impl Target {
    pub fn new(host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            path: path.into(),
        }
    }

    /// The host as it appears in a `Host` header or URL, with IPv6
    /// literals bracketed.
    pub fn authority_host(&self) -> Cow<'_, str> {
        if self.host.contains(':') {
            Cow::Owned(format!("[{}]", self.host))
        } else {
            Cow::Borrowed(&self.host)
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "http://{}:{}{}", self.authority_host(), self.port, self.path)
    }
}

impl FromStr for Target {
    type Err = HttpError;

    /// Parse `http://host[:port][/path][?query]`. The scheme prefix is
    /// optional, a fragment is dropped, and IPv6 hosts are written `[addr]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = match s.split_once("://") {
            Some((scheme, rest)) if !scheme.contains(['/', '?', '#']) => {
                if !scheme.eq_ignore_ascii_case("http") {
                    return Err(HttpError::Build(format!("unsupported scheme in {s:?}")));
                }
                rest
            }
            _ => s,
        };

        let (authority, tail) = match rest.find(['/', '?', '#']) {
            Some(i) => rest.split_at(i),
            None => (rest, ""),
        };
        let tail = tail.split_once('#').map_or(tail, |(before, _)| before);
        let path = if tail.starts_with('/') {
            tail.to_string()
        } else {
            format!("/{tail}")
        };

        let (host, port) = split_authority(authority)
            .ok_or_else(|| HttpError::Build(format!("invalid host or port in {s:?}")))?;
        if host.is_empty() {
            return Err(HttpError::Build(format!("missing host in {s:?}")));
        }

        Ok(Target::new(host, port, path))
    }
}

/// Split `host[:port]` or `[v6addr][:port]`.
fn split_authority(authority: &str) -> Option<(&str, u16)> {
    let (host, port) = match authority.strip_prefix('[') {
        Some(bracketed) => {
            let (host, after) = bracketed.split_once(']')?;
            host.parse::<Ipv6Addr>().ok()?;
            match after {
                "" => (host, None),
                _ => (host, Some(after.strip_prefix(':')?)),
            }
        }
        None => match authority.split_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        },
    };
    let port = match port {
        Some(p) => p.parse().ok()?,
        None => default_port(),
    };
    Some((host, port))
}

/// Summary of a response that reached the `Done` stage.
///
/// The body itself lives in the caller's sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    /// Declared Content-Length, or `None` for an EOF-delimited body.
    pub content_length: Option<u64>,
    /// Bytes delivered to the sink.
    pub body_len: u64,
}

/// Outcome of one request plus the last status code seen on the wire.
///
/// `status_code` is populated whenever the status line parsed, even if the
/// transaction failed afterwards, so callers can show it for diagnostics.
#[derive(Debug)]
pub struct Exchange {
    pub status_code: Option<u16>,
    pub result: Result<Response, HttpError>,
}

impl Exchange {
    pub fn into_result(self) -> Result<Response, HttpError> {
        self.result
    }
}
