//! Connection abstraction and the blocking TCP transport.
//!
//! # Design
//! The engine only needs three things from a connection: send some bytes,
//! receive some bytes, close. `Connection` captures exactly that so tests can
//! script fragmented reads and stalled writes in memory. `Connector` opens
//! connections for a client; `TcpConnector` applies the client's timeout to
//! connect, read and write so a stalled peer surfaces as a transport error.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, trace};

use crate::error::HttpError;

/// A byte-oriented, blocking connection.
pub trait Connection {
    /// Write some prefix of `data`, returning how many bytes were accepted.
    fn send(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Read into `buf`. `Ok(0)` means the peer closed the stream.
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn close(&mut self) -> io::Result<()>;
}

/// Opens connections to a host and port.
pub trait Connector {
    type Conn: Connection;

    fn connect(&self, host: &str, port: u16) -> io::Result<Self::Conn>;
}

/// Write all of `data`, retrying partial writes.
///
/// Success means every byte was accepted. A write that makes no progress is a
/// transport failure; there is no partial-success result.
pub fn send_all<C: Connection + ?Sized>(conn: &mut C, data: &[u8]) -> Result<(), HttpError> {
    let mut written = 0;
    while written < data.len() {
        match conn.send(&data[written..]) {
            Ok(0) => {
                return Err(HttpError::Transport(io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("connection stopped accepting data after {written} of {} bytes", data.len()),
                )));
            }
            Ok(n) => {
                written += n;
                trace!(written, total = data.len(), "partial send");
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(HttpError::Transport(e)),
        }
    }
    Ok(())
}

/// Plain TCP connector with a uniform timeout.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    timeout: Duration,
}

impl TcpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Connector for TcpConnector {
    type Conn = TcpConnection;

    fn connect(&self, host: &str, port: u16) -> io::Result<TcpConnection> {
        let mut last_err = None;
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(self.timeout))?;
                    stream.set_write_timeout(Some(self.timeout))?;
                    stream.set_nodelay(true)?;
                    debug!(%addr, "connected");
                    return Ok(TcpConnection { stream });
                }
                Err(e) => {
                    debug!(%addr, error = %e, "connect attempt failed");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no addresses for {host}"))
        }))
    }
}

/// A connected TCP stream.
#[derive(Debug)]
pub struct TcpConnection {
    stream: TcpStream,
}

impl Connection for TcpConnection {
    fn send(&mut self, data: &[u8]) -> io::Result<usize> {
        self.stream.write(data)
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.stream.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }

    fn close(&mut self) -> io::Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Accepts at most `limits[i]` bytes on the i-th send.
    struct Throttled {
        limits: VecDeque<io::Result<usize>>,
        sent: Vec<u8>,
    }

    impl Connection for Throttled {
        fn send(&mut self, data: &[u8]) -> io::Result<usize> {
            let n = match self.limits.pop_front() {
                Some(Ok(limit)) => limit.min(data.len()),
                Some(Err(e)) => return Err(e),
                None => data.len(),
            };
            self.sent.extend_from_slice(&data[..n]);
            Ok(n)
        }

        fn receive(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }

        fn close(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn throttled(limits: Vec<io::Result<usize>>) -> Throttled {
        Throttled {
            limits: limits.into(),
            sent: Vec::new(),
        }
    }

    #[test]
    fn send_all_retries_partial_writes() {
        let mut conn = throttled(vec![Ok(3), Ok(1), Ok(4)]);
        send_all(&mut conn, b"hello world").unwrap();
        assert_eq!(conn.sent, b"hello world");
    }

    #[test]
    fn send_all_retries_interrupted() {
        let mut conn = throttled(vec![
            Ok(2),
            Err(io::Error::new(io::ErrorKind::Interrupted, "signal")),
        ]);
        send_all(&mut conn, b"abcdef").unwrap();
        assert_eq!(conn.sent, b"abcdef");
    }

    #[test]
    fn send_all_fails_on_zero_progress() {
        let mut conn = throttled(vec![Ok(2), Ok(0)]);
        let err = send_all(&mut conn, b"abcdef").unwrap_err();
        match err {
            HttpError::Transport(e) => assert_eq!(e.kind(), io::ErrorKind::WriteZero),
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[test]
    fn send_all_propagates_write_errors() {
        let mut conn = throttled(vec![Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))]);
        let err = send_all(&mut conn, b"abc").unwrap_err();
        assert!(matches!(err, HttpError::Transport(_)));
    }

    #[test]
    fn send_all_empty_is_noop() {
        let mut conn = throttled(vec![Ok(0)]);
        send_all(&mut conn, b"").unwrap();
        assert!(conn.sent.is_empty());
    }

    #[test]
    fn tcp_connect_refused_is_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let connector = TcpConnector::new(Duration::from_secs(1));
        assert!(connector.connect("127.0.0.1", port).is_err());
    }

    #[test]
    fn tcp_round_trip() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4];
            stream.read_exact(&mut buf).unwrap();
            stream.write_all(&buf).unwrap();
        });

        let connector = TcpConnector::new(Duration::from_secs(5));
        let mut conn = connector.connect("127.0.0.1", port).unwrap();
        send_all(&mut conn, b"ping").unwrap();

        let mut got = Vec::new();
        let mut buf = [0u8; 16];
        loop {
            let n = conn.receive(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            got.extend_from_slice(&buf[..n]);
        }
        assert_eq!(got, b"ping");
        conn.close().unwrap();
        server.join().unwrap();
    }
}
