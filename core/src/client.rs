//! Blocking HTTP/1.0 client.
//!
//! # Design
//! `HttpClient` is built once with its configuration and a connector, then
//! reused for any number of sequential requests. Each request owns its
//! connection and transaction for its whole duration; there is no shared
//! mutable state between requests. The connection is closed on every exit
//! path before the call returns. Retrying is left to the caller.

use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::HttpError;
use crate::http::RequestBuilder;
use crate::parser::Transaction;
use crate::sink::BodySink;
use crate::transport::{Connection, Connector, TcpConnector};
use crate::types::{Exchange, Response, Target};

/// Synchronous client issuing one request per call.
#[derive(Debug, Clone)]
pub struct HttpClient<C = TcpConnector> {
    config: ClientConfig,
    connector: C,
}

impl HttpClient<TcpConnector> {
    /// A client over plain TCP using the configured timeout.
    pub fn new(config: ClientConfig) -> Self {
        let connector = TcpConnector::new(config.timeout());
        Self { config, connector }
    }
}

impl Default for HttpClient<TcpConnector> {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

impl<C: Connector> HttpClient<C> {
    pub fn with_connector(config: ClientConfig, connector: C) -> Self {
        Self { config, connector }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetch `target`, streaming the body into `sink`.
    pub fn get<S: BodySink + ?Sized>(&self, target: &Target, sink: &mut S) -> Result<Response, HttpError> {
        self.get_exchange(target, sink).into_result()
    }

    /// Send `body` to `target` with the configured content type.
    pub fn post<S: BodySink + ?Sized>(
        &self,
        target: &Target,
        body: &[u8],
        sink: &mut S,
    ) -> Result<Response, HttpError> {
        self.post_exchange(target, body, sink).into_result()
    }

    /// Like `get`, keeping the last status code seen even on failure.
    pub fn get_exchange<S: BodySink + ?Sized>(&self, target: &Target, sink: &mut S) -> Exchange {
        let builder = RequestBuilder::get(target, &self.config.user_agent);
        self.execute(&builder, sink)
    }

    pub fn post_exchange<S: BodySink + ?Sized>(&self, target: &Target, body: &[u8], sink: &mut S) -> Exchange {
        let builder = RequestBuilder::post(target, &self.config.user_agent, &self.config.content_type, body);
        self.execute(&builder, sink)
    }

    /// Build, connect, send, and decode one request.
    pub fn execute<S: BodySink + ?Sized>(&self, builder: &RequestBuilder<'_>, sink: &mut S) -> Exchange {
        let target = builder.target();
        debug!(method = builder.method().as_str(), %target, "issuing request");

        let request = match builder.build() {
            Ok(request) => request,
            Err(err) => return failed(None, err),
        };

        let mut conn = match self.connector.connect(&target.host, target.port) {
            Ok(conn) => conn,
            Err(source) => {
                let err = HttpError::Connect {
                    host: target.host.clone(),
                    port: target.port,
                    source,
                };
                return failed(None, err);
            }
        };

        let exchange = match request.send(&mut conn) {
            Ok(()) => receive(&mut conn, sink),
            Err(err) => failed(None, err),
        };

        if let Err(e) = conn.close() {
            warn!(error = %e, "could not close connection");
        }
        exchange
    }
}

fn receive<Conn: Connection + ?Sized, S: BodySink + ?Sized>(conn: &mut Conn, sink: &mut S) -> Exchange {
    let mut tx = Transaction::new(sink);
    let result = tx.run(conn).map(|()| Response {
        status: tx.status_code().unwrap_or_default(),
        content_length: tx.content_length(),
        body_len: tx.content_read(),
    });
    Exchange {
        status_code: tx.status_code(),
        result,
    }
}

fn failed(status_code: Option<u16>, err: HttpError) -> Exchange {
    debug!(error = %err, "request failed");
    Exchange {
        status_code,
        result: Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io;
    use std::rc::Rc;

    #[derive(Default)]
    struct Wire {
        sent: Vec<u8>,
        closed: bool,
        connects: Vec<(String, u16)>,
    }

    struct FakeConn {
        wire: Rc<RefCell<Wire>>,
        reads: VecDeque<Vec<u8>>,
        fail_send: bool,
    }

    impl Connection for FakeConn {
        fn send(&mut self, data: &[u8]) -> io::Result<usize> {
            if self.fail_send {
                return Ok(0);
            }
            self.wire.borrow_mut().sent.extend_from_slice(data);
            Ok(data.len())
        }

        fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let Some(chunk) = self.reads.pop_front() else {
                return Ok(0);
            };
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }

        fn close(&mut self) -> io::Result<()> {
            self.wire.borrow_mut().closed = true;
            Ok(())
        }
    }

    struct FakeConnector {
        wire: Rc<RefCell<Wire>>,
        response: Vec<Vec<u8>>,
        refuse: bool,
        fail_send: bool,
    }

    impl FakeConnector {
        fn replying(chunks: &[&[u8]]) -> Self {
            Self {
                wire: Rc::default(),
                response: chunks.iter().map(|c| c.to_vec()).collect(),
                refuse: false,
                fail_send: false,
            }
        }
    }

    impl Connector for FakeConnector {
        type Conn = FakeConn;

        fn connect(&self, host: &str, port: u16) -> io::Result<FakeConn> {
            self.wire.borrow_mut().connects.push((host.to_string(), port));
            if self.refuse {
                return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
            }
            Ok(FakeConn {
                wire: Rc::clone(&self.wire),
                reads: self.response.iter().cloned().collect(),
                fail_send: self.fail_send,
            })
        }
    }

    fn target() -> Target {
        Target::new("example.org", 80, "/x")
    }

    #[test]
    fn get_scenario_hello() {
        let connector = FakeConnector::replying(&[b"HTTP/1.0 200 OK\r\nContent-Length: 5\r\n\r\nhello"]);
        let wire = Rc::clone(&connector.wire);
        let client = HttpClient::with_connector(ClientConfig::default(), connector);
        let mut sink = MemorySink::new();

        let response = client.get(&target(), &mut sink).unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.content_length, Some(5));
        assert_eq!(response.body_len, 5);
        assert_eq!(sink.data(), b"hello");

        let wire = wire.borrow();
        assert_eq!(wire.connects, vec![("example.org".to_string(), 80)]);
        assert_eq!(
            wire.sent,
            b"GET /x HTTP/1.0\r\nHost: example.org\r\nUser-Agent: PalmHTTP/0.1\r\n\r\n"
        );
        assert!(wire.closed);
    }

    #[test]
    fn get_scenario_not_found_eof_body() {
        let connector = FakeConnector::replying(&[b"HTTP/1.0 404 Not Found\r\n\r\n"]);
        let client = HttpClient::with_connector(ClientConfig::default(), connector);
        let mut sink = MemorySink::new();

        let response = client.get(&target(), &mut sink).unwrap();

        assert_eq!(response.status, 404);
        assert_eq!(response.content_length, None);
        assert_eq!(response.body_len, 0);
        assert!(sink.data().is_empty());
    }

    #[test]
    fn post_sends_body_with_length() {
        let connector = FakeConnector::replying(&[b"HTTP/1.0 200 OK\r\n\r\n<methodResponse/>"]);
        let wire = Rc::clone(&connector.wire);
        let config = ClientConfig {
            user_agent: "Vagablog/1.0".to_string(),
            ..ClientConfig::default()
        };
        let client = HttpClient::with_connector(config, connector);
        let mut sink = MemorySink::new();

        client.post(&target(), b"<methodCall/>", &mut sink).unwrap();

        assert_eq!(sink.data(), b"<methodResponse/>");
        let sent = String::from_utf8(wire.borrow().sent.clone()).unwrap();
        assert_eq!(
            sent,
            "POST /x HTTP/1.0\r\nHost: example.org\r\nUser-Agent: Vagablog/1.0\r\n\
             Content-Type: text/xml\r\nContent-Length: 13\r\n\r\n<methodCall/>"
        );
    }

    #[test]
    fn early_close_keeps_status_for_diagnostics() {
        let connector = FakeConnector::replying(&[b"HTTP/1.0 200 OK\r\nContent-Length: 10\r\n\r\nabc"]);
        let wire = Rc::clone(&connector.wire);
        let client = HttpClient::with_connector(ClientConfig::default(), connector);
        let mut sink = MemorySink::new();

        let exchange = client.get_exchange(&target(), &mut sink);

        assert_eq!(exchange.status_code, Some(200));
        assert!(matches!(
            exchange.result,
            Err(HttpError::SizeMismatch { expected: 10, received: 3 })
        ));
        assert_eq!(sink.close_count(), 1);
        assert!(wire.borrow().closed);
    }

    #[test]
    fn connect_failure_is_connect_error() {
        let mut connector = FakeConnector::replying(&[]);
        connector.refuse = true;
        let client = HttpClient::with_connector(ClientConfig::default(), connector);
        let mut sink = MemorySink::new();

        let err = client.get(&target(), &mut sink).unwrap_err();

        assert!(matches!(err, HttpError::Connect { port: 80, .. }));
        assert!(err.is_retryable());
        assert_eq!(sink.open_count(), 0);
    }

    #[test]
    fn send_failure_is_transport_error_and_closes() {
        let mut connector = FakeConnector::replying(&[b"HTTP/1.0 200 OK\r\n\r\n"]);
        connector.fail_send = true;
        let wire = Rc::clone(&connector.wire);
        let client = HttpClient::with_connector(ClientConfig::default(), connector);
        let mut sink = MemorySink::new();

        let err = client.get(&target(), &mut sink).unwrap_err();

        assert!(matches!(err, HttpError::Transport(_)));
        assert!(wire.borrow().closed);
    }

    #[test]
    fn build_failure_never_connects() {
        let connector = FakeConnector::replying(&[]);
        let wire = Rc::clone(&connector.wire);
        let client = HttpClient::with_connector(ClientConfig::default(), connector);
        let mut sink = MemorySink::new();

        let bad = Target::new("example.org", 80, "/has space");
        let err = client.get(&bad, &mut sink).unwrap_err();

        assert!(matches!(err, HttpError::Build(_)));
        assert!(!err.is_retryable());
        assert!(wire.borrow().connects.is_empty());
    }

    #[test]
    fn client_is_reusable_across_requests() {
        let connector = FakeConnector::replying(&[b"HTTP/1.0 200 OK\r\nContent-Length: 2\r\n\r\nok"]);
        let wire = Rc::clone(&connector.wire);
        let client = HttpClient::with_connector(ClientConfig::default(), connector);

        for _ in 0..3 {
            let mut sink = MemorySink::new();
            client.get(&target(), &mut sink).unwrap();
            assert_eq!(sink.data(), b"ok");
        }
        assert_eq!(wire.borrow().connects.len(), 3);
    }
}
