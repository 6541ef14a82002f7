//! A one-shot TCP responder that replays scripted bytes.
//!
//! Accepts a single connection, reads the request (head plus any
//! `Content-Length` body), then writes each chunk with a flush and a short
//! pause so the client sees separate reads, and closes.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

const CHUNK_PAUSE: Duration = Duration::from_millis(5);

pub struct ScriptedServer {
    addr: SocketAddr,
    handle: JoinHandle<io::Result<Vec<u8>>>,
}

impl ScriptedServer {
    pub fn spawn(chunks: Vec<Vec<u8>>) -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        let handle = thread::spawn(move || {
            let (stream, peer) = listener.accept()?;
            debug!(%peer, chunks = chunks.len(), "scripted connection");
            serve(stream, &chunks)
        });
        Ok(Self { addr, handle })
    }

    /// Convenience for a response sent in one piece.
    pub fn reply(response: &[u8]) -> io::Result<Self> {
        Self::spawn(vec![response.to_vec()])
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Wait for the exchange to finish and return the request bytes received.
    pub fn join(self) -> io::Result<Vec<u8>> {
        match self.handle.join() {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(io::ErrorKind::Other, "scripted server panicked")),
        }
    }
}

fn serve(mut stream: TcpStream, chunks: &[Vec<u8>]) -> io::Result<Vec<u8>> {
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    let request = read_request(&mut stream)?;

    for chunk in chunks {
        if let Err(e) = stream.write_all(chunk).and_then(|()| stream.flush()) {
            warn!(error = %e, "client went away mid-script");
            return Ok(request);
        }
        thread::sleep(CHUNK_PAUSE);
    }
    Ok(request)
}

fn read_request(stream: &mut TcpStream) -> io::Result<Vec<u8>> {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        if let Some(head_end) = find(&request, b"\r\n\r\n") {
            let want = head_end + 4 + declared_length(&request[..head_end]);
            if request.len() >= want {
                return Ok(request);
            }
        }
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Ok(request);
        }
        request.extend_from_slice(&buf[..n]);
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn declared_length(head: &[u8]) -> usize {
    String::from_utf8_lossy(head)
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}
