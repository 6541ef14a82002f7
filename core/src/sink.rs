//! Destinations for decoded response bodies.
//!
//! A sink is opened exactly once, when the blank line ending the headers is
//! seen, appended to as body bytes are decoded, and closed once. If the
//! transaction fails after opening, the engine still closes the sink; any
//! bytes already written stay behind as a partial artifact.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub trait BodySink {
    fn open(&mut self) -> io::Result<()>;
    fn append(&mut self, data: &[u8]) -> io::Result<()>;
    fn close(&mut self) -> io::Result<()>;
}

/// Collects the body in memory and counts lifecycle calls.
#[derive(Debug, Default)]
pub struct MemorySink {
    data: Vec<u8>,
    opened: u32,
    closed: u32,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    pub fn open_count(&self) -> u32 {
        self.opened
    }

    pub fn close_count(&self) -> u32 {
        self.closed
    }

    pub fn is_open(&self) -> bool {
        self.opened > self.closed
    }
}

impl BodySink for MemorySink {
    fn open(&mut self) -> io::Result<()> {
        self.data.clear();
        self.opened += 1;
        Ok(())
    }

    fn append(&mut self, data: &[u8]) -> io::Result<()> {
        if !self.is_open() {
            return Err(io::Error::new(io::ErrorKind::Other, "append to a sink that is not open"));
        }
        self.data.extend_from_slice(data);
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed += 1;
        Ok(())
    }
}

/// Stores the body in a named file, truncating any previous result.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: Option<BufWriter<File>>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    /// A sink named `name` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>, name: &str) -> Self {
        Self::new(dir.as_ref().join(name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back at most `limit` bytes of a stored result.
    pub fn read_back(&self, limit: usize) -> io::Result<Vec<u8>> {
        let file = File::open(&self.path)?;
        let mut out = Vec::new();
        file.take(limit as u64).read_to_end(&mut out)?;
        Ok(out)
    }
}

impl BodySink for FileSink {
    fn open(&mut self) -> io::Result<()> {
        if self.file.is_some() {
            return Err(io::Error::new(io::ErrorKind::Other, "sink already open"));
        }
        self.file = Some(BufWriter::new(File::create(&self.path)?));
        Ok(())
    }

    fn append(&mut self, data: &[u8]) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.write_all(data),
            None => Err(io::Error::new(io::ErrorKind::Other, "append to a sink that is not open")),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        match self.file.take() {
            Some(mut file) => file.flush(),
            None => Ok(()),
        }
    }
}
