#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use urlcat::error::OpenError;
use urlcat::location::Location;
use urlcat::open::OpenContext;
use urlcat::source::ByteStream;
use urlcat::transport::{Opener, OpenerRegistry};

/// Counters shared by a [`MemoryOpener`] and every stream it hands out.
#[derive(Default)]
pub struct Stats {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    opened: Mutex<Vec<String>>,
    reads: Mutex<HashMap<String, usize>>,
    closes: Mutex<HashMap<String, usize>>,
}

impl Stats {
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Names in the order their opens completed.
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    pub fn reads(&self, name: &str) -> usize {
        self.reads.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    pub fn closes(&self, name: &str) -> usize {
        self.closes.lock().unwrap().get(name).copied().unwrap_or(0)
    }
}

#[derive(Clone)]
struct MemorySource {
    content: Vec<u8>,
    delay: Duration,
    failure: Option<OpenError>,
}

/// Serves `mem://<name>` locations from memory, with optional open delays and
/// failures.
#[derive(Default)]
pub struct MemoryOpener {
    sources: HashMap<String, MemorySource>,
    stats: Arc<Stats>,
}

impl MemoryOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(mut self, name: &str, content: &str) -> Self {
        self.sources.insert(
            name.to_string(),
            MemorySource {
                content: content.as_bytes().to_vec(),
                delay: Duration::ZERO,
                failure: None,
            },
        );
        self
    }

    pub fn slow_source(mut self, name: &str, content: &str, delay: Duration) -> Self {
        self.sources.insert(
            name.to_string(),
            MemorySource {
                content: content.as_bytes().to_vec(),
                delay,
                failure: None,
            },
        );
        self
    }

    pub fn failing_source(mut self, name: &str, failure: OpenError) -> Self {
        self.sources.insert(
            name.to_string(),
            MemorySource {
                content: Vec::new(),
                delay: Duration::ZERO,
                failure: Some(failure),
            },
        );
        self
    }

    pub fn stats(&self) -> Arc<Stats> {
        self.stats.clone()
    }

    pub fn into_registry(self) -> (OpenerRegistry, Arc<Stats>) {
        let stats = self.stats();
        let mut registry = OpenerRegistry::new();
        registry.register("mem", self);
        (registry, stats)
    }
}

impl Opener for MemoryOpener {
    fn open(
        &self,
        location: &Location,
        _ctx: &OpenContext,
    ) -> Result<Box<dyn ByteStream>, OpenError> {
        let name = location.host().to_string();
        let in_flight = self.stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats
            .max_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);

        let source = self.sources.get(&name).cloned();
        if let Some(source) = &source {
            thread::sleep(source.delay);
        }
        self.stats.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.stats.opened.lock().unwrap().push(name.clone());

        let source = source.ok_or_else(|| OpenError::NotFound { path: name.clone() })?;
        if let Some(failure) = source.failure {
            return Err(failure);
        }
        Ok(Box::new(MemoryStream {
            name,
            content: Cursor::new(source.content),
            stats: self.stats.clone(),
        }))
    }
}

struct MemoryStream {
    name: String,
    content: Cursor<Vec<u8>>,
    stats: Arc<Stats>,
}

impl Read for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        *self
            .stats
            .reads
            .lock()
            .unwrap()
            .entry(self.name.clone())
            .or_default() += 1;
        self.content.read(buf)
    }
}

impl ByteStream for MemoryStream {
    fn close(self: Box<Self>) -> io::Result<()> {
        *self
            .stats
            .closes
            .lock()
            .unwrap()
            .entry(self.name.clone())
            .or_default() += 1;
        Ok(())
    }
}

pub fn read_error_source(err: &io::Error) -> Option<&urlcat::error::ReadError> {
    err.get_ref()
        .and_then(|inner| inner.downcast_ref::<urlcat::error::ReadError>())
}
