use std::io::{self, Read};

use tracing::debug;

use crate::error::{CompositeCloseError, SourceCloseFailure};
use crate::source::SourceHandle;

/// Reads handle 0 to exhaustion, then handle 1, and so on. A failing handle
/// stops the reader at its position.
#[derive(Debug)]
pub struct ConcatReader {
    handles: Vec<SourceHandle>,
    cursor: usize,
}

impl ConcatReader {
    pub fn new(handles: Vec<SourceHandle>) -> Self {
        Self { handles, cursor: 0 }
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn handles(&self) -> &[SourceHandle] {
        &self.handles
    }

    pub fn close(mut self) -> Result<(), CompositeCloseError> {
        let mut failures = Vec::new();
        for (position, handle) in self.handles.iter_mut().enumerate() {
            if let Err(source) = handle.close() {
                debug!(position, "close failed: {source}");
                failures.push(SourceCloseFailure {
                    position,
                    identifier: handle.location().redacted(),
                    source,
                });
            }
        }

        if failures.is_empty() {
            return Ok(());
        }
        Err(CompositeCloseError { failures })
    }
}

impl Read for ConcatReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while let Some(handle) = self.handles.get_mut(self.cursor) {
            // Errors leave the cursor in place so a retry sees the same error.
            let n = handle.read(buf)?;
            if n > 0 {
                return Ok(n);
            }
            debug!(position = self.cursor, "source exhausted");
            self.cursor += 1;
        }
        Ok(0)
    }
}
