use std::fs::File;
use std::io::{self, Read};

use tracing::debug;

use crate::error::{CloseError, ConstructionError, OpenError, ReadError};
use crate::location::Location;
use crate::open::OpenContext;
use crate::transport::OpenerRegistry;

/// Closing consumes the stream; dropping it without closing still releases
/// the underlying resource but discards the close outcome.
pub trait ByteStream: Read + Send {
    fn close(self: Box<Self>) -> io::Result<()>;
}

impl ByteStream for File {
    fn close(self: Box<Self>) -> io::Result<()> {
        drop(self);
        Ok(())
    }
}

impl ByteStream for reqwest::blocking::Response {
    fn close(self: Box<Self>) -> io::Result<()> {
        drop(self);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleStatus {
    Pending,
    Opened,
    OpenFailed,
    Closed,
}

enum HandleState {
    Pending,
    Open(Box<dyn ByteStream>),
    Failed(OpenError),
    Closed,
}

pub struct SourceHandle {
    location: Location,
    state: HandleState,
}

impl SourceHandle {
    pub fn new(identifier: &str) -> Result<Self, ConstructionError> {
        Ok(Self::from_location(identifier.parse()?))
    }

    pub fn from_location(location: Location) -> Self {
        Self {
            location,
            state: HandleState::Pending,
        }
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn status(&self) -> HandleStatus {
        match self.state {
            HandleState::Pending => HandleStatus::Pending,
            HandleState::Open(_) => HandleStatus::Opened,
            HandleState::Failed(_) => HandleStatus::OpenFailed,
            HandleState::Closed => HandleStatus::Closed,
        }
    }

    pub fn open_error(&self) -> Option<&OpenError> {
        match &self.state {
            HandleState::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Resolves the opener for this handle's scheme and records the outcome.
    /// Only the first call on a handle has any effect.
    pub fn open(&mut self, openers: &OpenerRegistry, ctx: &OpenContext) {
        if !matches!(self.state, HandleState::Pending) {
            debug!(
                location = %self.location.redacted(),
                "open ignored, handle already settled"
            );
            return;
        }

        let outcome = ctx
            .check()
            .and_then(|()| openers.open(&self.location, ctx));
        self.state = match outcome {
            Ok(stream) => HandleState::Open(stream),
            Err(err) => HandleState::Failed(err),
        };
    }

    pub fn close(&mut self) -> Result<(), CloseError> {
        match std::mem::replace(&mut self.state, HandleState::Closed) {
            HandleState::Open(stream) => stream.close().map_err(CloseError::Transport),
            previous => {
                self.state = previous;
                Err(CloseError::NothingToClose)
            }
        }
    }
}

impl Read for SourceHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.state {
            HandleState::Open(stream) => stream.read(buf),
            HandleState::Failed(err) => Err(ReadError::Open {
                identifier: self.location.redacted(),
                source: err.clone(),
            }
            .into_io()),
            HandleState::Pending => Err(ReadError::NotOpened {
                identifier: self.location.redacted(),
            }
            .into_io()),
            HandleState::Closed => Err(ReadError::Closed {
                identifier: self.location.redacted(),
            }
            .into_io()),
        }
    }
}

impl std::fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceHandle")
            .field("location", &self.location.redacted())
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn read_error(handle: &mut SourceHandle) -> String {
        let mut buf = [0u8; 8];
        handle.read(&mut buf).unwrap_err().to_string()
    }

    #[test]
    fn read_before_open_fails() {
        let mut handle = SourceHandle::new("a.txt").unwrap();
        assert_eq!(handle.status(), HandleStatus::Pending);
        assert_eq!(read_error(&mut handle), "a.txt: file has to be opened first");
    }

    #[test]
    fn failed_open_is_sticky() {
        let mut handle = SourceHandle::new("foo://x").unwrap();
        handle.open(&OpenerRegistry::new(), &OpenContext::unbounded());

        assert_eq!(handle.status(), HandleStatus::OpenFailed);
        assert_matches!(handle.open_error(), Some(OpenError::UnsupportedScheme(s)) if s == "foo");
        let first = read_error(&mut handle);
        let second = read_error(&mut handle);
        assert_eq!(first, second);
        assert_eq!(first, "foo://x: unsupported url scheme \"foo\"");
    }

    #[test]
    fn close_without_stream_reports_nothing_to_close() {
        let mut handle = SourceHandle::new("foo://x").unwrap();
        assert_matches!(handle.close(), Err(CloseError::NothingToClose));

        handle.open(&OpenerRegistry::new(), &OpenContext::unbounded());
        assert_matches!(handle.close(), Err(CloseError::NothingToClose));
        assert_eq!(handle.status(), HandleStatus::OpenFailed);
    }

    #[test]
    fn expired_context_skips_transport() {
        let mut handle = SourceHandle::new("foo://x").unwrap();
        let ctx = OpenContext::with_deadline(std::time::Instant::now());
        handle.open(&OpenerRegistry::new(), &ctx);
        assert_eq!(handle.open_error(), Some(&OpenError::DeadlineExceeded));
    }
}
