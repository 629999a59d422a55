use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use tracing::{debug, warn};

use crate::error::{CatError, OpenError};
use crate::source::{HandleStatus, SourceHandle};
use crate::transport::OpenerRegistry;

#[derive(Debug, Clone, Copy, Default)]
pub struct OpenContext {
    deadline: Option<Instant>,
}

impl OpenContext {
    pub fn unbounded() -> Self {
        Self { deadline: None }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.deadline
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }

    pub fn check(&self) -> Result<(), OpenError> {
        if self.is_expired() {
            return Err(OpenError::DeadlineExceeded);
        }
        Ok(())
    }
}

/// Returns its admission slot when dropped, so a panicking opener still frees
/// the slot before the scope propagates the panic.
struct Slot<'a>(&'a Receiver<()>);

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        let _ = self.0.try_recv();
    }
}

/// Opens every handle on its own thread with at most `limit` opens in flight,
/// and returns once all of them have settled.
///
/// Failures are recorded on the handles; siblings are never cancelled. Inspect
/// each handle afterwards to learn its outcome.
pub fn multi_open(
    openers: &OpenerRegistry,
    ctx: &OpenContext,
    limit: usize,
    handles: &mut [SourceHandle],
) -> Result<(), CatError> {
    if handles.is_empty() {
        return Ok(());
    }
    if limit == 0 {
        return Err(CatError::InvalidConcurrency(limit));
    }

    debug!(sources = handles.len(), limit, "opening sources");
    let started = Instant::now();
    let (slots, released) = crossbeam_channel::bounded::<()>(limit);

    thread::scope(|scope| {
        for (position, handle) in handles.iter_mut().enumerate() {
            // Blocks while `limit` opens are in flight. Both channel ends live
            // until the scope ends, so this cannot disconnect.
            if slots.send(()).is_err() {
                break;
            }
            let released = &released;
            scope.spawn(move || {
                let _slot = Slot(released);
                let opened_at = Instant::now();
                handle.open(openers, ctx);
                match handle.open_error() {
                    Some(err) => warn!(
                        position,
                        location = %handle.location().redacted(),
                        elapsed = ?opened_at.elapsed(),
                        "open failed: {err}"
                    ),
                    None => debug!(
                        position,
                        location = %handle.location().redacted(),
                        elapsed = ?opened_at.elapsed(),
                        "source opened"
                    ),
                }
            });
        }
    });

    let opened = handles
        .iter()
        .filter(|handle| handle.status() == HandleStatus::Opened)
        .count();
    debug!(
        opened,
        failed = handles.len() - opened,
        elapsed = ?started.elapsed(),
        "open phase settled"
    );
    Ok(())
}
