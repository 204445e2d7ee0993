//! Session identity and the narrow delivery capability.
//!
//! Directories never hold a connection or a back-reference into the router;
//! they hold a [`SessionHandle`], which can do exactly two things: queue a
//! line for the session, or ask the disconnect worker to tear the session
//! down. That keeps ownership one-directional: directories own membership
//! entries, sessions own nothing back.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

/// Stable per-connection identifier, never reused for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{:06}", self.0)
    }
}

/// Hands out monotonically increasing session ids.
#[derive(Debug)]
pub struct SessionIdGenerator {
    counter: AtomicU64,
}

impl SessionIdGenerator {
    pub fn new() -> Self {
        Self { counter: AtomicU64::new(1) }
    }

    /// Generate the next session id.
    pub fn next(&self) -> SessionId {
        SessionId(self.counter.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SessionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// A teardown request queued for the disconnect worker.
#[derive(Debug)]
pub struct TeardownRequest {
    pub id: SessionId,
    pub reason: &'static str,
}

/// The capability handle a directory holds for one session.
pub struct SessionHandle {
    pub id: SessionId,
    /// When the session connected, for the teardown log.
    pub connected_at: DateTime<Utc>,
    outbox: mpsc::Sender<String>,
    disconnects: mpsc::Sender<TeardownRequest>,
    /// Latched once the session is dead or dying; stops further delivery
    /// and makes the teardown request fire at most once.
    closed: AtomicBool,
}

impl SessionHandle {
    pub fn new(
        id: SessionId,
        outbox: mpsc::Sender<String>,
        disconnects: mpsc::Sender<TeardownRequest>,
    ) -> Self {
        Self {
            id,
            connected_at: Utc::now(),
            outbox,
            disconnects,
            closed: AtomicBool::new(false),
        }
    }

    /// Queue a line for this session without blocking the caller.
    ///
    /// A closed outbox means the connection task is gone; a full one means
    /// the consumer stopped draining. Either way the session is marked dead
    /// and handed to the disconnect worker; the sender's operation is
    /// unaffected.
    pub fn deliver(&self, line: impl Into<String>) {
        if self.closed.load(Ordering::Relaxed) {
            return;
        }
        match self.outbox.try_send(line.into()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.request_teardown("output sink closed");
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.request_teardown("output queue overflow");
            }
        }
    }

    /// Ask the disconnect worker to run the cascade for this session.
    /// Only the first call enqueues anything.
    pub fn request_teardown(&self, reason: &'static str) {
        if self.closed.swap(true, Ordering::Relaxed) {
            return;
        }
        debug!(session = %self.id, reason, "Teardown requested");
        let _ = self.disconnects.try_send(TeardownRequest { id: self.id, reason });
    }

    /// Latch the handle closed without queueing a teardown request.
    /// Used by the cascade itself so late broadcasts stop cleanly.
    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }

    /// Seconds this session has been connected.
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.connected_at).num_seconds()
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

/// Build a handle wired to fresh channels, for directory tests.
#[cfg(test)]
pub(crate) fn test_handle(
    ids: &SessionIdGenerator,
) -> (std::sync::Arc<SessionHandle>, mpsc::Receiver<String>) {
    let (tx, rx) = mpsc::channel(32);
    // The teardown queue is not observed by these tests; requests are
    // silently discarded once the receiver drops.
    let (dtx, _drx) = mpsc::channel(32);
    (std::sync::Arc::new(SessionHandle::new(ids.next(), tx, dtx)), rx)
}

/// Drain every line currently queued for a test receiver.
#[cfg(test)]
pub(crate) fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Ok(line) = rx.try_recv() {
        lines.push(line);
    }
    lines
}
