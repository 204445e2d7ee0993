//! Shared relay state and the disconnect cascade.
//!
//! The `Relay` is the explicitly constructed context object the router and
//! network layer share: the three delivery directories, the content filter,
//! and the table of every connected session. There is no ambient global
//! state; everything reaches the directories through an `Arc<Relay>`.

use crate::filter::WordFilter;
use crate::state::groups::GroupDirectory;
use crate::state::registry::Registry;
use crate::state::session::{SessionHandle, SessionId, SessionIdGenerator, TeardownRequest};
use crate::state::topics::TopicDirectory;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Slots in the teardown request queue. Sized for burst disconnects; a
/// request lost to a full queue is recovered by the connection task's own
/// unconditional teardown on loop exit.
const DISCONNECT_QUEUE_DEPTH: usize = 1024;

/// Shared server state.
pub struct Relay {
    pub registry: Registry,
    pub groups: GroupDirectory,
    pub topics: TopicDirectory,
    pub filter: WordFilter,
    /// Server name used in the welcome line and logs.
    pub server_name: String,
    /// Every connected session, registered or not.
    sessions: DashMap<SessionId, Arc<SessionHandle>>,
    ids: SessionIdGenerator,
    disconnects: mpsc::Sender<TeardownRequest>,
}

impl Relay {
    /// Build the relay plus the receiving end of the disconnect queue.
    ///
    /// The caller spawns a worker draining the receiver into
    /// [`Relay::teardown_session`]; delivery failures observed inside other
    /// sessions' operations land there instead of unwinding the sender.
    pub fn new(server_name: String, filter: WordFilter) -> (Arc<Self>, mpsc::Receiver<TeardownRequest>) {
        let (disconnects, disconnect_rx) = mpsc::channel(DISCONNECT_QUEUE_DEPTH);
        let relay = Arc::new(Self {
            registry: Registry::new(),
            groups: GroupDirectory::new(),
            topics: TopicDirectory::new(),
            filter,
            server_name,
            sessions: DashMap::new(),
            ids: SessionIdGenerator::new(),
            disconnects,
        });
        (relay, disconnect_rx)
    }

    /// Create a handle for a new connection and the receiving end of its
    /// outbox.
    pub fn attach_session(&self, outbox_depth: usize) -> (Arc<SessionHandle>, mpsc::Receiver<String>) {
        let (outbox_tx, outbox_rx) = mpsc::channel(outbox_depth);
        let id = self.ids.next();
        let handle = Arc::new(SessionHandle::new(id, outbox_tx, self.disconnects.clone()));
        self.sessions.insert(id, Arc::clone(&handle));
        (handle, outbox_rx)
    }

    /// Whether the session is still attached (not yet torn down).
    pub fn is_attached(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Number of connected sessions, registered or not.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Clear a session's identity and memberships without detaching it.
    ///
    /// Used by explicit unregister: the name is freed and announced, group
    /// and topic memberships are dropped, but the connection stays open and
    /// may register anew. Returns the released display name.
    pub fn release_identity(&self, id: SessionId) -> Option<String> {
        let username = self.registry.unregister(id)?;
        self.registry.broadcast(&format!("User {} left the chat.", username), Some(id));
        self.groups.leave_current(id, &username);
        self.topics.remove_session(id);
        Some(username)
    }

    /// Full disconnect cascade: registry, group, topics, sink, in that
    /// order, unconditionally.
    ///
    /// Idempotent: removal from the session table is the single entry gate,
    /// so a second call (worker and connection task both reporting the same
    /// death) finds nothing and does nothing.
    pub fn teardown_session(&self, id: SessionId, reason: &str) {
        let Some((_, handle)) = self.sessions.remove(&id) else {
            return;
        };
        handle.mark_closed();

        let username = self.release_identity(id);
        // An unregistered session holds no memberships, but the cascade is
        // unconditional: sweep the directories regardless.
        if username.is_none() {
            self.groups.leave_current(id, "");
            self.topics.remove_session(id);
        }

        info!(
            session = %id,
            user = username.as_deref().unwrap_or("<unregistered>"),
            reason,
            uptime_secs = handle.uptime_secs(),
            "Session torn down"
        );
    }
}
