//! Named-group directory: mutually exclusive membership and group multicast.
//!
//! Group names are keyed lowercase with the display casing preserved from
//! creation. The member sets and the per-session current-group index are two
//! views of one relation and only ever change together, under this
//! directory's single lock: a session is in a group's member set iff the
//! index names that group. Announcement fan-out happens after the lock is
//! released; `SessionHandle::deliver` never blocks, so a slow member cannot
//! stall anyone's operation.

use crate::error::GroupError;
use crate::state::session::{SessionHandle, SessionId};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

struct Group {
    /// Display name as given at creation.
    name: String,
    created: DateTime<Utc>,
    members: HashMap<SessionId, Arc<SessionHandle>>,
}

/// A batch of lines to fan out once the lock is dropped.
type Fanout = Vec<(Vec<Arc<SessionHandle>>, String)>;

#[derive(Default)]
struct Inner {
    /// Lowercased group name -> group.
    groups: HashMap<String, Group>,
    /// Session id -> lowercased name of its current group.
    current: HashMap<SessionId, String>,
}

impl Inner {
    /// Remove the session from `key`'s member set, announce the departure to
    /// the remaining members, and delete the group if it became empty.
    ///
    /// The caller is responsible for the `current` index. Deletion of an
    /// emptied group is silent, there is no one left to notify.
    fn detach(&mut self, key: &str, id: SessionId, username: &str, fanout: &mut Fanout) -> bool {
        let became_empty = {
            let Some(group) = self.groups.get_mut(key) else {
                return false;
            };
            if group.members.remove(&id).is_none() {
                return false;
            }
            if group.members.is_empty() {
                true
            } else {
                fanout.push((
                    group.members.values().map(Arc::clone).collect(),
                    format!(
                        "GROUP [{}] | Server: User {} left group '{}'.",
                        group.name, username, group.name
                    ),
                ));
                false
            }
        };
        if became_empty
            && let Some(group) = self.groups.remove(key)
        {
            info!(
                group = %group.name,
                lifetime_secs = (Utc::now() - group.created).num_seconds(),
                "Empty group removed"
            );
        }
        became_empty
    }
}

/// Directory of named groups with at-most-one membership per session.
#[derive(Default)]
pub struct GroupDirectory {
    inner: RwLock<Inner>,
}

fn deliver_all(fanout: Fanout) {
    for (recipients, line) in fanout {
        for handle in recipients {
            handle.deliver(line.as_str());
        }
    }
}

/// Result of a successful leave.
#[derive(Debug)]
pub struct LeaveOutcome {
    /// Display name of the group that was left.
    pub group: String,
    /// True when the group emptied out and was deleted.
    pub removed_empty: bool,
}

impl GroupDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty group. Creating does not join.
    pub fn create(&self, name: &str) -> Result<String, GroupError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GroupError::EmptyName);
        }
        let key = name.to_lowercase();

        let mut inner = self.inner.write();
        if inner.groups.contains_key(&key) {
            return Err(GroupError::AlreadyExists(name.to_string()));
        }
        inner.groups.insert(
            key,
            Group { name: name.to_string(), created: Utc::now(), members: HashMap::new() },
        );
        info!(group = %name, "Group created");
        Ok(name.to_string())
    }

    /// Join a group, implicitly leaving the current one first.
    ///
    /// The whole transition happens under one write lock: no observer ever
    /// sees the session in two groups, or in none while mid-move.
    pub fn join(
        &self,
        name: &str,
        id: SessionId,
        handle: Arc<SessionHandle>,
        username: &str,
    ) -> Result<String, GroupError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GroupError::EmptyName);
        }
        let key = name.to_lowercase();

        let mut fanout = Fanout::new();
        let display = {
            let mut inner = self.inner.write();
            if !inner.groups.contains_key(&key) {
                return Err(GroupError::NotFound(name.to_string()));
            }
            if inner.current.get(&id) == Some(&key) {
                return Err(GroupError::AlreadyMember(name.to_string()));
            }
            if let Some(old_key) = inner.current.remove(&id) {
                inner.detach(&old_key, id, username, &mut fanout);
            }
            let Some(group) = inner.groups.get_mut(&key) else {
                return Err(GroupError::NotFound(name.to_string()));
            };
            fanout.push((
                group.members.values().map(Arc::clone).collect(),
                format!(
                    "GROUP [{}] | Server: User {} joined group '{}'.",
                    group.name, username, group.name
                ),
            ));
            group.members.insert(id, handle);
            let display = group.name.clone();
            inner.current.insert(id, key);
            display
        };
        deliver_all(fanout);
        Ok(display)
    }

    /// Leave a group by name.
    pub fn leave(&self, name: &str, id: SessionId, username: &str) -> Result<LeaveOutcome, GroupError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GroupError::EmptyName);
        }
        let key = name.to_lowercase();

        let mut fanout = Fanout::new();
        let outcome = {
            let mut inner = self.inner.write();
            let Some(group) = inner.groups.get(&key) else {
                return Err(GroupError::NotFound(name.to_string()));
            };
            let display = group.name.clone();
            if inner.current.get(&id) != Some(&key) {
                return Err(GroupError::NotAMember(display));
            }
            inner.current.remove(&id);
            let removed_empty = inner.detach(&key, id, username, &mut fanout);
            LeaveOutcome { group: display, removed_empty }
        };
        deliver_all(fanout);
        Ok(outcome)
    }

    /// Delete a group, evicting every member.
    ///
    /// All members transition to no-group and receive a removal notice
    /// naming the acting user.
    pub fn remove(&self, name: &str, acting_username: &str) -> Result<String, GroupError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GroupError::EmptyName);
        }
        let key = name.to_lowercase();

        let mut fanout = Fanout::new();
        let group_name = {
            let mut inner = self.inner.write();
            let Some(group) = inner.groups.remove(&key) else {
                return Err(GroupError::NotFound(name.to_string()));
            };
            fanout.push((
                group.members.values().map(Arc::clone).collect(),
                format!(
                    "GROUP [{}] | Server: Group '{}' has been removed by {}.",
                    group.name, group.name, acting_username
                ),
            ));
            for member_id in group.members.keys() {
                inner.current.remove(member_id);
            }
            group.name
        };
        info!(group = %group_name, by = %acting_username, "Group removed");
        deliver_all(fanout);
        Ok(group_name)
    }

    /// Deliver a user-authored line to every member except the sender.
    ///
    /// The caller supplies an already content-filtered body; the directory
    /// only adds the group framing. The sender need not be a member.
    pub fn send_to_group(
        &self,
        name: &str,
        sender: SessionId,
        from: &str,
        body: &str,
    ) -> Result<String, GroupError> {
        let name = name.trim();
        let key = name.to_lowercase();

        let (display, recipients) = {
            let inner = self.inner.read();
            let Some(group) = inner.groups.get(&key) else {
                return Err(GroupError::NotFound(name.to_string()));
            };
            let recipients: Vec<Arc<SessionHandle>> = group
                .members
                .iter()
                .filter(|(member_id, _)| **member_id != sender)
                .map(|(_, h)| Arc::clone(h))
                .collect();
            (group.name.clone(), recipients)
        };

        let line = format!("GROUP [{}] | {}: {}", display, from, body);
        for handle in recipients {
            handle.deliver(line.as_str());
        }
        Ok(display)
    }

    /// Whether a group with this name exists.
    pub fn exists(&self, name: &str) -> bool {
        self.inner.read().groups.contains_key(&name.trim().to_lowercase())
    }

    /// `(display name, member count)` pairs, sorted by name.
    pub fn list(&self) -> Vec<(String, usize)> {
        let inner = self.inner.read();
        let mut entries: Vec<(String, usize)> =
            inner.groups.values().map(|g| (g.name.clone(), g.members.len())).collect();
        entries.sort_by_key(|(name, _)| name.to_lowercase());
        entries
    }

    /// Display name of the session's current group, if any.
    pub fn current_group(&self, id: SessionId) -> Option<String> {
        let inner = self.inner.read();
        let key = inner.current.get(&id)?;
        inner.groups.get(key).map(|g| g.name.clone())
    }

    /// Cascade hook: drop the session from whatever group it is in.
    ///
    /// Idempotent. Returns the display name of the group that was left.
    pub fn leave_current(&self, id: SessionId, username: &str) -> Option<String> {
        let mut fanout = Fanout::new();
        let display = {
            let mut inner = self.inner.write();
            let key = inner.current.remove(&id)?;
            let display = inner.groups.get(&key).map(|g| g.name.clone());
            inner.detach(&key, id, username, &mut fanout);
            display
        };
        deliver_all(fanout);
        display
    }
}
