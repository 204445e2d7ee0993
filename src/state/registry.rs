//! Registered-session directory.
//!
//! The authoritative unique-username table. Keys are lowercased; the display
//! casing from registration is preserved for output. One lock covers the
//! whole table, so the uniqueness check and the insert are a single critical
//! section and a rename swaps both names without any window where the old
//! name is claimable or both names are held.

use crate::error::RegistryError;
use crate::filter::WordFilter;
use crate::state::session::{SessionHandle, SessionId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

struct Entry {
    /// Display name as given at registration.
    username: String,
    handle: Arc<SessionHandle>,
}

#[derive(Default)]
struct Inner {
    /// Lowercased username -> registered session.
    by_name: HashMap<String, Entry>,
    /// Session id -> lowercased username, for unregister and rename.
    by_id: HashMap<SessionId, String>,
}

/// Unique-username directory of registered sessions.
#[derive(Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `requested` to the session and mark it registered.
    ///
    /// Returns the stored display name. Rejects empty names, names the
    /// content filter flags, and names already held (case-insensitive).
    pub fn register(
        &self,
        handle: Arc<SessionHandle>,
        requested: &str,
        filter: &WordFilter,
    ) -> Result<String, RegistryError> {
        let requested = requested.trim();
        if requested.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if !filter.is_clean(requested) {
            return Err(RegistryError::NameRejected(requested.to_string()));
        }
        let key = requested.to_lowercase();

        let mut inner = self.inner.write();
        if inner.by_name.contains_key(&key) {
            return Err(RegistryError::NameTaken(requested.to_string()));
        }
        inner.by_id.insert(handle.id, key.clone());
        inner.by_name.insert(key, Entry { username: requested.to_string(), handle });
        Ok(requested.to_string())
    }

    /// Atomically release the session's current name and claim `requested`.
    ///
    /// Returns `(old, new)` display names. The swap happens under one write
    /// lock: no third party can claim the old name mid-operation, and the
    /// session never holds both names observably.
    pub fn rename(
        &self,
        id: SessionId,
        requested: &str,
        filter: &WordFilter,
    ) -> Result<(String, String), RegistryError> {
        let requested = requested.trim();
        if requested.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if !filter.is_clean(requested) {
            return Err(RegistryError::NameRejected(requested.to_string()));
        }
        let new_key = requested.to_lowercase();

        let mut inner = self.inner.write();
        let Some(old_key) = inner.by_id.get(&id).cloned() else {
            // Not registered; nothing to rename.
            return Err(RegistryError::NoSuchUser(requested.to_string()));
        };
        if old_key != new_key && inner.by_name.contains_key(&new_key) {
            return Err(RegistryError::NameTaken(requested.to_string()));
        }
        let Some(entry) = inner.by_name.remove(&old_key) else {
            return Err(RegistryError::NoSuchUser(requested.to_string()));
        };
        let old_name = entry.username;
        inner.by_name.insert(
            new_key.clone(),
            Entry { username: requested.to_string(), handle: entry.handle },
        );
        inner.by_id.insert(id, new_key);
        Ok((old_name, requested.to_string()))
    }

    /// Remove the session from the registry if present.
    ///
    /// Idempotent: unregistering an unknown session is a no-op. Returns the
    /// display name when the session was registered.
    pub fn unregister(&self, id: SessionId) -> Option<String> {
        let mut inner = self.inner.write();
        let key = inner.by_id.remove(&id)?;
        inner.by_name.remove(&key).map(|e| e.username)
    }

    /// Case-insensitive exact-match lookup.
    pub fn find_by_username(&self, name: &str) -> Option<Arc<SessionHandle>> {
        let inner = self.inner.read();
        inner.by_name.get(&name.trim().to_lowercase()).map(|e| Arc::clone(&e.handle))
    }

    /// Deliver `line` to every registered session except `exclude`.
    ///
    /// Recipients are collected under the read lock and delivered after it
    /// is released; a dead sink only ever affects that recipient.
    pub fn broadcast(&self, line: &str, exclude: Option<SessionId>) {
        let recipients: Vec<Arc<SessionHandle>> = {
            let inner = self.inner.read();
            inner
                .by_name
                .values()
                .filter(|e| Some(e.handle.id) != exclude)
                .map(|e| Arc::clone(&e.handle))
                .collect()
        };
        for handle in recipients {
            handle.deliver(line);
        }
    }

    /// Registered display names, sorted case-insensitively.
    pub fn list_usernames(&self) -> Vec<String> {
        let mut names: Vec<String> =
            self.inner.read().by_name.values().map(|e| e.username.clone()).collect();
        names.sort_by_key(|n| n.to_lowercase());
        names
    }

    /// Number of registered sessions.
    pub fn count(&self) -> usize {
        self.inner.read().by_name.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::session::{SessionIdGenerator, drain, test_handle};

    fn filter() -> WordFilter {
        WordFilter::load(None, &[])
    }

    #[test]
    fn register_then_find_is_case_insensitive() {
        let registry = Registry::new();
        let ids = SessionIdGenerator::new();
        let (alice, _rx) = test_handle(&ids);

        assert_eq!(registry.register(alice.clone(), "Alice", &filter()).unwrap(), "Alice");
        let found = registry.find_by_username("aLiCe").expect("lookup");
        assert_eq!(found.id, alice.id);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn duplicate_name_any_casing_is_conflict() {
        let registry = Registry::new();
        let ids = SessionIdGenerator::new();
        let (alice, _a) = test_handle(&ids);
        let (impostor, _b) = test_handle(&ids);

        registry.register(alice, "Alice", &filter()).unwrap();
        let err = registry.register(impostor, "ALICE", &filter()).unwrap_err();
        assert_eq!(err, RegistryError::NameTaken("ALICE".into()));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn empty_and_dirty_names_are_rejected() {
        let registry = Registry::new();
        let ids = SessionIdGenerator::new();
        let (s, _rx) = test_handle(&ids);

        assert_eq!(registry.register(s.clone(), "   ", &filter()).unwrap_err(), RegistryError::EmptyName);
        assert_eq!(
            registry.register(s, "badword", &filter()).unwrap_err(),
            RegistryError::NameRejected("badword".into())
        );
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn concurrent_claims_on_one_name_yield_exactly_one_winner() {
        let registry = Arc::new(Registry::new());
        let ids = SessionIdGenerator::new();
        let f = filter();

        let mut handles = Vec::new();
        let mut rxs = Vec::new();
        for _ in 0..8 {
            let (session, rx) = test_handle(&ids);
            // Keep the receivers alive so sink state cannot skew the result.
            rxs.push(rx);
            let registry = Arc::clone(&registry);
            let f = f.clone();
            handles.push(std::thread::spawn(move || {
                registry.register(session, "Highlander", &f).is_ok()
            }));
        }

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
        assert_eq!(registry.count(), 1);
        drop(rxs);
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = Registry::new();
        let ids = SessionIdGenerator::new();
        let (alice, _rx) = test_handle(&ids);
        let id = alice.id;

        registry.register(alice, "Alice", &filter()).unwrap();
        assert_eq!(registry.unregister(id), Some("Alice".into()));
        assert_eq!(registry.unregister(id), None);
        assert!(registry.find_by_username("alice").is_none());
    }

    #[test]
    fn rename_frees_old_and_claims_new_atomically() {
        let registry = Registry::new();
        let ids = SessionIdGenerator::new();
        let (alice, _a) = test_handle(&ids);
        let (late, _b) = test_handle(&ids);
        let id = alice.id;

        registry.register(alice, "Alice", &filter()).unwrap();
        let (old, new) = registry.rename(id, "Alicia", &filter()).unwrap();
        assert_eq!((old.as_str(), new.as_str()), ("Alice", "Alicia"));

        // Old name is free again, new name is held.
        assert!(registry.find_by_username("alice").is_none());
        assert_eq!(registry.find_by_username("alicia").unwrap().id, id);
        registry.register(late, "Alice", &filter()).unwrap();
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn rename_to_taken_name_is_conflict_and_keeps_old_binding() {
        let registry = Registry::new();
        let ids = SessionIdGenerator::new();
        let (alice, _a) = test_handle(&ids);
        let (bob, _b) = test_handle(&ids);

        registry.register(alice.clone(), "Alice", &filter()).unwrap();
        registry.register(bob, "Bob", &filter()).unwrap();

        let err = registry.rename(alice.id, "bob", &filter()).unwrap_err();
        assert_eq!(err, RegistryError::NameTaken("bob".into()));
        assert_eq!(registry.find_by_username("alice").unwrap().id, alice.id);
    }

    #[test]
    fn rename_can_change_casing_of_own_name() {
        let registry = Registry::new();
        let ids = SessionIdGenerator::new();
        let (alice, _rx) = test_handle(&ids);
        let id = alice.id;

        registry.register(alice, "alice", &filter()).unwrap();
        let (old, new) = registry.rename(id, "Alice", &filter()).unwrap();
        assert_eq!((old.as_str(), new.as_str()), ("alice", "Alice"));
        assert_eq!(registry.list_usernames(), vec!["Alice".to_string()]);
    }

    #[test]
    fn broadcast_reaches_everyone_except_excluded() {
        let registry = Registry::new();
        let ids = SessionIdGenerator::new();
        let (alice, mut a_rx) = test_handle(&ids);
        let (bob, mut b_rx) = test_handle(&ids);
        let (carol, mut c_rx) = test_handle(&ids);

        registry.register(alice.clone(), "Alice", &filter()).unwrap();
        registry.register(bob, "Bob", &filter()).unwrap();
        registry.register(carol, "Carol", &filter()).unwrap();

        registry.broadcast("GLOBAL | Alice: hi", Some(alice.id));

        assert!(drain(&mut a_rx).is_empty(), "sender is excluded");
        assert_eq!(drain(&mut b_rx), vec!["GLOBAL | Alice: hi".to_string()]);
        assert_eq!(drain(&mut c_rx), vec!["GLOBAL | Alice: hi".to_string()]);
    }

    #[test]
    fn broadcast_skips_unregistered_sessions() {
        let registry = Registry::new();
        let ids = SessionIdGenerator::new();
        let (alice, _a) = test_handle(&ids);
        let (lurker, mut l_rx) = test_handle(&ids);

        registry.register(alice.clone(), "Alice", &filter()).unwrap();
        registry.broadcast("hello", None);

        assert!(drain(&mut l_rx).is_empty());
        let _ = lurker;
    }

    #[test]
    fn usernames_list_in_case_insensitive_order() {
        let registry = Registry::new();
        let ids = SessionIdGenerator::new();
        for name in ["mallory", "Bob", "alice"] {
            let (s, _rx) = test_handle(&ids);
            registry.register(s, name, &filter()).unwrap();
        }
        assert_eq!(registry.list_usernames(), vec!["alice", "Bob", "mallory"]);
    }
}
