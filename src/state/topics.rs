//! Topic directory: keyword-triggered subscription channels.
//!
//! Topics are lowercase-normalized names with independent many-to-many
//! subscriber sets. They come into being explicitly or the first time a
//! message carries an unknown `#tag`, and are never deleted.
//!
//! Delivery has a deliberately split trigger: a hashtag *creates* a topic,
//! but a plain substring of the (filtered, lowercased) body *triggers* it.
//! A topic "news" matches any message containing "news" anywhere, hashtag or
//! not. The substring scan runs over every known topic at once through an
//! aho-corasick automaton, rebuilt only when a topic is added.

use crate::error::TopicError;
use crate::filter::WordFilter;
use crate::state::session::{SessionHandle, SessionId};
use aho_corasick::AhoCorasick;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Default)]
struct Inner {
    /// Lowercased topic name -> subscribers.
    topics: HashMap<String, HashMap<SessionId, Arc<SessionHandle>>>,
    /// Multi-pattern matcher over all topic names, aligned with
    /// `pattern_keys`. None until the first topic exists, or if a rebuild
    /// ever fails (the scan then falls back to a linear pass).
    matcher: Option<AhoCorasick>,
    pattern_keys: Vec<String>,
}

impl Inner {
    /// Insert a topic if absent. Returns false when it already existed.
    fn add_topic(&mut self, key: &str) -> bool {
        if self.topics.contains_key(key) {
            return false;
        }
        self.topics.insert(key.to_string(), HashMap::new());
        self.rebuild_matcher();
        true
    }

    fn rebuild_matcher(&mut self) {
        self.pattern_keys = self.topics.keys().cloned().collect();
        self.matcher = match AhoCorasick::new(&self.pattern_keys) {
            Ok(ac) => Some(ac),
            Err(e) => {
                warn!(error = %e, "Topic matcher rebuild failed, falling back to linear scan");
                None
            }
        };
    }

    /// Keys of every topic whose name occurs in `body_lower`.
    fn matching_keys(&self, body_lower: &str) -> Vec<String> {
        match &self.matcher {
            Some(ac) => {
                let mut found: HashSet<usize> = HashSet::new();
                for m in ac.find_overlapping_iter(body_lower) {
                    found.insert(m.pattern().as_usize());
                }
                found.into_iter().map(|i| self.pattern_keys[i].clone()).collect()
            }
            None => self
                .topics
                .keys()
                .filter(|k| body_lower.contains(k.as_str()))
                .cloned()
                .collect(),
        }
    }
}

/// Directory of keyword-triggered subscription topics.
#[derive(Default)]
pub struct TopicDirectory {
    inner: RwLock<Inner>,
}

impl TopicDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a topic explicitly. The stored name is the lowercased form.
    pub fn create_topic(&self, name: &str) -> Result<String, TopicError> {
        let key = name.trim().to_lowercase();
        let mut inner = self.inner.write();
        if !inner.add_topic(&key) {
            return Err(TopicError::AlreadyExists(key));
        }
        info!(topic = %key, "Topic created");
        Ok(key)
    }

    /// Subscribe the session to an existing topic.
    ///
    /// Subscribing twice is a confirmed no-op, not an error.
    pub fn subscribe(
        &self,
        name: &str,
        id: SessionId,
        handle: Arc<SessionHandle>,
    ) -> Result<String, TopicError> {
        let key = name.trim().to_lowercase();
        let mut inner = self.inner.write();
        let Some(subscribers) = inner.topics.get_mut(&key) else {
            return Err(TopicError::NotFound(key));
        };
        subscribers.insert(id, handle);
        Ok(key)
    }

    /// Remove the session's subscription to an existing topic.
    pub fn unsubscribe(&self, name: &str, id: SessionId) -> Result<String, TopicError> {
        let key = name.trim().to_lowercase();
        let mut inner = self.inner.write();
        let Some(subscribers) = inner.topics.get_mut(&key) else {
            return Err(TopicError::NotFound(key));
        };
        subscribers.remove(&id);
        Ok(key)
    }

    /// All topic names, sorted.
    pub fn list_topics(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().topics.keys().cloned().collect();
        names.sort();
        names
    }

    /// Route one user-authored message through the topic scopes.
    ///
    /// Phase 1: every `#word` token of the raw body that is not yet a topic
    /// becomes one, acknowledged to the sender only. Phase 2: the body is
    /// content-filtered once, lowercased, and scanned; each matching topic's
    /// subscribers (minus the sender) receive a topic-tagged copy of the
    /// filtered body.
    pub fn notify_subscribers(
        &self,
        body: &str,
        sender: &SessionHandle,
        sender_name: &str,
        filter: &WordFilter,
    ) {
        let filtered = filter.filter(body);
        let body_lower = filtered.to_lowercase();

        let mut acks: Vec<String> = Vec::new();
        let deliveries: Vec<(Vec<Arc<SessionHandle>>, String)> = {
            let mut inner = self.inner.write();

            for tag in extract_hashtags(body) {
                if inner.add_topic(&tag) {
                    info!(topic = %tag, by = %sender_name, "Topic auto-created");
                    acks.push(format!("Topic '{}' created.", tag));
                }
            }

            inner
                .matching_keys(&body_lower)
                .into_iter()
                .filter_map(|key| {
                    let subscribers = inner.topics.get(&key)?;
                    let recipients: Vec<Arc<SessionHandle>> = subscribers
                        .iter()
                        .filter(|(sub_id, _)| **sub_id != sender.id)
                        .map(|(_, h)| Arc::clone(h))
                        .collect();
                    if recipients.is_empty() {
                        return None;
                    }
                    let line =
                        format!("{} | {}: {}", key.to_uppercase(), sender_name, filtered);
                    Some((recipients, line))
                })
                .collect()
        };

        for ack in acks {
            sender.deliver(ack);
        }
        for (recipients, line) in deliveries {
            for handle in recipients {
                handle.deliver(line.as_str());
            }
        }
    }

    /// Cascade hook: drop the session from every subscriber set.
    pub fn remove_session(&self, id: SessionId) {
        let mut inner = self.inner.write();
        for subscribers in inner.topics.values_mut() {
            subscribers.remove(&id);
        }
    }
}

/// `#word` tokens of a body, lowercased, `#` stripped.
fn extract_hashtags(body: &str) -> Vec<String> {
    let mut tags: Vec<String> = body
        .split_whitespace()
        .filter(|w| w.starts_with('#') && w.len() > 1)
        .map(|w| w[1..].to_lowercase())
        .collect();
    tags.sort();
    tags.dedup();
    tags
}
