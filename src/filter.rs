//! Banned-word content filter.
//!
//! A pure collaborator of the routing core: `is_clean` and `filter` are the
//! whole interface, and routing never inspects the word set. User-authored
//! bodies are always run through `filter`; server-originated announcements
//! never are.

use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

/// Built-in fallback used when no wordlist file can be read.
const DEFAULT_WORDS: [&str; 5] = ["badword", "swear", "offensive", "inappropriate", "curse"];

/// Token-exact banned-word filter.
///
/// Matching is per whitespace-separated token, case-insensitive. A banned
/// word embedded inside a larger token is left alone.
#[derive(Debug, Clone)]
pub struct WordFilter {
    banned: HashSet<String>,
}

impl WordFilter {
    /// Build a filter from an optional wordlist path plus inline extras.
    ///
    /// The wordlist holds one word per line; blank lines and `#` comments
    /// are skipped. A missing or unreadable file falls back to the built-in
    /// list with a warning.
    pub fn load(path: Option<&Path>, extra: &[String]) -> Self {
        let mut banned: HashSet<String> = match path {
            Some(p) => match std::fs::read_to_string(p) {
                Ok(content) => {
                    let words: HashSet<String> = content
                        .lines()
                        .map(|l| l.trim().to_lowercase())
                        .filter(|l| !l.is_empty() && !l.starts_with('#'))
                        .collect();
                    info!(path = %p.display(), count = words.len(), "Loaded wordlist");
                    words
                }
                Err(e) => {
                    warn!(path = %p.display(), error = %e, "Wordlist unreadable, using built-in list");
                    DEFAULT_WORDS.iter().map(|w| (*w).to_string()).collect()
                }
            },
            None => DEFAULT_WORDS.iter().map(|w| (*w).to_string()).collect(),
        };

        for word in extra {
            banned.insert(word.to_lowercase());
        }

        Self { banned }
    }

    /// True when no token of `text` is a banned word.
    pub fn is_clean(&self, text: &str) -> bool {
        text.split_whitespace().all(|w| !self.banned.contains(&w.to_lowercase()))
    }

    /// Replace each banned token with asterisks of the same length.
    ///
    /// Runs of whitespace collapse to single spaces.
    pub fn filter(&self, text: &str) -> String {
        text.split_whitespace()
            .map(|w| {
                if self.banned.contains(&w.to_lowercase()) {
                    "*".repeat(w.chars().count())
                } else {
                    w.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}
