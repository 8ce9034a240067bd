//! Two-keyspace answer store.
//!
//! Entries are indexed by message id (WeChat redelivers an unacknowledged
//! webhook with the *same* id) and by user id (for `/status`). The user
//! keyspace is an indirection onto the message keyspace: it always points
//! at the user's most recent message, and superseding it strands the older
//! entry in the message keyspace only.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockWriteGuard};
use std::time::{Duration, Instant};

use crate::config::CacheConfig;
use crate::observability::metrics;

/// Processing state of one logical question.
#[derive(Debug, Clone)]
pub struct AnswerEntry {
    pub user_id: String,
    pub question: String,
    pub answer: String,
    pub ready: bool,
    pub processing_notice: String,
    pub created_at: Instant,
}

/// Result of attempting to claim a message id.
#[derive(Debug)]
pub enum PutOutcome {
    /// The id was unseen; a pending entry now exists under both keys.
    Created,
    /// The id was already claimed; snapshot of the existing entry.
    Existing(AnswerEntry),
}

#[derive(Default)]
struct Maps {
    by_message: HashMap<String, AnswerEntry>,
    by_user: HashMap<String, String>,
}

/// Thread-safe store for answer state.
///
/// A single reader/writer lock covers both keyspaces; it is held only
/// for the duration of a map operation, never across an await point.
pub struct AnswerStore {
    max_entries: usize,
    max_age: Duration,
    inner: RwLock<Maps>,
}

impl AnswerStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            max_entries: config.max_entries,
            max_age: Duration::from_secs(config.max_age_secs),
            inner: RwLock::new(Maps::default()),
        }
    }

    /// Snapshot of the entry for a message id, if any.
    pub fn get_by_message_id(&self, message_id: &str) -> Option<AnswerEntry> {
        self.read().by_message.get(message_id).cloned()
    }

    /// Snapshot of the user's most recent entry, if any.
    pub fn get_by_user_id(&self, user_id: &str) -> Option<AnswerEntry> {
        let maps = self.read();
        let message_id = maps.by_user.get(user_id)?;
        maps.by_message.get(message_id).cloned()
    }

    /// Atomically claim a message id.
    ///
    /// If the id is unseen, a pending entry is created and indexed under
    /// both keys (re-pointing the user slot from any older message) and
    /// `Created` is returned. Otherwise the existing entry is returned
    /// untouched, so a redelivery can never start duplicate backend work.
    pub fn put_new(
        &self,
        message_id: &str,
        user_id: &str,
        question: &str,
        processing_notice: &str,
    ) -> PutOutcome {
        let mut maps = self.write();

        if let Some(existing) = maps.by_message.get(message_id) {
            return PutOutcome::Existing(existing.clone());
        }

        self.evict(&mut maps);

        maps.by_message.insert(
            message_id.to_string(),
            AnswerEntry {
                user_id: user_id.to_string(),
                question: question.to_string(),
                answer: String::new(),
                ready: false,
                processing_notice: processing_notice.to_string(),
                created_at: Instant::now(),
            },
        );
        maps.by_user
            .insert(user_id.to_string(), message_id.to_string());

        metrics::record_cache_size(maps.by_message.len());
        PutOutcome::Created
    }

    /// Record the final answer for a message id. First write wins: once
    /// ready, an entry's answer is immutable. Returns false if the entry
    /// no longer exists (evicted).
    pub fn mark_ready(&self, message_id: &str, answer: &str) -> bool {
        let mut maps = self.write();
        match maps.by_message.get_mut(message_id) {
            Some(entry) => {
                if !entry.ready {
                    entry.answer = answer.to_string();
                    entry.ready = true;
                }
                true
            }
            None => false,
        }
    }

    /// Drop the user's slot only. Message-id entries for that user stay
    /// answerable to exact-retry lookups.
    pub fn clear_user(&self, user_id: &str) -> bool {
        self.write().by_user.remove(user_id).is_some()
    }

    /// Number of message-id entries currently held.
    pub fn len(&self) -> usize {
        self.read().by_message.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Age-sweep, then capacity-bound the message keyspace.
    ///
    /// Only ready entries are evicted: a pending entry's detached
    /// continuation must always find its entry to mark it ready.
    fn evict(&self, maps: &mut Maps) {
        let now = Instant::now();

        let expired: Vec<String> = maps
            .by_message
            .iter()
            .filter(|(_, e)| e.ready && now.duration_since(e.created_at) > self.max_age)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            maps.by_message.remove(id);
            maps.by_user.retain(|_, message_id| message_id != id);
        }
        if !expired.is_empty() {
            tracing::debug!(count = expired.len(), "swept aged-out answer entries");
        }

        while maps.by_message.len() >= self.max_entries {
            let oldest = maps
                .by_message
                .iter()
                .filter(|(_, e)| e.ready)
                .min_by_key(|(_, e)| e.created_at)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    maps.by_message.remove(&id);
                    maps.by_user.retain(|_, message_id| message_id != &id);
                    tracing::debug!(message_id = %id, "evicted oldest ready entry");
                }
                None => break,
            }
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Maps> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Maps> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
