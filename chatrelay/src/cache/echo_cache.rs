//! Capacity and TTL bounded cache of recently seen messages, keyed by message id.
//!
//! Used to reconstruct the content of a message after the platform reports
//! it as retracted.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lru::LruCache;
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};

pub const DEFAULT_ECHO_TTL: Duration = Duration::from_secs(600);
pub const DEFAULT_ECHO_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EchoRecord {
    #[serde(rename = "fromName")]
    pub from: String,
    #[serde(rename = "toName")]
    pub to: String,
    #[serde(rename = "msg")]
    pub text: String,
}

impl EchoRecord {
    pub fn new(from: impl Into<String>, to: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            text: text.into(),
        }
    }
}

struct EchoEntry {
    record: EchoRecord,
    stored_at: Instant,
}

pub struct EchoCache {
    entries: Mutex<LruCache<String, EchoEntry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl EchoCache {
    pub fn new(capacity: NonZeroUsize, ttl: Duration) -> Self {
        Self::with_clock(capacity, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(capacity: NonZeroUsize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            clock,
        }
    }

    /// Store a record. Records are write-once: a second put for the same id is ignored.
    pub fn put(&self, message_id: &str, record: EchoRecord) {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        self.purge_expired(&mut entries, now);
        if entries.contains(message_id) {
            return;
        }
        entries.put(
            message_id.to_string(),
            EchoEntry {
                record,
                stored_at: now,
            },
        );
    }

    pub fn get(&self, message_id: &str) -> Option<EchoRecord> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let expired = match entries.peek(message_id) {
            Some(entry) => now.saturating_duration_since(entry.stored_at) > self.ttl,
            None => return None,
        };
        if expired {
            entries.pop(message_id);
            return None;
        }
        entries.peek(message_id).map(|e| e.record.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Least recently inserted entries sit at the tail, so expired ones pop from there.
    fn purge_expired(&self, entries: &mut LruCache<String, EchoEntry>, now: Instant) {
        while let Some((_, oldest)) = entries.peek_lru() {
            if now.saturating_duration_since(oldest.stored_at) > self.ttl {
                entries.pop_lru();
            } else {
                break;
            }
        }
    }
}

impl Default for EchoCache {
    fn default() -> Self {
        Self::new(
            NonZeroUsize::new(DEFAULT_ECHO_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            DEFAULT_ECHO_TTL,
        )
    }
}
