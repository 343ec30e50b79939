//! Per-recipient record of recently sent messages, used to retract the
//! latest one.
//!
//! Entries are appended in send order, so expiry is always a prefix trim of
//! the per-target list.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::clock::{Clock, SystemClock};
use crate::target::MessageHandle;

pub const DEFAULT_RECALL_WINDOW: Duration = Duration::from_secs(120);

struct SentEntry {
    handle: MessageHandle,
    sent_at: Instant,
}

pub struct RecallWindow {
    sent: DashMap<String, VecDeque<SentEntry>>,
    retention: Duration,
    clock: Arc<dyn Clock>,
}

impl RecallWindow {
    pub fn new(retention: Duration) -> Self {
        Self::with_clock(retention, Arc::new(SystemClock))
    }

    pub fn with_clock(retention: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            sent: DashMap::new(),
            retention,
            clock,
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Append a freshly sent message for `target_id`, then drop expired entries.
    pub fn record(&self, target_id: &str, handle: MessageHandle) {
        let now = self.clock.now();
        let mut entries = self.sent.entry(target_id.to_string()).or_default();
        entries.push_back(SentEntry {
            handle,
            sent_at: now,
        });
        Self::evict_expired(&mut entries, now, self.retention);
    }

    /// Remove and return the most recent handle for `target_id`.
    ///
    /// Entries older than the retention window are never returned, even when
    /// they are the only ones left.
    pub fn take_most_recent(&self, target_id: &str) -> Option<MessageHandle> {
        let now = self.clock.now();
        let latest = {
            let mut entries = self.sent.get_mut(target_id)?;
            Self::evict_expired(&mut entries, now, self.retention);
            let latest = entries.pop_back().map(|e| e.handle);
            Self::evict_expired(&mut entries, now, self.retention);
            latest
        };
        // The shard guard above must be released before removal.
        self.sent.remove_if(target_id, |_, entries| entries.is_empty());
        latest
    }

    /// Number of targets with at least one retained send.
    pub fn tracked_targets(&self) -> usize {
        self.sent.len()
    }

    pub fn len(&self, target_id: &str) -> usize {
        self.sent.get(target_id).map(|e| e.len()).unwrap_or(0)
    }

    fn evict_expired(entries: &mut VecDeque<SentEntry>, now: Instant, retention: Duration) {
        while let Some(front) = entries.front() {
            if now.saturating_duration_since(front.sent_at) > retention {
                entries.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for RecallWindow {
    fn default() -> Self {
        Self::new(DEFAULT_RECALL_WINDOW)
    }
}
