/**
 * Local Event Ring Buffer
 *
 * Fixed-capacity, in-memory log of recently produced telemetry events, kept
 * for local inspection through the debug endpoints.
 *
 * Appending beyond capacity drops the oldest entry. All access goes through a
 * single mutex, which keeps ordering and the eviction bound intact under
 * concurrent appends. Nothing is persisted; a restart starts empty.
 */
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Default number of retained entries
pub const DEFAULT_RING_CAPACITY: usize = 100;

/// One buffered event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingBufferEntry {
    pub distinct_id: String,
    pub event_name: String,
    pub properties: Value,
    pub timestamp: String,
}

impl RingBufferEntry {
    pub fn new(distinct_id: impl Into<String>, event_name: impl Into<String>, properties: Value) -> Self {
        Self {
            distinct_id: distinct_id.into(),
            event_name: event_name.into(),
            properties,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Bounded FIFO of [`RingBufferEntry`]
#[derive(Debug)]
pub struct EventRing {
    capacity: usize,
    entries: Mutex<VecDeque<RingBufferEntry>>,
}

impl Default for EventRing {
    fn default() -> Self {
        Self::new(DEFAULT_RING_CAPACITY)
    }
}

impl EventRing {
    /// Create an empty ring holding at most `capacity` entries.
    ///
    /// A capacity of zero retains nothing.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append an entry, evicting the oldest one when full
    pub fn append(&self, entry: RingBufferEntry) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Up to `limit` entries, newest first. `limit` is clamped to the capacity.
    pub fn recent(&self, limit: usize) -> Vec<RingBufferEntry> {
        let limit = limit.min(self.capacity);
        self.lock().iter().rev().take(limit).cloned().collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<RingBufferEntry>> {
        // a panicking appender cannot leave the deque half-written
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
