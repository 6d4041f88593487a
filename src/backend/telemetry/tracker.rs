/**
 * Write-Request Tracker
 *
 * Turns each successful mutating call into exactly one enriched write event:
 *
 * 1. Look up the previous call to the same `(method, path)` in the event store.
 * 2. Diff previous vs. current request body, and separately the response body.
 * 3. Merge both diffs into one change map and summarize it.
 * 4. Emit the event to the store and append it to the local ring buffer.
 *
 * A failed or empty lookup is indistinguishable from a first call. Emission
 * failures are logged; nothing here returns an error.
 */
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::backend::telemetry::store::EventStoreClient;
use crate::shared::diff::{diff_optional, DiffNode};
use crate::shared::event::{
    CallRecord, EnrichedWriteEvent, ANONYMOUS_USER, FIRST_CALL_SUMMARY, NO_CHANGES_SUMMARY, WRITE_EVENT_NAME,
};
use crate::shared::ring::{EventRing, RingBufferEntry};

/// Methods whose calls are tracked: create, update, partial update
pub const TRACKED_METHODS: &[&str] = &["POST", "PUT", "PATCH"];

/// Whether calls with `method` go through write tracking
pub fn is_tracked_method(method: &str) -> bool {
    TRACKED_METHODS.iter().any(|m| m.eq_ignore_ascii_case(method))
}

pub struct WriteTracker {
    store: Arc<EventStoreClient>,
    ring: Arc<EventRing>,
    history_per_user: bool,
}

impl WriteTracker {
    pub fn new(store: Arc<EventStoreClient>, ring: Arc<EventRing>, history_per_user: bool) -> Self {
        Self {
            store,
            ring,
            history_per_user,
        }
    }

    /// Track one completed write.
    ///
    /// Returns the emitted event, or `None` when `current` is not a tracked
    /// method (reads and deletes never produce write events).
    pub async fn track_write(&self, current: CallRecord) -> Option<EnrichedWriteEvent> {
        if !is_tracked_method(&current.method) {
            tracing::debug!(method = %current.method, path = %current.path, "Not a tracked write method, skipping");
            return None;
        }

        let distinct_id = (self.history_per_user && current.user_id != ANONYMOUS_USER).then_some(current.user_id.as_str());
        let (method, path) = current.endpoint_key();
        let previous = self.store.previous_call(method, path, distinct_id).await;

        let event = build_enriched_event(current, previous);
        self.emit(&event).await;
        Some(event)
    }

    async fn emit(&self, event: &EnrichedWriteEvent) {
        let properties = event.to_properties();
        let distinct_id = event.current.user_id.as_str();

        self.ring.append(RingBufferEntry::new(
            distinct_id,
            WRITE_EVENT_NAME,
            serde_json::Value::Object(properties.clone()),
        ));

        if let Err(err) = self.store.emit(distinct_id, WRITE_EVENT_NAME, properties).await {
            tracing::warn!(
                method = %event.current.method,
                path = %event.current.path,
                error = %err,
                "Failed to emit write event"
            );
        }
    }
}

/// Join `current` with its predecessor.
///
/// `is_first_call` is exactly `previous.is_none()`, and `diff` is `None`
/// whenever neither body changed.
pub fn build_enriched_event(current: CallRecord, previous: Option<CallRecord>) -> EnrichedWriteEvent {
    let Some(previous) = previous else {
        return EnrichedWriteEvent {
            current,
            previous: None,
            diff: None,
            is_first_call: true,
            change_summary: FIRST_CALL_SUMMARY.to_string(),
        };
    };

    let mut changes = BTreeMap::new();
    if let Some(node) = diff_optional(previous.request_body.as_ref(), current.request_body.as_ref()) {
        changes.insert("request_body".to_string(), node);
    }
    if let Some(node) = diff_optional(previous.response_body.as_ref(), current.response_body.as_ref()) {
        changes.insert("response_body".to_string(), node);
    }

    let change_summary = summarize(&changes);
    let diff = (!changes.is_empty()).then(|| DiffNode::Nested { children: changes });

    EnrichedWriteEvent {
        current,
        previous: Some(previous),
        diff,
        is_first_call: false,
        change_summary,
    }
}

fn summarize(changes: &BTreeMap<String, DiffNode>) -> String {
    let describe = |label: &str, key: &str| {
        changes.get(key).map(|node| {
            let verb = match node {
                DiffNode::Added { .. } => "added",
                DiffNode::Removed { .. } => "removed",
                DiffNode::Changed { .. } | DiffNode::Nested { .. } => "changed",
            };
            format!("{label} {verb}")
        })
    };

    let parts: Vec<String> = [
        describe("Request body", "request_body"),
        describe("Response body", "response_body"),
    ]
    .into_iter()
    .flatten()
    .collect();

    if parts.is_empty() {
        NO_CHANGES_SUMMARY.to_string()
    } else {
        parts.join("; ")
    }
}
