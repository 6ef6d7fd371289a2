//! Flattens a batched webhook payload into individual message events.
//!
//! Non-message events (delivery/read receipts, postbacks, echoes) and entries
//! or events whose shape cannot be read are skipped and counted; neither is an
//! error for the batch as a whole.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::webhook::{Entry, MessagingEvent, RawMessagingEvent, WebhookPayload};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MalformedEvent {
    #[error("entry {entry_index} is malformed: {reason}")]
    Entry { entry_index: usize, reason: String },
    #[error("event {event_index} of entry {entry_index} is malformed: {reason}")]
    Event { entry_index: usize, event_index: usize, reason: String },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    pub yielded: usize,
    pub non_message: usize,
    pub malformed: usize,
}

/// A message event together with its position in the batch.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedEvent {
    pub source_id: String,
    pub entry_index: usize,
    pub event_index: usize,
    pub event: MessagingEvent,
}

pub fn normalize(payload: &WebhookPayload) -> Events<'_> {
    let entries: &[Value] =
        if payload.is_page_subscription() { &payload.entries } else { &[] };
    if !payload.is_page_subscription() {
        debug!(
            event_name = "ingress.webhook.ignored_object",
            object = %payload.object,
            "ignoring webhook for non-page object"
        );
    }

    Events { entries, entry_index: 0, current: None, stats: NormalizeStats::default() }
}

/// Single-pass iterator over the message events of a payload, in entry order
/// then event order.
pub struct Events<'a> {
    entries: &'a [Value],
    entry_index: usize,
    current: Option<CurrentEntry>,
    stats: NormalizeStats,
}

struct CurrentEntry {
    index: usize,
    source_id: String,
    events: std::vec::IntoIter<Value>,
    event_index: usize,
}

impl Events<'_> {
    pub fn stats(&self) -> NormalizeStats {
        self.stats
    }

    fn record_malformed(&mut self, malformed: MalformedEvent) {
        self.stats.malformed += 1;
        warn!(
            event_name = "ingress.webhook.malformed_event",
            error = %malformed,
            "skipping malformed webhook event"
        );
    }

    fn advance_entry(&mut self) -> bool {
        while let Some(raw) = self.entries.get(self.entry_index) {
            let index = self.entry_index;
            self.entry_index += 1;

            match serde_json::from_value::<Entry>(raw.clone()) {
                Ok(entry) => {
                    self.current = Some(CurrentEntry {
                        index,
                        source_id: entry.source_id,
                        events: entry.messaging_events.into_iter(),
                        event_index: 0,
                    });
                    return true;
                }
                Err(error) => self.record_malformed(MalformedEvent::Entry {
                    entry_index: index,
                    reason: error.to_string(),
                }),
            }
        }
        false
    }
}

impl Iterator for Events<'_> {
    type Item = NormalizedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Some(current) = self.current.as_mut() else {
                if !self.advance_entry() {
                    return None;
                }
                continue;
            };

            let Some(raw) = current.events.next() else {
                self.current = None;
                continue;
            };
            let entry_index = current.index;
            let event_index = current.event_index;
            let source_id = current.source_id.clone();
            current.event_index += 1;

            let event = match serde_json::from_value::<RawMessagingEvent>(raw) {
                Ok(raw) => MessagingEvent::from(raw),
                Err(error) => {
                    self.record_malformed(MalformedEvent::Event {
                        entry_index,
                        event_index,
                        reason: error.to_string(),
                    });
                    continue;
                }
            };

            let is_message = event.message.as_ref().is_some_and(|message| !message.is_echo);
            if !is_message {
                self.stats.non_message += 1;
                debug!(
                    event_name = "ingress.webhook.non_message_event",
                    source_id = %source_id,
                    sender_id = %event.sender_id,
                    echo = event.message.is_some(),
                    "skipping non-message webhook event"
                );
                continue;
            }

            self.stats.yielded += 1;
            return Some(NormalizedEvent { source_id, entry_index, event_index, event });
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{normalize, NormalizeStats};
    use crate::domain::webhook::WebhookPayload;

    fn payload(value: serde_json::Value) -> WebhookPayload {
        serde_json::from_value(value).expect("payload should deserialize")
    }

    fn message_event(sender: &str, text: &str) -> serde_json::Value {
        json!({
            "sender": { "id": sender },
            "recipient": { "id": "page-1" },
            "timestamp": 1_700_000_000_000_i64,
            "message": { "mid": format!("mid-{sender}"), "text": text }
        })
    }

    #[test]
    fn non_page_objects_yield_nothing() {
        let payload = payload(json!({
            "object": "instagram",
            "entry": [{ "id": "page-1", "time": 1, "messaging": [message_event("u1", "hi")] }]
        }));

        let mut events = normalize(&payload);
        assert!(events.next().is_none());
        assert_eq!(events.stats(), NormalizeStats::default());
    }

    #[test]
    fn flattens_entries_in_order() {
        let payload = payload(json!({
            "object": "page",
            "entry": [
                { "id": "page-1", "time": 1, "messaging": [message_event("u1", "a"), message_event("u2", "b")] },
                { "id": "page-2", "time": 2, "messaging": [message_event("u3", "c")] }
            ]
        }));

        let senders: Vec<_> = normalize(&payload)
            .map(|normalized| (normalized.source_id, normalized.event.sender_id))
            .collect();
        assert_eq!(
            senders,
            vec![
                ("page-1".to_owned(), "u1".to_owned()),
                ("page-1".to_owned(), "u2".to_owned()),
                ("page-2".to_owned(), "u3".to_owned()),
            ]
        );
    }

    #[test]
    fn events_without_message_or_echoes_are_counted_not_yielded() {
        let payload = payload(json!({
            "object": "page",
            "entry": [{ "id": "page-1", "time": 1, "messaging": [
                { "sender": { "id": "u1" }, "recipient": { "id": "page-1" }, "delivery": { "mids": ["m"] } },
                { "sender": { "id": "page-1" }, "recipient": { "id": "u1" },
                  "message": { "mid": "m2", "text": "echo", "is_echo": true } },
                message_event("u1", "real")
            ] }]
        }));

        let mut events = normalize(&payload);
        let yielded: Vec<_> = events.by_ref().collect();
        assert_eq!(yielded.len(), 1);
        assert_eq!(yielded[0].event_index, 2);
        assert_eq!(events.stats(), NormalizeStats { yielded: 1, non_message: 2, malformed: 0 });
    }

    #[test]
    fn malformed_entries_and_events_are_isolated() {
        let payload = payload(json!({
            "object": "page",
            "entry": [
                "not-an-entry",
                { "id": "page-1", "time": 1, "messaging": [
                    message_event("u1", "first"),
                    { "recipient": { "id": "page-1" }, "message": { "mid": "m", "text": "no sender" } },
                    message_event("u3", "third")
                ] }
            ]
        }));

        let mut events = normalize(&payload);
        let senders: Vec<_> = events.by_ref().map(|normalized| normalized.event.sender_id).collect();
        assert_eq!(senders, vec!["u1".to_owned(), "u3".to_owned()]);
        assert_eq!(events.stats().malformed, 2);
    }
}
