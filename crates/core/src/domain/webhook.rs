use std::collections::HashMap;

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Discriminator the platform sets on page subscription callbacks.
pub const PAGE_OBJECT: &str = "page";

/// Top-level webhook body. Entries stay as raw JSON so a single malformed
/// entry can be skipped without rejecting the whole batch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    #[serde(default, deserialize_with = "null_as_default")]
    pub object: String,
    #[serde(default, rename = "entry", deserialize_with = "null_as_default")]
    pub entries: Vec<Value>,
}

impl WebhookPayload {
    pub fn is_page_subscription(&self) -> bool {
        self.object == PAGE_OBJECT
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(rename = "id", deserialize_with = "platform_id")]
    pub source_id: String,
    #[serde(rename = "time", default)]
    pub timestamp: i64,
    #[serde(rename = "messaging", default)]
    pub messaging_events: Vec<Value>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MessagingEvent {
    pub sender_id: String,
    pub recipient_id: String,
    pub timestamp: i64,
    pub message: Option<Message>,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct RawMessagingEvent {
    pub sender: Participant,
    pub recipient: Participant,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct Participant {
    #[serde(deserialize_with = "platform_id")]
    pub id: String,
}

impl From<RawMessagingEvent> for MessagingEvent {
    fn from(raw: RawMessagingEvent) -> Self {
        Self {
            sender_id: raw.sender.id,
            recipient_id: raw.recipient.id,
            timestamp: raw.timestamp,
            message: raw.message,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "mid", default)]
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub quick_reply: Option<QuickReply>,
    #[serde(rename = "nlp", default)]
    pub annotation: Option<Annotation>,
    #[serde(default)]
    pub is_echo: bool,
}

impl Message {
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }
}

/// Opaque attachment descriptor; only the type tag is inspected.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickReply {
    #[serde(default)]
    pub payload: String,
}

/// NLP result attached to a message, keyed by entity name. Matches are kept
/// in the order the annotator ranked them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(default)]
    pub entities: HashMap<String, Vec<EntityMatch>>,
}

impl Annotation {
    pub fn first(&self, entity: &str) -> Option<&EntityMatch> {
        self.entities.get(entity).and_then(|matches| matches.first())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityMatch {
    #[serde(default, deserialize_with = "lenient_string")]
    pub value: String,
    #[serde(default)]
    pub confidence: f64,
}

impl EntityMatch {
    pub fn new(value: impl Into<String>, confidence: f64) -> Self {
        Self { value: value.into(), confidence }
    }
}

fn platform_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(id) if !id.trim().is_empty() => Ok(id),
        Value::Number(id) => Ok(id.to_string()),
        other => Err(de::Error::custom(format!("expected a platform id, found `{other}`"))),
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(value) => value,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Annotation, Entry, Message, RawMessagingEvent, WebhookPayload};

    #[test]
    fn null_top_level_fields_read_as_empty() {
        let payload: WebhookPayload =
            serde_json::from_str(r#"{"object":"page","entry":null}"#).expect("payload");
        assert!(payload.is_page_subscription());
        assert!(payload.entries.is_empty());

        let payload: WebhookPayload =
            serde_json::from_str(r#"{"object":null,"entry":[]}"#).expect("payload");
        assert_eq!(payload.object, "");
        assert!(!payload.is_page_subscription());
    }

    #[test]
    fn message_reads_platform_field_names() {
        let message: Message = serde_json::from_value(json!({
            "mid": "m_1",
            "text": "price of eos",
            "quick_reply": { "payload": "PRICE_EOS" },
            "nlp": { "entities": { "cryptocurrency_type": [
                { "value": "EOS", "confidence": 0.91 },
                { "value": "Bitcoin", "confidence": 0.99 }
            ] } }
        }))
        .expect("message should deserialize");

        assert_eq!(message.id, "m_1");
        assert_eq!(message.quick_reply.map(|reply| reply.payload).as_deref(), Some("PRICE_EOS"));
        let annotation = message.annotation.expect("annotation");
        let first = annotation.first("cryptocurrency_type").expect("first match");
        assert_eq!(first.value, "EOS");
        assert!(!message.is_echo);
    }

    #[test]
    fn entity_values_that_are_not_strings_are_stringified() {
        let annotation: Annotation = serde_json::from_value(json!({
            "entities": { "query_price": [ { "value": true, "confidence": 0.85 } ],
                          "greeting": [ { "confidence": 0.5 } ] }
        }))
        .expect("annotation should deserialize");

        assert_eq!(annotation.first("query_price").map(|m| m.value.as_str()), Some("true"));
        assert_eq!(annotation.first("greeting").map(|m| m.value.as_str()), Some(""));
        assert!(annotation.first("missing").is_none());
    }

    #[test]
    fn numeric_ids_are_accepted_and_blank_ids_rejected() {
        let event: RawMessagingEvent = serde_json::from_value(json!({
            "sender": { "id": 1234 },
            "recipient": { "id": "page-1" },
            "timestamp": 1_500_000_000_000_i64
        }))
        .expect("numeric sender id");
        assert_eq!(event.sender.id, "1234");

        let blank = serde_json::from_value::<RawMessagingEvent>(json!({
            "sender": { "id": " " },
            "recipient": { "id": "page-1" }
        }));
        assert!(blank.is_err());
    }

    #[test]
    fn payload_without_entries_defaults_to_empty() {
        let payload: WebhookPayload =
            serde_json::from_value(json!({ "object": "page" })).expect("payload");
        assert!(payload.is_page_subscription());
        assert!(payload.entries.is_empty());

        let entry: Entry =
            serde_json::from_value(json!({ "id": "page-1", "time": 1 })).expect("entry");
        assert!(entry.messaging_events.is_empty());
    }
}
