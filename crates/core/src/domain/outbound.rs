use serde::{ser::SerializeStruct, Serialize, Serializer};

/// Tag attached to every message the bot sends.
pub const OUTBOUND_METADATA: &str = "DEVELOPER_DEFINED_METADATA";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub recipient_id: String,
    pub text: String,
    pub metadata: &'static str,
}

impl OutboundMessage {
    pub fn text(recipient_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { recipient_id: recipient_id.into(), text: text.into(), metadata: OUTBOUND_METADATA }
    }
}

#[derive(Serialize)]
struct Recipient<'a> {
    id: &'a str,
}

#[derive(Serialize)]
struct Body<'a> {
    text: &'a str,
    metadata: &'a str,
}

/// Serializes to the Send API request shape.
impl Serialize for OutboundMessage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("OutboundMessage", 2)?;
        state.serialize_field("recipient", &Recipient { id: &self.recipient_id })?;
        state.serialize_field("message", &Body { text: &self.text, metadata: self.metadata })?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::OutboundMessage;

    #[test]
    fn serializes_to_send_api_shape() {
        let message = OutboundMessage::text("user-7", "You say Bitcoin?");
        let value = serde_json::to_value(&message).expect("serialize");

        assert_eq!(
            value,
            json!({
                "recipient": { "id": "user-7" },
                "message": { "text": "You say Bitcoin?", "metadata": "DEVELOPER_DEFINED_METADATA" }
            })
        );
    }
}
