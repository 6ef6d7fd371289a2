use crate::domain::{intent::Intent, webhook::Message};

pub const DEFAULT_ASSET_ENTITY: &str = "cryptocurrency_type";
pub const DEFAULT_PRICE_ENTITY: &str = "query_price";

/// Reads the asset and price-request entities off a message annotation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntentExtractor {
    asset_entity: String,
    price_entity: String,
}

impl Default for IntentExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_ASSET_ENTITY, DEFAULT_PRICE_ENTITY)
    }
}

impl IntentExtractor {
    pub fn new(asset_entity: impl Into<String>, price_entity: impl Into<String>) -> Self {
        Self { asset_entity: asset_entity.into(), price_entity: price_entity.into() }
    }

    /// Takes the first match per entity in annotator order. Confidence is not
    /// filtered here.
    pub fn extract(&self, message: &Message) -> Intent {
        let Some(annotation) = message.annotation.as_ref() else {
            return Intent::default();
        };

        Intent {
            asset_type: annotation.first(&self.asset_entity).cloned(),
            wants_price: annotation.first(&self.price_entity).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::IntentExtractor;
    use crate::domain::webhook::{EntityMatch, Message};

    fn message(nlp: serde_json::Value) -> Message {
        serde_json::from_value(json!({ "mid": "m1", "text": "hello", "nlp": nlp }))
            .expect("message should deserialize")
    }

    #[test]
    fn first_match_wins_without_resorting() {
        let message = message(json!({ "entities": {
            "cryptocurrency_type": [
                { "value": "IOTA", "confidence": 0.4 },
                { "value": "Bitcoin", "confidence": 0.99 }
            ],
            "query_price": [ { "value": "price", "confidence": 0.9 } ]
        } }));

        let intent = IntentExtractor::default().extract(&message);
        assert_eq!(intent.asset_type, Some(EntityMatch::new("IOTA", 0.4)));
        assert_eq!(intent.wants_price, Some(EntityMatch::new("price", 0.9)));
    }

    #[test]
    fn missing_annotation_or_entity_is_empty() {
        let bare = Message { id: "m1".to_owned(), text: Some("hi".to_owned()), ..Message::default() };
        assert!(IntentExtractor::default().extract(&bare).is_empty());

        let message = message(json!({ "entities": { "greetings": [ { "value": "true", "confidence": 1.0 } ] } }));
        let intent = IntentExtractor::default().extract(&message);
        assert!(intent.is_empty());
    }

    #[test]
    fn empty_match_list_is_treated_as_absent() {
        let message = message(json!({ "entities": { "cryptocurrency_type": [] } }));
        assert!(IntentExtractor::default().extract(&message).asset_type.is_none());
    }

    #[test]
    fn entity_names_are_configurable() {
        let message = message(json!({ "entities": {
            "coin": [ { "value": "EOS", "confidence": 0.95 } ]
        } }));

        let intent = IntentExtractor::new("coin", "price").extract(&message);
        assert_eq!(intent.asset_type.map(|found| found.value), Some("EOS".to_owned()));
    }
}
