//! Maps an extracted intent to the reply the bot should send, if any.
//!
//! Decisions are pure: the dispatcher only describes the action and the
//! caller performs it.

use serde::Serialize;

use crate::domain::{asset::Asset, intent::Intent, webhook::EntityMatch, webhook::Message};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "asset", rename_all = "snake_case")]
pub enum Action {
    None,
    SendAck(Asset),
    SendPriceReply(Asset),
    SendUnsupportedAttachment,
}

impl Action {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::SendAck(_) => "send_ack",
            Self::SendPriceReply(_) => "send_price_reply",
            Self::SendUnsupportedAttachment => "send_unsupported_attachment",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DispatchPolicy {
    /// A match counts only when its confidence is strictly greater.
    pub confidence_threshold: f64,
    pub reply_to_attachments: bool,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self { confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD, reply_to_attachments: false }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dispatcher {
    policy: DispatchPolicy,
}

impl Dispatcher {
    pub fn new(policy: DispatchPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    pub fn dispatch(&self, _sender_id: &str, message: &Message, intent: &Intent) -> Action {
        if message.text.as_deref().map_or(true, str::is_empty) {
            if self.policy.reply_to_attachments && message.has_attachments() {
                return Action::SendUnsupportedAttachment;
            }
            return Action::None;
        }

        let asset = self.confident(intent.asset_type.as_ref());
        if let (Some(asset), None) = (asset, intent.wants_price.as_ref()) {
            return Asset::from_entity_value(&asset.value).map_or(Action::None, Action::SendAck);
        }

        if let (Some(asset), Some(_)) = (asset, self.confident(intent.wants_price.as_ref())) {
            return Asset::from_entity_value(&asset.value)
                .map_or(Action::None, Action::SendPriceReply);
        }

        Action::None
    }

    fn confident<'a>(&self, entity: Option<&'a EntityMatch>) -> Option<&'a EntityMatch> {
        entity.filter(|found| found.confidence > self.policy.confidence_threshold)
    }
}
