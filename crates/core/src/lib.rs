pub mod config;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod intent;
pub mod normalize;
pub mod signature;

pub use dispatch::{Action, DispatchPolicy, Dispatcher};
pub use domain::asset::Asset;
pub use domain::intent::Intent;
pub use domain::outbound::{OutboundMessage, OUTBOUND_METADATA};
pub use domain::price::{price_reply_text, Price};
pub use domain::webhook::{
    Annotation, Attachment, EntityMatch, Entry, Message, MessagingEvent, QuickReply,
    WebhookPayload, PAGE_OBJECT,
};
pub use errors::{IngressError, IngressStatus, SignatureError};
pub use intent::IntentExtractor;
pub use normalize::{normalize, Events, MalformedEvent, NormalizeStats, NormalizedEvent};
