//! Messenger integration - webhook event pipeline and Send API
//!
//! - **Pipeline** (`pipeline`) - plans one action per inbound message and
//!   executes the side effects with per-event failure isolation
//! - **Send API** (`send`) - outbound text replies through the Graph API
//!
//! # Architecture
//!
//! ```text
//! WebhookPayload → normalize → IntentExtractor → Dispatcher → BatchPlan
//!                                                                 ↓
//!                        SendApi ← price reply text ← PriceLookup (ActionExecutor)
//! ```
//!
//! Planning is synchronous and pure, so the HTTP layer can acknowledge the
//! platform before any outbound I/O starts.

pub mod pipeline;
pub mod send;

pub use pipeline::{
    ActionExecutor, ActionOutcome, ActionResult, BatchPlan, BatchPlanner, EventContext,
    ExecutionReport, ExecutorSettings, PlannedAction,
};
pub use send::{DeliveryError, GraphSendClient, SendApi, SendReceipt};
