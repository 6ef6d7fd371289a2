//! Turns a verified webhook payload into replies.
//!
//! [`BatchPlanner`] is pure: it decides one [`Action`] per message event
//! without touching the network. [`ActionExecutor`] then runs each actionable
//! entry in its own task so one failing or panicking event never affects its
//! siblings.

use std::{sync::Arc, time::Duration};

use pricebot_core::{
    config::AppConfig, normalize, price_reply_text, Action, Dispatcher, IntentExtractor,
    NormalizeStats, WebhookPayload,
};
use pricebot_market::{LookupError, PriceLookup};
use serde::Serialize;
use tokio::{task::JoinSet, time::timeout};
use tracing::{debug, error, info, warn};

use crate::send::{DeliveryError, SendApi, SendReceipt};

/// Per-request context threaded through planning and execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl EventContext {
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self { correlation_id: correlation_id.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlannedAction {
    pub source_id: String,
    pub sender_id: String,
    pub message_id: String,
    pub entry_index: usize,
    pub event_index: usize,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchPlan {
    pub correlation_id: String,
    pub actions: Vec<PlannedAction>,
    #[serde(skip)]
    pub stats: NormalizeStats,
}

impl BatchPlan {
    pub fn actionable(&self) -> impl Iterator<Item = &PlannedAction> {
        self.actions.iter().filter(|planned| !planned.action.is_none())
    }

    pub fn actionable_count(&self) -> usize {
        self.actionable().count()
    }
}

#[derive(Clone, Debug, Default)]
pub struct BatchPlanner {
    extractor: IntentExtractor,
    dispatcher: Dispatcher,
}

impl BatchPlanner {
    pub fn new(extractor: IntentExtractor, dispatcher: Dispatcher) -> Self {
        Self { extractor, dispatcher }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.intent_extractor(), Dispatcher::new(config.dispatch_policy()))
    }

    pub fn plan(&self, payload: &WebhookPayload, context: &EventContext) -> BatchPlan {
        let mut events = normalize(payload);
        let mut actions = Vec::new();

        for normalized in events.by_ref() {
            let event = &normalized.event;
            let Some(message) = event.message.as_ref() else {
                continue;
            };

            if let Some(quick_reply) = &message.quick_reply {
                debug!(
                    event_name = "pipeline.quick_reply.received",
                    correlation_id = %context.correlation_id,
                    sender_id = %event.sender_id,
                    payload = %quick_reply.payload,
                    "quick reply received"
                );
            }

            let intent = self.extractor.extract(message);
            let action = self.dispatcher.dispatch(&event.sender_id, message, &intent);
            info!(
                event_name = "pipeline.event.dispatched",
                correlation_id = %context.correlation_id,
                source_id = %normalized.source_id,
                sender_id = %event.sender_id,
                message_id = %message.id,
                action = action.as_str(),
                "dispatched message event"
            );

            actions.push(PlannedAction {
                source_id: normalized.source_id.clone(),
                sender_id: event.sender_id.clone(),
                message_id: message.id.clone(),
                entry_index: normalized.entry_index,
                event_index: normalized.event_index,
                action,
            });
        }

        let stats = events.stats();
        debug!(
            event_name = "pipeline.batch.planned",
            correlation_id = %context.correlation_id,
            yielded = stats.yielded,
            non_message = stats.non_message,
            malformed = stats.malformed,
            "planned webhook batch"
        );
        BatchPlan { correlation_id: context.correlation_id.clone(), actions, stats }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionResult {
    Delivered(SendReceipt),
    LookupFailed(LookupError),
    DeliveryFailed(DeliveryError),
    TimedOut(Duration),
}

impl ActionResult {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionOutcome {
    pub sender_id: String,
    pub message_id: String,
    pub action: Action,
    pub result: ActionResult,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub outcomes: Vec<ActionOutcome>,
    pub panicked: usize,
}

impl ExecutionReport {
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.result.is_delivered()).count()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutorSettings {
    /// Upper bound for one action, lookup and send included.
    pub action_timeout: Duration,
    pub unsupported_attachment_text: String,
}

impl ExecutorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            action_timeout: Duration::from_secs(
                config.messenger.timeout_secs + config.market.timeout_secs,
            ),
            unsupported_attachment_text: config.dispatch.unsupported_attachment_text.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ActionExecutor {
    send: Arc<dyn SendApi>,
    prices: Arc<dyn PriceLookup>,
    settings: Arc<ExecutorSettings>,
}

impl ActionExecutor {
    pub fn new(
        send: Arc<dyn SendApi>,
        prices: Arc<dyn PriceLookup>,
        settings: ExecutorSettings,
    ) -> Self {
        Self { send, prices, settings: Arc::new(settings) }
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    pub async fn execute(&self, plan: BatchPlan) -> ExecutionReport {
        let correlation_id: Arc<str> = Arc::from(plan.correlation_id.as_str());
        let mut tasks = JoinSet::new();
        for planned in plan.actions.into_iter().filter(|planned| !planned.action.is_none()) {
            let executor = self.clone();
            let correlation_id = Arc::clone(&correlation_id);
            tasks.spawn(async move { executor.run_one(planned, &correlation_id).await });
        }

        let mut report = ExecutionReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(join_error) => {
                    report.panicked += 1;
                    error!(
                        event_name = "pipeline.action.panicked",
                        correlation_id = %correlation_id,
                        error = %join_error,
                        "action task aborted"
                    );
                }
            }
        }
        report
    }

    async fn run_one(&self, planned: PlannedAction, correlation_id: &str) -> ActionOutcome {
        let limit = self.settings.action_timeout;
        let result = match timeout(limit, self.perform(&planned)).await {
            Ok(result) => result,
            Err(_) => ActionResult::TimedOut(limit),
        };

        match &result {
            ActionResult::Delivered(_) => info!(
                event_name = "pipeline.action.delivered",
                correlation_id,
                sender_id = %planned.sender_id,
                action = planned.action.as_str(),
                "action delivered"
            ),
            ActionResult::LookupFailed(failure) => warn!(
                event_name = "pipeline.action.lookup_failed",
                correlation_id,
                sender_id = %planned.sender_id,
                error = %failure,
                "price lookup failed; no reply sent"
            ),
            ActionResult::DeliveryFailed(failure) => warn!(
                event_name = "pipeline.action.delivery_failed",
                correlation_id,
                sender_id = %planned.sender_id,
                error = %failure,
                "reply delivery failed"
            ),
            ActionResult::TimedOut(limit) => warn!(
                event_name = "pipeline.action.timed_out",
                correlation_id,
                sender_id = %planned.sender_id,
                timeout_ms = limit.as_millis() as u64,
                "action timed out"
            ),
        }

        ActionOutcome {
            sender_id: planned.sender_id,
            message_id: planned.message_id,
            action: planned.action,
            result,
        }
    }

    async fn perform(&self, planned: &PlannedAction) -> ActionResult {
        let text = match planned.action {
            Action::None => return ActionResult::Delivered(SendReceipt::default()),
            Action::SendAck(asset) => asset.ack_phrase().to_owned(),
            Action::SendUnsupportedAttachment => self.settings.unsupported_attachment_text.clone(),
            Action::SendPriceReply(asset) => {
                let symbol = asset.price_symbol();
                match self.prices.fetch_price(symbol).await {
                    Ok(price) => price_reply_text(symbol, &price),
                    Err(failure) => return ActionResult::LookupFailed(failure),
                }
            }
        };

        match self.send.send_text(&planned.sender_id, &text).await {
            Ok(receipt) => ActionResult::Delivered(receipt),
            Err(failure) => ActionResult::DeliveryFailed(failure),
        }
    }
}
