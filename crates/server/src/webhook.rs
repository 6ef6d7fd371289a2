use std::{
    collections::HashMap,
    future::Future,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use pricebot_core::{
    config::AppConfig,
    signature::{self, SHA1_HEADER, SHA256_HEADER},
    IngressError, IngressStatus, WebhookPayload,
};
use pricebot_messenger::{ActionExecutor, BatchPlan, BatchPlanner, EventContext};
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;
use tokio::{sync::Notify, time::timeout};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct WebhookState {
    app_secret: SecretString,
    validation_token: SecretString,
    planner: Arc<BatchPlanner>,
    executor: ActionExecutor,
    in_flight: Arc<InFlight>,
}

impl WebhookState {
    pub fn new(config: &AppConfig, planner: BatchPlanner, executor: ActionExecutor) -> Self {
        Self {
            app_secret: config.messenger.app_secret.clone(),
            validation_token: config.messenger.validation_token.clone(),
            planner: Arc::new(planner),
            executor,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    pub fn in_flight(&self) -> Arc<InFlight> {
        Arc::clone(&self.in_flight)
    }
}

/// Counts executor batches still running after their request was answered.
#[derive(Debug, Default)]
pub struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl InFlight {
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn spawn<F>(self: &Arc<Self>, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.count.fetch_add(1, Ordering::AcqRel);
        let guard = InFlightGuard(Arc::clone(self));
        tokio::spawn(async move {
            let _guard = guard;
            task.await;
        });
    }

    /// Waits until every spawned batch finished. Returns `false` if `limit` elapsed first.
    pub async fn drain(&self, limit: Duration) -> bool {
        timeout(limit, async {
            loop {
                let notified = self.idle.notified();
                if self.is_empty() {
                    return;
                }
                notified.await;
            }
        })
        .await
        .is_ok()
    }
}

pub fn router(state: WebhookState) -> Router {
    Router::new().route("/webhook", get(handshake).post(receive)).with_state(state)
}

pub async fn handshake(
    State(state): State<WebhookState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mode = params.get("hub.mode").map(String::as_str);
    let token = params.get("hub.verify_token").map(String::as_str).unwrap_or_default();
    let token_matches: bool =
        token.as_bytes().ct_eq(state.validation_token.expose_secret().as_bytes()).into();

    if mode == Some("subscribe") && token_matches {
        info!(
            event_name = "ingress.webhook.handshake_accepted",
            correlation_id = "handshake",
            "validating webhook"
        );
        let challenge = params.get("hub.challenge").cloned().unwrap_or_default();
        return (StatusCode::OK, challenge).into_response();
    }

    warn!(
        event_name = "ingress.webhook.handshake_rejected",
        correlation_id = "handshake",
        mode = mode.unwrap_or("missing"),
        "failed validation; make sure the validation tokens match"
    );
    StatusCode::FORBIDDEN.into_response()
}

pub async fn receive(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let context = EventContext::new(Uuid::new_v4().to_string());
    info!(
        event_name = "ingress.webhook.received",
        correlation_id = %context.correlation_id,
        bytes = body.len(),
        "webhook received"
    );

    let plan = match accept(&state, &headers, &body, &context) {
        Ok(plan) => plan,
        Err(error) => {
            warn!(
                event_name = "ingress.webhook.rejected",
                correlation_id = %context.correlation_id,
                error = %error,
                "webhook rejected"
            );
            return (status_code(error.status()), error.user_message()).into_response();
        }
    };

    if plan.actionable_count() > 0 {
        let executor = state.executor.clone();
        state.in_flight.spawn(async move {
            let correlation_id = plan.correlation_id.clone();
            let report = executor.execute(plan).await;
            debug!(
                event_name = "pipeline.batch.executed",
                correlation_id = %correlation_id,
                outcomes = report.outcomes.len(),
                delivered = report.delivered(),
                panicked = report.panicked,
                "webhook batch executed"
            );
        });
    }

    StatusCode::OK.into_response()
}

/// Verifies and plans a webhook without performing any outbound I/O.
pub fn accept(
    state: &WebhookState,
    headers: &HeaderMap,
    body: &[u8],
    context: &EventContext,
) -> Result<BatchPlan, IngressError> {
    signature::verify_header(
        body,
        signature_header(headers),
        state.app_secret.expose_secret().as_bytes(),
    )?;
    let payload: WebhookPayload = serde_json::from_slice(body)
        .map_err(|error| IngressError::MalformedPayload(error.to_string()))?;
    Ok(state.planner.plan(&payload, context))
}

fn signature_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SHA256_HEADER)
        .or_else(|| headers.get(SHA1_HEADER))
        .and_then(|value| value.to_str().ok())
}

fn status_code(status: IngressStatus) -> StatusCode {
    match status {
        IngressStatus::Unauthorized => StatusCode::UNAUTHORIZED,
        IngressStatus::BadRequest => StatusCode::BAD_REQUEST,
    }
}
