use std::sync::Arc;

use axum::Router;
use pricebot_core::config::{AppConfig, ConfigError, LoadOptions};
use pricebot_market::LookupError;
use pricebot_messenger::{
    ActionExecutor, BatchPlanner, DeliveryError, ExecutorSettings, GraphSendClient,
};
use thiserror::Error;
use tracing::info;

use crate::{health, webhook};

pub struct Application {
    pub config: AppConfig,
    pub webhook: webhook::WebhookState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("price lookup client setup failed: {0}")]
    PriceLookup(#[source] LookupError),
    #[error("send api client setup failed: {0}")]
    SendApi(#[source] DeliveryError),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    bootstrap_with_config(AppConfig::load(options)?)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let prices =
        pricebot_market::from_config(&config.market).map_err(BootstrapError::PriceLookup)?;
    info!(
        event_name = "system.bootstrap.price_lookup_ready",
        correlation_id = "bootstrap",
        provider = prices.provider(),
        base_url = %config.market.resolved_base_url(),
        "price lookup client ready"
    );

    let send =
        GraphSendClient::from_config(&config.messenger).map_err(BootstrapError::SendApi)?;
    info!(
        event_name = "system.bootstrap.send_api_ready",
        correlation_id = "bootstrap",
        base_url = %config.messenger.graph_api_base_url,
        "send api client ready"
    );

    let executor =
        ActionExecutor::new(Arc::new(send), prices, ExecutorSettings::from_config(&config));
    let webhook = webhook::WebhookState::new(&config, BatchPlanner::from_config(&config), executor);

    Ok(Application { config, webhook })
}

pub fn router(app: &Application) -> Router {
    webhook::router(app.webhook.clone()).merge(health::router())
}
