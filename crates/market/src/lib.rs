//! Market data - USD price lookups for the assets the bot knows
//!
//! - **CoinMarketCap** (`coinmarketcap`) - legacy `/v1/ticker/{symbol}/` endpoint
//! - **CoinGecko** (`coingecko`) - `/api/v3/simple/price`
//!
//! Both sit behind [`PriceLookup`] so the messenger pipeline never knows which
//! provider answered. Every request is bounded by the configured timeout.

pub mod coingecko;
pub mod coinmarketcap;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use pricebot_core::{
    config::{MarketConfig, MarketProvider},
    Price,
};
use thiserror::Error;

pub use coingecko::CoinGeckoClient;
pub use coinmarketcap::CoinMarketCapClient;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("price request failed: {0}")]
    Transport(String),
    #[error("price provider returned status {status}")]
    Status { status: u16 },
    #[error("price response could not be decoded: {0}")]
    Decode(String),
    #[error("price provider has no quote for `{0}`")]
    UnknownSymbol(String),
    #[error("price lookup timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait PriceLookup: Send + Sync {
    fn provider(&self) -> &'static str;
    async fn fetch_price(&self, symbol: &str) -> Result<Price, LookupError>;
}

pub fn from_config(config: &MarketConfig) -> Result<Arc<dyn PriceLookup>, LookupError> {
    let timeout = Duration::from_secs(config.timeout_secs);
    let base_url = config.resolved_base_url();
    Ok(match config.provider {
        MarketProvider::CoinMarketCap => Arc::new(CoinMarketCapClient::new(base_url, timeout)?),
        MarketProvider::CoinGecko => Arc::new(CoinGeckoClient::new(base_url, timeout)?),
    })
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, LookupError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|error| LookupError::Transport(error.to_string()))
}

pub(crate) fn transport_error(error: reqwest::Error, timeout: Duration) -> LookupError {
    if error.is_timeout() {
        LookupError::Timeout(timeout)
    } else {
        LookupError::Transport(error.to_string())
    }
}

/// Symbols are interpolated into request URLs, so only plain identifiers pass.
pub(crate) fn checked_symbol(symbol: &str) -> Result<&str, LookupError> {
    let valid = !symbol.is_empty()
        && symbol.bytes().all(|byte| byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'-');
    if valid {
        Ok(symbol)
    } else {
        Err(LookupError::UnknownSymbol(symbol.to_owned()))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::Router;

    pub async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
        let address = listener.local_addr().expect("stub address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{address}")
    }
}
