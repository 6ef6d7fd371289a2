use std::time::Duration;

use async_trait::async_trait;
use pricebot_core::Price;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::{checked_symbol, http_client, transport_error, LookupError, PriceLookup};

#[derive(Clone, Debug)]
pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl CoinGeckoClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, LookupError> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_owned(),
            timeout,
        })
    }
}

#[async_trait]
impl PriceLookup for CoinGeckoClient {
    fn provider(&self) -> &'static str {
        "coingecko"
    }

    async fn fetch_price(&self, symbol: &str) -> Result<Price, LookupError> {
        let symbol = checked_symbol(symbol)?;
        let url = format!("{}/api/v3/simple/price", self.base_url);
        debug!(provider = self.provider(), symbol, url = %url, "requesting simple price");

        let response = self
            .client
            .get(&url)
            .query(&[("ids", symbol), ("vs_currencies", "usd")])
            .send()
            .await
            .map_err(|error| transport_error(error, self.timeout))?;

        if !response.status().is_success() {
            return Err(LookupError::Status { status: response.status().as_u16() });
        }

        let body: Value =
            response.json().await.map_err(|error| LookupError::Decode(error.to_string()))?;
        let Some(quote) = body.get(symbol) else {
            return Err(LookupError::UnknownSymbol(symbol.to_owned()));
        };

        let raw = match quote.get("usd") {
            Some(Value::Number(number)) => number.to_string(),
            Some(Value::String(text)) => text.clone(),
            _ => return Err(LookupError::Decode(format!("no usd quote for `{symbol}`"))),
        };
        Price::parse(&raw).ok_or_else(|| LookupError::Decode(format!("invalid price `{raw}`")))
    }
}
