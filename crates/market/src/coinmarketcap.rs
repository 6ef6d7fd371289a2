use std::time::Duration;

use async_trait::async_trait;
use pricebot_core::Price;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::{checked_symbol, http_client, transport_error, LookupError, PriceLookup};

#[derive(Clone, Debug)]
pub struct CoinMarketCapClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct TickerRow {
    price_usd: Option<String>,
}

impl CoinMarketCapClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, LookupError> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_owned(),
            timeout,
        })
    }

    fn ticker_url(&self, symbol: &str) -> String {
        format!("{}/v1/ticker/{symbol}/", self.base_url)
    }
}

#[async_trait]
impl PriceLookup for CoinMarketCapClient {
    fn provider(&self) -> &'static str {
        "coinmarketcap"
    }

    async fn fetch_price(&self, symbol: &str) -> Result<Price, LookupError> {
        let symbol = checked_symbol(symbol)?;
        let url = self.ticker_url(symbol);
        debug!(provider = self.provider(), symbol, url = %url, "requesting ticker");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|error| transport_error(error, self.timeout))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => return Err(LookupError::UnknownSymbol(symbol.to_owned())),
            status => return Err(LookupError::Status { status: status.as_u16() }),
        }

        let rows: Vec<TickerRow> =
            response.json().await.map_err(|error| LookupError::Decode(error.to_string()))?;
        let Some(row) = rows.into_iter().next() else {
            return Err(LookupError::UnknownSymbol(symbol.to_owned()));
        };
        let raw = row
            .price_usd
            .ok_or_else(|| LookupError::Decode("ticker row has no price_usd".to_owned()))?;

        Price::parse(&raw).ok_or_else(|| LookupError::Decode(format!("invalid price `{raw}`")))
    }
}
