use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// USD price quoted by a market-data provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Price(pub Decimal);

impl Price {
    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// Parses a provider-supplied decimal string, accepting exponent notation.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Decimal::from_str(raw).or_else(|_| Decimal::from_scientific(raw)).ok().map(Self)
    }
}

/// Trailing zeros are dropped so `5.00` renders as `5`.
impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

pub fn price_reply_text(symbol: &str, price: &Price) -> String {
    format!("The price of {symbol} is {price} US Dollars")
}
