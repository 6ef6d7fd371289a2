use std::fmt;

use serde::{Deserialize, Serialize};

/// Assets the bot knows how to talk about. Each variant owns its entity
/// token, acknowledgment phrase, and market-data symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Asset {
    Bitcoin,
    Iota,
    Ethereum,
    Eos,
}

impl Asset {
    pub const ALL: [Asset; 4] = [Asset::Bitcoin, Asset::Iota, Asset::Ethereum, Asset::Eos];

    /// Matches the normalized token produced by the NLP annotator. Matching is
    /// exact; unknown tokens are not an error.
    pub fn from_entity_value(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|asset| asset.entity_value() == value)
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let symbol = symbol.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|asset| asset.price_symbol() == symbol)
    }

    pub fn entity_value(self) -> &'static str {
        match self {
            Self::Bitcoin => "Bitcoin",
            Self::Iota => "IOTA",
            Self::Ethereum => "Ethereum",
            Self::Eos => "EOS",
        }
    }

    pub fn ack_phrase(self) -> &'static str {
        match self {
            Self::Bitcoin => "You say Bitcoin?",
            Self::Iota => "You say Iota?",
            Self::Ethereum => "You say Ethereum?",
            Self::Eos => "You say Eos?",
        }
    }

    pub fn price_symbol(self) -> &'static str {
        match self {
            Self::Bitcoin => "bitcoin",
            Self::Iota => "iota",
            Self::Ethereum => "ethereum",
            Self::Eos => "eos",
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entity_value())
    }
}
