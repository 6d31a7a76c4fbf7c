use crate::ids::PlatformId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Currency a reward or stake is denominated in.
///
/// `Token` is a fungible token held in custody and paid out by transfer.
/// `Platform` is a receipt token issued per platform and paid out by minting.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Currency {
    Token(String),
    Platform(PlatformId),
}

impl Currency {
    pub fn token(symbol: impl Into<String>) -> Self {
        Self::Token(symbol.into())
    }

    pub fn is_platform(&self) -> bool {
        matches!(self, Self::Platform(_))
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(symbol) => write!(f, "{}", symbol),
            Self::Platform(platform) => write!(f, "receipt@{}", platform),
        }
    }
}
