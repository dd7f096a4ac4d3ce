use serde::{Deserialize, Serialize};

use crate::error::{QuoteFlowError, Result};

/// The fixed set of service tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferTier {
    Standard,
    Premium,
    Confort,
}

impl OfferTier {
    pub const ALL: [OfferTier; 3] = [OfferTier::Standard, OfferTier::Premium, OfferTier::Confort];

    /// Normalize a server-supplied identifier, case-insensitively
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(OfferTier::Standard),
            "premium" => Ok(OfferTier::Premium),
            "confort" => Ok(OfferTier::Confort),
            _ => Err(QuoteFlowError::UnknownOfferTier(raw.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OfferTier::Standard => "standard",
            OfferTier::Premium => "premium",
            OfferTier::Confort => "confort",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            OfferTier::Standard => "Standard",
            OfferTier::Premium => "Premium",
            OfferTier::Confort => "Confort",
        }
    }
}

/// Per-tier CHF prices as returned by the pricing endpoint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OfferPrices {
    pub standard: f64,
    pub premium: f64,
    pub confort: f64,
}

impl OfferPrices {
    pub fn price_of(&self, tier: OfferTier) -> f64 {
        match tier {
            OfferTier::Standard => self.standard,
            OfferTier::Premium => self.premium,
            OfferTier::Confort => self.confort,
        }
    }
}

/// A priced service tier as shown on the offer step.
///
/// The price is authoritative only as of the `OfferPrices` it was built from.
/// Offers are always rebuilt wholesale from the latest fetch, never mutated,
/// so a stale price can never linger on screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub tier: OfferTier,
    pub name: String,
    pub price: f64,
}

impl Offer {
    pub fn from_prices(tier: OfferTier, prices: &OfferPrices) -> Self {
        Self {
            tier,
            name: tier.display_name().to_string(),
            price: prices.price_of(tier),
        }
    }
}
