use tracing::{debug, warn};

use crate::api::QuoteApi;
use crate::error::Result;
use crate::offer::OfferPrices;

/// Caches the per-tier price map for the current questionnaire session.
///
/// Prices are fetched once per session and reused until invalidated. Every
/// fetch carries a generation token; a response whose generation is no longer
/// current by the time it resolves is discarded instead of overwriting newer
/// state.
#[derive(Debug, Default)]
pub struct PricingGate {
    cache: Option<OfferPrices>,
    generation: u64,
}

impl PricingGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached(&self) -> Option<&OfferPrices> {
        self.cache.as_ref()
    }

    /// Drops the cache and stales any in-flight fetch
    pub fn invalidate(&mut self) {
        self.cache = None;
        self.generation += 1;
    }

    /// Seed the cache from a restoration result
    pub fn prime(&mut self, prices: OfferPrices) {
        self.cache = Some(prices);
    }

    /// Start a fetch, returning the generation token to hand back to
    /// [`PricingGate::complete`]
    pub fn begin(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Accept a resolved fetch; returns false when the result was stale and
    /// discarded
    pub fn complete(&mut self, generation: u64, prices: OfferPrices) -> bool {
        if generation != self.generation {
            debug!(
                stale = generation,
                current = self.generation,
                "discarding stale pricing response"
            );
            return false;
        }
        self.cache = Some(prices);
        true
    }

    /// Return cached prices, fetching them first if the cache is empty
    pub async fn ensure(&mut self, api: &dyn QuoteApi, questionnaire_id: &str) -> Result<OfferPrices> {
        if let Some(prices) = self.cache {
            return Ok(prices);
        }
        let generation = self.begin();
        let prices = api.calculate_prices(questionnaire_id).await?;
        if !self.complete(generation, prices) {
            warn!(questionnaire_id, "pricing fetch resolved after invalidation");
        }
        Ok(prices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::CountingApi;

    #[tokio::test]
    async fn ensure_fetches_once_and_caches() {
        let api = CountingApi::new();
        let mut gate = PricingGate::new();

        let first = gate.ensure(&api, "q-1").await.unwrap();
        let second = gate.ensure(&api, "q-1").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(api.calls.calculate_prices(), 1);
    }

    #[tokio::test]
    async fn invalidation_forces_a_refetch() {
        let api = CountingApi::new();
        let mut gate = PricingGate::new();

        gate.ensure(&api, "q-1").await.unwrap();
        gate.invalidate();
        assert!(gate.cached().is_none());

        gate.ensure(&api, "q-1").await.unwrap();
        assert_eq!(api.calls.calculate_prices(), 2);
    }

    #[test]
    fn stale_generation_is_discarded() {
        let mut gate = PricingGate::new();
        let prices = OfferPrices {
            standard: 79.0,
            premium: 149.0,
            confort: 249.0,
        };

        let stale = gate.begin();
        // a newer fetch (or an invalidation) supersedes the outstanding one
        let current = gate.begin();

        assert!(!gate.complete(stale, prices));
        assert!(gate.cached().is_none());

        assert!(gate.complete(current, prices));
        assert_eq!(gate.cached(), Some(&prices));
    }

    #[test]
    fn response_arriving_after_invalidation_is_discarded() {
        let mut gate = PricingGate::new();
        let prices = OfferPrices {
            standard: 79.0,
            premium: 149.0,
            confort: 249.0,
        };

        let generation = gate.begin();
        gate.invalidate();
        assert!(!gate.complete(generation, prices));
        assert!(gate.cached().is_none());
    }
}
