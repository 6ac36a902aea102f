//! Price resolution: first matching predicate in `(document, tier)` order.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use merx_core::{DomainError, DomainResult, Money};
use merx_store::{Collection, Filter};

use crate::cache::{CartPriceCache, ExpressionCache};
use crate::document::PriceDocument;
use crate::expression::FactSet;

/// Selects the single applicable price value for a sku and a fact set.
pub struct PriceResolver {
    prices: Arc<dyn Collection<PriceDocument>>,
    expressions: Arc<ExpressionCache>,
    cart_cache: CartPriceCache,
}

impl PriceResolver {
    pub fn new(
        prices: Arc<dyn Collection<PriceDocument>>,
        expressions: Arc<ExpressionCache>,
        cart_cache: CartPriceCache,
    ) -> Self {
        Self {
            prices,
            expressions,
            cart_cache,
        }
    }

    /// Resolve against the store's current state.
    pub fn resolve(&self, sku: &str, facts: &FactSet) -> DomainResult<Money> {
        let prices = self.load_active(sku)?;
        self.select(&prices, facts)
    }

    /// Cart-path resolution: the sku's price projection is served from the
    /// TTL cache when present, so a result may lag the store by up to the
    /// cache TTL.
    pub fn resolve_for_cart(&self, sku: &str, facts: &FactSet) -> DomainResult<Money> {
        let prices = match self.cart_cache.get(sku) {
            Some(cached) => cached,
            None => {
                let loaded = self.load_active(sku)?;
                self.cart_cache.insert(sku, loaded)
            }
        };
        self.select(&prices, facts)
    }

    fn load_active(&self, sku: &str) -> DomainResult<Vec<PriceDocument>> {
        let mut prices = self.prices.find(&Filter::eq("sku", json!(sku)))?;
        prices.retain(|price| price.active);
        Ok(prices)
    }

    /// Scan predicates sorted by `(document order, predicate order)` and
    /// return the first unconditional or true-evaluating one.
    fn select(&self, prices: &[PriceDocument], facts: &FactSet) -> DomainResult<Money> {
        let mut tiers: Vec<_> = prices
            .iter()
            .flat_map(|doc| doc.predicates.iter().map(move |p| (doc.order, p.order, p)))
            .collect();
        tiers.sort_by_key(|(group, order, _)| (*group, *order));

        for (group, order, predicate) in tiers {
            let Some(source) = predicate.expression.as_deref() else {
                debug!(group, order, "unconditional predicate matched");
                return Ok(predicate.value.clone());
            };
            let compiled = match self.expressions.get_or_compile(source) {
                Ok(compiled) => compiled,
                Err(err) => {
                    // Stored source is corrupt; skip the tier, keep resolving.
                    warn!(%err, "skipping predicate with malformed expression");
                    continue;
                }
            };
            if compiled.evaluate(facts) {
                debug!(group, order, "predicate matched");
                return Ok(predicate.value.clone());
            }
        }
        Err(DomainError::NotFound)
    }
}
