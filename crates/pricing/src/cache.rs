//! Process-wide pricing caches.
//!
//! Both caches are TTL-evicted and never invalidated on write; their TTL is
//! short relative to acceptable staleness. They are explicit objects handed
//! to the resolver, not hidden globals.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use tracing::{debug, warn};

use crate::document::PriceDocument;
use crate::expression::CompiledExpression;

const EXPRESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const CART_PRICE_TTL: Duration = Duration::from_secs(60 * 60);

/// Compiled expressions keyed by their source text.
pub struct ExpressionCache {
    inner: Cache<String, Arc<CompiledExpression>>,
}

impl ExpressionCache {
    pub fn new() -> Self {
        Self::with_ttl(EXPRESSION_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder().time_to_live(ttl).build(),
        }
    }

    /// Look up the compiled form of `source`, compiling on miss.
    ///
    /// A racing miss compiles twice and keeps one copy; compilation is pure,
    /// so that is merely redundant work.
    pub fn get_or_compile(&self, source: &str) -> merx_core::DomainResult<Arc<CompiledExpression>> {
        if let Some(hit) = self.inner.get(source) {
            return Ok(hit);
        }
        let compiled = Arc::new(CompiledExpression::compile(source)?);
        self.inner.insert(source.to_string(), compiled.clone());
        Ok(compiled)
    }

    /// Startup pass: pre-compile every distinct expression in the store so
    /// first requests never pay compilation latency. Malformed sources are
    /// logged and skipped; resolution will skip them too.
    pub fn warm_up(&self, prices: &[PriceDocument]) -> usize {
        let mut compiled = 0;
        for price in prices {
            for predicate in &price.predicates {
                let Some(source) = predicate.expression.as_deref() else {
                    continue;
                };
                if self.inner.contains_key(source) {
                    continue;
                }
                match self.get_or_compile(source) {
                    Ok(_) => compiled += 1,
                    Err(err) => {
                        warn!(price = price.id, %err, "skipping malformed price expression");
                    }
                }
            }
        }
        debug!(compiled, "expression cache warmed up");
        compiled
    }

    pub fn contains(&self, source: &str) -> bool {
        self.inner.contains_key(source)
    }
}

impl Default for ExpressionCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolved price-document projections keyed by sku, for the cart path.
pub struct CartPriceCache {
    inner: Cache<String, Arc<Vec<PriceDocument>>>,
}

impl CartPriceCache {
    pub fn new() -> Self {
        Self::with_ttl(CART_PRICE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder().time_to_live(ttl).build(),
        }
    }

    pub fn get(&self, sku: &str) -> Option<Arc<Vec<PriceDocument>>> {
        self.inner.get(sku)
    }

    pub fn insert(&self, sku: &str, prices: Vec<PriceDocument>) -> Arc<Vec<PriceDocument>> {
        let prices = Arc::new(prices);
        self.inner.insert(sku.to_string(), prices.clone());
        prices
    }
}

impl Default for CartPriceCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::PriceConstraints;
    use crate::document::Predicate;
    use merx_core::Money;

    #[test]
    fn compiled_expressions_are_shared_on_repeat_lookups() {
        let cache = ExpressionCache::new();
        let first = cache.get_or_compile("country in 'US'").unwrap();
        let second = cache.get_or_compile("country in 'US'").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn warm_up_compiles_each_distinct_expression_once() {
        let us = Predicate::with_constraints(
            1,
            Money::new(1000, "USD"),
            PriceConstraints::new().countries(&["US"]),
        );
        let prices = vec![
            PriceDocument::new("pr1", "S-1", 1).with_predicate(us.clone()),
            PriceDocument::new("pr2", "S-2", 1)
                .with_predicate(us)
                .with_predicate(Predicate::base(2, Money::new(900, "USD"))),
        ];

        let cache = ExpressionCache::new();
        assert_eq!(cache.warm_up(&prices), 1);
        assert!(cache.contains("country in 'US'"));
        // Second pass finds everything cached.
        assert_eq!(cache.warm_up(&prices), 0);
    }

    #[test]
    fn warm_up_skips_malformed_expressions() {
        let mut bad = Predicate::base(1, Money::new(100, "USD"));
        bad.expression = Some("country in".to_string());
        let prices = vec![PriceDocument::new("pr1", "S-1", 1).with_predicate(bad)];

        let cache = ExpressionCache::new();
        assert_eq!(cache.warm_up(&prices), 0);
        assert!(!cache.contains("country in"));
    }

    #[test]
    fn expired_cart_entries_are_gone() {
        let cache = CartPriceCache::with_ttl(Duration::from_millis(10));
        cache.insert("S-1", vec![PriceDocument::new("pr1", "S-1", 1)]);
        assert!(cache.get("S-1").is_some());

        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.get("S-1").is_none());
    }
}
