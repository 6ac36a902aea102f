//! Cart-price indexer: keeps the search index's price projection per sku in
//! step with price-document changes.
//!
//! Unlike other listeners, this path retries locally a bounded number of
//! times before giving up, because the search index is a remote collaborator
//! with transient failures and price changes have no periodic reconciliation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde_json::json;
use tracing::warn;

use merx_events::{ChangeEvent, ListenerHandle, PubSub, spawn_listener};
use merx_store::{Collection, Filter, SearchIndex};

use crate::document::PriceDocument;

const INDEX_ATTEMPTS: u32 = 3;
const INDEX_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Rebuild and upsert the price projection of one sku.
///
/// The projection is recomputed from the store, not from the triggering
/// event, so replays and out-of-order deliveries converge on current state.
pub fn index_sku(
    prices: &dyn Collection<PriceDocument>,
    index: &dyn SearchIndex,
    sku: &str,
) -> anyhow::Result<()> {
    let mut docs = prices
        .find(&Filter::eq("sku", json!(sku)))
        .with_context(|| format!("loading prices for sku {sku}"))?;
    docs.retain(|doc| doc.active);
    docs.sort_by_key(|doc| doc.order);

    let projection = json!({
        "id": sku,
        "sku": sku,
        "prices": docs,
    });

    let mut attempt = 0;
    loop {
        attempt += 1;
        match index.upsert(projection.clone()) {
            Ok(()) => return Ok(()),
            Err(err) if attempt < INDEX_ATTEMPTS => {
                warn!(sku, attempt, %err, "price index upsert failed, retrying");
                std::thread::sleep(INDEX_RETRY_DELAY);
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("indexing prices for sku {sku} after {INDEX_ATTEMPTS} attempts")
                });
            }
        }
    }
}

/// Listen on `price.changed` and reindex the affected sku.
pub fn spawn_cart_price_indexer<B>(
    bus: &B,
    prices: Arc<dyn Collection<PriceDocument>>,
    index: Arc<dyn SearchIndex>,
) -> ListenerHandle
where
    B: PubSub + ?Sized,
{
    let topic = ChangeEvent::topic(<PriceDocument as merx_core::VersionedEntity>::KIND);
    spawn_listener("cart-price-indexer", bus, &topic, move |message| {
        let event: ChangeEvent =
            serde_json::from_value(message.payload).context("malformed price change event")?;
        let sku = event
            .snapshot
            .get("sku")
            .and_then(|v| v.as_str())
            .context("price change event without sku")?;
        index_sku(prices.as_ref(), index.as_ref(), sku)
    })
}
