//! Asynchronous half of the tree manager: the descendant-repair listener.
//!
//! The store cannot combine an array removal and an array insertion in one
//! statement, so repair issues two bulk updates back to back. Between them a
//! descendant's ancestor list reflects neither the old nor the fully-new
//! chain: an eventual-consistency window bounded by message latency.

use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use merx_core::TreeNode;
use merx_events::{ListenerHandle, PubSub, spawn_listener};
use merx_store::{ArrayUpdate, Collection, Filter};

use crate::reparent::REPAIR_DESCENDANTS;

/// Payload of the repair side effect emitted by the re-parent handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairDescendants {
    pub id: String,
    pub old_ancestors: Vec<String>,
}

/// Rewrite the ancestor lists of every descendant of `repair.id`.
///
/// Statement 1 pulls the moved node's old chain out of each descendant;
/// statement 2 pushes its new chain at the front. The moved node itself is
/// untouched (its own ancestors never contain its id).
pub fn repair_descendants<E: TreeNode>(
    nodes: &dyn Collection<E>,
    repair: &RepairDescendants,
) -> anyhow::Result<()> {
    let node = nodes
        .find_one(&repair.id)
        .with_context(|| format!("loading {} for repair", repair.id))?
        .with_context(|| format!("node {} vanished before repair", repair.id))?;

    let descendants = Filter::contains("ancestors", json!(repair.id));

    if !repair.old_ancestors.is_empty() {
        let values = repair.old_ancestors.iter().map(|id| json!(id)).collect();
        let pulled = nodes
            .update_many(&descendants, &ArrayUpdate::pull_all("ancestors", values))
            .context("pulling old ancestor chain")?;
        debug!(node = %repair.id, pulled, "removed old ancestor chain");
    }

    let chain: Vec<_> = node.ancestors().iter().map(|id| json!(id)).collect();
    if !chain.is_empty() {
        let pushed = nodes
            .update_many(&descendants, &ArrayUpdate::push_front("ancestors", chain))
            .context("pushing new ancestor chain")?;
        debug!(node = %repair.id, pushed, "prepended new ancestor chain");
    }

    info!(node = %repair.id, "descendant ancestor lists repaired");
    Ok(())
}

/// Bind the repair routine to the side-effect channel.
///
/// Failures are logged and the message dropped; redelivery is the recovery
/// path, since subscriptions here are ephemeral.
pub fn spawn_repair_listener<E, B>(bus: &B, nodes: Arc<dyn Collection<E>>) -> ListenerHandle
where
    E: TreeNode,
    B: PubSub + ?Sized,
{
    spawn_listener("category-repair", bus, REPAIR_DESCENDANTS, move |message| {
        let repair: RepairDescendants =
            serde_json::from_value(message.payload).context("malformed repair payload")?;
        repair_descendants(nodes.as_ref(), &repair)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::{Category, handler_table};
    use merx_actions::{Action, EntityService, RequestContext};
    use merx_core::ProjectId;
    use merx_events::InMemoryPubSub;
    use merx_store::InMemoryCollection;
    use std::time::Duration;

    /// root -> shoes -> sneakers, plus an empty "sale" root.
    fn seeded() -> Arc<InMemoryCollection<Category>> {
        let repo = Arc::new(InMemoryCollection::new());
        repo.insert_one(Category::new("root", "Root")).unwrap();
        repo.insert_one(Category::new("sale", "Sale")).unwrap();
        repo.insert_one(Category::new("shoes", "Shoes").under("root", &[]))
            .unwrap();
        repo.insert_one(
            Category::new("sneakers", "Sneakers").under("shoes", &["root".to_string()]),
        )
        .unwrap();
        repo
    }

    fn ancestors(repo: &InMemoryCollection<Category>, id: &str) -> Vec<String> {
        repo.find_one(id).unwrap().unwrap().ancestors
    }

    #[test]
    fn repair_rewrites_descendant_chains() {
        let repo = seeded();
        // Simulate the synchronous half: shoes moved under sale.
        let patch = merx_core::Patch::new()
            .set("parent", json!("sale"))
            .set("ancestors", json!(["sale"]));
        repo.update_one("shoes", 0, &patch).unwrap();

        repair_descendants(
            repo.as_ref(),
            &RepairDescendants {
                id: "shoes".into(),
                old_ancestors: vec!["root".into()],
            },
        )
        .unwrap();

        assert_eq!(ancestors(&repo, "sneakers"), vec!["sale", "shoes"]);
    }

    #[test]
    fn intermediate_window_shows_a_partially_repaired_chain() {
        let repo = seeded();
        let patch = merx_core::Patch::new()
            .set("parent", json!("sale"))
            .set("ancestors", json!(["sale"]));
        repo.update_one("shoes", 0, &patch).unwrap();

        // Statement 1 only: the old chain is gone, the new one not yet
        // prepended. This is the accepted consistency window.
        let descendants = Filter::contains("ancestors", json!("shoes"));
        repo.update_many(
            &descendants,
            &ArrayUpdate::pull_all("ancestors", vec![json!("root")]),
        )
        .unwrap();
        assert_eq!(ancestors(&repo, "sneakers"), vec!["shoes"]);

        // Statement 2 closes the window.
        repo.update_many(
            &descendants,
            &ArrayUpdate::push_front("ancestors", vec![json!("sale")]),
        )
        .unwrap();
        assert_eq!(ancestors(&repo, "sneakers"), vec!["sale", "shoes"]);
    }

    #[test]
    fn missing_node_fails_the_repair() {
        let repo = seeded();
        let err = repair_descendants(
            repo.as_ref(),
            &RepairDescendants {
                id: "ghost".into(),
                old_ancestors: vec![],
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn reparent_flows_end_to_end_through_the_listener() {
        let repo = seeded();
        let bus = Arc::new(InMemoryPubSub::new());
        let handle = spawn_repair_listener(bus.as_ref(), repo.clone() as Arc<dyn Collection<Category>>);

        let service = EntityService::new(
            repo.clone() as Arc<dyn Collection<Category>>,
            bus.clone() as Arc<dyn merx_events::PubSub>,
            handler_table(),
        );
        let ctx = RequestContext::new(ProjectId::new("demo"));
        let updated = service
            .apply_actions(
                "shoes",
                0,
                &[Action::ChangeParent {
                    parent: Some("sale".into()),
                }],
                &ctx,
            )
            .unwrap();
        assert_eq!(updated.ancestors, vec!["sale"]);

        // Eventually consistent: wait for the listener to repair descendants.
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while ancestors(&repo, "sneakers") != vec!["sale".to_string(), "shoes".to_string()]
            && std::time::Instant::now() < deadline
        {
            std::thread::sleep(Duration::from_millis(5));
        }
        handle.shutdown();

        assert_eq!(ancestors(&repo, "sneakers"), vec!["sale", "shoes"]);
    }
}
