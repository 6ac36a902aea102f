//! `merx-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! the versioned-entity contract, identifiers, money, the error taxonomy and
//! the JSON diff/patch algebra shared by the action runner and the catalog
//! sync engine.

pub mod diff;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;

pub use diff::{DiffEntry, DiffOp, Patch, diff, sync_patch};
pub use entity::{
    CatalogScoped, ExpectedVersion, Keyed, Named, Tagged, TreeNode, VersionedEntity,
};
pub use error::{DomainError, DomainResult};
pub use id::{ProjectId, RequestId};
pub use money::Money;
