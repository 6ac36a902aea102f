//! `merx-store`: document-store collaborator abstraction.
//!
//! The real driver is out of scope; this crate defines the collection surface
//! the core relies on (per-document atomic conditional update, bulk array
//! updates, no cross-document transactions) plus in-memory implementations
//! for tests and development.

pub mod catalogs;
pub mod collection;
pub mod memory;
pub mod search;

pub use catalogs::{Catalogs, InMemoryCatalogs};
pub use collection::{ArrayUpdate, Collection, Filter, StoreError, fields};
pub use memory::InMemoryCollection;
pub use search::{InMemorySearchIndex, SearchIndex};
