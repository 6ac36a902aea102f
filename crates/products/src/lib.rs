//! `merx-products`: the product document and its mutation surface.

pub mod product;

pub use product::{Product, handler_table};
