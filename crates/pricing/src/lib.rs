//! `merx-pricing`: price documents, predicate expressions, and resolution.
//!
//! A price carries an ordered list of predicates. Each predicate's structured
//! constraints are translated at write time into a small boolean expression,
//! compiled once per distinct source text, and evaluated at resolution time
//! against the request's facts (country, customer group, channel, quantity,
//! date). The first matching predicate's value wins.

pub mod cache;
pub mod constraints;
pub mod document;
pub mod expression;
pub mod indexer;
pub mod resolver;

pub use cache::{CartPriceCache, ExpressionCache};
pub use constraints::PriceConstraints;
pub use document::{Predicate, PriceDocument};
pub use expression::{CompiledExpression, FactSet, FactValue};
pub use indexer::spawn_cart_price_indexer;
pub use resolver::PriceResolver;
