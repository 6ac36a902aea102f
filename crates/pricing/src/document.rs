//! Price documents: a sku's ordered tiers of predicated values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use merx_core::{Money, VersionedEntity};

use crate::constraints::PriceConstraints;

/// One price tier: a value guarded by an optional compiled-expression source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    /// Position within the owning document's tiers.
    pub order: i32,
    pub value: Money,
    #[serde(default)]
    pub constraints: PriceConstraints,
    /// Source text derived from `constraints` at write time. `None` marks an
    /// unconditional base predicate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

impl Predicate {
    /// An unconditional predicate.
    pub fn base(order: i32, value: Money) -> Self {
        Self {
            order,
            value,
            constraints: PriceConstraints::default(),
            expression: None,
        }
    }

    /// A guarded predicate; the expression is derived here, once.
    pub fn with_constraints(order: i32, value: Money, constraints: PriceConstraints) -> Self {
        let expression = constraints.to_expression();
        Self {
            order,
            value,
            constraints,
            expression,
        }
    }
}

/// All prices of one sku, ordered among the sku's other price documents by
/// `order`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceDocument {
    pub id: String,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub last_modified_at: DateTime<Utc>,
    pub sku: String,
    pub active: bool,
    /// Group order: ranks this document against the sku's other documents.
    pub order: i32,
    pub predicates: Vec<Predicate>,
}

impl PriceDocument {
    pub fn new(id: impl Into<String>, sku: impl Into<String>, order: i32) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            version: 0,
            created_at: now,
            last_modified_at: now,
            sku: sku.into(),
            active: true,
            order,
            predicates: Vec::new(),
        }
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

impl VersionedEntity for PriceDocument {
    const KIND: &'static str = "price";

    fn id(&self) -> &str {
        &self.id
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.created_at = at;
    }
    fn last_modified_at(&self) -> DateTime<Utc> {
        self.last_modified_at
    }
    fn set_last_modified_at(&mut self, at: DateTime<Utc>) {
        self.last_modified_at = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guarded_predicates_derive_their_expression_once() {
        let predicate = Predicate::with_constraints(
            1,
            Money::new(1000, "USD"),
            PriceConstraints::new().countries(&["US"]),
        );
        assert_eq!(predicate.expression.as_deref(), Some("country in 'US'"));

        let base = Predicate::base(2, Money::new(1200, "USD"));
        assert_eq!(base.expression, None);
    }
}
