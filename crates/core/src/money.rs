//! Monetary value in the smallest currency unit.

use serde::{Deserialize, Serialize};

/// Price value in the smallest currency unit (e.g. cents).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub cent_amount: i64,
    /// ISO currency code (e.g. "USD", "EUR").
    pub currency: String,
}

impl Money {
    pub fn new(cent_amount: i64, currency: impl Into<String>) -> Self {
        Self {
            cent_amount,
            currency: currency.into(),
        }
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} {}", self.cent_amount, self.currency)
    }
}
