//! Structured price constraints and their write-time translation into
//! expression source text.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Applicability constraints of one price tier.
///
/// Empty lists and `None` fields constrain nothing. A predicate whose
/// constraints are all empty carries no expression and matches
/// unconditionally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceConstraints {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub countries: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub customer_groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_quantity: Option<u32>,
}

impl PriceConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn countries(mut self, countries: &[&str]) -> Self {
        self.countries = countries.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn customer_groups(mut self, groups: &[&str]) -> Self {
        self.customer_groups = groups.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn channels(mut self, channels: &[&str]) -> Self {
        self.channels = channels.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn valid_from(mut self, from: DateTime<Utc>) -> Self {
        self.valid_from = Some(from);
        self
    }

    pub fn valid_until(mut self, until: DateTime<Utc>) -> Self {
        self.valid_until = Some(until);
        self
    }

    pub fn minimum_quantity(mut self, quantity: u32) -> Self {
        self.minimum_quantity = Some(quantity);
        self
    }

    /// Translate the constraints into expression source text.
    ///
    /// Fixed operator table: list fields use `in`, the validity window uses
    /// `>=`/`<=` on the `date` fact, minimum quantity uses `>=`. Strings are
    /// single-quoted, numbers are not. Returns `None` when nothing is
    /// constrained.
    pub fn to_expression(&self) -> Option<String> {
        let mut clauses = Vec::new();

        if !self.countries.is_empty() {
            clauses.push(format!("country in {}", quoted_list(&self.countries)));
        }
        if !self.customer_groups.is_empty() {
            clauses.push(format!(
                "customer_group in {}",
                quoted_list(&self.customer_groups)
            ));
        }
        if !self.channels.is_empty() {
            clauses.push(format!("channel in {}", quoted_list(&self.channels)));
        }
        if let Some(from) = self.valid_from {
            clauses.push(format!("date >= '{}'", rfc3339(from)));
        }
        if let Some(until) = self.valid_until {
            clauses.push(format!("date <= '{}'", rfc3339(until)));
        }
        if let Some(quantity) = self.minimum_quantity {
            clauses.push(format!("quantity >= {quantity}"));
        }

        if clauses.is_empty() {
            None
        } else {
            Some(clauses.join(" and "))
        }
    }
}

fn quoted_list(values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("'{v}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{CompiledExpression, FactSet};
    use chrono::TimeZone;

    #[test]
    fn empty_constraints_have_no_expression() {
        assert_eq!(PriceConstraints::new().to_expression(), None);
    }

    #[test]
    fn each_constraint_uses_its_fixed_operator() {
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let constraints = PriceConstraints::new()
            .countries(&["US", "DE"])
            .customer_groups(&["b2b"])
            .channels(&["web"])
            .valid_from(from)
            .minimum_quantity(3);

        assert_eq!(
            constraints.to_expression().unwrap(),
            "country in 'US', 'DE' and customer_group in 'b2b' and channel in 'web' \
             and date >= '2026-01-01T00:00:00Z' and quantity >= 3"
        );
    }

    #[test]
    fn translated_expressions_compile_and_evaluate() {
        let constraints = PriceConstraints::new()
            .countries(&["US"])
            .minimum_quantity(2);
        let expr = CompiledExpression::compile(&constraints.to_expression().unwrap()).unwrap();

        assert!(expr.evaluate(&FactSet::new().with_country("US").with_quantity(2)));
        assert!(!expr.evaluate(&FactSet::new().with_country("US").with_quantity(1)));
    }
}
