//! Predicate expression language: compilation and evaluation.
//!
//! Grammar, as produced by the constraint translator:
//!
//! ```text
//! expression := clause ("and" clause)*
//! clause     := field ("in" | ">=" | "<=" | "=") literal ("," literal)*
//! literal    := 'single-quoted string' | number
//! ```
//!
//! Only `in` accepts more than one operand. Evaluation is strict: a clause
//! over a fact the request did not supply is false, never an error.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use merx_core::{DomainError, DomainResult};

/// A string or numeric operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Num(f64),
}

/// Comparison operator of one clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    In,
    Ge,
    Le,
    Eq,
}

impl CmpOp {
    fn as_str(self) -> &'static str {
        match self {
            CmpOp::In => "in",
            CmpOp::Ge => ">=",
            CmpOp::Le => "<=",
            CmpOp::Eq => "=",
        }
    }
}

/// One `field op operands` conjunct.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub field: String,
    pub op: CmpOp,
    pub operands: Vec<Literal>,
}

/// A parsed expression, ready for repeated evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpression {
    source: String,
    clauses: Vec<Clause>,
}

/// One fact supplied by the request.
#[derive(Debug, Clone, PartialEq)]
pub enum FactValue {
    Str(String),
    Num(f64),
    Date(DateTime<Utc>),
}

/// The facts a resolution request carries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactSet {
    facts: HashMap<String, FactValue>,
}

impl FactSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_country(self, country: impl Into<String>) -> Self {
        self.with("country", FactValue::Str(country.into()))
    }

    pub fn with_customer_group(self, group: impl Into<String>) -> Self {
        self.with("customer_group", FactValue::Str(group.into()))
    }

    pub fn with_channel(self, channel: impl Into<String>) -> Self {
        self.with("channel", FactValue::Str(channel.into()))
    }

    pub fn with_locale(self, locale: impl Into<String>) -> Self {
        self.with("locale", FactValue::Str(locale.into()))
    }

    pub fn with_quantity(self, quantity: u32) -> Self {
        self.with("quantity", FactValue::Num(quantity.into()))
    }

    pub fn with_date(self, date: DateTime<Utc>) -> Self {
        self.with("date", FactValue::Date(date))
    }

    pub fn with(mut self, field: impl Into<String>, value: FactValue) -> Self {
        self.facts.insert(field.into(), value);
        self
    }

    fn get(&self, field: &str) -> Option<&FactValue> {
        self.facts.get(field)
    }
}

impl CompiledExpression {
    /// Parse `source` into an evaluable expression.
    pub fn compile(source: &str) -> DomainResult<Self> {
        let tokens = lex(source)?;
        let clauses = parse(&tokens, source)?;
        Ok(Self {
            source: source.to_string(),
            clauses,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// True only if every clause holds against the facts.
    pub fn evaluate(&self, facts: &FactSet) -> bool {
        self.clauses.iter().all(|clause| eval_clause(clause, facts))
    }
}

fn eval_clause(clause: &Clause, facts: &FactSet) -> bool {
    let Some(fact) = facts.get(&clause.field) else {
        return false;
    };
    match clause.op {
        CmpOp::In => clause.operands.iter().any(|op| literal_eq(fact, op)),
        CmpOp::Eq => clause.operands.first().is_some_and(|op| literal_eq(fact, op)),
        CmpOp::Ge => compare(fact, clause.operands.first()).is_some_and(|o| o >= 0.0),
        CmpOp::Le => compare(fact, clause.operands.first()).is_some_and(|o| o <= 0.0),
    }
}

fn literal_eq(fact: &FactValue, literal: &Literal) -> bool {
    match (fact, literal) {
        (FactValue::Str(f), Literal::Str(l)) => f == l,
        (FactValue::Num(f), Literal::Num(l)) => f == l,
        _ => false,
    }
}

/// Ordering of fact minus operand, when the two are comparable.
fn compare(fact: &FactValue, literal: Option<&Literal>) -> Option<f64> {
    match (fact, literal?) {
        (FactValue::Num(f), Literal::Num(l)) => Some(f - l),
        // Date bounds are stored as quoted RFC 3339 strings.
        (FactValue::Date(f), Literal::Str(l)) => {
            let bound = DateTime::parse_from_rfc3339(l).ok()?.with_timezone(&Utc);
            Some((*f - bound).num_seconds() as f64)
        }
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(f64),
    Comma,
    Op(CmpOp),
}

fn lex(source: &str) -> DomainResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '\'' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => s.push(c),
                        None => {
                            return Err(DomainError::validation(format!(
                                "expression: unterminated string in '{source}'"
                            )));
                        }
                    }
                }
                tokens.push(Token::Str(s));
            }
            '>' | '<' => {
                chars.next();
                if chars.next() != Some('=') {
                    return Err(DomainError::validation(format!(
                        "expression: expected '{c}=' in '{source}'"
                    )));
                }
                tokens.push(Token::Op(if c == '>' { CmpOp::Ge } else { CmpOp::Le }));
            }
            '=' => {
                chars.next();
                tokens.push(Token::Op(CmpOp::Eq));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut s = String::new();
                s.push(c);
                chars.next();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        s.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let num = s.parse().map_err(|_| {
                    DomainError::validation(format!("expression: bad number '{s}'"))
                })?;
                tokens.push(Token::Num(num));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut s = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        s.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(s));
            }
            other => {
                return Err(DomainError::validation(format!(
                    "expression: unexpected character '{other}' in '{source}'"
                )));
            }
        }
    }
    Ok(tokens)
}

fn parse(tokens: &[Token], source: &str) -> DomainResult<Vec<Clause>> {
    let mut clauses = Vec::new();
    let mut pos = 0;

    loop {
        let field = match tokens.get(pos) {
            Some(Token::Ident(name)) if name != "and" && name != "in" => name.clone(),
            _ => {
                return Err(DomainError::validation(format!(
                    "expression: expected field name in '{source}'"
                )));
            }
        };
        pos += 1;

        let op = match tokens.get(pos) {
            Some(Token::Op(op)) => *op,
            Some(Token::Ident(kw)) if kw == "in" => CmpOp::In,
            _ => {
                return Err(DomainError::validation(format!(
                    "expression: expected operator after '{field}' in '{source}'"
                )));
            }
        };
        pos += 1;

        let mut operands = Vec::new();
        loop {
            match tokens.get(pos) {
                Some(Token::Str(s)) => operands.push(Literal::Str(s.clone())),
                Some(Token::Num(n)) => operands.push(Literal::Num(*n)),
                _ => {
                    return Err(DomainError::validation(format!(
                        "expression: expected operand for '{field} {}' in '{source}'",
                        op.as_str()
                    )));
                }
            }
            pos += 1;
            if op == CmpOp::In && tokens.get(pos) == Some(&Token::Comma) {
                pos += 1;
            } else {
                break;
            }
        }

        clauses.push(Clause { field, op, operands });

        match tokens.get(pos) {
            None => return Ok(clauses),
            Some(Token::Ident(kw)) if kw == "and" => pos += 1,
            _ => {
                return Err(DomainError::validation(format!(
                    "expression: expected 'and' between clauses in '{source}'"
                )));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn compile(source: &str) -> CompiledExpression {
        CompiledExpression::compile(source).unwrap()
    }

    #[test]
    fn membership_over_a_string_list() {
        let expr = compile("country in 'US', 'DE'");
        assert!(expr.evaluate(&FactSet::new().with_country("US")));
        assert!(expr.evaluate(&FactSet::new().with_country("DE")));
        assert!(!expr.evaluate(&FactSet::new().with_country("FR")));
    }

    #[test]
    fn missing_fact_is_false_not_an_error() {
        let expr = compile("country in 'US'");
        assert!(!expr.evaluate(&FactSet::new()));
        assert!(!expr.evaluate(&FactSet::new().with_channel("web")));
    }

    #[test]
    fn conjunction_requires_every_clause() {
        let expr = compile("country in 'US' and quantity >= 3");
        assert!(expr.evaluate(&FactSet::new().with_country("US").with_quantity(3)));
        assert!(!expr.evaluate(&FactSet::new().with_country("US").with_quantity(2)));
        assert!(!expr.evaluate(&FactSet::new().with_quantity(5)));
    }

    #[test]
    fn date_bounds_compare_against_quoted_rfc3339() {
        let expr = compile("date >= '2026-01-01T00:00:00Z' and date <= '2026-06-30T00:00:00Z'");
        let inside = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let before = Utc.with_ymd_and_hms(2025, 12, 31, 0, 0, 0).unwrap();
        assert!(expr.evaluate(&FactSet::new().with_date(inside)));
        assert!(!expr.evaluate(&FactSet::new().with_date(before)));
    }

    #[test]
    fn equality_on_strings_and_numbers() {
        assert!(compile("channel = 'web'").evaluate(&FactSet::new().with_channel("web")));
        assert!(compile("quantity = 2").evaluate(&FactSet::new().with_quantity(2)));
        assert!(!compile("quantity = 2").evaluate(&FactSet::new().with_quantity(3)));
    }

    #[test]
    fn type_mismatch_never_matches() {
        let expr = compile("quantity >= 'two'");
        assert!(!expr.evaluate(&FactSet::new().with_quantity(5)));
    }

    #[test]
    fn malformed_sources_fail_validation() {
        for bad in [
            "country in",
            "in 'US'",
            "country 'US'",
            "country in 'US",
            "country > 'US'",
            "country in 'US' quantity >= 1",
            "country in 'US' and",
        ] {
            let err = CompiledExpression::compile(bad).unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)), "{bad}");
        }
    }

    #[test]
    fn source_text_is_retained_for_cache_keying() {
        let source = "country in 'US'";
        assert_eq!(compile(source).source(), source);
    }
}
