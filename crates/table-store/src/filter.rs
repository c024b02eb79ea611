//! Equality filters pushed down to the store.

use crate::entity::{EdmValue, Entity, PARTITION_KEY, ROW_KEY};
use std::fmt;

/// `property eq value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub property: String,
    pub value: EdmValue,
}

impl Predicate {
    pub fn eq(property: impl Into<String>, value: impl Into<EdmValue>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
        }
    }

    fn matches(&self, entity: &Entity) -> bool {
        match self.property.as_str() {
            PARTITION_KEY => self.value.as_str() == Some(entity.partition_key.as_str()),
            ROW_KEY => self.value.as_str() == Some(entity.row_key.as_str()),
            name => entity
                .get(name)
                .is_some_and(|actual| values_equal(actual, &self.value)),
        }
    }

    fn to_odata(&self) -> String {
        format!("{} eq {}", self.property, odata_literal(&self.value))
    }
}

/// Int32 and Int64 compare by value, the way the service compares them.
fn values_equal(actual: &EdmValue, expected: &EdmValue) -> bool {
    match (actual.as_i64(), expected.as_i64()) {
        (Some(a), Some(b)) => a == b,
        _ => actual == expected,
    }
}

fn odata_literal(value: &EdmValue) -> String {
    match value {
        EdmValue::String(s) => format!("'{}'", s.replace('\'', "''")),
        EdmValue::Int32(v) => v.to_string(),
        EdmValue::Int64(v) => format!("{v}L"),
        EdmValue::Double(v) => {
            if v.fract() == 0.0 && v.is_finite() {
                format!("{v:.1}")
            } else {
                v.to_string()
            }
        }
        EdmValue::Boolean(b) => b.to_string(),
    }
}

/// Conjunction of equality predicates. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    predicates: Vec<Predicate>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `property eq value` to the conjunction.
    pub fn eq(mut self, property: impl Into<String>, value: impl Into<EdmValue>) -> Self {
        self.predicates.push(Predicate::eq(property, value));
        self
    }

    /// Combine two filters with `and`.
    pub fn and(mut self, other: Filter) -> Self {
        self.predicates.extend(other.predicates);
        self
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Evaluate the filter against an entity.
    pub fn matches(&self, entity: &Entity) -> bool {
        self.predicates.iter().all(|p| p.matches(entity))
    }

    /// Render as an OData `$filter` expression.
    pub fn to_odata(&self) -> String {
        match self.predicates.as_slice() {
            [] => String::new(),
            [single] => single.to_odata(),
            many => many
                .iter()
                .map(|p| format!("({})", p.to_odata()))
                .collect::<Vec<_>>()
                .join(" and "),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "<all>")
        } else {
            write!(f, "{}", self.to_odata())
        }
    }
}
