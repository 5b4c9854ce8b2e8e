//! Filter tree

use std::fmt;

use crate::scalar::Operator;
use crate::value::RawValue;

/// An operator key as written by the caller. Unknown symbols are kept so the
/// adapter can decide between ignoring them and failing in strict mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperatorSymbol {
    Known(Operator),
    Unknown(String),
}

impl OperatorSymbol {
    pub fn parse(symbol: &str) -> Self {
        match Operator::from_symbol(symbol) {
            Some(op) => Self::Known(op),
            None => Self::Unknown(symbol.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Known(op) => op.symbol(),
            Self::Unknown(symbol) => symbol,
        }
    }
}

impl From<Operator> for OperatorSymbol {
    fn from(op: Operator) -> Self {
        Self::Known(op)
    }
}

impl From<&str> for OperatorSymbol {
    fn from(symbol: &str) -> Self {
        Self::parse(symbol)
    }
}

impl fmt::Display for OperatorSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operators applied to one field (or, when the name is a relationship, to
/// the related entity's primary key).
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCondition {
    pub field: String,
    pub operators: Vec<(OperatorSymbol, RawValue)>,
}

impl FieldCondition {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operators: Vec::new(),
        }
    }

    pub fn op(mut self, operator: impl Into<OperatorSymbol>, value: RawValue) -> Self {
        self.operators.push((operator.into(), value));
        self
    }
}

/// A filter on a related entity, compiled to a correlated existence check.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipCondition {
    pub relationship: String,
    pub nested: Box<FilterNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    Field(FieldCondition),
    Relationship(RelationshipCondition),
    /// Only valid as the sole content of a relationship filter.
    Exists(bool),
    And(Vec<FilterNode>),
    Or(Vec<FilterNode>),
    Not(Box<FilterNode>),
}

impl FilterNode {
    /// `field` with a single operator.
    pub fn field(field: impl Into<String>, operator: impl Into<OperatorSymbol>, value: RawValue) -> Self {
        Self::Field(FieldCondition::new(field).op(operator, value))
    }

    pub fn relationship(relationship: impl Into<String>, nested: FilterNode) -> Self {
        Self::Relationship(RelationshipCondition {
            relationship: relationship.into(),
            nested: Box::new(nested),
        })
    }

    /// `{relationship: {_exists: exists}}`
    pub fn exists(relationship: impl Into<String>, exists: bool) -> Self {
        Self::relationship(relationship, Self::Exists(exists))
    }

    pub fn and(children: impl IntoIterator<Item = FilterNode>) -> Self {
        Self::And(children.into_iter().collect())
    }

    pub fn or(children: impl IntoIterator<Item = FilterNode>) -> Self {
        Self::Or(children.into_iter().collect())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(child: FilterNode) -> Self {
        Self::Not(Box::new(child))
    }

    /// A filter that constrains nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Field(condition) => condition.operators.is_empty(),
            Self::And(children) | Self::Or(children) => children.iter().all(Self::is_empty),
            Self::Not(child) => child.is_empty(),
            Self::Relationship(_) | Self::Exists(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operator_symbol_parse() {
        assert_eq!(OperatorSymbol::parse("_ilike"), OperatorSymbol::Known(Operator::Ilike));
        assert_eq!(
            OperatorSymbol::parse("_regex"),
            OperatorSymbol::Unknown("_regex".to_string())
        );
        assert_eq!(OperatorSymbol::parse("_regex").to_string(), "_regex");
    }

    #[test]
    fn test_is_empty() {
        assert!(FilterNode::and([]).is_empty());
        assert!(FilterNode::or([FilterNode::and([])]).is_empty());
        assert!(FilterNode::Field(FieldCondition::new("name")).is_empty());
        assert!(!FilterNode::field("name", Operator::Eq, json!("a")).is_empty());
        assert!(!FilterNode::exists("posts", true).is_empty());
    }
}
