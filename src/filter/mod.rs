//! Filter trees and their compilation into query predicates
//!
//! A filter document is parsed once into a [`FilterNode`] tree against the
//! entity's schema, validated for `_exists` placement, and compiled into
//! [`Expr`](crate::query::Expr) predicates on a [`Query`](crate::query::Query).
//! Relationship conditions become correlated existence subqueries.

mod ast;
mod compile;
mod parse;
mod validate;

pub use ast::{FieldCondition, FilterNode, OperatorSymbol, RelationshipCondition};
pub use compile::compile;
pub use parse::parse_filter;
pub use validate::validate;
