//! Scalar operator tables
//!
//! Every scalar kind owns the semantics of its operators. Each kind module
//! registers predicate builders keyed by `(family, adapter, operator)` into
//! one [`OperatorTable`], built once on first use and read-only afterwards.
//! A missing entry means "this operator is not available for this kind on
//! this backend".

mod array;
mod boolean;
mod common;
mod enumeration;
mod geo;
mod json;
mod numeric;
mod string;
mod temporal;

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;

use crate::adapter::{Adapter, AdapterId};
use crate::error::ValidationError;
use crate::query::{ColumnRef, Expr};
use crate::schema::{Field, ScalarFamily, ScalarKind};
use crate::value::{RawValue, Value};

/// Filter operators understood by at least one scalar kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    IsNull,
    Between,
    Like,
    Ilike,
    Contains,
    StartsWith,
    EndsWith,
    Similar,
    InPast,
    InFuture,
    WithinDistance,
    Includes,
    Excludes,
    IncludesAll,
    IncludesAny,
    IsEmpty,
    HasKey,
}

impl Operator {
    pub const ALL: [Operator; 25] = [
        Self::Eq,
        Self::Neq,
        Self::Gt,
        Self::Gte,
        Self::Lt,
        Self::Lte,
        Self::In,
        Self::Nin,
        Self::IsNull,
        Self::Between,
        Self::Like,
        Self::Ilike,
        Self::Contains,
        Self::StartsWith,
        Self::EndsWith,
        Self::Similar,
        Self::InPast,
        Self::InFuture,
        Self::WithinDistance,
        Self::Includes,
        Self::Excludes,
        Self::IncludesAll,
        Self::IncludesAny,
        Self::IsEmpty,
        Self::HasKey,
    ];

    /// Wire symbol, e.g. `_gte`.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "_eq",
            Self::Neq => "_neq",
            Self::Gt => "_gt",
            Self::Gte => "_gte",
            Self::Lt => "_lt",
            Self::Lte => "_lte",
            Self::In => "_in",
            Self::Nin => "_nin",
            Self::IsNull => "_is_null",
            Self::Between => "_between",
            Self::Like => "_like",
            Self::Ilike => "_ilike",
            Self::Contains => "_contains",
            Self::StartsWith => "_starts_with",
            Self::EndsWith => "_ends_with",
            Self::Similar => "_similar",
            Self::InPast => "_in_past",
            Self::InFuture => "_in_future",
            Self::WithinDistance => "_within_distance",
            Self::Includes => "_includes",
            Self::Excludes => "_excludes",
            Self::IncludesAll => "_includes_all",
            Self::IncludesAny => "_includes_any",
            Self::IsEmpty => "_is_empty",
            Self::HasKey => "_has_key",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.symbol() == symbol)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Everything a predicate builder needs to know about its target.
#[derive(Debug, Clone)]
pub struct Operand<'a> {
    pub column: ColumnRef,
    pub field: &'a Field,
    pub adapter: &'a Adapter,
    pub operator: Operator,
}

impl Operand<'_> {
    pub(crate) fn invalid(&self, reason: impl Into<String>) -> ValidationError {
        ValidationError::invalid_value(&self.field.name, self.operator.symbol(), reason)
    }

    /// Coerce the argument to the field's own kind.
    pub(crate) fn coerce(&self, raw: &RawValue) -> Result<Value, ValidationError> {
        Value::coerce(raw, &self.field.kind).map_err(|reason| self.invalid(reason))
    }

    /// Coerce a single element (the field's element kind for arrays).
    pub(crate) fn coerce_element(&self, raw: &RawValue) -> Result<Value, ValidationError> {
        Value::coerce(raw, self.element_kind()).map_err(|reason| self.invalid(reason))
    }

    pub(crate) fn coerce_list(&self, raw: &RawValue) -> Result<Vec<Value>, ValidationError> {
        Value::coerce_list(raw, self.element_kind()).map_err(|reason| self.invalid(reason))
    }

    pub(crate) fn bool_arg(&self, raw: &RawValue) -> Result<bool, ValidationError> {
        raw.as_bool()
            .ok_or_else(|| self.invalid(format!("expected a boolean, got {raw}")))
    }

    fn element_kind(&self) -> &ScalarKind {
        self.field.kind.element().unwrap_or(&self.field.kind)
    }
}

/// Builds one predicate for `(operand, argument)`.
pub type PredicateFn = fn(&Operand<'_>, &RawValue) -> Result<Expr, ValidationError>;

/// `(scalar family, adapter, operator) -> predicate builder`.
pub struct OperatorTable {
    entries: HashMap<(ScalarFamily, AdapterId, Operator), PredicateFn>,
}

impl OperatorTable {
    fn build() -> Self {
        let mut table = Self {
            entries: HashMap::new(),
        };
        string::register(&mut table);
        numeric::register(&mut table);
        boolean::register(&mut table);
        temporal::register(&mut table);
        enumeration::register(&mut table);
        geo::register(&mut table);
        array::register(&mut table);
        json::register(&mut table);
        tracing::debug!(entries = table.entries.len(), "Operator table built");
        table
    }

    /// Register one mapping used identically by every adapter.
    fn shared(&mut self, family: ScalarFamily, operator: Operator, build: PredicateFn) {
        self.on(family, &AdapterId::ALL, operator, build);
    }

    /// Register a mapping for a subset of adapters.
    fn on(&mut self, family: ScalarFamily, adapters: &[AdapterId], operator: Operator, build: PredicateFn) {
        for adapter in adapters {
            self.entries.insert((family, *adapter, operator), build);
        }
    }

    pub fn lookup(&self, family: ScalarFamily, adapter: AdapterId, operator: Operator) -> Option<PredicateFn> {
        self.entries.get(&(family, adapter, operator)).copied()
    }

    /// Operators a kind supports on an adapter, sorted.
    pub fn operators_for(&self, family: ScalarFamily, adapter: AdapterId) -> Vec<Operator> {
        let mut ops: Vec<Operator> = self
            .entries
            .keys()
            .filter(|(f, a, _)| *f == family && *a == adapter)
            .map(|(_, _, op)| *op)
            .collect();
        ops.sort();
        ops
    }
}

static OPERATOR_TABLE: Lazy<OperatorTable> = Lazy::new(OperatorTable::build);

/// The process-wide operator table.
pub fn operator_table() -> &'static OperatorTable {
    &OPERATOR_TABLE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::Adapter;
    use crate::query::{ArrayEncoding, ArrayPredicate, Binding, CmpOp};
    use serde_json::json;

    fn field(name: &str, kind: ScalarKind) -> Field {
        Field {
            name: name.to_string(),
            column: name.to_string(),
            kind,
        }
    }

    fn build(adapter: AdapterId, field: &Field, operator: Operator, raw: RawValue) -> Option<Result<Expr, ValidationError>> {
        let adapter = Adapter::get(adapter);
        let operand = Operand {
            column: ColumnRef::new(Binding::Root, &field.column, field.kind.clone()),
            field,
            adapter,
            operator,
        };
        operator_table()
            .lookup(field.kind.family(), adapter.id(), operator)
            .map(|build| build(&operand, &raw))
    }

    #[test]
    fn test_symbols_round_trip() {
        for op in Operator::ALL {
            assert_eq!(Operator::from_symbol(op.symbol()), Some(op));
        }
        assert_eq!(Operator::from_symbol("_and"), None);
    }

    #[test]
    fn test_shared_equality_everywhere() {
        let name = field("name", ScalarKind::String);
        for adapter in AdapterId::ALL {
            let expr = build(adapter, &name, Operator::Eq, json!("Alice")).unwrap().unwrap();
            assert!(matches!(expr, Expr::Compare { op: CmpOp::Eq, .. }), "{adapter:?}");
        }
    }

    #[test]
    fn test_ilike_varies_by_adapter() {
        let name = field("name", ScalarKind::String);
        assert!(build(AdapterId::Postgres, &name, Operator::Ilike, json!("a%")).is_some());
        assert!(build(AdapterId::Sqlite, &name, Operator::Ilike, json!("a%")).is_some());
        assert!(build(AdapterId::MsSql, &name, Operator::Ilike, json!("a%")).is_none());
    }

    #[test]
    fn test_array_encoding_follows_adapter() {
        let tags = field("tags", ScalarKind::array_of(ScalarKind::String));

        let pg = build(AdapterId::Postgres, &tags, Operator::Includes, json!("admin")).unwrap().unwrap();
        assert!(matches!(
            pg,
            Expr::Array { encoding: ArrayEncoding::Native, predicate: ArrayPredicate::Includes, .. }
        ));

        let mysql = build(AdapterId::MySql, &tags, Operator::IncludesAny, json!(["a", "b"])).unwrap().unwrap();
        assert!(matches!(mysql, Expr::Array { encoding: ArrayEncoding::JsonDocument, .. }));

        assert!(build(AdapterId::MsSql, &tags, Operator::Includes, json!("admin")).is_none());
    }

    #[test]
    fn test_invalid_argument_names_field_and_operator() {
        let age = field("age", ScalarKind::Integer);
        let err = build(AdapterId::Postgres, &age, Operator::Gte, json!("old")).unwrap().unwrap_err();
        assert_eq!(
            err,
            ValidationError::invalid_value("age", "_gte", "expected an integer, got \"old\"")
        );
    }

    #[test]
    fn test_operators_for_enum() {
        let ops = operator_table().operators_for(ScalarFamily::Enum, AdapterId::Postgres);
        assert_eq!(
            ops,
            vec![Operator::Eq, Operator::Neq, Operator::In, Operator::Nin, Operator::IsNull]
        );
    }
}
