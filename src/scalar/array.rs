//! Array operators
//!
//! The same operators compile to native array predicates on engines that
//! have an array type and to JSON-document predicates on engines that store
//! arrays as JSON. The encoding is taken from the adapter's capabilities.

use crate::adapter::AdapterId;
use crate::error::ValidationError;
use crate::query::{ArrayEncoding, ArrayPredicate, Expr};
use crate::schema::ScalarFamily;
use crate::value::{RawValue, Value};

use super::common;
use super::{Operand, Operator, OperatorTable};

/// Adapters able to query array-typed fields in either encoding.
const ARRAYS: [AdapterId; 5] = [
    AdapterId::Postgres,
    AdapterId::MySql,
    AdapterId::Sqlite,
    AdapterId::Search,
    AdapterId::Memory,
];

pub(super) fn register(table: &mut OperatorTable) {
    let family = ScalarFamily::Array;
    table.shared(family, Operator::IsNull, common::is_null);
    table.on(family, &ARRAYS, Operator::Includes, includes);
    table.on(family, &ARRAYS, Operator::Excludes, excludes);
    table.on(family, &ARRAYS, Operator::IncludesAll, includes_all);
    table.on(family, &ARRAYS, Operator::IncludesAny, includes_any);
    table.on(family, &ARRAYS, Operator::IsEmpty, is_empty);
}

fn encoding(operand: &Operand<'_>) -> Result<ArrayEncoding, ValidationError> {
    operand
        .adapter
        .array_encoding()
        .ok_or_else(|| operand.invalid(format!("{} cannot query array fields", operand.adapter.id())))
}

fn single(operand: &Operand<'_>, raw: &RawValue, predicate: ArrayPredicate) -> Result<Expr, ValidationError> {
    let value = operand.coerce_element(raw)?;
    if matches!(value, Value::Null | Value::List(_)) {
        return Err(operand.invalid(format!("expected a single element, got {raw}")));
    }
    Ok(Expr::Array {
        column: operand.column.clone(),
        predicate,
        values: vec![value],
        encoding: encoding(operand)?,
    })
}

fn many(operand: &Operand<'_>, raw: &RawValue, predicate: ArrayPredicate) -> Result<Expr, ValidationError> {
    let values = operand.coerce_list(raw)?;
    if values.is_empty() {
        // Every array contains all of nothing; none contains any of nothing.
        return Ok(Expr::Bool(predicate == ArrayPredicate::IncludesAll));
    }
    Ok(Expr::Array {
        column: operand.column.clone(),
        predicate,
        values,
        encoding: encoding(operand)?,
    })
}

fn includes(operand: &Operand<'_>, raw: &RawValue) -> Result<Expr, ValidationError> {
    single(operand, raw, ArrayPredicate::Includes)
}

fn excludes(operand: &Operand<'_>, raw: &RawValue) -> Result<Expr, ValidationError> {
    single(operand, raw, ArrayPredicate::Excludes)
}

fn includes_all(operand: &Operand<'_>, raw: &RawValue) -> Result<Expr, ValidationError> {
    many(operand, raw, ArrayPredicate::IncludesAll)
}

fn includes_any(operand: &Operand<'_>, raw: &RawValue) -> Result<Expr, ValidationError> {
    many(operand, raw, ArrayPredicate::IncludesAny)
}

/// `_is_empty: true` matches empty and null arrays.
fn is_empty(operand: &Operand<'_>, raw: &RawValue) -> Result<Expr, ValidationError> {
    let empty = operand.bool_arg(raw)?;
    Ok(Expr::ArrayEmpty {
        column: operand.column.clone(),
        encoding: encoding(operand)?,
        negated: !empty,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::Adapter;
    use crate::query::{Binding, ColumnRef};
    use crate::schema::{Field, ScalarKind};
    use serde_json::json;

    fn tags() -> Field {
        Field {
            name: "tags".to_string(),
            column: "tags".to_string(),
            kind: ScalarKind::array_of(ScalarKind::String),
        }
    }

    fn operand<'a>(field: &'a Field, adapter: AdapterId, operator: Operator) -> Operand<'a> {
        Operand {
            column: ColumnRef::new(Binding::Root, &field.column, field.kind.clone()),
            field,
            adapter: Adapter::get(adapter),
            operator,
        }
    }

    #[test]
    fn test_includes_takes_one_element() {
        let field = tags();
        let op = operand(&field, AdapterId::Sqlite, Operator::Includes);
        let expr = includes(&op, &json!("admin")).unwrap();
        assert!(matches!(
            expr,
            Expr::Array { encoding: ArrayEncoding::JsonDocument, ref values, .. } if values.len() == 1
        ));
        assert!(includes(&op, &json!(["a", "b"])).is_err());
        assert!(includes(&op, &json!(3)).is_err());
    }

    #[test]
    fn test_empty_lists() {
        let field = tags();
        let all = operand(&field, AdapterId::Postgres, Operator::IncludesAll);
        assert_eq!(includes_all(&all, &json!([])).unwrap(), Expr::Bool(true));
        let any = operand(&field, AdapterId::Postgres, Operator::IncludesAny);
        assert_eq!(includes_any(&any, &json!([])).unwrap(), Expr::Bool(false));
    }

    #[test]
    fn test_is_empty() {
        let field = tags();
        let op = operand(&field, AdapterId::Memory, Operator::IsEmpty);
        assert!(matches!(is_empty(&op, &json!(false)).unwrap(), Expr::ArrayEmpty { negated: true, .. }));
    }
}
