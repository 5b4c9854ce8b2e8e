//! Predicate builders shared by several scalar kinds

use crate::error::ValidationError;
use crate::query::{CmpOp, Expr};
use crate::schema::ScalarFamily;
use crate::value::{RawValue, Value};

use super::{Operand, Operator, OperatorTable};

/// Register equality, set membership and null checks for a family.
pub(super) fn register_equality(table: &mut OperatorTable, family: ScalarFamily) {
    table.shared(family, Operator::Eq, eq);
    table.shared(family, Operator::Neq, neq);
    table.shared(family, Operator::In, in_list);
    table.shared(family, Operator::Nin, not_in_list);
    table.shared(family, Operator::IsNull, is_null);
}

/// Register range comparisons for a family with a natural ordering.
pub(super) fn register_ordering(table: &mut OperatorTable, family: ScalarFamily) {
    table.shared(family, Operator::Gt, gt);
    table.shared(family, Operator::Gte, gte);
    table.shared(family, Operator::Lt, lt);
    table.shared(family, Operator::Lte, lte);
}

pub(super) fn compare(operand: &Operand<'_>, raw: &RawValue, op: CmpOp) -> Result<Expr, ValidationError> {
    let value = operand.coerce(raw)?;
    if value.is_null() {
        return match op {
            CmpOp::Eq => Ok(is_null_expr(operand, true)),
            CmpOp::Neq => Ok(is_null_expr(operand, false)),
            _ => Err(operand.invalid("cannot compare against null")),
        };
    }
    Ok(Expr::Compare {
        column: operand.column.clone(),
        op,
        value,
    })
}

fn eq(operand: &Operand<'_>, raw: &RawValue) -> Result<Expr, ValidationError> {
    compare(operand, raw, CmpOp::Eq)
}

fn neq(operand: &Operand<'_>, raw: &RawValue) -> Result<Expr, ValidationError> {
    compare(operand, raw, CmpOp::Neq)
}

fn gt(operand: &Operand<'_>, raw: &RawValue) -> Result<Expr, ValidationError> {
    compare(operand, raw, CmpOp::Gt)
}

fn gte(operand: &Operand<'_>, raw: &RawValue) -> Result<Expr, ValidationError> {
    compare(operand, raw, CmpOp::Gte)
}

fn lt(operand: &Operand<'_>, raw: &RawValue) -> Result<Expr, ValidationError> {
    compare(operand, raw, CmpOp::Lt)
}

fn lte(operand: &Operand<'_>, raw: &RawValue) -> Result<Expr, ValidationError> {
    compare(operand, raw, CmpOp::Lte)
}

fn in_list(operand: &Operand<'_>, raw: &RawValue) -> Result<Expr, ValidationError> {
    membership(operand, raw, false)
}

fn not_in_list(operand: &Operand<'_>, raw: &RawValue) -> Result<Expr, ValidationError> {
    membership(operand, raw, true)
}

/// `_in` / `_nin`. Lists longer than the adapter's bound-parameter limit are
/// split into chunks combined with OR (AND for the negated form).
fn membership(operand: &Operand<'_>, raw: &RawValue, negated: bool) -> Result<Expr, ValidationError> {
    let values: Vec<Value> = operand
        .coerce_list(raw)?
        .into_iter()
        .filter(|v| !v.is_null())
        .collect();

    if values.is_empty() {
        // Nothing is in the empty set.
        return Ok(Expr::Bool(negated));
    }

    let chunk_size = operand
        .adapter
        .capabilities()
        .max_in_list
        .unwrap_or(values.len())
        .max(1);

    let chunks: Vec<Expr> = values
        .chunks(chunk_size)
        .map(|chunk| Expr::InList {
            column: operand.column.clone(),
            values: chunk.to_vec(),
            negated,
        })
        .collect();

    if chunks.len() > 1 {
        tracing::debug!(
            field = %operand.field.name,
            chunks = chunks.len(),
            "Split oversized IN list"
        );
    }

    Ok(if negated {
        Expr::and(chunks)
    } else {
        Expr::or(chunks)
    })
}

fn is_null_expr(operand: &Operand<'_>, null: bool) -> Expr {
    Expr::IsNull {
        column: operand.column.clone(),
        negated: !null,
    }
}

pub(super) fn is_null(operand: &Operand<'_>, raw: &RawValue) -> Result<Expr, ValidationError> {
    let null = operand.bool_arg(raw)?;
    Ok(is_null_expr(operand, null))
}

/// `_between: [low, high]`, inclusive on both ends.
pub(super) fn between(operand: &Operand<'_>, raw: &RawValue) -> Result<Expr, ValidationError> {
    let bounds = match raw {
        RawValue::Array(items) if items.len() == 2 => items,
        _ => return Err(operand.invalid(format!("expected [low, high], got {raw}"))),
    };
    let low = operand.coerce(&bounds[0])?;
    let high = operand.coerce(&bounds[1])?;
    if low.is_null() || high.is_null() {
        return Err(operand.invalid("bounds must not be null"));
    }
    if let Some(std::cmp::Ordering::Greater) = low.compare(&high) {
        return Err(operand.invalid(format!("lower bound {low} is above upper bound {high}")));
    }

    Ok(Expr::And(vec![
        Expr::Compare {
            column: operand.column.clone(),
            op: CmpOp::Gte,
            value: low,
        },
        Expr::Compare {
            column: operand.column.clone(),
            op: CmpOp::Lte,
            value: high,
        },
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{Adapter, AdapterId};
    use crate::query::{Binding, ColumnRef};
    use crate::schema::{Field, ScalarKind};
    use serde_json::json;

    fn age() -> Field {
        Field {
            name: "age".to_string(),
            column: "age".to_string(),
            kind: ScalarKind::Integer,
        }
    }

    fn operand<'a>(field: &'a Field, adapter: &'a Adapter, operator: Operator) -> Operand<'a> {
        Operand {
            column: ColumnRef::new(Binding::Root, &field.column, field.kind.clone()),
            field,
            adapter,
            operator,
        }
    }

    #[test]
    fn test_eq_null_becomes_is_null() {
        let field = age();
        let adapter = Adapter::get(AdapterId::Postgres);
        let expr = eq(&operand(&field, adapter, Operator::Eq), &json!(null)).unwrap();
        assert!(matches!(expr, Expr::IsNull { negated: false, .. }));

        let err = gt(&operand(&field, adapter, Operator::Gt), &json!(null)).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { .. }));
    }

    #[test]
    fn test_empty_in_lists() {
        let field = age();
        let adapter = Adapter::get(AdapterId::Postgres);
        assert_eq!(in_list(&operand(&field, adapter, Operator::In), &json!([])).unwrap(), Expr::Bool(false));
        assert_eq!(
            not_in_list(&operand(&field, adapter, Operator::Nin), &json!([])).unwrap(),
            Expr::Bool(true)
        );
    }

    #[test]
    fn test_in_list_chunked() {
        let field = age();
        let adapter = Adapter::get(AdapterId::Postgres).with_max_in_list(Some(2));
        let expr = in_list(&operand(&field, &adapter, Operator::In), &json!([1, 2, 3, 4, 5])).unwrap();
        match expr {
            Expr::Or(chunks) => {
                assert_eq!(chunks.len(), 3);
                assert!(matches!(&chunks[2], Expr::InList { values, .. } if values.len() == 1));
            }
            other => panic!("expected Or, got {other:?}"),
        }

        let expr = not_in_list(&operand(&field, &adapter, Operator::Nin), &json!([1, 2, 3])).unwrap();
        assert!(matches!(expr, Expr::And(chunks) if chunks.len() == 2));
    }

    #[test]
    fn test_between_bounds() {
        let field = age();
        let adapter = Adapter::get(AdapterId::Sqlite);
        let op = operand(&field, adapter, Operator::Between);
        assert!(matches!(between(&op, &json!([18, 65])).unwrap(), Expr::And(parts) if parts.len() == 2));
        assert!(between(&op, &json!([65, 18])).is_err());
        assert!(between(&op, &json!([18])).is_err());
    }
}
