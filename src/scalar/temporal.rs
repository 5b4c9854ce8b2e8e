//! Date and datetime operators

use crate::error::ValidationError;
use crate::query::{CmpOp, Expr};
use crate::schema::ScalarFamily;
use crate::value::RawValue;

use super::common;
use super::{Operand, Operator, OperatorTable};

pub(super) fn register(table: &mut OperatorTable) {
    for family in [ScalarFamily::Date, ScalarFamily::DateTime] {
        common::register_equality(table, family);
        common::register_ordering(table, family);
        table.shared(family, Operator::Between, common::between);
        table.shared(family, Operator::InPast, in_past);
        table.shared(family, Operator::InFuture, in_future);
    }
}

/// `_in_past: true` is `< now`, `_in_past: false` is `>= now`.
fn in_past(operand: &Operand<'_>, raw: &RawValue) -> Result<Expr, ValidationError> {
    let op = if operand.bool_arg(raw)? { CmpOp::Lt } else { CmpOp::Gte };
    Ok(Expr::CompareNow {
        column: operand.column.clone(),
        op,
    })
}

/// `_in_future: true` is `> now`, `_in_future: false` is `<= now`.
fn in_future(operand: &Operand<'_>, raw: &RawValue) -> Result<Expr, ValidationError> {
    let op = if operand.bool_arg(raw)? { CmpOp::Gt } else { CmpOp::Lte };
    Ok(Expr::CompareNow {
        column: operand.column.clone(),
        op,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{Adapter, AdapterId};
    use crate::query::{Binding, ColumnRef};
    use crate::schema::{Field, ScalarKind};
    use serde_json::json;

    #[test]
    fn test_relative_time_operators() {
        let field = Field {
            name: "published_at".to_string(),
            column: "published_at".to_string(),
            kind: ScalarKind::DateTime,
        };
        let operand = Operand {
            column: ColumnRef::new(Binding::Root, "published_at", ScalarKind::DateTime),
            field: &field,
            adapter: Adapter::get(AdapterId::Sqlite),
            operator: Operator::InPast,
        };

        assert!(matches!(in_past(&operand, &json!(true)).unwrap(), Expr::CompareNow { op: CmpOp::Lt, .. }));
        assert!(matches!(in_past(&operand, &json!(false)).unwrap(), Expr::CompareNow { op: CmpOp::Gte, .. }));
        assert!(matches!(in_future(&operand, &json!(true)).unwrap(), Expr::CompareNow { op: CmpOp::Gt, .. }));
        assert!(in_past(&operand, &json!("yes")).is_err());
    }
}
