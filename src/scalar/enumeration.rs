//! Enum operators
//!
//! Arguments are checked against the enum's declared values during coercion,
//! so a typo such as `_eq: "actve"` fails compilation instead of silently
//! matching nothing.

use crate::schema::ScalarFamily;

use super::common;
use super::OperatorTable;

pub(super) fn register(table: &mut OperatorTable) {
    common::register_equality(table, ScalarFamily::Enum);
}

#[cfg(test)]
mod tests {
    use crate::adapter::{Adapter, AdapterId};
    use crate::error::ValidationError;
    use crate::query::{Binding, ColumnRef};
    use crate::scalar::{Operand, Operator, operator_table};
    use crate::schema::{EnumType, Field, ScalarKind};
    use serde_json::json;

    #[test]
    fn test_unknown_enum_value_rejected() {
        let kind = ScalarKind::Enum(EnumType::new("status", ["active", "archived"]));
        let field = Field {
            name: "status".to_string(),
            column: "status".to_string(),
            kind: kind.clone(),
        };
        let operand = Operand {
            column: ColumnRef::new(Binding::Root, "status", kind.clone()),
            field: &field,
            adapter: Adapter::get(AdapterId::Postgres),
            operator: Operator::In,
        };
        let build = operator_table()
            .lookup(kind.family(), AdapterId::Postgres, Operator::In)
            .unwrap();

        assert!(build(&operand, &json!(["active"])).is_ok());
        assert_eq!(
            build(&operand, &json!(["active", "deleted"])).unwrap_err(),
            ValidationError::invalid_value("status", "_in", "`deleted` is not a value of enum status")
        );
    }
}
