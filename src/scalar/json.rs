//! JSON document operators

use crate::error::ValidationError;
use crate::query::Expr;
use crate::schema::ScalarFamily;
use crate::value::RawValue;

use super::common;
use super::{Operand, Operator, OperatorTable};

pub(super) fn register(table: &mut OperatorTable) {
    let family = ScalarFamily::Json;
    table.shared(family, Operator::IsNull, common::is_null);
    table.shared(family, Operator::HasKey, has_key);
}

fn has_key(operand: &Operand<'_>, raw: &RawValue) -> Result<Expr, ValidationError> {
    let key = raw
        .as_str()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| operand.invalid(format!("expected a non-empty key, got {raw}")))?;
    if !key.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return Err(operand.invalid(format!("key `{key}` may only contain letters, digits, `_` and `-`")));
    }
    Ok(Expr::JsonHasKey {
        column: operand.column.clone(),
        key: key.to_string(),
    })
}
