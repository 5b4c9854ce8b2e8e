//! Boolean operators

use crate::error::ValidationError;
use crate::query::{CmpOp, Expr};
use crate::schema::ScalarFamily;
use crate::value::RawValue;

use super::common;
use super::{Operand, Operator, OperatorTable};

pub(super) fn register(table: &mut OperatorTable) {
    let family = ScalarFamily::Boolean;
    table.shared(family, Operator::Eq, eq);
    table.shared(family, Operator::Neq, neq);
    table.shared(family, Operator::IsNull, common::is_null);
}

fn eq(operand: &Operand<'_>, raw: &RawValue) -> Result<Expr, ValidationError> {
    common::compare(operand, raw, CmpOp::Eq)
}

fn neq(operand: &Operand<'_>, raw: &RawValue) -> Result<Expr, ValidationError> {
    common::compare(operand, raw, CmpOp::Neq)
}
