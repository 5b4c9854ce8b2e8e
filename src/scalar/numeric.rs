//! Integer and float operators

use crate::schema::ScalarFamily;

use super::common;
use super::{Operator, OperatorTable};

pub(super) fn register(table: &mut OperatorTable) {
    for family in [ScalarFamily::Integer, ScalarFamily::Float] {
        common::register_equality(table, family);
        common::register_ordering(table, family);
        table.shared(family, Operator::Between, common::between);
    }
}

#[cfg(test)]
mod tests {
    use crate::adapter::AdapterId;
    use crate::scalar::{Operator, operator_table};
    use crate::schema::ScalarFamily;

    #[test]
    fn test_numeric_has_no_text_operators() {
        let ops = operator_table().operators_for(ScalarFamily::Float, AdapterId::MySql);
        assert!(ops.contains(&Operator::Between));
        assert!(!ops.contains(&Operator::Like));
        assert!(!ops.contains(&Operator::Includes));
    }
}
