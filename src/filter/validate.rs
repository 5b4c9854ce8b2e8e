//! Structural checks that run before any predicate is built

use crate::error::ValidationError;

use super::ast::FilterNode;

/// Reject misplaced `_exists` markers anywhere in the tree.
///
/// `_exists` is legal only as the entire content of a relationship filter.
/// Next to other conditions in the same relationship map it is
/// [`ValidationError::ExistsNotSole`]; anywhere else it is
/// [`ValidationError::ExistsOutsideRelationship`].
pub fn validate(node: &FilterNode) -> Result<(), ValidationError> {
    match node {
        FilterNode::Exists(_) => Err(ValidationError::ExistsOutsideRelationship),
        FilterNode::Field(_) => Ok(()),
        FilterNode::Relationship(rel) => match rel.nested.as_ref() {
            FilterNode::Exists(_) => Ok(()),
            FilterNode::And(children) if children.iter().any(|c| matches!(c, FilterNode::Exists(_))) => {
                Err(ValidationError::ExistsNotSole {
                    relationship: rel.relationship.clone(),
                })
            }
            nested => validate(nested),
        },
        FilterNode::And(children) | FilterNode::Or(children) => children.iter().try_for_each(validate),
        FilterNode::Not(child) => validate(child),
    }
}
