//! JSON filter documents to [`FilterNode`] trees
//!
//! ```json
//! {
//!   "name": {"_ilike": "a%"},
//!   "posts": {"status": {"_eq": "active"}},
//!   "_or": [{"age": {"_gte": 18}}, {"verified": true}],
//!   "_not": {"organization": {"_exists": true}}
//! }
//! ```

use serde_json::Map;

use crate::error::{Result, ValidationError};
use crate::scalar::Operator;
use crate::schema::{Member, SchemaRef};
use crate::value::RawValue;

use super::ast::{FieldCondition, FilterNode, OperatorSymbol};

const LOGICAL_KEYS: [&str; 4] = ["_and", "_or", "_not", "_exists"];

/// Parse a filter document against `schema`. `null` and `{}` parse to `None`.
///
/// Unrecognised `_`-prefixed keys are skipped unless `strict` is set, in
/// which case they are [`ValidationError::MalformedFilter`]. Operator keys
/// under a field are kept verbatim and judged later by the adapter.
pub fn parse_filter(raw: &RawValue, schema: SchemaRef<'_>, strict: bool) -> Result<Option<FilterNode>> {
    match raw {
        RawValue::Null => Ok(None),
        RawValue::Object(map) if map.is_empty() => Ok(None),
        RawValue::Object(map) => Parser { strict }.map(map, schema).map(Some),
        other => Err(ValidationError::malformed_filter(format!("expected an object, got {other}")).into()),
    }
}

struct Parser {
    strict: bool,
}

impl Parser {
    fn map(&self, map: &Map<String, RawValue>, schema: SchemaRef<'_>) -> Result<FilterNode> {
        let mut children = Vec::with_capacity(map.len());
        for (key, value) in map {
            match key.as_str() {
                "_and" => children.push(FilterNode::And(self.list(key, value, schema)?)),
                "_or" => children.push(FilterNode::Or(self.list(key, value, schema)?)),
                "_not" => children.push(FilterNode::not(self.object(key, value, schema)?)),
                "_exists" => {
                    let exists = value
                        .as_bool()
                        .ok_or_else(|| ValidationError::malformed_filter(format!("`_exists` expects a boolean, got {value}")))?;
                    children.push(FilterNode::Exists(exists));
                }
                other if other.starts_with('_') => self.unknown_key(other, schema)?,
                name => children.push(self.member(name, value, schema)?),
            }
        }

        Ok(match children.len() {
            1 => children.remove(0),
            _ => FilterNode::And(children),
        })
    }

    fn object(&self, key: &str, value: &RawValue, schema: SchemaRef<'_>) -> Result<FilterNode> {
        let map = value
            .as_object()
            .ok_or_else(|| ValidationError::malformed_filter(format!("`{key}` expects an object, got {value}")))?;
        self.map(map, schema)
    }

    /// `_and`/`_or` take a list of filters; a single object is accepted too.
    fn list(&self, key: &str, value: &RawValue, schema: SchemaRef<'_>) -> Result<Vec<FilterNode>> {
        match value {
            RawValue::Array(items) => items.iter().map(|item| self.object(key, item, schema)).collect(),
            RawValue::Object(map) => Ok(vec![self.map(map, schema)?]),
            other => Err(ValidationError::malformed_filter(format!("`{key}` expects a list, got {other}")).into()),
        }
    }

    fn member(&self, name: &str, value: &RawValue, schema: SchemaRef<'_>) -> Result<FilterNode> {
        if let Member::Relationship(_) = schema.member(name) {
            // `{author: {_eq: 5}}` targets the related key; anything else is
            // a filter on the related entity.
            if let RawValue::Object(map) = value {
                if !is_operator_map(map) {
                    let (_, target) = schema.related(name)?;
                    return Ok(FilterNode::relationship(name, self.map(map, target)?));
                }
            }
        }
        Ok(FilterNode::Field(field_condition(name, value)))
    }

    fn unknown_key(&self, key: &str, schema: SchemaRef<'_>) -> Result<()> {
        if self.strict {
            return Err(ValidationError::malformed_filter(format!("unknown key `{key}`")).into());
        }
        tracing::debug!(entity = schema.entity(), key, "Skipping unknown filter key");
        Ok(())
    }
}

fn is_operator_map(map: &Map<String, RawValue>) -> bool {
    !map.is_empty()
        && map
            .keys()
            .all(|key| key.starts_with('_') && !LOGICAL_KEYS.contains(&key.as_str()))
}

/// `{_op: value, ..}`, or shorthand: `null` is `_is_null: true`, any other
/// bare value is `_eq`.
fn field_condition(name: &str, value: &RawValue) -> FieldCondition {
    let condition = FieldCondition::new(name);
    match value {
        RawValue::Object(map) => map
            .iter()
            .fold(condition, |c, (op, arg)| c.op(OperatorSymbol::parse(op), arg.clone())),
        RawValue::Null => condition.op(Operator::IsNull, RawValue::Bool(true)),
        other => condition.op(Operator::Eq, other.clone()),
    }
}
