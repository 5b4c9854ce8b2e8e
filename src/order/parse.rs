//! JSON order-by lists to [`OrderNode`] entries
//!
//! ```json
//! [
//!   {"name": "asc"},
//!   {"status": {"direction": "desc", "priority": ["active", "draft"]}},
//!   {"location": {"center": {"lat": 52.52, "lon": 13.40}}},
//!   {"author": {"organization": {"name": "desc_nulls_last"}}}
//! ]
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Map;

use crate::error::{Result, ValidationError};
use crate::query::OrderDirection;
use crate::schema::{Member, SchemaRef};
use crate::value::{GeoPoint, RawValue};

use super::ast::OrderNode;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// Parse an order-by document against `schema`.
///
/// Accepts a list of single-key maps, a single map (keys in map order), a
/// bare field name (ascending) or `null`. Keys that are not identifiers, such
/// as a stray `_and`, are skipped unless `strict` is set.
pub fn parse_order(raw: &RawValue, schema: SchemaRef<'_>, strict: bool) -> Result<Vec<OrderNode>> {
    let parser = Parser { strict };
    let mut entries = Vec::new();
    match raw {
        RawValue::Null => {}
        RawValue::Array(items) => {
            for item in items {
                parser.entry(item, schema, &mut entries)?;
            }
        }
        other => parser.entry(other, schema, &mut entries)?,
    }
    Ok(entries)
}

struct Parser {
    strict: bool,
}

impl Parser {
    fn entry(&self, raw: &RawValue, schema: SchemaRef<'_>, out: &mut Vec<OrderNode>) -> Result<()> {
        match raw {
            RawValue::String(field) => {
                if self.identifier(field, schema)? {
                    out.push(OrderNode::asc(field.as_str()));
                }
                Ok(())
            }
            RawValue::Object(map) => self.map(map, schema, out),
            other => Err(ValidationError::malformed_order(format!("expected an order entry, got {other}")).into()),
        }
    }

    fn map(&self, map: &Map<String, RawValue>, schema: SchemaRef<'_>, out: &mut Vec<OrderNode>) -> Result<()> {
        for (key, value) in map {
            if !self.identifier(key, schema)? {
                continue;
            }
            match schema.member(key) {
                Member::Relationship(_) if !is_leaf_value(value) => {
                    let (_, target) = schema.related(key)?;
                    let mut nested = Vec::new();
                    self.nested(value, target, &mut nested)?;
                    out.extend(nested.into_iter().map(|inner| OrderNode::associated([key.as_str()], inner)));
                }
                _ => out.push(self.leaf(key, value)?),
            }
        }
        Ok(())
    }

    fn nested(&self, value: &RawValue, schema: SchemaRef<'_>, out: &mut Vec<OrderNode>) -> Result<()> {
        match value {
            RawValue::Array(items) => items.iter().try_for_each(|item| self.entry(item, schema, out)),
            other => self.entry(other, schema, out),
        }
    }

    /// `"desc"` or `{direction, priority}` / `{direction, center}`.
    fn leaf(&self, field: &str, value: &RawValue) -> Result<OrderNode> {
        let options = match value {
            RawValue::String(direction) => return Ok(OrderNode::standard(field, direction_of(field, direction)?)),
            RawValue::Null => return Ok(OrderNode::asc(field)),
            RawValue::Object(options) => options,
            other => {
                return Err(ValidationError::malformed_order(format!(
                    "`{field}` expects a direction or options, got {other}"
                ))
                .into());
            }
        };

        let mut direction = OrderDirection::Asc;
        let mut priority = None;
        let mut center = None;
        for (key, option) in options {
            match key.as_str() {
                "direction" => {
                    let name = option.as_str().ok_or_else(|| {
                        ValidationError::malformed_order(format!("`{field}` direction must be a string, got {option}"))
                    })?;
                    direction = direction_of(field, name)?;
                }
                "priority" => priority = Some(priority_values(field, option)?),
                "center" => {
                    let point = GeoPoint::from_raw(option)
                        .map_err(|reason| ValidationError::malformed_order(format!("`{field}` center: {reason}")))?;
                    center = Some(point);
                }
                other if self.strict => {
                    return Err(ValidationError::malformed_order(format!("unknown option `{other}` on `{field}`")).into());
                }
                other => tracing::debug!(field, option = other, "Skipping unknown order option"),
            }
        }

        match (priority, center) {
            (Some(_), Some(_)) => Err(ValidationError::malformed_order(format!(
                "`{field}` cannot combine `priority` and `center`"
            ))
            .into()),
            (Some(priority), None) => Ok(OrderNode::priority(field, direction, priority)),
            (None, Some(center)) => Ok(OrderNode::geo(field, direction, center)),
            (None, None) => Ok(OrderNode::standard(field, direction)),
        }
    }

    /// Whether `key` may name a field or relationship. Anything else is
    /// skipped, or rejected in strict mode.
    fn identifier(&self, key: &str, schema: SchemaRef<'_>) -> Result<bool> {
        if IDENTIFIER.is_match(key) {
            return Ok(true);
        }
        if self.strict {
            return Err(ValidationError::malformed_order(format!("`{key}` is not a field name")).into());
        }
        tracing::debug!(entity = schema.entity(), key, "Skipping non-identifier order key");
        Ok(false)
    }
}

/// A relationship key followed by a direction (or options object without
/// nested field keys) is an ordinary entry; the compiler reports it.
fn is_leaf_value(value: &RawValue) -> bool {
    match value {
        RawValue::String(_) | RawValue::Null => true,
        RawValue::Object(map) => map
            .keys()
            .any(|key| matches!(key.as_str(), "direction" | "priority" | "center")),
        _ => false,
    }
}

fn direction_of(field: &str, name: &str) -> Result<OrderDirection, ValidationError> {
    name.parse::<OrderDirection>()
        .map_err(|reason| ValidationError::malformed_order(format!("`{field}`: {reason}")))
}

fn priority_values(field: &str, raw: &RawValue) -> Result<Vec<String>, ValidationError> {
    let items = raw
        .as_array()
        .ok_or_else(|| ValidationError::malformed_order(format!("`{field}` priority must be a list, got {raw}")))?;
    items
        .iter()
        .map(|item| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                ValidationError::malformed_order(format!("`{field}` priority values must be strings, got {item}"))
            })
        })
        .collect()
}
