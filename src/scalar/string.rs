//! String operators

use crate::adapter::AdapterId;
use crate::error::ValidationError;
use crate::query::Expr;
use crate::schema::ScalarFamily;
use crate::value::RawValue;

use super::common;
use super::{Operand, Operator, OperatorTable};

/// Default similarity threshold for `_similar` when none is given.
pub const DEFAULT_SIMILARITY: f64 = 0.6;

const CASE_INSENSITIVE_LIKE: [AdapterId; 5] = [
    AdapterId::Postgres,
    AdapterId::MySql,
    AdapterId::Sqlite,
    AdapterId::Search,
    AdapterId::Memory,
];

const SIMILARITY: [AdapterId; 2] = [AdapterId::Postgres, AdapterId::Memory];

pub(super) fn register(table: &mut OperatorTable) {
    let family = ScalarFamily::String;
    common::register_equality(table, family);
    common::register_ordering(table, family);

    table.shared(family, Operator::Like, like);
    table.shared(family, Operator::Contains, contains);
    table.shared(family, Operator::StartsWith, starts_with);
    table.shared(family, Operator::EndsWith, ends_with);
    table.on(family, &CASE_INSENSITIVE_LIKE, Operator::Ilike, ilike);
    table.on(family, &SIMILARITY, Operator::Similar, similar);
}

fn pattern_arg(operand: &Operand<'_>, raw: &RawValue) -> Result<String, ValidationError> {
    raw.as_str()
        .map(str::to_string)
        .ok_or_else(|| operand.invalid(format!("expected a string pattern, got {raw}")))
}

fn like(operand: &Operand<'_>, raw: &RawValue) -> Result<Expr, ValidationError> {
    Ok(Expr::Like {
        column: operand.column.clone(),
        pattern: pattern_arg(operand, raw)?,
        case_insensitive: false,
    })
}

fn ilike(operand: &Operand<'_>, raw: &RawValue) -> Result<Expr, ValidationError> {
    Ok(Expr::Like {
        column: operand.column.clone(),
        pattern: pattern_arg(operand, raw)?,
        case_insensitive: true,
    })
}

fn literal_pattern(operand: &Operand<'_>, raw: &RawValue, prefix: &str, suffix: &str) -> Result<Expr, ValidationError> {
    let needle = pattern_arg(operand, raw)?;
    Ok(Expr::Like {
        column: operand.column.clone(),
        pattern: format!("{prefix}{}{suffix}", escape_like(&needle)),
        case_insensitive: false,
    })
}

fn contains(operand: &Operand<'_>, raw: &RawValue) -> Result<Expr, ValidationError> {
    literal_pattern(operand, raw, "%", "%")
}

fn starts_with(operand: &Operand<'_>, raw: &RawValue) -> Result<Expr, ValidationError> {
    literal_pattern(operand, raw, "", "%")
}

fn ends_with(operand: &Operand<'_>, raw: &RawValue) -> Result<Expr, ValidationError> {
    literal_pattern(operand, raw, "%", "")
}

/// `_similar: "text"` or `_similar: {"value": "text", "threshold": 0.8}`.
fn similar(operand: &Operand<'_>, raw: &RawValue) -> Result<Expr, ValidationError> {
    let (value, threshold) = match raw {
        RawValue::String(s) => (s.clone(), DEFAULT_SIMILARITY),
        RawValue::Object(map) => {
            let value = map
                .get("value")
                .and_then(RawValue::as_str)
                .ok_or_else(|| operand.invalid("missing `value`"))?;
            let threshold = match map.get("threshold") {
                None | Some(RawValue::Null) => DEFAULT_SIMILARITY,
                Some(t) => t
                    .as_f64()
                    .ok_or_else(|| operand.invalid(format!("threshold must be a number, got {t}")))?,
            };
            (value.to_string(), threshold)
        }
        other => return Err(operand.invalid(format!("expected a string or {{value, threshold}}, got {other}"))),
    };

    if !(0.0..=1.0).contains(&threshold) {
        return Err(operand.invalid(format!("threshold {threshold} is outside 0..=1")));
    }

    Ok(Expr::Similar {
        column: operand.column.clone(),
        value,
        threshold,
    })
}

/// Escape LIKE wildcards so user text matches literally.
pub(crate) fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
