//! In-process query execution
//!
//! Runs a compiled [`Query`] over JSON records. Related records are expected
//! to be embedded under the relationship name: an object for to-one
//! relationships, a list for to-many ones (including many-to-many, whose join
//! table is not materialized).
//!
//! Predicates use SQL's three-valued logic: a comparison against a missing or
//! null value is unknown, `_not` of unknown stays unknown, and a record only
//! matches when every predicate is true. `{_not: {age: {_lt: 18}}}` therefore
//! drops null ages here exactly as `NOT (age < 18)` does in SQL.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::Utc;
use regex::Regex;
use strsim::normalized_levenshtein;

use crate::query::{
    ArrayPredicate, Binding, CmpOp, ColumnRef, Expr, NullsOrder, OrderClause, OrderExpr, Query, SubQuery,
};
use crate::schema::ScalarKind;
use crate::value::{RawValue, Value};

/// Filter, order and page `records` according to `query`.
pub fn execute(query: &Query, records: &[RawValue]) -> Vec<RawValue> {
    let mut evaluator = Evaluator::default();
    let mut matched: Vec<&RawValue> = records
        .iter()
        .filter(|record| evaluator.matches(query, record))
        .collect();

    if !query.order_by().is_empty() {
        let mut keyed: Vec<(Vec<Option<Value>>, &RawValue)> = matched
            .into_iter()
            .map(|record| (sort_keys(query, record), record))
            .collect();
        // Vec::sort_by is stable, so ties keep input order.
        keyed.sort_by(|(a, _), (b, _)| compare_keys(query.order_by(), a, b));
        matched = keyed.into_iter().map(|(_, record)| record).collect();
    }

    let offset = query.offset().unwrap_or(0) as usize;
    let limit = query.limit().map(|l| l as usize).unwrap_or(usize::MAX);

    let rows: Vec<RawValue> = matched.into_iter().skip(offset).take(limit).cloned().collect();
    tracing::debug!(
        entity = query.entity(),
        scanned = records.len(),
        returned = rows.len(),
        "Executed in-memory query"
    );
    rows
}

/// Number of records matching the query's predicates.
pub fn count(query: &Query, records: &[RawValue]) -> usize {
    let mut evaluator = Evaluator::default();
    records.iter().filter(|record| evaluator.matches(query, record)).count()
}

/// Whether `record` satisfies every predicate of `query`.
pub fn matches(query: &Query, record: &RawValue) -> bool {
    Evaluator::default().matches(query, record)
}

/// Bindings visible while evaluating one root record.
struct Scope<'r> {
    root: &'r RawValue,
    aliases: Vec<(String, &'r RawValue)>,
}

impl<'r> Scope<'r> {
    fn record(&self, binding: &Binding) -> Option<&'r RawValue> {
        match binding {
            Binding::Root => Some(self.root),
            Binding::Alias(alias) => self
                .aliases
                .iter()
                .rev()
                .find(|(name, _)| name == alias)
                .map(|(_, record)| *record),
        }
    }
}

#[derive(Default)]
struct Evaluator {
    patterns: HashMap<(String, bool), Option<Regex>>,
}

impl Evaluator {
    fn matches(&mut self, query: &Query, record: &RawValue) -> bool {
        let mut scope = Scope {
            root: record,
            aliases: joined_records(query, record),
        };
        self.all(query.predicates(), &mut scope) == Some(true)
    }

    /// `None` is SQL's unknown.
    fn eval<'r>(&mut self, expr: &Expr, scope: &mut Scope<'r>) -> Option<bool> {
        match expr {
            Expr::Bool(b) => Some(*b),
            Expr::Compare { column, op, value } => read(scope, column).map(|actual| compare(&actual, *op, value)),
            Expr::InList {
                column,
                values,
                negated,
            } => read(scope, column).map(|actual| values.iter().any(|v| actual.loosely_equals(v)) != *negated),
            Expr::IsNull { column, negated } => Some(read(scope, column).is_none() != *negated),
            Expr::Like {
                column,
                pattern,
                case_insensitive,
            } => match read(scope, column)? {
                Value::String(s) => Some(self.like(pattern, *case_insensitive).is_some_and(|re| re.is_match(&s))),
                _ => None,
            },
            Expr::Similar {
                column,
                value,
                threshold,
            } => match read(scope, column)? {
                Value::String(s) => Some(similarity(&s, value) >= *threshold),
                _ => None,
            },
            Expr::CompareNow { column, op } => {
                read(scope, column).map(|actual| compare(&actual, *op, &now(&column.kind)))
            }
            Expr::WithinDistance {
                column,
                center,
                distance_km,
            } => match read(scope, column)? {
                Value::GeoPoint(point) => Some(point.distance_km(center) <= *distance_km),
                _ => None,
            },
            Expr::Array {
                column,
                predicate,
                values,
                ..
            } => {
                let items = read_list(scope, column);
                let contains = |v: &Value| items.iter().any(|item| item.loosely_equals(v));
                Some(match predicate {
                    ArrayPredicate::Includes => values.iter().all(contains),
                    ArrayPredicate::Excludes => !values.iter().any(contains),
                    ArrayPredicate::IncludesAll => values.iter().all(contains),
                    ArrayPredicate::IncludesAny => values.iter().any(contains),
                })
            }
            Expr::ArrayEmpty { column, negated, .. } => Some(read_list(scope, column).is_empty() != *negated),
            Expr::JsonHasKey { column, key } => match scope.record(&column.binding)?.get(&column.column)? {
                RawValue::Object(object) => Some(object.contains_key(key)),
                RawValue::Null => None,
                _ => Some(false),
            },
            Expr::And(children) => self.all(children, scope),
            Expr::Or(children) => self.any(children, scope),
            Expr::Not(inner) => self.eval(inner, scope).map(|b| !b),
            Expr::Exists { subquery, negated } => Some(self.exists(subquery, scope) != *negated),
        }
    }

    /// Three-valued AND: false wins over unknown.
    fn all<'r>(&mut self, exprs: &[Expr], scope: &mut Scope<'r>) -> Option<bool> {
        let mut result = Some(true);
        for expr in exprs {
            match self.eval(expr, scope) {
                Some(false) => return Some(false),
                None => result = None,
                Some(true) => {}
            }
        }
        result
    }

    /// Three-valued OR: true wins over unknown.
    fn any<'r>(&mut self, exprs: &[Expr], scope: &mut Scope<'r>) -> Option<bool> {
        let mut result = Some(false);
        for expr in exprs {
            match self.eval(expr, scope) {
                Some(true) => return Some(true),
                None => result = None,
                Some(false) => {}
            }
        }
        result
    }

    fn exists<'r>(&mut self, subquery: &SubQuery, scope: &mut Scope<'r>) -> bool {
        let Some(parent) = scope.record(&subquery.link.parent) else {
            return false;
        };
        for related in related_records(parent, &subquery.relationship) {
            scope.aliases.push((subquery.alias.clone(), related));
            let found = self.all(&subquery.predicates, scope) == Some(true);
            scope.aliases.pop();
            if found {
                return true;
            }
        }
        false
    }

    fn like(&mut self, pattern: &str, case_insensitive: bool) -> Option<&Regex> {
        self.patterns
            .entry((pattern.to_string(), case_insensitive))
            .or_insert_with(|| {
                let compiled = Regex::new(&like_to_regex(pattern, case_insensitive));
                if let Err(ref err) = compiled {
                    tracing::warn!(pattern, error = %err, "Could not compile LIKE pattern");
                }
                compiled.ok()
            })
            .as_ref()
    }
}

/// Records reachable from the root through the query's order joins.
fn joined_records<'r>(query: &Query, root: &'r RawValue) -> Vec<(String, &'r RawValue)> {
    query
        .joins()
        .iter()
        .filter_map(|join| {
            let mut current = root;
            for relationship in &join.path {
                current = related_records(current, relationship).into_iter().next()?;
            }
            Some((join.alias.clone(), current))
        })
        .collect()
}

fn related_records<'r>(parent: &'r RawValue, relationship: &str) -> Vec<&'r RawValue> {
    match parent.get(relationship) {
        Some(RawValue::Array(items)) => items.iter().filter(|item| item.is_object()).collect(),
        Some(object @ RawValue::Object(_)) => vec![object],
        _ => Vec::new(),
    }
}

/// Read a column as a typed value. Missing, null and uncoercible values all
/// read as `None`.
fn read(scope: &Scope<'_>, column: &ColumnRef) -> Option<Value> {
    let raw = scope.record(&column.binding)?.get(&column.column)?;
    match Value::coerce(raw, &column.kind) {
        Ok(Value::Null) => None,
        Ok(value) => Some(value),
        Err(reason) => {
            tracing::trace!(column = %column.column, reason = %reason, "Unreadable value treated as null");
            None
        }
    }
}

/// Array columns read as their elements; null and missing arrays are empty.
fn read_list(scope: &Scope<'_>, column: &ColumnRef) -> Vec<Value> {
    match read(scope, column) {
        Some(Value::List(items)) => items,
        Some(single) => vec![single],
        None => Vec::new(),
    }
}

fn compare(actual: &Value, op: CmpOp, expected: &Value) -> bool {
    let Some(ordering) = actual.compare(expected) else {
        // Incomparable variants can still be (un)equal, e.g. JSON documents.
        return match op {
            CmpOp::Eq => actual == expected,
            CmpOp::Neq => actual != expected,
            _ => false,
        };
    };
    match op {
        CmpOp::Eq => ordering == Ordering::Equal,
        CmpOp::Neq => ordering != Ordering::Equal,
        CmpOp::Gt => ordering == Ordering::Greater,
        CmpOp::Gte => ordering != Ordering::Less,
        CmpOp::Lt => ordering == Ordering::Less,
        CmpOp::Lte => ordering != Ordering::Greater,
    }
}

fn now(kind: &ScalarKind) -> Value {
    let now = Utc::now();
    match kind {
        ScalarKind::Date => Value::Date(now.date_naive()),
        _ => Value::DateTime(now),
    }
}

/// Case-insensitive normalized Levenshtein similarity in `0.0..=1.0`.
fn similarity(a: &str, b: &str) -> f64 {
    normalized_levenshtein(&a.trim().to_lowercase(), &b.trim().to_lowercase())
}

/// Anchored regex equivalent of a LIKE pattern.
fn like_to_regex(pattern: &str, case_insensitive: bool) -> String {
    let mut out = String::from(if case_insensitive { "(?is)^" } else { "(?s)^" });
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push_str(&regex::escape(&escaped.to_string()));
                }
            }
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}

fn sort_keys(query: &Query, record: &RawValue) -> Vec<Option<Value>> {
    let scope = Scope {
        root: record,
        aliases: joined_records(query, record),
    };
    query
        .order_by()
        .iter()
        .map(|clause| match &clause.expr {
            OrderExpr::Column(column) => read(&scope, column),
            OrderExpr::Priority { column, values } => {
                let rank = read(&scope, column)
                    .and_then(|actual| values.iter().position(|v| actual.loosely_equals(v)))
                    .unwrap_or(values.len());
                Some(Value::Int(rank as i64))
            }
            OrderExpr::Distance { column, center } => match read(&scope, column) {
                Some(Value::GeoPoint(point)) => Some(Value::Float(point.distance_km(center))),
                _ => None,
            },
        })
        .collect()
}

fn compare_keys(clauses: &[OrderClause], a: &[Option<Value>], b: &[Option<Value>]) -> Ordering {
    for (i, clause) in clauses.iter().enumerate() {
        let descending = clause.direction.is_descending();
        // Nulls sort as the largest value unless placed explicitly.
        let nulls_first = match clause.direction.nulls() {
            Some(NullsOrder::First) => true,
            Some(NullsOrder::Last) => false,
            None => descending,
        };
        let ordering = match (&a[i], &b[i]) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => {
                if nulls_first {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            (Some(_), None) => {
                if nulls_first {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            (Some(x), Some(y)) => {
                let ordering = x.compare(y).unwrap_or(Ordering::Equal);
                if descending { ordering.reverse() } else { ordering }
            }
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}
