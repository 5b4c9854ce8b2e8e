//! Search engine request rendering
//!
//! Produces an Elasticsearch/OpenSearch style request body. Related entities
//! are expected to be indexed as nested documents under the relationship name,
//! so correlated existence checks become `nested` queries.

use std::collections::HashMap;

use serde_json::{Map, json};

use crate::query::{
    ArrayPredicate, Binding, CmpOp, ColumnRef, Expr, NullsOrder, OrderClause, OrderExpr, Query, SubQuery,
};
use crate::schema::ScalarKind;
use crate::value::{RawValue, Value};

/// Painless script ranking a field's value by its position in `params.values`.
const PRIORITY_SCRIPT: &str = "def f = params.field; \
if (doc[f].size() == 0) { return params.values.size(); } \
int i = params.values.indexOf(doc[f].value); \
return i < 0 ? params.values.size() : i;";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchRenderer;

impl SearchRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Full request body: query, sort and paging.
    pub fn body(&self, query: &Query) -> RawValue {
        let mut paths = Paths::for_query(query);
        let mut body = Map::new();
        body.insert("query".to_string(), paths.conjunction(query.predicates()));

        let sort: Vec<RawValue> = query.order_by().iter().map(|c| paths.sort(c)).collect();
        if !sort.is_empty() {
            body.insert("sort".to_string(), RawValue::Array(sort));
        }
        if let Some(limit) = query.limit() {
            body.insert("size".to_string(), json!(limit));
        }
        if let Some(offset) = query.offset() {
            body.insert("from".to_string(), json!(offset));
        }

        let body = RawValue::Object(body);
        tracing::debug!(entity = query.entity(), body = %body, "Rendered search request");
        body
    }

    /// Only the `query` clause.
    pub fn query_clause(&self, query: &Query) -> RawValue {
        Paths::for_query(query).conjunction(query.predicates())
    }
}

/// Maps aliases to dotted document paths.
struct Paths {
    aliases: HashMap<String, String>,
}

impl Paths {
    fn for_query(query: &Query) -> Self {
        let aliases = query
            .joins()
            .iter()
            .map(|join| (join.alias.clone(), join.path.join(".")))
            .collect();
        Self { aliases }
    }

    fn prefix(&self, binding: &Binding) -> Option<&str> {
        match binding {
            Binding::Root => None,
            Binding::Alias(alias) => self.aliases.get(alias).map(String::as_str),
        }
    }

    fn field(&self, column: &ColumnRef) -> String {
        match self.prefix(&column.binding) {
            Some(prefix) => format!("{prefix}.{}", column.column),
            None => column.column.clone(),
        }
    }

    fn conjunction(&mut self, predicates: &[Expr]) -> RawValue {
        match predicates {
            [] => json!({ "match_all": {} }),
            [single] => self.clause(single),
            many => {
                let filters: Vec<RawValue> = many.iter().map(|p| self.clause(p)).collect();
                json!({ "bool": { "filter": filters } })
            }
        }
    }

    fn clause(&mut self, expr: &Expr) -> RawValue {
        match expr {
            Expr::Bool(true) => json!({ "match_all": {} }),
            Expr::Bool(false) => json!({ "match_none": {} }),
            Expr::Compare { column, op, value } => {
                let field = self.field(column);
                let value = value.to_json();
                match op {
                    CmpOp::Eq => term(&field, value),
                    CmpOp::Neq => not(term(&field, value)),
                    CmpOp::Gt => range(&field, "gt", value),
                    CmpOp::Gte => range(&field, "gte", value),
                    CmpOp::Lt => range(&field, "lt", value),
                    CmpOp::Lte => range(&field, "lte", value),
                }
            }
            Expr::InList {
                column,
                values,
                negated,
            } => {
                let terms = terms(&self.field(column), values);
                if *negated { not(terms) } else { terms }
            }
            Expr::IsNull { column, negated } => {
                let exists = json!({ "exists": { "field": self.field(column) } });
                if *negated { exists } else { not(exists) }
            }
            Expr::Like {
                column,
                pattern,
                case_insensitive,
            } => {
                let mut field = Map::new();
                field.insert(
                    self.field(column),
                    json!({ "value": like_to_wildcard(pattern), "case_insensitive": case_insensitive }),
                );
                json!({ "wildcard": field })
            }
            Expr::Similar { column, value, .. } => {
                let mut field = Map::new();
                field.insert(self.field(column), json!({ "query": value, "fuzziness": "AUTO" }));
                json!({ "match": field })
            }
            Expr::CompareNow { column, op } => {
                let now = if matches!(column.kind, ScalarKind::Date) { "now/d" } else { "now" };
                let bound = match op {
                    CmpOp::Gt => "gt",
                    CmpOp::Gte => "gte",
                    CmpOp::Lt => "lt",
                    CmpOp::Lte => "lte",
                    CmpOp::Eq | CmpOp::Neq => "gte",
                };
                range(&self.field(column), bound, json!(now))
            }
            Expr::WithinDistance {
                column,
                center,
                distance_km,
            } => {
                let mut clause = Map::new();
                clause.insert("distance".to_string(), json!(format!("{distance_km}km")));
                clause.insert(self.field(column), json!({ "lat": center.lat, "lon": center.lon }));
                json!({ "geo_distance": clause })
            }
            Expr::Array {
                column,
                predicate,
                values,
                ..
            } => {
                let field = self.field(column);
                let first = values.first().map(Value::to_json).unwrap_or(RawValue::Null);
                match predicate {
                    ArrayPredicate::Includes => term(&field, first),
                    ArrayPredicate::Excludes => not(term(&field, first)),
                    ArrayPredicate::IncludesAny => terms(&field, values),
                    ArrayPredicate::IncludesAll => {
                        let all: Vec<RawValue> = values.iter().map(|v| term(&field, v.to_json())).collect();
                        json!({ "bool": { "filter": all } })
                    }
                }
            }
            Expr::ArrayEmpty { column, negated, .. } => {
                let exists = json!({ "exists": { "field": self.field(column) } });
                if *negated { exists } else { not(exists) }
            }
            Expr::JsonHasKey { column, key } => {
                json!({ "exists": { "field": format!("{}.{key}", self.field(column)) } })
            }
            Expr::And(children) => {
                let filters: Vec<RawValue> = children.iter().map(|c| self.clause(c)).collect();
                json!({ "bool": { "filter": filters } })
            }
            Expr::Or(children) => {
                let should: Vec<RawValue> = children.iter().map(|c| self.clause(c)).collect();
                json!({ "bool": { "should": should, "minimum_should_match": 1 } })
            }
            Expr::Not(inner) => not(self.clause(inner)),
            Expr::Exists { subquery, negated } => {
                let nested = self.nested(subquery);
                if *negated { not(nested) } else { nested }
            }
        }
    }

    fn nested(&mut self, subquery: &SubQuery) -> RawValue {
        let path = match self.prefix(&subquery.link.parent) {
            Some(parent) => format!("{parent}.{}", subquery.relationship),
            None => subquery.relationship.clone(),
        };
        self.aliases.insert(subquery.alias.clone(), path.clone());
        let inner = self.conjunction(&subquery.predicates);
        json!({ "nested": { "path": path, "query": inner } })
    }

    fn sort(&self, clause: &OrderClause) -> RawValue {
        let order = if clause.direction.is_descending() { "desc" } else { "asc" };
        match &clause.expr {
            OrderExpr::Column(column) => {
                let mut options = Map::new();
                options.insert("order".to_string(), json!(order));
                if let Some(nulls) = clause.direction.nulls() {
                    let missing = match nulls {
                        NullsOrder::First => "_first",
                        NullsOrder::Last => "_last",
                    };
                    options.insert("missing".to_string(), json!(missing));
                }
                if let Some(prefix) = self.prefix(&column.binding) {
                    options.insert("nested".to_string(), json!({ "path": prefix }));
                }
                let mut sort = Map::new();
                sort.insert(self.field(column), RawValue::Object(options));
                RawValue::Object(sort)
            }
            OrderExpr::Priority { column, values } => {
                let values: Vec<RawValue> = values.iter().map(Value::to_json).collect();
                json!({
                    "_script": {
                        "type": "number",
                        "order": order,
                        "script": {
                            "lang": "painless",
                            "source": PRIORITY_SCRIPT,
                            "params": { "field": self.field(column), "values": values }
                        }
                    }
                })
            }
            OrderExpr::Distance { column, center } => {
                let mut options = Map::new();
                options.insert(self.field(column), json!({ "lat": center.lat, "lon": center.lon }));
                options.insert("order".to_string(), json!(order));
                options.insert("unit".to_string(), json!("km"));
                json!({ "_geo_distance": options })
            }
        }
    }
}

fn term(field: &str, value: RawValue) -> RawValue {
    let mut clause = Map::new();
    clause.insert(field.to_string(), value);
    json!({ "term": clause })
}

fn terms(field: &str, values: &[Value]) -> RawValue {
    let mut clause = Map::new();
    clause.insert(
        field.to_string(),
        RawValue::Array(values.iter().map(Value::to_json).collect()),
    );
    json!({ "terms": clause })
}

fn range(field: &str, bound: &str, value: RawValue) -> RawValue {
    let mut bounds = Map::new();
    bounds.insert(bound.to_string(), value);
    let mut clause = Map::new();
    clause.insert(field.to_string(), RawValue::Object(bounds));
    json!({ "range": clause })
}

fn not(clause: RawValue) -> RawValue {
    json!({ "bool": { "must_not": [clause] } })
}

/// Convert a LIKE pattern to wildcard syntax (`*`, `?`, `\` escape).
fn like_to_wildcard(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    if matches!(escaped, '*' | '?' | '\\') {
                        out.push('\\');
                    }
                    out.push(escaped);
                }
            }
            '%' => out.push('*'),
            '_' => out.push('?'),
            '*' | '?' => {
                out.push('\\');
                out.push(c);
            }
            other => out.push(other),
        }
    }
    out
}
