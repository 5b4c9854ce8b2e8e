//! SQL rendering for relational adapters
//!
//! Turns a compiled [`Query`] into parameterized SQL for one dialect. Every
//! literal is bound as a parameter; identifiers come from the schema and are
//! always quoted.

use crate::query::{
    ArrayEncoding, ArrayPredicate, Binding, ColumnRef, Expr, Join, Link, NullsOrder, OrderClause, OrderExpr,
    Query, SubQuery,
};
use crate::schema::ScalarKind;
use crate::value::{GeoPoint, Value};

/// SQL flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Postgres,
    MySql,
    Sqlite,
    MsSql,
}

impl Dialect {
    fn quote(self, ident: &str) -> String {
        match self {
            Self::Postgres | Self::Sqlite => format!("\"{}\"", ident.replace('"', "\"\"")),
            Self::MySql => format!("`{}`", ident.replace('`', "``")),
            Self::MsSql => format!("[{}]", ident.replace(']', "]]")),
        }
    }

    fn placeholder(self, index: usize) -> String {
        match self {
            Self::Postgres => format!("${index}"),
            Self::Sqlite => format!("?{index}"),
            Self::MySql => "?".to_string(),
            Self::MsSql => format!("@p{index}"),
        }
    }

    fn supports_nulls_order(self) -> bool {
        matches!(self, Self::Postgres | Self::Sqlite)
    }
}

/// SQL text plus its bound parameters, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Renders queries for one dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlRenderer {
    dialect: Dialect,
}

impl SqlRenderer {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// `SELECT root.* FROM root [joins] [WHERE ..] [ORDER BY ..] [LIMIT ..]`
    pub fn select(&self, query: &Query) -> SqlStatement {
        let mut w = Writer::new(self.dialect, query.source());
        let root = w.quote(query.source());
        w.push(&format!("SELECT {root}.* FROM {root}"));
        for join in query.joins() {
            w.join(join);
        }
        w.where_clause(query.predicates());
        w.order_by(query.order_by());
        w.pagination(query);
        w.finish("select")
    }

    /// `SELECT COUNT(*)` over the filtered rows. Joins and ordering are dropped.
    pub fn count(&self, query: &Query) -> SqlStatement {
        let mut w = Writer::new(self.dialect, query.source());
        let root = w.quote(query.source());
        w.push(&format!("SELECT COUNT(*) FROM {root}"));
        w.where_clause(query.predicates());
        w.finish("count")
    }

    /// Single boolean row telling whether any row matches.
    pub fn exists(&self, query: &Query) -> SqlStatement {
        let mut w = Writer::new(self.dialect, query.source());
        let root = w.quote(query.source());
        let open = match self.dialect {
            Dialect::MsSql => "SELECT CASE WHEN EXISTS (",
            _ => "SELECT EXISTS (",
        };
        w.push(open);
        w.push(&format!("SELECT 1 FROM {root}"));
        w.where_clause(query.predicates());
        w.push(match self.dialect {
            Dialect::MsSql => ") THEN 1 ELSE 0 END",
            _ => ")",
        });
        w.finish("exists")
    }

    /// Just the WHERE condition, for callers assembling their own statements.
    pub fn condition(&self, query: &Query) -> SqlStatement {
        let mut w = Writer::new(self.dialect, query.source());
        w.expr(&query.predicate());
        w.finish("condition")
    }
}

struct Writer<'q> {
    dialect: Dialect,
    root: &'q str,
    sql: String,
    params: Vec<Value>,
}

impl<'q> Writer<'q> {
    fn new(dialect: Dialect, root: &'q str) -> Self {
        Self {
            dialect,
            root,
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn finish(self, kind: &str) -> SqlStatement {
        tracing::debug!(
            dialect = ?self.dialect,
            kind,
            sql = %self.sql,
            params = self.params.len(),
            "Rendered SQL"
        );
        SqlStatement {
            sql: self.sql,
            params: self.params,
        }
    }

    fn push(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    fn quote(&self, ident: &str) -> String {
        self.dialect.quote(ident)
    }

    fn param(&mut self, value: Value) {
        self.params.push(value);
        let placeholder = self.dialect.placeholder(self.params.len());
        self.push(&placeholder);
    }

    fn params(&mut self, values: &[Value]) {
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.param(value.clone());
        }
    }

    /// JSON text parameter for JSON-document functions.
    fn json_param(&mut self, value: serde_json::Value) {
        self.param(Value::String(value.to_string()));
    }

    fn qualifier(&self, binding: &Binding) -> String {
        match binding {
            Binding::Root => self.quote(self.root),
            Binding::Alias(alias) => self.quote(alias),
        }
    }

    fn qualified(&self, binding: &Binding, column: &str) -> String {
        format!("{}.{}", self.qualifier(binding), self.quote(column))
    }

    fn column(&mut self, column: &ColumnRef) {
        let rendered = self.qualified(&column.binding, &column.column);
        self.push(&rendered);
    }

    fn where_clause(&mut self, predicates: &[Expr]) {
        if predicates.is_empty() {
            return;
        }
        self.push(" WHERE ");
        self.conjunction(predicates);
    }

    fn conjunction(&mut self, predicates: &[Expr]) {
        for (i, expr) in predicates.iter().enumerate() {
            if i > 0 {
                self.push(" AND ");
            }
            self.expr(expr);
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Bool(true) => self.push("1 = 1"),
            Expr::Bool(false) => self.push("1 = 0"),
            Expr::Compare { column, op, value } => {
                self.column(column);
                self.push(&format!(" {} ", op.as_sql()));
                self.param(value.clone());
            }
            Expr::InList {
                column,
                values,
                negated,
            } => {
                self.column(column);
                self.push(if *negated { " NOT IN (" } else { " IN (" });
                self.params(values);
                self.push(")");
            }
            Expr::IsNull { column, negated } => {
                self.column(column);
                self.push(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Expr::Like {
                column,
                pattern,
                case_insensitive,
            } => self.like(column, pattern, *case_insensitive),
            Expr::Similar {
                column,
                value,
                threshold,
            } => self.similar(column, value, *threshold),
            Expr::CompareNow { column, op } => {
                self.column(column);
                self.push(&format!(" {} ", op.as_sql()));
                let now = self.now(&column.kind);
                self.push(now);
            }
            Expr::WithinDistance {
                column,
                center,
                distance_km,
            } => self.within_distance(column, center, *distance_km),
            Expr::Array {
                column,
                predicate,
                values,
                encoding,
            } => self.array(column, *predicate, values, *encoding),
            Expr::ArrayEmpty {
                column,
                encoding,
                negated,
            } => self.array_empty(column, *encoding, *negated),
            Expr::JsonHasKey { column, key } => self.json_has_key(column, key),
            Expr::And(children) => self.group(children, " AND ", "1 = 1"),
            Expr::Or(children) => self.group(children, " OR ", "1 = 0"),
            Expr::Not(inner) => {
                self.push("NOT (");
                self.expr(inner);
                self.push(")");
            }
            Expr::Exists { subquery, negated } => self.exists(subquery, *negated),
        }
    }

    fn group(&mut self, children: &[Expr], separator: &str, identity: &str) {
        if children.is_empty() {
            self.push(identity);
            return;
        }
        self.push("(");
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                self.push(separator);
            }
            self.expr(child);
        }
        self.push(")");
    }

    fn unsupported(&mut self, what: &str) {
        tracing::warn!(dialect = ?self.dialect, what, "No SQL form for predicate, matching nothing");
        self.push("1 = 0");
    }

    fn like(&mut self, column: &ColumnRef, raw_pattern: &str, case_insensitive: bool) {
        let pattern = Value::String(raw_pattern.to_string());
        match (self.dialect, case_insensitive) {
            (Dialect::Postgres, ci) => {
                self.column(column);
                self.push(if ci { " ILIKE " } else { " LIKE " });
                self.param(pattern);
            }
            (Dialect::MySql, false) => {
                self.column(column);
                self.push(" LIKE ");
                self.param(pattern);
                self.push(" COLLATE utf8mb4_bin");
            }
            // SQLite LIKE already ignores ASCII case; GLOB is the case-sensitive form.
            (Dialect::Sqlite, false) => {
                self.column(column);
                self.push(" GLOB ");
                self.param(Value::String(like_to_glob(raw_pattern)));
            }
            (Dialect::Sqlite, true) => {
                self.column(column);
                self.push(" LIKE ");
                self.param(pattern);
                self.push(" ESCAPE '\\'");
            }
            (Dialect::MsSql, false) => {
                self.column(column);
                self.push(" LIKE ");
                self.param(pattern);
                self.push(" ESCAPE '\\'");
            }
            (Dialect::MySql | Dialect::MsSql, true) => {
                self.push("LOWER(");
                self.column(column);
                self.push(") LIKE LOWER(");
                self.param(pattern);
                self.push(")");
                if self.dialect == Dialect::MsSql {
                    self.push(" ESCAPE '\\'");
                }
            }
        }
    }

    fn similar(&mut self, column: &ColumnRef, value: &str, threshold: f64) {
        if self.dialect != Dialect::Postgres {
            return self.unsupported("similarity");
        }
        // pg_trgm
        self.push("similarity(");
        self.column(column);
        self.push(", ");
        self.param(Value::String(value.to_string()));
        self.push(") >= ");
        self.param(Value::Float(threshold));
    }

    fn now(&self, kind: &ScalarKind) -> &'static str {
        let date_only = matches!(kind, ScalarKind::Date);
        match (self.dialect, date_only) {
            (Dialect::Postgres, true) => "CURRENT_DATE",
            (Dialect::Postgres, false) => "now()",
            (Dialect::MySql, true) => "UTC_DATE()",
            (Dialect::MySql, false) => "UTC_TIMESTAMP()",
            (Dialect::Sqlite, true) => "date('now')",
            (Dialect::Sqlite, false) => "strftime('%Y-%m-%dT%H:%M:%S', 'now')",
            (Dialect::MsSql, true) => "CAST(SYSUTCDATETIME() AS date)",
            (Dialect::MsSql, false) => "SYSUTCDATETIME()",
        }
    }

    /// Geodesic distance expression in metres between `column` and `center`.
    fn distance(&mut self, column: &ColumnRef, center: &GeoPoint) -> bool {
        match self.dialect {
            Dialect::Postgres => {
                self.push("ST_Distance(");
                self.column(column);
                self.push("::geography, ST_SetSRID(ST_MakePoint(");
                self.param(Value::Float(center.lon));
                self.push(", ");
                self.param(Value::Float(center.lat));
                self.push("), 4326)::geography)");
            }
            Dialect::MySql => {
                self.push("ST_Distance_Sphere(");
                self.column(column);
                self.push(", POINT(");
                self.param(Value::Float(center.lon));
                self.push(", ");
                self.param(Value::Float(center.lat));
                self.push("))");
            }
            Dialect::MsSql => {
                self.column(column);
                self.push(".STDistance(geography::Point(");
                self.param(Value::Float(center.lat));
                self.push(", ");
                self.param(Value::Float(center.lon));
                self.push(", 4326))");
            }
            Dialect::Sqlite => return false,
        }
        true
    }

    fn within_distance(&mut self, column: &ColumnRef, center: &GeoPoint, distance_km: f64) {
        if self.dialect == Dialect::Postgres {
            // ST_DWithin can use a spatial index, ST_Distance cannot.
            self.push("ST_DWithin(");
            self.column(column);
            self.push("::geography, ST_SetSRID(ST_MakePoint(");
            self.param(Value::Float(center.lon));
            self.push(", ");
            self.param(Value::Float(center.lat));
            self.push("), 4326)::geography, ");
            self.param(Value::Float(distance_km * 1000.0));
            self.push(")");
            return;
        }
        if !self.distance(column, center) {
            return self.unsupported("distance");
        }
        self.push(" <= ");
        self.param(Value::Float(distance_km * 1000.0));
    }

    fn array(&mut self, column: &ColumnRef, predicate: ArrayPredicate, values: &[Value], encoding: ArrayEncoding) {
        match (self.dialect, encoding) {
            (Dialect::Postgres, ArrayEncoding::Native) => self.native_array(column, predicate, values),
            (Dialect::MySql, ArrayEncoding::JsonDocument) => self.mysql_json_array(column, predicate, values),
            (Dialect::Sqlite, ArrayEncoding::JsonDocument) => self.sqlite_json_array(column, predicate, values),
            _ => self.unsupported("array predicate"),
        }
    }

    fn native_array(&mut self, column: &ColumnRef, predicate: ArrayPredicate, values: &[Value]) {
        match predicate {
            ArrayPredicate::Includes | ArrayPredicate::Excludes => {
                let negated = predicate == ArrayPredicate::Excludes;
                if negated {
                    self.push("NOT (");
                }
                if let Some(value) = values.first() {
                    self.param(value.clone());
                }
                self.push(" = ANY(");
                self.column(column);
                self.push(")");
                if negated {
                    self.push(")");
                }
            }
            ArrayPredicate::IncludesAll | ArrayPredicate::IncludesAny => {
                self.column(column);
                self.push(if predicate == ArrayPredicate::IncludesAll {
                    " @> "
                } else {
                    " && "
                });
                self.param(Value::List(values.to_vec()));
            }
        }
    }

    fn mysql_json_array(&mut self, column: &ColumnRef, predicate: ArrayPredicate, values: &[Value]) {
        let (prefix, function, candidate) = match predicate {
            ArrayPredicate::Includes => ("", "JSON_CONTAINS", first_json(values)),
            ArrayPredicate::Excludes => ("NOT ", "JSON_CONTAINS", first_json(values)),
            ArrayPredicate::IncludesAll => ("", "JSON_CONTAINS", list_json(values)),
            ArrayPredicate::IncludesAny => ("", "JSON_OVERLAPS", list_json(values)),
        };
        self.push(&format!("{prefix}{function}("));
        self.column(column);
        self.push(", ");
        self.json_param(candidate);
        self.push(")");
    }

    fn sqlite_json_array(&mut self, column: &ColumnRef, predicate: ArrayPredicate, values: &[Value]) {
        match predicate {
            ArrayPredicate::Includes | ArrayPredicate::Excludes | ArrayPredicate::IncludesAny => {
                if predicate == ArrayPredicate::Excludes {
                    self.push("NOT ");
                }
                self.push("EXISTS (SELECT 1 FROM json_each(");
                self.column(column);
                self.push(") WHERE json_each.value IN (");
                self.params(values);
                self.push("))");
            }
            ArrayPredicate::IncludesAll => {
                let distinct = distinct(values);
                self.push("(SELECT COUNT(DISTINCT json_each.value) FROM json_each(");
                self.column(column);
                self.push(") WHERE json_each.value IN (");
                self.params(&distinct);
                self.push(&format!(")) = {}", distinct.len()));
            }
        }
    }

    fn array_empty(&mut self, column: &ColumnRef, encoding: ArrayEncoding, negated: bool) {
        let length = match (self.dialect, encoding) {
            (Dialect::Postgres, ArrayEncoding::Native) => "cardinality",
            (Dialect::MySql, ArrayEncoding::JsonDocument) => "JSON_LENGTH",
            (Dialect::Sqlite, ArrayEncoding::JsonDocument) => "json_array_length",
            _ => return self.unsupported("array length"),
        };
        self.push(&format!("COALESCE({length}("));
        self.column(column);
        self.push(if negated { "), 0) > 0" } else { "), 0) = 0" });
    }

    fn json_has_key(&mut self, column: &ColumnRef, key: &str) {
        let key = Value::String(key.to_string());
        match self.dialect {
            Dialect::Postgres => {
                self.push("jsonb_exists(");
                self.column(column);
                self.push(", ");
                self.param(key);
                self.push(")");
            }
            Dialect::MySql => {
                self.push("JSON_CONTAINS_PATH(");
                self.column(column);
                self.push(", 'one', CONCAT('$.', ");
                self.param(key);
                self.push("))");
            }
            Dialect::Sqlite => {
                self.push("json_type(");
                self.column(column);
                self.push(", '$.' || ");
                self.param(key);
                self.push(") IS NOT NULL");
            }
            Dialect::MsSql => {
                self.push("JSON_PATH_EXISTS(");
                self.column(column);
                self.push(", CONCAT('$.', ");
                self.param(key);
                self.push(")) = 1");
            }
        }
    }

    fn exists(&mut self, subquery: &SubQuery, negated: bool) {
        let alias = Binding::Alias(subquery.alias.clone());
        let link = &subquery.link;

        let from = format!(
            "SELECT 1 FROM {} AS {}",
            self.quote(&subquery.source),
            self.quote(&subquery.alias)
        );
        self.push(if negated { "NOT EXISTS (" } else { "EXISTS (" });
        self.push(&from);

        let correlation = match &link.through {
            Some(through) => {
                let through_alias = Binding::Alias(through.alias.clone());
                let inner_join = format!(
                    " INNER JOIN {} AS {} ON {} = {}",
                    self.quote(&through.table),
                    self.quote(&through.alias),
                    self.qualified(&through_alias, &through.destination_key),
                    self.qualified(&alias, &link.destination_key),
                );
                self.push(&inner_join);
                format!(
                    "{} = {}",
                    self.qualified(&through_alias, &through.source_key),
                    self.qualified(&link.parent, &link.source_key),
                )
            }
            None => format!(
                "{} = {}",
                self.qualified(&alias, &link.destination_key),
                self.qualified(&link.parent, &link.source_key),
            ),
        };

        self.push(" WHERE ");
        self.push(&correlation);
        for predicate in &subquery.predicates {
            self.push(" AND ");
            self.expr(predicate);
        }
        self.push(")");
    }

    fn join(&mut self, join: &Join) {
        let alias = Binding::Alias(join.alias.clone());
        let Link {
            parent,
            source_key,
            destination_key,
            through,
        } = &join.link;

        let clause = match through {
            Some(through) => {
                let through_alias = Binding::Alias(through.alias.clone());
                format!(
                    " LEFT JOIN {} AS {} ON {} = {} LEFT JOIN {} AS {} ON {} = {}",
                    self.quote(&through.table),
                    self.quote(&through.alias),
                    self.qualified(&through_alias, &through.source_key),
                    self.qualified(parent, source_key),
                    self.quote(&join.source),
                    self.quote(&join.alias),
                    self.qualified(&alias, destination_key),
                    self.qualified(&through_alias, &through.destination_key),
                )
            }
            None => format!(
                " LEFT JOIN {} AS {} ON {} = {}",
                self.quote(&join.source),
                self.quote(&join.alias),
                self.qualified(&alias, destination_key),
                self.qualified(parent, source_key),
            ),
        };
        self.push(&clause);
    }

    fn order_by(&mut self, clauses: &[OrderClause]) {
        if clauses.is_empty() {
            return;
        }
        self.push(" ORDER BY ");
        for (i, clause) in clauses.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.order_expr(&clause.expr);
            self.push(if clause.direction.is_descending() { " DESC" } else { " ASC" });
            match clause.direction.nulls() {
                Some(nulls) if self.dialect.supports_nulls_order() => self.push(match nulls {
                    NullsOrder::First => " NULLS FIRST",
                    NullsOrder::Last => " NULLS LAST",
                }),
                Some(_) => {
                    tracing::warn!(dialect = ?self.dialect, "Dialect cannot place nulls, using default placement")
                }
                None => {}
            }
        }
    }

    fn order_expr(&mut self, expr: &OrderExpr) {
        match expr {
            OrderExpr::Column(column) => self.column(column),
            OrderExpr::Priority { column, values } => {
                self.push("CASE");
                for (rank, value) in values.iter().enumerate() {
                    self.push(" WHEN ");
                    self.column(column);
                    self.push(" = ");
                    self.param(value.clone());
                    self.push(&format!(" THEN {rank}"));
                }
                self.push(&format!(" ELSE {} END", values.len()));
            }
            OrderExpr::Distance { column, center } => {
                if !self.distance(column, center) {
                    tracing::warn!(dialect = ?self.dialect, "No distance function, ordering by column");
                    self.column(column);
                }
            }
        }
    }

    fn pagination(&mut self, query: &Query) {
        let (limit, offset) = (query.limit(), query.offset());
        match self.dialect {
            Dialect::MsSql => {
                if limit.is_none() && offset.is_none() {
                    return;
                }
                if query.order_by().is_empty() {
                    self.push(" ORDER BY (SELECT NULL)");
                }
                self.push(&format!(" OFFSET {} ROWS", offset.unwrap_or(0)));
                if let Some(limit) = limit {
                    self.push(&format!(" FETCH NEXT {limit} ROWS ONLY"));
                }
            }
            _ => {
                match (limit, offset) {
                    (Some(limit), _) => self.push(&format!(" LIMIT {limit}")),
                    (None, Some(_)) => match self.dialect {
                        Dialect::Sqlite => self.push(" LIMIT -1"),
                        Dialect::MySql => self.push(&format!(" LIMIT {}", u64::MAX)),
                        _ => {}
                    },
                    (None, None) => {}
                }
                if let Some(offset) = offset {
                    self.push(&format!(" OFFSET {offset}"));
                }
            }
        }
    }
}

fn first_json(values: &[Value]) -> serde_json::Value {
    values.first().map(Value::to_json).unwrap_or(serde_json::Value::Null)
}

fn list_json(values: &[Value]) -> serde_json::Value {
    serde_json::Value::Array(values.iter().map(Value::to_json).collect())
}

fn distinct(values: &[Value]) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::with_capacity(values.len());
    for value in values {
        if !out.iter().any(|v| v.loosely_equals(value)) {
            out.push(value.clone());
        }
    }
    out
}

/// Convert a LIKE pattern (`%`, `_`, `\` escape) to a GLOB pattern.
fn like_to_glob(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    push_glob_literal(&mut out, escaped);
                }
            }
            '%' => out.push('*'),
            '_' => out.push('?'),
            other => push_glob_literal(&mut out, other),
        }
    }
    out
}

fn push_glob_literal(out: &mut String, c: char) {
    match c {
        '*' | '?' | '[' => {
            out.push('[');
            out.push(c);
            out.push(']');
        }
        other => out.push(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{CmpOp, OrderDirection, ThroughJoin};
    use crate::schema::{ScalarKind, SchemaDescriptor};
    use pretty_assertions::assert_eq;

    fn users() -> Query {
        let schema = SchemaDescriptor::builder("user")
            .source("users")
            .field("name", ScalarKind::String)
            .build()
            .unwrap();
        Query::new(&schema)
    }

    fn name() -> ColumnRef {
        ColumnRef::new(Binding::Root, "name", ScalarKind::String)
    }

    fn name_eq(value: &str) -> Expr {
        Expr::Compare {
            column: name(),
            op: CmpOp::Eq,
            value: Value::String(value.to_string()),
        }
    }

    #[test]
    fn test_placeholders_per_dialect() {
        let mut query = users();
        query.filter(name_eq("Alice"));
        query.filter(Expr::InList {
            column: name(),
            values: vec![Value::String("a".into()), Value::String("b".into())],
            negated: false,
        });

        let pg = SqlRenderer::new(Dialect::Postgres).select(&query);
        assert_eq!(
            pg.sql,
            r#"SELECT "users".* FROM "users" WHERE "users"."name" = $1 AND "users"."name" IN ($2, $3)"#
        );
        assert_eq!(pg.params.len(), 3);

        let mysql = SqlRenderer::new(Dialect::MySql).select(&query);
        assert_eq!(
            mysql.sql,
            "SELECT `users`.* FROM `users` WHERE `users`.`name` = ? AND `users`.`name` IN (?, ?)"
        );

        let mssql = SqlRenderer::new(Dialect::MsSql).count(&query);
        assert_eq!(
            mssql.sql,
            "SELECT COUNT(*) FROM [users] WHERE [users].[name] = @p1 AND [users].[name] IN (@p2, @p3)"
        );
    }

    #[test]
    fn test_not_exists_through_join_table() {
        let mut query = users();
        query.filter(Expr::Exists {
            subquery: Box::new(SubQuery {
                relationship: "groups".to_string(),
                source: "groups".to_string(),
                alias: "groups_0".to_string(),
                link: Link {
                    parent: Binding::Root,
                    source_key: "id".to_string(),
                    destination_key: "id".to_string(),
                    through: Some(ThroughJoin {
                        table: "memberships".to_string(),
                        alias: "groups_0_through".to_string(),
                        source_key: "user_id".to_string(),
                        destination_key: "group_id".to_string(),
                    }),
                },
                predicates: vec![],
            }),
            negated: true,
        });

        let stmt = SqlRenderer::new(Dialect::Sqlite).condition(&query);
        assert_eq!(
            stmt.sql,
            concat!(
                r#"NOT EXISTS (SELECT 1 FROM "groups" AS "groups_0" "#,
                r#"INNER JOIN "memberships" AS "groups_0_through" ON "groups_0_through"."group_id" = "groups_0"."id" "#,
                r#"WHERE "groups_0_through"."user_id" = "users"."id")"#
            )
        );
    }

    #[test]
    fn test_or_and_empty_groups() {
        let mut query = users();
        query.filter(Expr::Or(vec![name_eq("a"), name_eq("b")]));
        let stmt = SqlRenderer::new(Dialect::Postgres).condition(&query);
        assert_eq!(stmt.sql, r#"("users"."name" = $1 OR "users"."name" = $2)"#);

        let empty = SqlRenderer::new(Dialect::Postgres).condition(&users());
        assert_eq!(empty.sql, "1 = 1");
    }

    #[test]
    fn test_order_and_pagination() {
        let mut query = users().with_limit(10).with_offset(20);
        query.push_order(OrderClause {
            direction: OrderDirection::DescNullsLast,
            expr: OrderExpr::Column(name()),
        });

        let pg = SqlRenderer::new(Dialect::Postgres).select(&query);
        assert_eq!(
            pg.sql,
            r#"SELECT "users".* FROM "users" ORDER BY "users"."name" DESC NULLS LAST LIMIT 10 OFFSET 20"#
        );

        let mssql = SqlRenderer::new(Dialect::MsSql).select(&users().with_limit(5));
        assert_eq!(
            mssql.sql,
            "SELECT [users].* FROM [users] ORDER BY (SELECT NULL) OFFSET 0 ROWS FETCH NEXT 5 ROWS ONLY"
        );
    }

    #[test]
    fn test_priority_order_binds_values() {
        let mut query = users();
        query.push_order(OrderClause {
            direction: OrderDirection::Asc,
            expr: OrderExpr::Priority {
                column: name(),
                values: vec![Value::String("gold".into()), Value::String("silver".into())],
            },
        });
        let stmt = SqlRenderer::new(Dialect::MySql).select(&query);
        assert!(stmt.sql.ends_with(
            "ORDER BY CASE WHEN `users`.`name` = ? THEN 0 WHEN `users`.`name` = ? THEN 1 ELSE 2 END ASC"
        ));
        assert_eq!(stmt.params.len(), 2);
    }

    #[test]
    fn test_like_variants() {
        let mut query = users();
        query.filter(Expr::Like {
            column: name(),
            pattern: "A\\_%".to_string(),
            case_insensitive: false,
        });
        let stmt = SqlRenderer::new(Dialect::Sqlite).condition(&query);
        assert_eq!(stmt.sql, r#""users"."name" GLOB ?1"#);
        assert_eq!(stmt.params, vec![Value::String("A_*".to_string())]);

        assert_eq!(like_to_glob("50\\%*"), "50%[*]");
    }

    #[test]
    fn test_json_arrays() {
        let tags = ColumnRef::new(Binding::Root, "tags", ScalarKind::array_of(ScalarKind::String));
        let mut query = users();
        query.filter(Expr::Array {
            column: tags.clone(),
            predicate: ArrayPredicate::Includes,
            values: vec![Value::String("admin".into())],
            encoding: ArrayEncoding::JsonDocument,
        });

        let mysql = SqlRenderer::new(Dialect::MySql).condition(&query);
        assert_eq!(mysql.sql, "JSON_CONTAINS(`users`.`tags`, ?)");
        assert_eq!(mysql.params, vec![Value::String("\"admin\"".to_string())]);

        let sqlite = SqlRenderer::new(Dialect::Sqlite).condition(&query);
        assert_eq!(
            sqlite.sql,
            r#"EXISTS (SELECT 1 FROM json_each("users"."tags") WHERE json_each.value IN (?1))"#
        );
    }

    #[test]
    fn test_quoting_escapes() {
        assert_eq!(Dialect::Postgres.quote("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(Dialect::MsSql.quote("a]b"), "[a]]b]");
    }
}
