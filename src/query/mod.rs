//! Backend-neutral query representation
//!
//! The compilers never talk to a database. They append predicates, joins and
//! order clauses to a [`Query`]; the selected adapter then renders it into
//! backend-native form (SQL text and parameters, a search request body) or
//! executes it directly over in-memory records.

mod expr;

use std::fmt;
use std::str::FromStr;

pub use expr::{ArrayEncoding, ArrayPredicate, Binding, CmpOp, ColumnRef, Expr};

use crate::schema::{Relationship, SchemaDescriptor};
use crate::value::{GeoPoint, Value};

/// Join table hop for many-to-many relationships.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThroughJoin {
    pub table: String,
    pub alias: String,
    /// Join-table column matching the parent's source key.
    pub source_key: String,
    /// Join-table column matching the target's destination key.
    pub destination_key: String,
}

/// How a related relation is tied back to its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub parent: Binding,
    /// Column on the parent side.
    pub source_key: String,
    /// Column on the related side.
    pub destination_key: String,
    pub through: Option<ThroughJoin>,
}

impl Link {
    pub(crate) fn for_relationship(parent: Binding, rel: &Relationship, alias: &str) -> Self {
        Self {
            parent,
            source_key: rel.source_key().to_string(),
            destination_key: rel.destination_key().to_string(),
            through: rel.through.as_ref().map(|jt| ThroughJoin {
                table: jt.table.clone(),
                alias: format!("{alias}_through"),
                source_key: jt.source_key.clone(),
                destination_key: jt.destination_key.clone(),
            }),
        }
    }
}

/// A correlated existence check against a related entity.
#[derive(Debug, Clone, PartialEq)]
pub struct SubQuery {
    /// Relationship name, used as the nested document path by search
    /// backends and as the embedded key by the memory adapter.
    pub relationship: String,
    pub source: String,
    pub alias: String,
    pub link: Link,
    pub predicates: Vec<Expr>,
}

/// A left join added for ordering through a relationship path.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    /// Relationship names from the root entity to the joined relation.
    pub path: Vec<String>,
    pub alias: String,
    pub source: String,
    pub link: Link,
}

/// Whether nulls sort before or after everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NullsOrder {
    First,
    Last,
}

/// Sort direction, including explicit null placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
    AscNullsFirst,
    AscNullsLast,
    DescNullsFirst,
    DescNullsLast,
}

impl OrderDirection {
    pub const ALL: [OrderDirection; 6] = [
        Self::Asc,
        Self::Desc,
        Self::AscNullsFirst,
        Self::AscNullsLast,
        Self::DescNullsFirst,
        Self::DescNullsLast,
    ];

    pub fn is_descending(self) -> bool {
        matches!(self, Self::Desc | Self::DescNullsFirst | Self::DescNullsLast)
    }

    pub fn nulls(self) -> Option<NullsOrder> {
        match self {
            Self::AscNullsFirst | Self::DescNullsFirst => Some(NullsOrder::First),
            Self::AscNullsLast | Self::DescNullsLast => Some(NullsOrder::Last),
            Self::Asc | Self::Desc => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
            Self::AscNullsFirst => "asc_nulls_first",
            Self::AscNullsLast => "asc_nulls_last",
            Self::DescNullsFirst => "desc_nulls_first",
            Self::DescNullsLast => "desc_nulls_last",
        }
    }
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            "asc_nulls_first" => Ok(Self::AscNullsFirst),
            "asc_nulls_last" => Ok(Self::AscNullsLast),
            "desc_nulls_first" => Ok(Self::DescNullsFirst),
            "desc_nulls_last" => Ok(Self::DescNullsLast),
            other => Err(format!("unknown sort direction `{other}`")),
        }
    }
}

/// The value a row is sorted by.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderExpr {
    Column(ColumnRef),
    /// Rank of the column's value within `values`; unlisted values sort last.
    Priority { column: ColumnRef, values: Vec<Value> },
    /// Great-circle distance from `center`.
    Distance { column: ColumnRef, center: GeoPoint },
}

impl OrderExpr {
    pub fn column(&self) -> &ColumnRef {
        match self {
            Self::Column(column)
            | Self::Priority { column, .. }
            | Self::Distance { column, .. } => column,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderClause {
    pub direction: OrderDirection,
    pub expr: OrderExpr,
}

/// A query under construction for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    entity: String,
    source: String,
    predicates: Vec<Expr>,
    joins: Vec<Join>,
    order_by: Vec<OrderClause>,
    limit: Option<u64>,
    offset: Option<u64>,
    alias_counter: usize,
}

impl Query {
    /// Start an unfiltered, unordered query over the schema's entity.
    pub fn new(schema: &SchemaDescriptor) -> Self {
        Self {
            entity: schema.entity().to_string(),
            source: schema.source().to_string(),
            predicates: Vec::new(),
            joins: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            alias_counter: 0,
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn predicates(&self) -> &[Expr] {
        &self.predicates
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn order_by(&self) -> &[OrderClause] {
        &self.order_by
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Append one predicate (implicit AND with the existing ones).
    pub fn filter(&mut self, expr: Expr) {
        match expr {
            Expr::Bool(true) => {}
            Expr::And(children) => self.predicates.extend(children),
            other => self.predicates.push(other),
        }
    }

    /// All predicates combined into one expression.
    pub fn predicate(&self) -> Expr {
        Expr::and(self.predicates.clone())
    }

    /// Add a join unless one with the same alias already exists.
    /// Returns `true` when the join was added.
    pub fn join(&mut self, join: Join) -> bool {
        if self.has_join(&join.alias) {
            return false;
        }
        self.joins.push(join);
        true
    }

    pub fn has_join(&self, alias: &str) -> bool {
        self.joins.iter().any(|j| j.alias == alias)
    }

    pub fn join_for_path(&self, path: &[String]) -> Option<&Join> {
        self.joins.iter().find(|j| j.path == path)
    }

    pub fn push_order(&mut self, clause: OrderClause) {
        self.order_by.push(clause);
    }

    /// A fresh alias for a correlated subquery, unique within this query.
    pub(crate) fn next_alias(&mut self, relationship: &str) -> String {
        let alias = format!("{relationship}_{}", self.alias_counter);
        self.alias_counter += 1;
        alias
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ScalarKind;

    fn query() -> Query {
        let schema = SchemaDescriptor::builder("post")
            .source("posts")
            .field("title", ScalarKind::String)
            .build()
            .unwrap();
        Query::new(&schema)
    }

    #[test]
    fn test_filter_flattens_conjunctions() {
        let mut q = query();
        let title = ColumnRef::new(Binding::Root, "title", ScalarKind::String);
        q.filter(Expr::Bool(true));
        q.filter(Expr::And(vec![
            Expr::IsNull {
                column: title.clone(),
                negated: true,
            },
            Expr::Compare {
                column: title,
                op: CmpOp::Neq,
                value: Value::String(String::new()),
            },
        ]));
        assert_eq!(q.predicates().len(), 2);
    }

    #[test]
    fn test_join_deduplicates_by_alias() {
        let mut q = query();
        let join = Join {
            path: vec!["author".to_string()],
            alias: "author".to_string(),
            source: "users".to_string(),
            link: Link {
                parent: Binding::Root,
                source_key: "author_id".to_string(),
                destination_key: "id".to_string(),
                through: None,
            },
        };
        assert!(q.join(join.clone()));
        assert!(!q.join(join));
        assert_eq!(q.joins().len(), 1);
        assert!(q.join_for_path(&["author".to_string()]).is_some());
    }

    #[test]
    fn test_direction_parsing() {
        assert_eq!("DESC".parse::<OrderDirection>(), Ok(OrderDirection::Desc));
        assert_eq!(
            "asc_nulls_last".parse::<OrderDirection>(),
            Ok(OrderDirection::AscNullsLast)
        );
        assert!("sideways".parse::<OrderDirection>().is_err());
        assert!(OrderDirection::DescNullsFirst.is_descending());
        assert_eq!(OrderDirection::DescNullsFirst.nulls(), Some(NullsOrder::First));
    }

    #[test]
    fn test_aliases_are_unique() {
        let mut q = query();
        assert_eq!(q.next_alias("author"), "author_0");
        assert_eq!(q.next_alias("author"), "author_1");
    }
}
