//! Backend-neutral predicate expressions

use crate::schema::ScalarKind;
use crate::value::{GeoPoint, Value};

use super::SubQuery;

/// Which relation in the query a column is read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Binding {
    /// The entity the query was created for.
    Root,
    /// A joined relation or correlated subquery, by alias.
    Alias(String),
}

impl Binding {
    pub fn alias(alias: impl Into<String>) -> Self {
        Self::Alias(alias.into())
    }
}

/// A column (or document field) together with its scalar kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    pub binding: Binding,
    pub column: String,
    pub kind: ScalarKind,
}

impl ColumnRef {
    pub fn new(binding: Binding, column: impl Into<String>, kind: ScalarKind) -> Self {
        Self {
            binding,
            column: column.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CmpOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Neq => "<>",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }
}

/// Array membership tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayPredicate {
    Includes,
    Excludes,
    IncludesAll,
    IncludesAny,
}

/// How an array-typed column is physically stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayEncoding {
    /// Engine-native array type.
    Native,
    /// Array encoded as a JSON document, queried through JSON functions.
    JsonDocument,
}

/// A predicate over one row of the query.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Bool(bool),
    Compare {
        column: ColumnRef,
        op: CmpOp,
        value: Value,
    },
    InList {
        column: ColumnRef,
        values: Vec<Value>,
        negated: bool,
    },
    IsNull {
        column: ColumnRef,
        negated: bool,
    },
    /// SQL `LIKE` pattern: `%` any run, `_` one character, `\` escapes.
    Like {
        column: ColumnRef,
        pattern: String,
        case_insensitive: bool,
    },
    Similar {
        column: ColumnRef,
        value: String,
        threshold: f64,
    },
    /// Compare a temporal column against the current time.
    CompareNow {
        column: ColumnRef,
        op: CmpOp,
    },
    WithinDistance {
        column: ColumnRef,
        center: GeoPoint,
        distance_km: f64,
    },
    Array {
        column: ColumnRef,
        predicate: ArrayPredicate,
        values: Vec<Value>,
        encoding: ArrayEncoding,
    },
    ArrayEmpty {
        column: ColumnRef,
        encoding: ArrayEncoding,
        negated: bool,
    },
    JsonHasKey {
        column: ColumnRef,
        key: String,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    Exists {
        subquery: Box<SubQuery>,
        negated: bool,
    },
}

impl Expr {
    /// Conjunction, flattening nested `And`s and dropping `true`.
    pub fn and(exprs: Vec<Expr>) -> Expr {
        let mut out = Vec::with_capacity(exprs.len());
        for expr in exprs {
            match expr {
                Expr::Bool(true) => {}
                Expr::Bool(false) => return Expr::Bool(false),
                Expr::And(children) => out.extend(children),
                other => out.push(other),
            }
        }
        match out.len() {
            0 => Expr::Bool(true),
            1 => out.remove(0),
            _ => Expr::And(out),
        }
    }

    /// Disjunction, flattening nested `Or`s and dropping `false`.
    pub fn or(exprs: Vec<Expr>) -> Expr {
        let mut out = Vec::with_capacity(exprs.len());
        for expr in exprs {
            match expr {
                Expr::Bool(false) => {}
                Expr::Bool(true) => return Expr::Bool(true),
                Expr::Or(children) => out.extend(children),
                other => out.push(other),
            }
        }
        match out.len() {
            0 => Expr::Bool(false),
            1 => out.remove(0),
            _ => Expr::Or(out),
        }
    }

    /// Logical negation. Existence checks flip in place so `NOT EXISTS`
    /// is emitted rather than `NOT (EXISTS ...)`.
    pub fn negate(self) -> Expr {
        match self {
            Expr::Bool(b) => Expr::Bool(!b),
            Expr::Not(inner) => *inner,
            Expr::Exists { subquery, negated } => Expr::Exists {
                subquery,
                negated: !negated,
            },
            Expr::IsNull { column, negated } => Expr::IsNull {
                column,
                negated: !negated,
            },
            other => Expr::Not(Box::new(other)),
        }
    }

    pub fn is_exists(&self) -> bool {
        matches!(self, Expr::Exists { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name_eq(value: &str) -> Expr {
        Expr::Compare {
            column: ColumnRef::new(Binding::Root, "name", ScalarKind::String),
            op: CmpOp::Eq,
            value: Value::String(value.to_string()),
        }
    }

    #[test]
    fn test_and_flattens_and_simplifies() {
        assert_eq!(Expr::and(vec![]), Expr::Bool(true));
        assert_eq!(Expr::and(vec![name_eq("a")]), name_eq("a"));
        assert_eq!(
            Expr::and(vec![Expr::And(vec![name_eq("a"), name_eq("b")]), name_eq("c")]),
            Expr::And(vec![name_eq("a"), name_eq("b"), name_eq("c")])
        );
        assert_eq!(
            Expr::and(vec![name_eq("a"), Expr::Bool(false)]),
            Expr::Bool(false)
        );
    }

    #[test]
    fn test_or_simplifies() {
        assert_eq!(Expr::or(vec![]), Expr::Bool(false));
        assert_eq!(Expr::or(vec![Expr::Bool(false), name_eq("a")]), name_eq("a"));
        assert_eq!(Expr::or(vec![name_eq("a"), Expr::Bool(true)]), Expr::Bool(true));
    }

    #[test]
    fn test_negate_double_negation() {
        let expr = name_eq("a");
        assert_eq!(expr.clone().negate().negate(), expr);
        assert_eq!(Expr::Bool(true).negate(), Expr::Bool(false));
    }
}
