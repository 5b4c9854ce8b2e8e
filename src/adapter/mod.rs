//! Backend adapters
//!
//! An adapter describes what one storage backend can do: which operators are
//! valid per field category, which sort directions it accepts, whether it has
//! native arrays, geo ordering and priority ordering. The compilers consult
//! these descriptors before emitting anything, and each adapter knows how to
//! turn a finished [`Query`] into its native form.

pub mod memory;
pub mod search;
pub mod sql;

use std::fmt;
use std::str::FromStr;

use crate::config::CompileOptions;
use crate::error::ValidationError;
use crate::filter::OperatorSymbol;
use crate::query::{ArrayEncoding, Binding, ColumnRef, Expr, OrderDirection, Query};
use crate::scalar::{Operand, Operator, operator_table};
use crate::schema::{Field, FieldCategory, SchemaDescriptor};
use crate::value::RawValue;

pub use sql::{Dialect, SqlRenderer, SqlStatement};

/// Supported backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AdapterId {
    Postgres,
    MySql,
    Sqlite,
    MsSql,
    /// Document search engine (Elasticsearch/OpenSearch query DSL).
    Search,
    /// In-process evaluation over JSON records.
    Memory,
}

impl AdapterId {
    pub const ALL: [AdapterId; 6] = [
        Self::Postgres,
        Self::MySql,
        Self::Sqlite,
        Self::MsSql,
        Self::Search,
        Self::Memory,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
            Self::MsSql => "mssql",
            Self::Search => "search",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for AdapterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdapterId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::MySql),
            "sqlite" => Ok(Self::Sqlite),
            "mssql" | "sqlserver" => Ok(Self::MsSql),
            "search" | "elasticsearch" | "opensearch" => Ok(Self::Search),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown adapter `{other}`")),
        }
    }
}

/// Feature flags for one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Engine has a native array column type.
    pub native_arrays: bool,
    /// Arrays can be queried as JSON documents.
    pub json_arrays: bool,
    /// Largest `_in` list sent as one predicate; longer lists are chunked.
    pub max_in_list: Option<usize>,
    pub geo_ordering: bool,
    pub priority_ordering: bool,
    /// Unsupported operators are errors rather than ignored.
    pub strict: bool,
}

/// Operators accepted per field category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorSupport {
    pub scalar: &'static [Operator],
    pub array: &'static [Operator],
    pub json: &'static [Operator],
}

impl OperatorSupport {
    pub fn for_category(&self, category: FieldCategory) -> &'static [Operator] {
        match category {
            FieldCategory::Scalar => self.scalar,
            FieldCategory::Array => self.array,
            FieldCategory::Json => self.json,
        }
    }
}

const SCALAR_OPERATORS: &[Operator] = &[
    Operator::Eq,
    Operator::Neq,
    Operator::Gt,
    Operator::Gte,
    Operator::Lt,
    Operator::Lte,
    Operator::In,
    Operator::Nin,
    Operator::IsNull,
    Operator::Between,
    Operator::Like,
    Operator::Ilike,
    Operator::Contains,
    Operator::StartsWith,
    Operator::EndsWith,
    Operator::Similar,
    Operator::InPast,
    Operator::InFuture,
    Operator::WithinDistance,
];

const ARRAY_OPERATORS: &[Operator] = &[
    Operator::Includes,
    Operator::Excludes,
    Operator::IncludesAll,
    Operator::IncludesAny,
    Operator::IsEmpty,
    Operator::IsNull,
];

const JSON_OPERATORS: &[Operator] = &[Operator::HasKey, Operator::IsNull];

const FULL_SUPPORT: OperatorSupport = OperatorSupport {
    scalar: SCALAR_OPERATORS,
    array: ARRAY_OPERATORS,
    json: JSON_OPERATORS,
};

const ALL_DIRECTIONS: &[OrderDirection] = &OrderDirection::ALL;
const PLAIN_DIRECTIONS: &[OrderDirection] = &[OrderDirection::Asc, OrderDirection::Desc];

static POSTGRES: Adapter = Adapter {
    id: AdapterId::Postgres,
    capabilities: Capabilities {
        native_arrays: true,
        json_arrays: true,
        max_in_list: Some(1000),
        geo_ordering: true,
        priority_ordering: true,
        strict: false,
    },
    directions: ALL_DIRECTIONS,
    operators: FULL_SUPPORT,
};

static MYSQL: Adapter = Adapter {
    id: AdapterId::MySql,
    capabilities: Capabilities {
        native_arrays: false,
        json_arrays: true,
        max_in_list: Some(1000),
        geo_ordering: true,
        priority_ordering: true,
        strict: false,
    },
    directions: PLAIN_DIRECTIONS,
    operators: FULL_SUPPORT,
};

static SQLITE: Adapter = Adapter {
    id: AdapterId::Sqlite,
    capabilities: Capabilities {
        native_arrays: false,
        json_arrays: true,
        // SQLITE_MAX_VARIABLE_NUMBER on older builds
        max_in_list: Some(999),
        geo_ordering: false,
        priority_ordering: true,
        strict: false,
    },
    directions: ALL_DIRECTIONS,
    operators: FULL_SUPPORT,
};

static MSSQL: Adapter = Adapter {
    id: AdapterId::MsSql,
    capabilities: Capabilities {
        native_arrays: false,
        json_arrays: false,
        // 2100 parameter cap per statement
        max_in_list: Some(2000),
        geo_ordering: true,
        priority_ordering: true,
        strict: false,
    },
    directions: PLAIN_DIRECTIONS,
    operators: OperatorSupport {
        scalar: SCALAR_OPERATORS,
        array: &[Operator::IsNull],
        json: JSON_OPERATORS,
    },
};

static SEARCH: Adapter = Adapter {
    id: AdapterId::Search,
    capabilities: Capabilities {
        native_arrays: true,
        json_arrays: false,
        max_in_list: Some(65_536),
        geo_ordering: true,
        priority_ordering: true,
        strict: false,
    },
    directions: ALL_DIRECTIONS,
    operators: FULL_SUPPORT,
};

static MEMORY: Adapter = Adapter {
    id: AdapterId::Memory,
    capabilities: Capabilities {
        native_arrays: true,
        json_arrays: true,
        max_in_list: None,
        geo_ordering: true,
        priority_ordering: true,
        strict: false,
    },
    directions: ALL_DIRECTIONS,
    operators: FULL_SUPPORT,
};

/// Capability descriptor and renderer entry point for one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adapter {
    id: AdapterId,
    capabilities: Capabilities,
    directions: &'static [OrderDirection],
    operators: OperatorSupport,
}

impl Adapter {
    /// The registered descriptor for a backend.
    pub fn get(id: AdapterId) -> &'static Adapter {
        match id {
            AdapterId::Postgres => &POSTGRES,
            AdapterId::MySql => &MYSQL,
            AdapterId::Sqlite => &SQLITE,
            AdapterId::MsSql => &MSSQL,
            AdapterId::Search => &SEARCH,
            AdapterId::Memory => &MEMORY,
        }
    }

    pub fn id(&self) -> AdapterId {
        self.id
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Sort directions this backend can express.
    pub fn directions(&self) -> &'static [OrderDirection] {
        self.directions
    }

    pub fn operators(&self) -> &OperatorSupport {
        &self.operators
    }

    pub fn with_strict(&self, strict: bool) -> Adapter {
        let mut adapter = self.clone();
        adapter.capabilities.strict = strict;
        adapter
    }

    pub fn with_max_in_list(&self, max_in_list: Option<usize>) -> Adapter {
        let mut adapter = self.clone();
        adapter.capabilities.max_in_list = max_in_list;
        adapter
    }

    pub fn supports_direction(&self, direction: OrderDirection) -> bool {
        self.directions.contains(&direction)
    }

    pub fn supports_operator(&self, category: FieldCategory, operator: Operator) -> bool {
        self.operators.for_category(category).contains(&operator)
    }

    /// How array fields are queried, or `None` when they cannot be.
    pub fn array_encoding(&self) -> Option<ArrayEncoding> {
        if self.capabilities.native_arrays {
            Some(ArrayEncoding::Native)
        } else if self.capabilities.json_arrays {
            Some(ArrayEncoding::JsonDocument)
        } else {
            None
        }
    }

    /// SQL renderer for relational backends.
    pub fn sql(&self) -> Option<SqlRenderer> {
        let dialect = match self.id {
            AdapterId::Postgres => Dialect::Postgres,
            AdapterId::MySql => Dialect::MySql,
            AdapterId::Sqlite => Dialect::Sqlite,
            AdapterId::MsSql => Dialect::MsSql,
            AdapterId::Search | AdapterId::Memory => return None,
        };
        Some(SqlRenderer::new(dialect))
    }

    /// Build the predicate for one operator on one field.
    ///
    /// `Ok(None)` means the operator was unsupported and ignored because the
    /// adapter is not in strict mode.
    pub fn build_predicate(
        &self,
        field: &Field,
        binding: &Binding,
        symbol: &OperatorSymbol,
        raw: &RawValue,
        opts: &CompileOptions,
    ) -> Result<Option<Expr>, ValidationError> {
        let operator = match symbol {
            OperatorSymbol::Known(op) => *op,
            OperatorSymbol::Unknown(name) => return self.unsupported(field, name, opts),
        };

        if !self.supports_operator(field.kind.category(), operator) {
            return self.unsupported(field, operator.symbol(), opts);
        }
        let Some(build) = operator_table().lookup(field.kind.family(), self.id, operator) else {
            return self.unsupported(field, operator.symbol(), opts);
        };

        let operand = Operand {
            column: ColumnRef::new(binding.clone(), &field.column, field.kind.clone()),
            field,
            adapter: self,
            operator,
        };
        let expr = build(&operand, raw)?;
        tracing::trace!(
            adapter = %self.id,
            field = %field.name,
            operator = %operator,
            "Built predicate"
        );
        Ok(Some(expr))
    }

    /// Append one operator's predicate to `query`, matching the named field
    /// on the query's root entity. Unknown fields are ignored.
    pub fn apply_operator(
        &self,
        query: &mut Query,
        schema: &SchemaDescriptor,
        field: &str,
        symbol: &OperatorSymbol,
        raw: &RawValue,
        opts: &CompileOptions,
    ) -> Result<(), ValidationError> {
        let Some(field) = schema.field(field) else {
            tracing::debug!(entity = schema.entity(), field, "Ignoring filter on unknown field");
            return Ok(());
        };
        if let Some(expr) = self.build_predicate(field, &Binding::Root, symbol, raw, opts)? {
            query.filter(expr);
        }
        Ok(())
    }

    fn unsupported(&self, field: &Field, operator: &str, opts: &CompileOptions) -> Result<Option<Expr>, ValidationError> {
        if opts.is_strict(self) {
            return Err(ValidationError::UnsupportedOperator {
                adapter: self.id.to_string(),
                field: field.name.clone(),
                operator: operator.to_string(),
            });
        }
        tracing::debug!(
            adapter = %self.id,
            field = %field.name,
            operator,
            "Ignoring unsupported operator"
        );
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ScalarKind;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn schema() -> SchemaDescriptor {
        SchemaDescriptor::builder("user")
            .source("users")
            .field("name", ScalarKind::String)
            .field("tags", ScalarKind::array_of(ScalarKind::String))
            .build()
            .unwrap()
    }

    #[test]
    fn test_adapter_names() {
        for id in AdapterId::ALL {
            assert_eq!(id.as_str().parse::<AdapterId>(), Ok(id));
            assert_eq!(Adapter::get(id).id(), id);
        }
        assert!("oracle".parse::<AdapterId>().is_err());
    }

    #[test]
    fn test_sort_vocabularies() {
        let mysql = Adapter::get(AdapterId::MySql);
        assert!(mysql.supports_direction(OrderDirection::Desc));
        assert!(!mysql.supports_direction(OrderDirection::AscNullsFirst));
        assert!(Adapter::get(AdapterId::Postgres).supports_direction(OrderDirection::DescNullsLast));
    }

    #[test]
    fn test_apply_operator_appends_predicate() {
        let schema = schema();
        let adapter = Adapter::get(AdapterId::Postgres);
        let mut query = Query::new(&schema);
        let eq = OperatorSymbol::Known(Operator::Eq);

        adapter
            .apply_operator(&mut query, &schema, "name", &eq, &json!("Alice"), &CompileOptions::default())
            .unwrap();
        adapter
            .apply_operator(&mut query, &schema, "nickname", &eq, &json!("Al"), &CompileOptions::default())
            .unwrap();

        assert_eq!(query.predicates().len(), 1);
    }

    #[test]
    fn test_unsupported_operator_lenient_and_strict() {
        let schema = schema();
        let adapter = Adapter::get(AdapterId::MsSql);
        let includes = OperatorSymbol::Known(Operator::Includes);
        let mut query = Query::new(&schema);

        adapter
            .apply_operator(&mut query, &schema, "tags", &includes, &json!("x"), &CompileOptions::default())
            .unwrap();
        assert!(query.predicates().is_empty());

        let err = adapter
            .apply_operator(&mut query, &schema, "tags", &includes, &json!("x"), &CompileOptions::strict())
            .unwrap_err();
        assert_matches!(err, ValidationError::UnsupportedOperator { operator, .. } if operator == "_includes");
    }

    #[test]
    fn test_operator_wrong_category_is_unsupported() {
        let schema = schema();
        let adapter = Adapter::get(AdapterId::Postgres).with_strict(true);
        let field = schema.field("name").unwrap();
        let result = adapter.build_predicate(
            field,
            &Binding::Root,
            &OperatorSymbol::Known(Operator::Includes),
            &json!("x"),
            &CompileOptions::default(),
        );
        assert_matches!(result, Err(ValidationError::UnsupportedOperator { .. }));

        let result = adapter.build_predicate(
            field,
            &Binding::Root,
            &OperatorSymbol::Unknown("_regex".to_string()),
            &json!("x"),
            &CompileOptions::default(),
        );
        assert_matches!(result, Err(ValidationError::UnsupportedOperator { operator, .. }) if operator == "_regex");
    }
}
