//! Quarry - backend-agnostic filter and order compiler
//!
//! Turns the nested `where`/`order_by` arguments of a list query into
//! predicates, joins and order clauses on a backend-neutral [`Query`], which
//! an adapter then renders as SQL, as a search request body, or evaluates over
//! in-memory records.
//!
//! ```rust,ignore
//! use quarry::{Adapter, AdapterId, Catalog, CompileOptions, Query};
//!
//! let catalog = build_catalog()?;
//! let users = catalog.schema("user")?;
//! let adapter = Adapter::get(AdapterId::Postgres);
//!
//! let query = quarry::compile_json(
//!     Query::new(&users),
//!     &json!({"name": {"_ilike": "a%"}, "posts": {"status": {"_eq": "active"}}}),
//!     &json!([{"age": "desc"}]),
//!     users,
//!     adapter,
//!     &CompileOptions::default(),
//! )?;
//!
//! let statement = adapter.sql().expect("relational adapter").select(&query);
//! ```

pub mod adapter;
pub mod config;
pub mod error;
pub mod filter;
pub mod logging;
pub mod order;
pub mod query;
pub mod scalar;
pub mod schema;
pub mod value;

pub use adapter::{Adapter, AdapterId, Capabilities};
pub use config::{CompileOptions, CompilerConfig};
pub use error::{CompileError, Result, SchemaError, ValidationError};
pub use filter::FilterNode;
pub use order::OrderNode;
pub use query::{Expr, Query};
pub use schema::{Catalog, Relationship, ScalarKind, SchemaDescriptor, SchemaRef};
pub use value::{GeoPoint, RawValue, Value};

/// Apply a filter and then an order list to `query`.
///
/// Filter predicates are added first so a failing order never sees a
/// half-filtered query; the first error anywhere is returned.
pub fn compile(
    query: Query,
    filter: Option<&FilterNode>,
    order: &[OrderNode],
    schema: SchemaRef<'_>,
    adapter: &Adapter,
    opts: &CompileOptions,
) -> Result<Query> {
    let query = filter::compile(query, filter, schema, adapter, opts)?;
    order::compile(query, order, schema, adapter, opts)
}

/// Parse wire-level filter and order documents, then [`compile`] them.
pub fn compile_json(
    query: Query,
    filter: &RawValue,
    order: &RawValue,
    schema: SchemaRef<'_>,
    adapter: &Adapter,
    opts: &CompileOptions,
) -> Result<Query> {
    let strict = opts.is_strict(adapter);
    let filter = filter::parse_filter(filter, schema, strict)?;
    let order = order::parse_order(order, schema, strict)?;
    compile(query, filter.as_ref(), &order, schema, adapter, opts)
}
