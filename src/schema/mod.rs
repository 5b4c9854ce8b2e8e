//! Schema descriptors consumed by the filter and order compilers
//!
//! The schema layer describes each entity once: its scalar fields (with their
//! [`ScalarKind`]) and its relationships to other entities. Descriptors are
//! collected into a [`Catalog`], frozen, and then shared read-only by every
//! compilation.

mod catalog;
mod descriptor;
mod kind;
pub mod types;

pub use catalog::{Catalog, CatalogBuilder, Member, SchemaRef};
pub use descriptor::{Cardinality, Field, JoinTable, Relationship, SchemaBuilder, SchemaDescriptor};
pub use kind::{EnumType, FieldCategory, ScalarFamily, ScalarKind};
pub use types::{SharedTypeRegistry, TypeRegistry};
