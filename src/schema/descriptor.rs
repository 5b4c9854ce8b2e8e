//! Per-entity field and relationship descriptions

use std::collections::BTreeMap;

use crate::error::SchemaError;

use super::kind::ScalarKind;

/// A scalar attribute of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    /// Storage column (or document path). Defaults to the field name.
    pub column: String,
    pub kind: ScalarKind,
}

/// How many related records a relationship can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

/// Intermediate table for many-to-many relationships.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTable {
    pub table: String,
    /// Column on the join table pointing back at the source entity.
    pub source_key: String,
    /// Column on the join table pointing at the destination entity.
    pub destination_key: String,
}

impl JoinTable {
    pub fn new(
        table: impl Into<String>,
        source_key: impl Into<String>,
        destination_key: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            source_key: source_key.into(),
            destination_key: destination_key.into(),
        }
    }
}

/// A named link from one entity to another.
///
/// Keys left unset fall back to the primary key of the entity on that side
/// once the owning [`Catalog`](super::Catalog) is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub name: String,
    pub cardinality: Cardinality,
    /// Entity name of the related side.
    pub destination: String,
    source_key: Option<String>,
    destination_key: Option<String>,
    pub through: Option<JoinTable>,
    orderable: Option<bool>,
}

impl Relationship {
    fn new(name: impl Into<String>, cardinality: Cardinality, destination: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cardinality,
            destination: destination.into(),
            source_key: None,
            destination_key: None,
            through: None,
            orderable: None,
        }
    }

    /// `post.author_id -> user.id`
    pub fn belongs_to(
        name: impl Into<String>,
        destination: impl Into<String>,
        source_key: impl Into<String>,
    ) -> Self {
        let mut rel = Self::new(name, Cardinality::One, destination);
        rel.source_key = Some(source_key.into());
        rel
    }

    /// `user.id -> profile.user_id`
    pub fn has_one(
        name: impl Into<String>,
        destination: impl Into<String>,
        destination_key: impl Into<String>,
    ) -> Self {
        let mut rel = Self::new(name, Cardinality::One, destination);
        rel.destination_key = Some(destination_key.into());
        rel
    }

    /// `user.id -> post.author_id` (many)
    pub fn has_many(
        name: impl Into<String>,
        destination: impl Into<String>,
        destination_key: impl Into<String>,
    ) -> Self {
        let mut rel = Self::new(name, Cardinality::Many, destination);
        rel.destination_key = Some(destination_key.into());
        rel
    }

    /// `post.id -> post_tags.post_id / post_tags.tag_id -> tag.id`
    pub fn many_to_many(
        name: impl Into<String>,
        destination: impl Into<String>,
        through: JoinTable,
    ) -> Self {
        let mut rel = Self::new(name, Cardinality::Many, destination);
        rel.through = Some(through);
        rel
    }

    pub fn with_source_key(mut self, key: impl Into<String>) -> Self {
        self.source_key = Some(key.into());
        self
    }

    pub fn with_destination_key(mut self, key: impl Into<String>) -> Self {
        self.destination_key = Some(key.into());
        self
    }

    /// Explicitly allow (or forbid) ordering through this relationship.
    pub fn orderable(mut self, orderable: bool) -> Self {
        self.orderable = Some(orderable);
        self
    }

    /// Column on the source entity used for correlation.
    pub fn source_key(&self) -> &str {
        self.source_key.as_deref().unwrap_or("id")
    }

    /// Column on the destination entity used for correlation.
    pub fn destination_key(&self) -> &str {
        self.destination_key.as_deref().unwrap_or("id")
    }

    /// To-one relationships are orderable unless forbidden; to-many ones only
    /// when explicitly allowed.
    pub fn is_orderable(&self) -> bool {
        self.orderable
            .unwrap_or(self.cardinality == Cardinality::One)
    }

    pub fn is_many(&self) -> bool {
        self.cardinality == Cardinality::Many
    }

    pub(crate) fn resolve_keys(&mut self, source_pk: &str, destination_pk: &str) {
        if self.source_key.is_none() {
            self.source_key = Some(source_pk.to_string());
        }
        if self.destination_key.is_none() {
            self.destination_key = Some(destination_pk.to_string());
        }
    }
}

/// Immutable description of one entity, built once at schema-build time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDescriptor {
    entity: String,
    source: String,
    primary_key: String,
    key: Field,
    fields: BTreeMap<String, Field>,
    relationships: BTreeMap<String, Relationship>,
}

impl SchemaDescriptor {
    pub fn builder(entity: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(entity)
    }

    /// Entity name used by relationships to refer to this schema.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Table, collection or index backing the entity.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// The primary key as a filterable field, whether or not it was declared.
    pub fn key_field(&self) -> &Field {
        &self.key
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.values()
    }

    pub(crate) fn relationships_mut(&mut self) -> impl Iterator<Item = &mut Relationship> {
        self.relationships.values_mut()
    }
}

/// Fluent builder for [`SchemaDescriptor`].
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    entity: String,
    source: Option<String>,
    primary_key: String,
    key_kind: ScalarKind,
    fields: Vec<Field>,
    relationships: Vec<Relationship>,
}

impl SchemaBuilder {
    fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            source: None,
            primary_key: "id".to_string(),
            key_kind: ScalarKind::Integer,
            fields: Vec::new(),
            relationships: Vec::new(),
        }
    }

    /// Backing table/index name (defaults to the entity name)
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    /// Kind of an undeclared primary key (defaults to integer).
    pub fn key_kind(mut self, kind: ScalarKind) -> Self {
        self.key_kind = kind;
        self
    }

    pub fn field(self, name: impl Into<String>, kind: ScalarKind) -> Self {
        let name = name.into();
        let column = name.clone();
        self.field_with_column(name, column, kind)
    }

    pub fn field_with_column(
        mut self,
        name: impl Into<String>,
        column: impl Into<String>,
        kind: ScalarKind,
    ) -> Self {
        self.fields.push(Field {
            name: name.into(),
            column: column.into(),
            kind,
        });
        self
    }

    pub fn relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn build(self) -> Result<SchemaDescriptor, SchemaError> {
        let mut fields = BTreeMap::new();
        let mut relationships = BTreeMap::new();

        for field in self.fields {
            if fields.contains_key(&field.name) {
                return Err(SchemaError::DuplicateName {
                    entity: self.entity,
                    name: field.name,
                });
            }
            fields.insert(field.name.clone(), field);
        }

        for rel in self.relationships {
            if fields.contains_key(&rel.name) || relationships.contains_key(&rel.name) {
                return Err(SchemaError::DuplicateName {
                    entity: self.entity,
                    name: rel.name,
                });
            }
            relationships.insert(rel.name.clone(), rel);
        }

        let key = fields.get(&self.primary_key).cloned().unwrap_or_else(|| Field {
            name: self.primary_key.clone(),
            column: self.primary_key.clone(),
            kind: self.key_kind,
        });

        Ok(SchemaDescriptor {
            source: self.source.unwrap_or_else(|| self.entity.clone()),
            entity: self.entity,
            primary_key: self.primary_key,
            key,
            fields,
            relationships,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_builder_defaults() {
        let schema = SchemaDescriptor::builder("user")
            .field("name", ScalarKind::String)
            .field_with_column("joined", "created_at", ScalarKind::DateTime)
            .build()
            .unwrap();

        assert_eq!(schema.source(), "user");
        assert_eq!(schema.primary_key(), "id");
        assert_eq!(schema.field("joined").unwrap().column, "created_at");
        assert!(schema.field("missing").is_none());
        assert_eq!(schema.key_field().column, "id");
        assert_eq!(schema.key_field().kind, ScalarKind::Integer);
    }

    #[test]
    fn test_declared_primary_key_is_key_field() {
        let schema = SchemaDescriptor::builder("tag")
            .primary_key("slug")
            .field_with_column("slug", "tag_slug", ScalarKind::String)
            .build()
            .unwrap();
        assert_eq!(schema.key_field().column, "tag_slug");
        assert_eq!(schema.key_field().kind, ScalarKind::String);

        let schema = SchemaDescriptor::builder("session")
            .primary_key("token")
            .key_kind(ScalarKind::String)
            .build()
            .unwrap();
        assert_eq!(schema.key_field().name, "token");
        assert_eq!(schema.key_field().kind, ScalarKind::String);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = SchemaDescriptor::builder("post")
            .field("author", ScalarKind::String)
            .relationship(Relationship::belongs_to("author", "user", "author_id"))
            .build();

        assert_matches!(result, Err(SchemaError::DuplicateName { name, .. }) if name == "author");
    }

    #[test]
    fn test_relationship_orderability() {
        let author = Relationship::belongs_to("author", "user", "author_id");
        let posts = Relationship::has_many("posts", "post", "author_id");
        let pinned = Relationship::has_many("comments", "comment", "post_id").orderable(true);

        assert!(author.is_orderable());
        assert!(!posts.is_orderable());
        assert!(pinned.is_orderable());
        assert!(!author.clone().orderable(false).is_orderable());
    }

    #[test]
    fn test_relationship_key_defaults() {
        let mut author = Relationship::belongs_to("author", "user", "author_id");
        author.resolve_keys("id", "uid");
        assert_eq!(author.source_key(), "author_id");
        assert_eq!(author.destination_key(), "uid");
    }
}
