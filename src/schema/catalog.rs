//! The set of entity schemas shared by every compilation

use std::collections::HashMap;
use std::ops::Deref;

use crate::error::SchemaError;

use super::descriptor::{Field, Relationship, SchemaDescriptor};

/// All entity schemas, keyed by entity name.
///
/// Built once when the schema layer finishes defining types and then only
/// read. Wrap it in an `Arc` to share it between request handlers.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entities: HashMap<String, SchemaDescriptor>,
}

impl Catalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// Look up an entity's schema.
    pub fn schema(&self, entity: &str) -> Result<SchemaRef<'_>, SchemaError> {
        self.entities
            .get(entity)
            .map(|descriptor| SchemaRef {
                catalog: self,
                descriptor,
            })
            .ok_or_else(|| SchemaError::UnknownEntity {
                entity: entity.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CatalogBuilder {
    entities: Vec<SchemaDescriptor>,
}

impl CatalogBuilder {
    pub fn entity(mut self, descriptor: SchemaDescriptor) -> Self {
        self.entities.push(descriptor);
        self
    }

    /// Freeze the catalog, checking that every relationship points at a
    /// known entity and filling in default join keys.
    pub fn build(self) -> Result<Catalog, SchemaError> {
        let mut primary_keys: HashMap<String, String> = HashMap::new();
        for descriptor in &self.entities {
            if primary_keys
                .insert(
                    descriptor.entity().to_string(),
                    descriptor.primary_key().to_string(),
                )
                .is_some()
            {
                return Err(SchemaError::DuplicateName {
                    entity: descriptor.entity().to_string(),
                    name: descriptor.entity().to_string(),
                });
            }
        }

        let mut entities = HashMap::with_capacity(self.entities.len());
        for mut descriptor in self.entities {
            let entity = descriptor.entity().to_string();
            let source_pk = descriptor.primary_key().to_string();
            for rel in descriptor.relationships_mut() {
                let destination_pk = primary_keys.get(&rel.destination).ok_or_else(|| {
                    SchemaError::UnknownEntity {
                        entity: rel.destination.clone(),
                    }
                })?;
                rel.resolve_keys(&source_pk, destination_pk);
            }
            tracing::trace!(entity = %entity, "Registered entity schema");
            entities.insert(entity, descriptor);
        }

        Ok(Catalog { entities })
    }
}

/// What an identifier names on a schema.
#[derive(Debug, Clone, Copy)]
pub enum Member<'a> {
    Field(&'a Field),
    Relationship(&'a Relationship),
    Unknown,
}

/// A schema together with the catalog it belongs to, so relationships can be
/// followed to their destination schemas.
#[derive(Debug, Clone, Copy)]
pub struct SchemaRef<'a> {
    catalog: &'a Catalog,
    descriptor: &'a SchemaDescriptor,
}

impl<'a> SchemaRef<'a> {
    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    pub fn descriptor(&self) -> &'a SchemaDescriptor {
        self.descriptor
    }

    /// Resolve an identifier. Relationships win over fields; the builder
    /// guarantees the two namespaces never overlap. The primary key always
    /// resolves to a field.
    pub fn member(&self, name: &str) -> Member<'a> {
        if let Some(rel) = self.descriptor.relationship(name) {
            Member::Relationship(rel)
        } else if let Some(field) = self.descriptor.field(name) {
            Member::Field(field)
        } else if name == self.descriptor.primary_key() {
            Member::Field(self.descriptor.key_field())
        } else {
            Member::Unknown
        }
    }

    /// Follow a relationship to the related entity's schema.
    pub fn related(&self, relationship: &str) -> Result<(&'a Relationship, SchemaRef<'a>), SchemaError> {
        let rel = self.descriptor.relationship(relationship).ok_or_else(|| {
            SchemaError::UnknownRelationship {
                entity: self.descriptor.entity().to_string(),
                relationship: relationship.to_string(),
            }
        })?;
        let target = self.catalog.schema(&rel.destination)?;
        Ok((rel, target))
    }
}

impl Deref for SchemaRef<'_> {
    type Target = SchemaDescriptor;

    fn deref(&self) -> &Self::Target {
        self.descriptor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{JoinTable, ScalarKind};
    use assert_matches::assert_matches;

    fn catalog() -> Catalog {
        Catalog::builder()
            .entity(
                SchemaDescriptor::builder("user")
                    .source("users")
                    .primary_key("uid")
                    .field("name", ScalarKind::String)
                    .relationship(Relationship::has_many("posts", "post", "author_id"))
                    .build()
                    .unwrap(),
            )
            .entity(
                SchemaDescriptor::builder("post")
                    .source("posts")
                    .field("title", ScalarKind::String)
                    .relationship(Relationship::belongs_to("author", "user", "author_id"))
                    .relationship(Relationship::many_to_many(
                        "tags",
                        "tag",
                        JoinTable::new("post_tags", "post_id", "tag_id"),
                    ))
                    .build()
                    .unwrap(),
            )
            .entity(
                SchemaDescriptor::builder("tag")
                    .field("label", ScalarKind::String)
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_keys_resolved_from_primary_keys() {
        let catalog = catalog();
        let post = catalog.schema("post").unwrap();

        let (author, user) = post.related("author").unwrap();
        assert_eq!(author.source_key(), "author_id");
        assert_eq!(author.destination_key(), "uid");
        assert_eq!(user.source(), "users");

        let user = catalog.schema("user").unwrap();
        let (posts, _) = user.related("posts").unwrap();
        assert_eq!(posts.source_key(), "uid");
        assert_eq!(posts.destination_key(), "author_id");
    }

    #[test]
    fn test_member_lookup() {
        let catalog = catalog();
        let post = catalog.schema("post").unwrap();
        assert_matches!(post.member("title"), Member::Field(_));
        assert_matches!(post.member("tags"), Member::Relationship(_));
        assert_matches!(post.member("nope"), Member::Unknown);
        assert_matches!(post.member("id"), Member::Field(field) if field.column == "id");
    }

    #[test]
    fn test_unknown_relationship_is_schema_error() {
        let catalog = catalog();
        let post = catalog.schema("post").unwrap();
        assert_matches!(
            post.related("editor"),
            Err(SchemaError::UnknownRelationship { relationship, .. }) if relationship == "editor"
        );
    }

    #[test]
    fn test_dangling_destination_rejected() {
        let result = Catalog::builder()
            .entity(
                SchemaDescriptor::builder("post")
                    .relationship(Relationship::belongs_to("author", "ghost", "author_id"))
                    .build()
                    .unwrap(),
            )
            .build();
        assert_matches!(result, Err(SchemaError::UnknownEntity { entity }) if entity == "ghost");
    }
}
