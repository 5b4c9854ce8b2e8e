//! Concrete record type to schema type name resolution
//!
//! Used when a polymorphic result has to report which schema type a record
//! belongs to. This is independent of query compilation and never shares a
//! lock with it.

use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// Frozen type table, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<TypeId, Arc<str>>,
}

impl TypeRegistry {
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder::default()
    }

    /// Resolved schema type name for `T`, if registered.
    pub fn resolve<T: 'static>(&self) -> Option<&str> {
        self.types.get(&TypeId::of::<T>()).map(|name| &**name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct TypeRegistryBuilder {
    types: HashMap<TypeId, Arc<str>>,
}

impl TypeRegistryBuilder {
    pub fn register<T: 'static>(mut self, schema_type: impl Into<String>) -> Self {
        let schema_type: String = schema_type.into();
        self.types.insert(TypeId::of::<T>(), schema_type.into());
        self
    }

    pub fn build(self) -> TypeRegistry {
        TypeRegistry { types: self.types }
    }
}

/// Registry that accepts registrations while the process is starting up.
///
/// Writers take the mutex; once [`freeze`](Self::freeze) is called readers use
/// the returned [`TypeRegistry`] without any locking.
#[derive(Debug, Default)]
pub struct SharedTypeRegistry {
    types: Mutex<HashMap<TypeId, Arc<str>>>,
}

impl SharedTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T`. Returns the previously registered name, if any.
    pub fn register<T: 'static>(&self, schema_type: impl Into<String>) -> Option<Arc<str>> {
        let schema_type: String = schema_type.into();
        let previous = self
            .types
            .lock()
            .insert(TypeId::of::<T>(), schema_type.clone().into());
        if let Some(ref prev) = previous {
            tracing::warn!(
                rust_type = type_name::<T>(),
                previous = %prev,
                current = %schema_type,
                "Type registered twice, keeping the latest name"
            );
        }
        previous
    }

    pub fn resolve<T: 'static>(&self) -> Option<Arc<str>> {
        self.types.lock().get(&TypeId::of::<T>()).cloned()
    }

    pub fn freeze(&self) -> TypeRegistry {
        TypeRegistry {
            types: self.types.lock().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    struct User;
    struct Organization;

    #[test]
    fn test_build_time_registry() {
        let registry = TypeRegistry::builder()
            .register::<User>("User")
            .register::<Organization>("Organization")
            .build();

        assert_eq!(registry.resolve::<User>(), Some("User"));
        assert_eq!(registry.resolve::<Organization>(), Some("Organization"));
        assert_eq!(registry.resolve::<String>(), None);
    }

    #[test]
    fn test_shared_registry_concurrent_registration() {
        let shared = Arc::new(SharedTypeRegistry::new());

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    if i % 2 == 0 {
                        shared.register::<User>("User");
                    } else {
                        shared.register::<Organization>("Organization");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let frozen = shared.freeze();
        assert_eq!(frozen.len(), 2);
        assert_eq!(frozen.resolve::<User>(), Some("User"));
    }
}
