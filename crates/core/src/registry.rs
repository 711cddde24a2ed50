//! Identifier conversion registry.
//!
//! The registry answers three questions about a type, at runtime, given only
//! its [`TypeKey`]:
//!
//! - is it a strongly typed id, and if so what value does it wrap?
//! - is it an entity whose `id` field is a strongly typed id?
//! - how do I build an instance of it from a raw value?
//!
//! Types opt in through [`IdRegistryBuilder`]; there is no runtime type
//! introspection. Answers that require building something (factories, entity
//! id properties) are computed on first lookup and cached for the lifetime of
//! the registry. Every cache uses an atomic get-or-create, so concurrent first
//! lookups for the same type all observe the same entry.

use core::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::entity::{Entity, ID_PROPERTY, TypeKey};
use crate::error::{IdError, IdResult};
use crate::id::{DynId, StronglyTypedId};
use crate::json::{IdConverter, typed_converter};

/// Builds an identifier of some (erased) type from a raw value `V`.
pub type IdFactory<V> = Arc<dyn Fn(V) -> DynId + Send + Sync>;

type ErasedFactory = Arc<dyn Any + Send + Sync>;

/// Static shape of a registered id type.
struct IdShape {
    id_type: TypeKey,
    value_type: TypeKey,
    make_factory: fn() -> ErasedFactory,
    make_converter: fn() -> Arc<dyn IdConverter>,
}

/// Static shape of a registered entity type.
struct EntityShape {
    entity_type: TypeKey,
    id_type: TypeKey,
    get: fn(&dyn Any) -> Option<String>,
    set: fn(&mut dyn Any, Box<dyn Any + Send>) -> IdResult<()>,
}

/// Descriptor for the `id` property of a strongly typed entity.
///
/// Acts as the property accessor: reads the current id as its raw string form
/// and assigns a new id produced by a registry factory.
#[derive(Clone)]
pub struct IdProperty {
    entity_type: TypeKey,
    id_type: TypeKey,
    value_type: TypeKey,
    get: fn(&dyn Any) -> Option<String>,
    set: fn(&mut dyn Any, Box<dyn Any + Send>) -> IdResult<()>,
}

impl IdProperty {
    pub fn name(&self) -> &'static str {
        ID_PROPERTY
    }

    pub fn entity_type(&self) -> TypeKey {
        self.entity_type
    }

    /// Declared type of the property (the strongly typed id).
    pub fn id_type(&self) -> TypeKey {
        self.id_type
    }

    /// Value type wrapped by the id.
    pub fn value_type(&self) -> TypeKey {
        self.value_type
    }

    /// Current id of `entity` as a raw string, `None` if unset.
    pub fn get_value(&self, entity: &dyn Any) -> Option<String> {
        (self.get)(entity)
    }

    /// Assign `id` into `entity`'s id field.
    pub fn set_value(&self, entity: &mut dyn Any, id: DynId) -> IdResult<()> {
        (self.set)(entity, id.into_any())
    }
}

impl core::fmt::Debug for IdProperty {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IdProperty")
            .field("entity_type", &self.entity_type)
            .field("id_type", &self.id_type)
            .field("value_type", &self.value_type)
            .finish()
    }
}

/// Collects id and entity registrations; `build` freezes them into an [`IdRegistry`].
#[derive(Default)]
pub struct IdRegistryBuilder {
    ids: HashMap<TypeId, IdShape>,
    entities: HashMap<TypeId, EntityShape>,
}

impl IdRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a strongly typed id.
    pub fn id<T: StronglyTypedId>(mut self) -> Self {
        let id_type = TypeKey::of::<T>();
        self.ids.insert(
            id_type.type_id(),
            IdShape {
                id_type,
                value_type: TypeKey::of::<T::Value>(),
                make_factory: make_factory::<T>,
                make_converter: typed_converter::<T>,
            },
        );
        self
    }

    /// Register an entity. Whether it counts as strongly typed is decided on
    /// first lookup, from the id types registered by then.
    pub fn entity<E: Entity>(mut self) -> Self {
        let entity_type = TypeKey::of::<E>();
        self.entities.insert(
            entity_type.type_id(),
            EntityShape {
                entity_type,
                id_type: TypeKey::of::<E::Id>(),
                get: read_id::<E>,
                set: write_id::<E>,
            },
        );
        self
    }

    pub fn build(self) -> IdRegistry {
        debug!(
            ids = self.ids.len(),
            entities = self.entities.len(),
            "id registry built"
        );
        IdRegistry {
            ids: self.ids,
            entities: self.entities,
            factories: DashMap::new(),
            properties: DashMap::new(),
        }
    }
}

/// Process-wide identifier registry.
///
/// Build one at startup and share it (`Arc<IdRegistry>`) with the JSON
/// converter and the entity id hooks.
pub struct IdRegistry {
    ids: HashMap<TypeId, IdShape>,
    entities: HashMap<TypeId, EntityShape>,
    factories: DashMap<TypeId, ErasedFactory>,
    properties: DashMap<TypeId, Option<Arc<IdProperty>>>,
}

impl IdRegistry {
    pub fn builder() -> IdRegistryBuilder {
        IdRegistryBuilder::new()
    }

    pub fn is_strongly_typed_id(&self, ty: TypeKey) -> bool {
        self.ids.contains_key(&ty.type_id())
    }

    /// The value type wrapped by `ty`, if `ty` is a strongly typed id.
    pub fn strongly_typed_id(&self, ty: TypeKey) -> Option<TypeKey> {
        self.ids.get(&ty.type_id()).map(|shape| shape.value_type)
    }

    pub fn is_strongly_typed_entity(&self, entity_type: TypeKey) -> bool {
        self.strongly_typed_entity(entity_type).is_some()
    }

    /// The `id` property of `entity_type`, if it is a strongly typed entity.
    ///
    /// Resolved once per entity type; negative answers are cached too.
    pub fn strongly_typed_entity(&self, entity_type: TypeKey) -> Option<Arc<IdProperty>> {
        let key = entity_type.type_id();
        if let Some(hit) = self.properties.get(&key) {
            return hit.value().clone();
        }

        self.properties
            .entry(key)
            .or_insert_with(|| self.resolve_id_property(entity_type))
            .value()
            .clone()
    }

    /// Factory building `id_type` instances from a raw `V`.
    ///
    /// Fails if `id_type` isn't a strongly typed id, or if `V` isn't exactly
    /// the value type it wraps. The factory is created once per id type;
    /// later calls return the same `Arc`.
    pub fn factory<V: 'static>(&self, id_type: TypeKey) -> IdResult<IdFactory<V>> {
        let shape = self
            .ids
            .get(&id_type.type_id())
            .ok_or_else(|| IdError::not_strongly_typed(id_type.name()))?;

        if shape.value_type.type_id() != TypeId::of::<V>() {
            return Err(IdError::MissingConstructor {
                type_name: shape.id_type.name(),
                value_type: type_name::<V>(),
            });
        }

        let erased = match self.factories.get(&id_type.type_id()) {
            Some(hit) => hit.value().clone(),
            None => self
                .factories
                .entry(id_type.type_id())
                .or_insert_with(|| {
                    debug!(id_type = shape.id_type.name(), "creating id factory");
                    (shape.make_factory)()
                })
                .value()
                .clone(),
        };

        erased
            .downcast::<IdFactory<V>>()
            .map(|factory| (*factory).clone())
            .map_err(|_| IdError::UnresolvedConverter {
                type_name: shape.id_type.name(),
            })
    }

    /// Typed convenience over [`factory`](Self::factory).
    pub fn create<T: StronglyTypedId>(&self, value: T::Value) -> IdResult<T> {
        let factory = self.factory::<T::Value>(TypeKey::of::<T>())?;
        factory(value)
            .downcast::<T>()
            .ok_or_else(|| IdError::type_mismatch(type_name::<T>()))
    }

    pub(crate) fn converter_for(&self, ty: TypeKey) -> IdResult<Arc<dyn IdConverter>> {
        self.ids
            .get(&ty.type_id())
            .map(|shape| (shape.make_converter)())
            .ok_or(IdError::UnresolvedConverter {
                type_name: ty.name(),
            })
    }

    fn resolve_id_property(&self, entity_type: TypeKey) -> Option<Arc<IdProperty>> {
        let Some(entity) = self.entities.get(&entity_type.type_id()) else {
            debug!(entity = entity_type.name(), "unregistered entity type");
            return None;
        };

        let Some(value_type) = self.strongly_typed_id(entity.id_type) else {
            debug!(
                entity = entity.entity_type.name(),
                id_type = entity.id_type.name(),
                "entity id is not strongly typed"
            );
            return None;
        };

        debug!(
            entity = entity.entity_type.name(),
            id_type = entity.id_type.name(),
            "resolved strongly typed entity"
        );
        Some(Arc::new(IdProperty {
            entity_type: entity.entity_type,
            id_type: entity.id_type,
            value_type,
            get: entity.get,
            set: entity.set,
        }))
    }
}

impl core::fmt::Debug for IdRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IdRegistry")
            .field("ids", &self.ids.len())
            .field("entities", &self.entities.len())
            .field("factories", &self.factories.len())
            .finish()
    }
}

fn make_factory<T: StronglyTypedId>() -> ErasedFactory {
    let factory: IdFactory<T::Value> = Arc::new(|value| Box::new(T::from_value(value)) as DynId);
    Arc::new(factory)
}

fn read_id<E: Entity>(entity: &dyn Any) -> Option<String> {
    entity
        .downcast_ref::<E>()
        .and_then(|entity| entity.id())
        .map(ToString::to_string)
}

fn write_id<E: Entity>(entity: &mut dyn Any, id: Box<dyn Any + Send>) -> IdResult<()> {
    let entity = entity
        .downcast_mut::<E>()
        .ok_or_else(|| IdError::type_mismatch(type_name::<E>()))?;
    let id = id
        .downcast::<E::Id>()
        .map_err(|_| IdError::type_mismatch(type_name::<E::Id>()))?;
    entity.set_id(*id);
    Ok(())
}
