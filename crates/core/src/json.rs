//! JSON conversion for strongly typed ids.
//!
//! Ids are transparent on the wire: `ProductId("01HXYZ")` is the token
//! `"01HXYZ"`, never an object. Types generated by
//! [`strongly_typed_id!`](crate::strongly_typed_id) already serialize that way
//! through serde; [`IdJsonConverter`] covers the type-erased path, where the
//! host serializer only holds a `TypeKey` and a `&dyn Any`.

use core::any::{Any, TypeId, type_name};
use core::marker::PhantomData;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::entity::TypeKey;
use crate::error::{IdError, IdResult};
use crate::id::{DynId, StronglyTypedId};
use crate::registry::IdRegistry;

/// A pluggable converter the host serializer consults before falling back to serde.
pub trait JsonConverter: Send + Sync {
    fn can_convert(&self, ty: TypeKey) -> bool;

    /// Decode `token` as `ty`. A null token is `Ok(None)`.
    fn read_json(&self, token: &Value, ty: TypeKey) -> IdResult<Option<Box<dyn Any + Send>>>;

    /// Encode `value` (of type `ty`). `None` encodes as a null token.
    fn write_json(&self, value: Option<&dyn Any>, ty: TypeKey) -> IdResult<Value>;
}

/// Per-id-type converter, created from the registration of `T`.
pub(crate) trait IdConverter: Send + Sync {
    fn read(&self, registry: &IdRegistry, token: &Value) -> IdResult<Option<DynId>>;

    fn write(&self, value: &dyn Any) -> IdResult<Value>;
}

struct TypedIdConverter<T>(PhantomData<fn() -> T>);

pub(crate) fn typed_converter<T: StronglyTypedId>() -> Arc<dyn IdConverter> {
    Arc::new(TypedIdConverter::<T>(PhantomData))
}

impl<T: StronglyTypedId> IdConverter for TypedIdConverter<T> {
    fn read(&self, registry: &IdRegistry, token: &Value) -> IdResult<Option<DynId>> {
        if token.is_null() {
            return Ok(None);
        }

        let value = <T::Value as Deserialize>::deserialize(token)?;
        let factory = registry.factory::<T::Value>(TypeKey::of::<T>())?;
        Ok(Some(factory(value)))
    }

    fn write(&self, value: &dyn Any) -> IdResult<Value> {
        let id = value
            .downcast_ref::<T>()
            .ok_or_else(|| IdError::type_mismatch(type_name::<T>()))?;
        Ok(serde_json::to_value(id.value())?)
    }
}

/// [`JsonConverter`] for every id type known to an [`IdRegistry`].
pub struct IdJsonConverter {
    registry: Arc<IdRegistry>,
    converters: DashMap<TypeId, Arc<dyn IdConverter>>,
}

impl IdJsonConverter {
    pub fn new(registry: Arc<IdRegistry>) -> Self {
        Self {
            registry,
            converters: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<IdRegistry> {
        &self.registry
    }

    fn converter(&self, ty: TypeKey) -> IdResult<Arc<dyn IdConverter>> {
        if let Some(hit) = self.converters.get(&ty.type_id()) {
            return Ok(hit.value().clone());
        }

        // Resolve outside the entry so a failed lookup leaves no cache entry.
        let created = self.registry.converter_for(ty)?;
        let converter = self
            .converters
            .entry(ty.type_id())
            .or_insert_with(|| {
                debug!(id_type = ty.name(), "creating id json converter");
                created
            })
            .value()
            .clone();
        Ok(converter)
    }
}

impl JsonConverter for IdJsonConverter {
    fn can_convert(&self, ty: TypeKey) -> bool {
        self.registry.is_strongly_typed_id(ty)
    }

    fn read_json(&self, token: &Value, ty: TypeKey) -> IdResult<Option<Box<dyn Any + Send>>> {
        let converter = self.converter(ty)?;
        Ok(converter.read(&self.registry, token)?.map(|id| id.into_any()))
    }

    fn write_json(&self, value: Option<&dyn Any>, ty: TypeKey) -> IdResult<Value> {
        match value {
            None => Ok(Value::Null),
            Some(value) => self.converter(ty)?.write(value),
        }
    }
}

impl core::fmt::Debug for IdJsonConverter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IdJsonConverter")
            .field("registry", &self.registry)
            .field("converters", &self.converters.len())
            .finish()
    }
}
