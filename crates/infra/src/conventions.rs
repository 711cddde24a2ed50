//! Store conventions and the id glue that hooks strongly typed ids into the
//! document store lifecycle.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace};

use docid_core::{
    ID_PROPERTY, IdRegistry, IdResult, MemberDescriptor, TypeKey, new_unique_key,
};

use crate::config::{DEFAULT_MAX_REQUESTS_PER_SESSION, StoreConfig};
use crate::document_store::{
    AfterConversionToEntity, BeforeStore, InMemoryDocumentStore, StoreError,
};
use crate::serialization::{DocumentSerializer, create_custom_json_serialization};

/// Decides whether the store itself manages a member as the document key.
pub type IdentityPredicate = Arc<dyn Fn(&MemberDescriptor) -> bool + Send + Sync>;

/// Produces the document key for an entity being stored without one.
#[async_trait]
pub trait DocumentIdGenerator: Send + Sync {
    async fn generate(
        &self,
        database: &str,
        entity: &(dyn Any + Send + Sync),
        entity_type: TypeKey,
    ) -> String;
}

/// Default generator: a fresh unique key for every entity.
#[derive(Debug, Default, Clone, Copy)]
pub struct UniqueKeyGenerator;

#[async_trait]
impl DocumentIdGenerator for UniqueKeyGenerator {
    async fn generate(
        &self,
        _database: &str,
        _entity: &(dyn Any + Send + Sync),
        _entity_type: TypeKey,
    ) -> String {
        new_unique_key()
    }
}

/// Store-wide conventions.
#[derive(Clone)]
pub struct Conventions {
    pub serializer: DocumentSerializer,
    pub find_identity_property: IdentityPredicate,
    pub document_id_generator: Arc<dyn DocumentIdGenerator>,
    pub max_requests_per_session: usize,
}

impl Default for Conventions {
    fn default() -> Self {
        Self {
            serializer: DocumentSerializer::default(),
            find_identity_property: Arc::new(|member: &MemberDescriptor| {
                member.name() == ID_PROPERTY
            }),
            document_id_generator: Arc::new(UniqueKeyGenerator),
            max_requests_per_session: DEFAULT_MAX_REQUESTS_PER_SESSION,
        }
    }
}

impl core::fmt::Debug for Conventions {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Conventions")
            .field("serializer", &self.serializer)
            .field("max_requests_per_session", &self.max_requests_per_session)
            .finish_non_exhaustive()
    }
}

/// Identity convention: the store manages `id` itself, except on strongly
/// typed entities, whose ids the glue converts to and from keys.
pub fn find_identity_property(
    registry: Arc<IdRegistry>,
) -> impl Fn(&MemberDescriptor) -> bool + Send + Sync + 'static {
    move |member: &MemberDescriptor| {
        if registry.is_strongly_typed_entity(member.declaring_type()) {
            return false;
        }
        member.name() == ID_PROPERTY
    }
}

/// Conventions wired for strongly typed ids.
pub fn configure(registry: Arc<IdRegistry>, config: &StoreConfig) -> Conventions {
    Conventions {
        serializer: create_custom_json_serialization(registry.clone()),
        find_identity_property: Arc::new(find_identity_property(registry.clone())),
        document_id_generator: Arc::new(EntityIdHooks::new(registry)),
        max_requests_per_session: config.max_requests_per_session,
    }
}

/// Lifecycle hooks keeping strongly typed entity ids and document keys in sync.
#[derive(Debug, Clone)]
pub struct EntityIdHooks {
    registry: Arc<IdRegistry>,
}

impl EntityIdHooks {
    pub fn new(registry: Arc<IdRegistry>) -> Self {
        Self { registry }
    }

    /// Subscribe both hooks on `store`.
    pub fn attach(&self, store: &mut InMemoryDocumentStore) {
        let hooks = self.clone();
        store.on_after_conversion_to_entity(move |args| {
            hooks.on_loaded(args).map_err(StoreError::from)
        });
        let hooks = self.clone();
        store.on_before_store(move |args| hooks.on_before_store(args).map_err(StoreError::from));
    }

    /// After a document became an entity: set its id from the document key.
    ///
    /// Overwrites whatever id the body carried; the key is authoritative.
    pub fn on_loaded(&self, args: &mut AfterConversionToEntity<'_>) -> IdResult<()> {
        let Some(property) = self.registry.strongly_typed_entity(args.entity_type) else {
            return Ok(());
        };
        let factory = self.registry.factory::<String>(property.id_type())?;
        property.set_value(&mut *args.entity, factory(args.id.to_string()))?;
        trace!(entity = args.entity_type.name(), key = args.id, "id restored from key");
        Ok(())
    }

    /// Before storing: fill an unset id from the assigned document key.
    pub fn on_before_store(&self, args: &mut BeforeStore<'_>) -> IdResult<()> {
        let Some(property) = self.registry.strongly_typed_entity(args.entity_type) else {
            return Ok(());
        };
        if property.get_value(&*args.entity).is_some() {
            return Ok(());
        }
        let factory = self.registry.factory::<String>(property.id_type())?;
        property.set_value(&mut *args.entity, factory(args.document_id.to_string()))?;
        trace!(
            entity = args.entity_type.name(),
            key = args.document_id,
            "id filled from document key"
        );
        Ok(())
    }
}

#[async_trait]
impl DocumentIdGenerator for EntityIdHooks {
    /// The entity's own id when it has one, otherwise a fresh unique key.
    async fn generate(
        &self,
        database: &str,
        entity: &(dyn Any + Send + Sync),
        entity_type: TypeKey,
    ) -> String {
        let existing = self
            .registry
            .strongly_typed_entity(entity_type)
            .and_then(|property| property.get_value(entity));
        match existing {
            Some(key) => key,
            None => {
                let key = new_unique_key();
                debug!(database, entity = entity_type.name(), key = %key, "generated document key");
                key
            }
        }
    }
}
