use std::any::Any;
use std::collections::HashMap;
use std::sync::RwLock;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use docid_core::{Entity, ID_PROPERTY, MemberDescriptor, TypeKey};

use super::session::DocumentSession;
use super::{
    AfterConversionHandler, AfterConversionToEntity, BeforeStore, BeforeStoreHandler, StoreError,
    StoredDocument,
};
use crate::conventions::Conventions;

/// In-memory document store.
///
/// Intended for tests/dev. Documents are kept as JSON bodies keyed by their
/// document id, exactly as a real store would hold them.
pub struct InMemoryDocumentStore {
    database: String,
    conventions: Conventions,
    documents: RwLock<HashMap<String, StoredDocument>>,
    before_store: Vec<BeforeStoreHandler>,
    after_conversion: Vec<AfterConversionHandler>,
}

impl InMemoryDocumentStore {
    pub fn new(database: impl Into<String>, conventions: Conventions) -> Self {
        Self {
            database: database.into(),
            conventions,
            documents: RwLock::new(HashMap::new()),
            before_store: Vec::new(),
            after_conversion: Vec::new(),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn conventions(&self) -> &Conventions {
        &self.conventions
    }

    /// Subscribe to the before-store event.
    pub fn on_before_store<F>(&mut self, handler: F)
    where
        F: Fn(&mut BeforeStore<'_>) -> Result<(), StoreError> + Send + Sync + 'static,
    {
        self.before_store.push(Box::new(handler));
    }

    /// Subscribe to the after-conversion-to-entity event.
    pub fn on_after_conversion_to_entity<F>(&mut self, handler: F)
    where
        F: Fn(&mut AfterConversionToEntity<'_>) -> Result<(), StoreError> + Send + Sync + 'static,
    {
        self.after_conversion.push(Box::new(handler));
    }

    pub fn open_session(&self) -> DocumentSession<'_> {
        DocumentSession::new(self)
    }

    /// Raw stored document, as committed.
    pub fn document(&self, key: &str) -> Result<Option<StoredDocument>, StoreError> {
        let documents = self.documents.read().map_err(|_| StoreError::Poisoned)?;
        Ok(documents.get(key).cloned())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let documents = self.documents.read().map_err(|_| StoreError::Poisoned)?;
        Ok(documents.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        self.len().map(|len| len == 0)
    }

    pub(crate) fn commit(
        &self,
        pending: impl IntoIterator<Item = (String, StoredDocument)>,
    ) -> Result<usize, StoreError> {
        let mut documents = self.documents.write().map_err(|_| StoreError::Poisoned)?;
        let mut written = 0;
        for (key, document) in pending {
            documents.insert(key, document);
            written += 1;
        }
        debug!(database = %self.database, written, "committed documents");
        Ok(written)
    }

    /// All documents of one collection, ordered by key.
    pub(crate) fn scan(&self, collection: &str) -> Result<Vec<(String, StoredDocument)>, StoreError> {
        let documents = self.documents.read().map_err(|_| StoreError::Poisoned)?;
        let mut matches: Vec<_> = documents
            .iter()
            .filter(|(_, document)| document.collection == collection)
            .map(|(key, document)| (key.clone(), document.clone()))
            .collect();
        matches.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(matches)
    }

    pub(crate) fn raise_before_store(
        &self,
        document_id: &str,
        entity_type: TypeKey,
        entity: &mut dyn Any,
    ) -> Result<(), StoreError> {
        let mut args = BeforeStore {
            document_id,
            entity_type,
            entity,
        };
        for handler in &self.before_store {
            handler(&mut args)?;
        }
        Ok(())
    }

    /// Turn a stored body back into an entity.
    ///
    /// The key is written into the identity property only when the identity
    /// convention claims it; otherwise after-conversion handlers must fill it.
    pub(crate) fn materialize<E>(&self, key: &str, document: StoredDocument) -> Result<E, StoreError>
    where
        E: Entity + DeserializeOwned,
    {
        let StoredDocument {
            collection,
            mut body,
        } = document;

        if collection != E::COLLECTION {
            return Err(StoreError::CollectionMismatch {
                key: key.to_string(),
                expected: E::COLLECTION,
                found: collection,
            });
        }

        if (self.conventions.find_identity_property)(&MemberDescriptor::of::<E>(ID_PROPERTY)) {
            body.insert(ID_PROPERTY.to_string(), Value::String(key.to_string()));
        }

        let mut entity: E = self.conventions.serializer.from_document(body)?;

        let mut args = AfterConversionToEntity {
            id: key,
            entity_type: TypeKey::of::<E>(),
            entity: &mut entity,
        };
        for handler in &self.after_conversion {
            handler(&mut args)?;
        }

        Ok(entity)
    }
}

impl core::fmt::Debug for InMemoryDocumentStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InMemoryDocumentStore")
            .field("database", &self.database)
            .field("conventions", &self.conventions)
            .field("before_store", &self.before_store.len())
            .field("after_conversion", &self.after_conversion.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Memo {
        #[serde(default)]
        id: Option<String>,
        text: String,
    }

    impl Entity for Memo {
        type Id = String;
        const COLLECTION: &'static str = "memos";

        fn id(&self) -> Option<&String> {
            self.id.as_ref()
        }

        fn set_id(&mut self, id: String) {
            self.id = Some(id);
        }
    }

    fn memo_document(text: &str) -> StoredDocument {
        let Value::Object(body) = json!({ "text": text }) else {
            unreachable!()
        };
        StoredDocument {
            collection: "memos",
            body,
        }
    }

    #[test]
    fn scan_filters_by_collection_and_orders_by_key() {
        let store = InMemoryDocumentStore::new("db", Conventions::default());
        assert!(store.is_empty().unwrap());
        let mut other = memo_document("x");
        other.collection = "others";
        store
            .commit([
                ("memos/2".to_string(), memo_document("b")),
                ("memos/1".to_string(), memo_document("a")),
                ("others/1".to_string(), other),
            ])
            .unwrap();

        let keys: Vec<_> = store.scan("memos").unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["memos/1", "memos/2"]);
        assert_eq!(store.len().unwrap(), 3);
        assert!(!store.is_empty().unwrap());
    }

    #[test]
    fn claimed_identity_property_is_filled_from_key() {
        let store = InMemoryDocumentStore::new("db", Conventions::default());
        let memo: Memo = store.materialize("memos/1", memo_document("hi")).unwrap();
        assert_eq!(memo.id.as_deref(), Some("memos/1"));
    }

    #[test]
    fn unclaimed_identity_property_is_left_to_handlers() {
        let mut conventions = Conventions::default();
        conventions.find_identity_property = std::sync::Arc::new(|_: &MemberDescriptor| false);
        let mut store = InMemoryDocumentStore::new("db", conventions);

        let memo: Memo = store.materialize("memos/1", memo_document("hi")).unwrap();
        assert_eq!(memo.id, None);

        store.on_after_conversion_to_entity(|args| {
            if let Some(memo) = args.entity.downcast_mut::<Memo>() {
                memo.id = Some(format!("handled:{}", args.id));
            }
            Ok(())
        });
        let memo: Memo = store.materialize("memos/1", memo_document("hi")).unwrap();
        assert_eq!(memo.id.as_deref(), Some("handled:memos/1"));
    }

    #[test]
    fn wrong_collection_is_rejected() {
        let store = InMemoryDocumentStore::new("db", Conventions::default());
        let mut document = memo_document("hi");
        document.collection = "others";
        let err = store.materialize::<Memo>("others/1", document).unwrap_err();
        assert!(matches!(
            err,
            StoreError::CollectionMismatch { expected: "memos", found: "others", .. }
        ));
    }

    #[test]
    fn handler_errors_abort_the_operation() {
        let mut store = InMemoryDocumentStore::new("db", Conventions::default());
        store.on_before_store(|_| Err(StoreError::NotAnObject("null")));
        let mut memo = Memo {
            id: None,
            text: "hi".to_string(),
        };
        let err = store
            .raise_before_store("memos/1", TypeKey::of::<Memo>(), &mut memo)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotAnObject("null")));
    }
}
