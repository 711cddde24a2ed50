use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use docid_core::{Entity, ID_PROPERTY, MemberDescriptor, TypeKey};

use super::in_memory::InMemoryDocumentStore;
use super::{StoreError, StoredDocument};

/// Unit of work against a document store.
///
/// Tracks loaded entities by key, buffers stores until [`save_changes`], and
/// counts round trips against the configured request budget.
///
/// [`save_changes`]: DocumentSession::save_changes
pub struct DocumentSession<'s> {
    store: &'s InMemoryDocumentStore,
    pending: Vec<(String, StoredDocument)>,
    tracked: HashMap<String, Box<dyn Any + Send + Sync>>,
    included: HashMap<String, StoredDocument>,
    requests: usize,
}

impl<'s> DocumentSession<'s> {
    pub(crate) fn new(store: &'s InMemoryDocumentStore) -> Self {
        Self {
            store,
            pending: Vec::new(),
            tracked: HashMap::new(),
            included: HashMap::new(),
            requests: 0,
        }
    }

    /// Round trips issued so far.
    pub fn number_of_requests(&self) -> usize {
        self.requests
    }

    /// Stage `entity` for storage and return its document key.
    ///
    /// The key is the entity's own id when the identity convention claims the
    /// `id` member and it is set; otherwise the configured generator picks it.
    pub async fn store<E>(&mut self, entity: &mut E) -> Result<String, StoreError>
    where
        E: Entity + Serialize + Clone,
    {
        let store = self.store;
        let conventions = store.conventions();
        let entity_type = TypeKey::of::<E>();
        let claimed = (conventions.find_identity_property)(&MemberDescriptor::of::<E>(ID_PROPERTY));

        let existing = if claimed {
            entity.id().map(ToString::to_string)
        } else {
            None
        };
        let key = match existing {
            Some(key) => key,
            None => {
                let key = conventions
                    .document_id_generator
                    .generate(store.database(), &*entity, entity_type)
                    .await;
                if claimed {
                    // The store owns claimed ids; plain string ids get the key.
                    if let Some(id) = (&key as &dyn Any).downcast_ref::<E::Id>() {
                        entity.set_id(id.clone());
                    }
                }
                key
            }
        };

        store.raise_before_store(&key, entity_type, &mut *entity)?;
        let body = conventions.serializer.to_document(&*entity)?;

        debug!(collection = E::COLLECTION, key = %key, "staged document");
        self.pending.retain(|(pending, _)| pending != &key);
        self.pending.push((
            key.clone(),
            StoredDocument {
                collection: E::COLLECTION,
                body,
            },
        ));
        self.tracked.insert(key.clone(), Box::new(entity.clone()));
        Ok(key)
    }

    /// Flush staged documents in one request.
    pub async fn save_changes(&mut self) -> Result<(), StoreError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.count_request()?;
        let pending = std::mem::take(&mut self.pending);
        self.store.commit(pending)?;
        Ok(())
    }

    /// Load one entity by key.
    ///
    /// Entities already tracked or pulled in by an include cost no request.
    pub async fn load<E>(&mut self, key: &str) -> Result<Option<E>, StoreError>
    where
        E: Entity + DeserializeOwned + Clone,
    {
        if let Some(entity) = self.tracked_entity::<E>(key) {
            return Ok(Some(entity));
        }
        if let Some(document) = self.included.remove(key) {
            return self.track(key, document).map(Some);
        }

        self.count_request()?;
        match self.store.document(key)? {
            Some(document) => self.track(key, document).map(Some),
            None => Ok(None),
        }
    }

    /// Start a load that also prefetches the documents referenced at `path`.
    ///
    /// Paths are dotted field names into the document body; arrays are
    /// walked element-wise (`lines.product_id`).
    pub fn include(&mut self, path: &'static str) -> IncludeLoader<'_, 's> {
        IncludeLoader {
            session: self,
            paths: vec![path],
        }
    }

    /// Query the collection of `E`.
    pub fn query<E>(&mut self) -> Query<'_, 's, E>
    where
        E: Entity + DeserializeOwned + Clone,
    {
        Query {
            session: self,
            filters: Vec::new(),
            error: None,
            _entity: PhantomData,
        }
    }

    fn count_request(&mut self) -> Result<(), StoreError> {
        let max = self.store.conventions().max_requests_per_session;
        if self.requests >= max {
            return Err(StoreError::TooManyRequests { max });
        }
        self.requests += 1;
        Ok(())
    }

    fn tracked_entity<E: Entity + Clone>(&self, key: &str) -> Option<E> {
        self.tracked
            .get(key)
            .and_then(|entity| entity.downcast_ref::<E>())
            .cloned()
    }

    fn track<E>(&mut self, key: &str, document: StoredDocument) -> Result<E, StoreError>
    where
        E: Entity + DeserializeOwned + Clone,
    {
        let entity: E = self.store.materialize(key, document)?;
        self.tracked.insert(key.to_string(), Box::new(entity.clone()));
        Ok(entity)
    }
}

impl core::fmt::Debug for DocumentSession<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DocumentSession")
            .field("database", &self.store.database())
            .field("pending", &self.pending.len())
            .field("tracked", &self.tracked.len())
            .field("requests", &self.requests)
            .finish()
    }
}

/// Load with includes; see [`DocumentSession::include`].
pub struct IncludeLoader<'a, 's> {
    session: &'a mut DocumentSession<'s>,
    paths: Vec<&'static str>,
}

impl IncludeLoader<'_, '_> {
    pub fn include(mut self, path: &'static str) -> Self {
        self.paths.push(path);
        self
    }

    /// Load `key` and every referenced document in a single request.
    pub async fn load<E>(self, key: &str) -> Result<Option<E>, StoreError>
    where
        E: Entity + DeserializeOwned + Clone,
    {
        let session = self.session;
        session.count_request()?;

        let Some(document) = session.store.document(key)? else {
            return Ok(None);
        };

        for path in &self.paths {
            let mut references = Vec::new();
            collect_references(&document.body, path, &mut references);
            for reference in references {
                if session.tracked.contains_key(&reference) || session.included.contains_key(&reference) {
                    continue;
                }
                if let Some(included) = session.store.document(&reference)? {
                    session.included.insert(reference, included);
                }
            }
        }

        session.track(key, document).map(Some)
    }
}

/// String values reachable from `body` along a dotted `path`.
fn collect_references(body: &serde_json::Map<String, Value>, path: &str, out: &mut Vec<String>) {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    if let Some(value) = body.get(head) {
        collect_from_value(value, rest, out);
    }
}

fn collect_from_value(value: &Value, rest: Option<&str>, out: &mut Vec<String>) {
    match (value, rest) {
        (Value::Array(items), _) => {
            for item in items {
                collect_from_value(item, rest, out);
            }
        }
        (Value::Object(object), Some(rest)) => collect_references(object, rest, out),
        (Value::String(reference), None) => out.push(reference.clone()),
        _ => {}
    }
}

/// Equality query over one collection.
///
/// Filter values go through the store's serializer, so strongly typed ids
/// compare by their wrapped value. Filtering on `id` matches document keys.
pub struct Query<'a, 's, E> {
    session: &'a mut DocumentSession<'s>,
    filters: Vec<(&'static str, Value)>,
    error: Option<StoreError>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Query<'_, '_, E>
where
    E: Entity + DeserializeOwned + Clone,
{
    pub fn where_eq<V: Serialize + Any>(mut self, field: &'static str, value: &V) -> Self {
        match self.session.store.conventions().serializer.encode(value) {
            Ok(token) => self.filters.push((field, token)),
            Err(err) => {
                self.error.get_or_insert(err);
            }
        }
        self
    }

    pub async fn to_list(self) -> Result<Vec<E>, StoreError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let session = self.session;
        session.count_request()?;

        let mut results = Vec::new();
        for (key, document) in session.store.scan(E::COLLECTION)? {
            let matches = self.filters.iter().all(|(field, expected)| {
                if *field == ID_PROPERTY {
                    matches!(expected, Value::String(id) if *id == key)
                } else {
                    document.body.get(*field) == Some(expected)
                }
            });
            if matches {
                results.push(session.track(&key, document)?);
            }
        }
        Ok(results)
    }

    pub async fn first(self) -> Result<Option<E>, StoreError> {
        Ok(self.to_list().await?.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> serde_json::Map<String, Value> {
        match value {
            Value::Object(body) => body,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn references_follow_nested_arrays() {
        let body = body(json!({
            "customer_id": "c-1",
            "lines": [
                { "product_id": "p-1", "quantity": 1 },
                { "product_id": "p-2", "quantity": 3 },
                { "quantity": 4 },
            ],
        }));

        let mut out = Vec::new();
        collect_references(&body, "lines.product_id", &mut out);
        collect_references(&body, "customer_id", &mut out);
        assert_eq!(out, vec!["p-1", "p-2", "c-1"]);
    }

    #[test]
    fn missing_or_non_string_paths_yield_nothing() {
        let body = body(json!({ "count": 3, "nested": { "id": 7 } }));
        let mut out = Vec::new();
        collect_references(&body, "absent", &mut out);
        collect_references(&body, "count", &mut out);
        collect_references(&body, "nested.id", &mut out);
        collect_references(&body, "nested", &mut out);
        assert!(out.is_empty());
    }
}
