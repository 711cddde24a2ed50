//! Ready-made store wiring for tests and local runs.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use docid_core::{Entity, IdRegistry};

use crate::config::StoreConfig;
use crate::conventions::{EntityIdHooks, configure};
use crate::document_store::{InMemoryDocumentStore, StoreError};

/// Builds the id registry for every domain module and hands out stores with
/// the id glue installed.
#[derive(Debug, Clone)]
pub struct TestDriver {
    config: StoreConfig,
    registry: Arc<IdRegistry>,
}

impl TestDriver {
    /// Driver configured from the environment, with logging initialized.
    pub fn new() -> Self {
        docid_observability::init();
        Self::with_config(StoreConfig::from_env())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            registry: Arc::new(domain_registry()),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<IdRegistry> {
        &self.registry
    }

    /// A fresh, empty store with strongly typed id conventions and hooks.
    pub fn document_store(&self) -> InMemoryDocumentStore {
        let conventions = configure(self.registry.clone(), &self.config);
        let mut store = InMemoryDocumentStore::new(self.config.database.clone(), conventions);
        EntityIdHooks::new(self.registry.clone()).attach(&mut store);
        info!(
            database = %self.config.database,
            max_requests_per_session = self.config.max_requests_per_session,
            "document store initialized"
        );
        store
    }

    /// Store `entities` in one session and commit them.
    pub async fn seed<E>(
        &self,
        store: &InMemoryDocumentStore,
        entities: &mut [E],
    ) -> Result<Vec<String>, StoreError>
    where
        E: Entity + Serialize + Clone,
    {
        let mut session = store.open_session();
        let mut keys = Vec::with_capacity(entities.len());
        for entity in entities.iter_mut() {
            keys.push(session.store(entity).await?);
        }
        session.save_changes().await?;
        Ok(keys)
    }
}

impl Default for TestDriver {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry covering every domain crate's ids and entities.
pub fn domain_registry() -> IdRegistry {
    let builder = IdRegistry::builder();
    let builder = docid_products::register(builder);
    let builder = docid_customers::register(builder);
    docid_sales::register(builder).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use docid_core::TypeKey;
    use docid_customers::Customer;
    use docid_products::{Product, ProductId};
    use docid_sales::Order;

    #[test]
    fn registry_covers_all_domain_entities() {
        let registry = domain_registry();
        for entity in [
            TypeKey::of::<Product>(),
            TypeKey::of::<Customer>(),
            TypeKey::of::<Order>(),
        ] {
            assert!(registry.is_strongly_typed_entity(entity), "{entity}");
        }
    }

    #[test]
    fn store_uses_configured_database() {
        let driver = TestDriver::with_config(StoreConfig::default().with_database("orders-db"));
        assert_eq!(driver.config().database, "orders-db");
        assert!(driver.registry().is_strongly_typed_entity(TypeKey::of::<Order>()));

        let store = driver.document_store();
        assert_eq!(store.database(), "orders-db");
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn seed_commits_in_one_request() {
        let driver = TestDriver::with_config(StoreConfig::default());
        let store = driver.document_store();
        let mut products = [
            Product::new(ProductId::new("p-1"), "One"),
            Product::new(ProductId::new("p-2"), "Two"),
        ];
        let keys = driver.seed(&store, &mut products).await.unwrap();
        assert_eq!(keys, vec!["p-1", "p-2"]);
        assert_eq!(store.len().unwrap(), 2);
    }
}
