use serde::{Deserialize, Serialize};

use docid_core::{Entity, IdRegistryBuilder, new_unique_key, strongly_typed_id};

strongly_typed_id! {
    /// Product identifier; also the product's document key.
    pub struct ProductId(String);
}

impl ProductId {
    /// Create a new identifier (time-ordered, globally unique).
    pub fn create() -> Self {
        Self::new(new_unique_key())
    }
}

/// Product document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Never part of the document body; the store fills it from the key.
    #[serde(default)]
    id: Option<ProductId>,
    name: String,
}

impl Product {
    pub fn new(id: ProductId, name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
        }
    }

    /// A product whose id the store assigns on first save.
    pub fn unassigned(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Entity for Product {
    type Id = ProductId;
    const COLLECTION: &'static str = "products";

    fn id(&self) -> Option<&ProductId> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: ProductId) {
        self.id = Some(id);
    }
}

/// Register the product id and entity with an id registry.
pub fn register(builder: IdRegistryBuilder) -> IdRegistryBuilder {
    builder.id::<ProductId>().entity::<Product>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use docid_core::{IdRegistry, TypeKey};

    #[test]
    fn created_ids_are_unique() {
        assert_ne!(ProductId::create(), ProductId::create());
    }

    #[test]
    fn product_is_a_strongly_typed_entity() {
        let registry = register(IdRegistry::builder()).build();
        let property = registry
            .strongly_typed_entity(TypeKey::of::<Product>())
            .expect("product id is strongly typed");
        assert_eq!(property.id_type(), TypeKey::of::<ProductId>());
        assert_eq!(property.value_type(), TypeKey::of::<String>());
    }

    #[test]
    fn id_serializes_as_bare_string() {
        let product = Product::new(ProductId::new("01HXYZ"), "Test");
        let json = serde_json::to_value(&product).unwrap();
        assert_eq!(json, serde_json::json!({ "id": "01HXYZ", "name": "Test" }));
    }

    #[test]
    fn missing_id_deserializes_as_unassigned() {
        let product: Product = serde_json::from_value(serde_json::json!({ "name": "Test" })).unwrap();
        assert_eq!(product, Product::unassigned("Test"));
        assert!(product.id().is_none());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: the document form of a product reads back unchanged.
            #[test]
            fn document_round_trip(raw in "[0-9A-Z]{26}", name in "[A-Za-z][A-Za-z0-9 ]{0,40}") {
                let product = Product::new(ProductId::new(raw), name);
                let json = serde_json::to_string(&product).unwrap();
                let back: Product = serde_json::from_str(&json).unwrap();
                prop_assert_eq!(back, product);
            }
        }
    }
}
