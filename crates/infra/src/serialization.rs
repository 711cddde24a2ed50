//! Document serialization: serde plus pluggable converters and a contract
//! resolver deciding which properties reach the document body.

use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use docid_core::{ID_PROPERTY, IdError, IdJsonConverter, IdRegistry, JsonConverter, TypeKey};

use crate::document_store::StoreError;

/// Document body: a JSON object without the key property.
pub type DocumentBody = Map<String, Value>;

/// Suppresses named properties from serialized documents.
///
/// The suppressed properties are still readable through converters invoked
/// explicitly; they just never land in the stored body.
#[derive(Debug, Clone, Default)]
pub struct ContractResolver {
    ignored: HashSet<String>,
}

impl ContractResolver {
    pub fn new<I, S>(ignore: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ignored: ignore.into_iter().map(Into::into).collect(),
        }
    }

    pub fn should_serialize(&self, property: &str) -> bool {
        !self.ignored.contains(property)
    }

    /// Strip ignored properties from `body` and from every object nested in
    /// it, array elements included.
    pub fn apply(&self, body: &mut DocumentBody) {
        body.retain(|property, _| self.should_serialize(property));
        for value in body.values_mut() {
            self.apply_nested(value);
        }
    }

    fn apply_nested(&self, value: &mut Value) {
        match value {
            Value::Object(object) => self.apply(object),
            Value::Array(items) => {
                for item in items {
                    self.apply_nested(item);
                }
            }
            _ => {}
        }
    }
}

/// Host serializer configuration.
///
/// Converters apply to single values only ([`encode`](Self::encode),
/// [`decode`](Self::decode), query arguments). Whole documents go through
/// serde, where strongly typed ids are already transparent.
#[derive(Clone, Default)]
pub struct DocumentSerializer {
    converters: Vec<Arc<dyn JsonConverter>>,
    resolver: ContractResolver,
}

impl DocumentSerializer {
    pub fn new(resolver: ContractResolver) -> Self {
        Self {
            converters: Vec::new(),
            resolver,
        }
    }

    pub fn with_converter(mut self, converter: impl JsonConverter + 'static) -> Self {
        self.converters.push(Arc::new(converter));
        self
    }

    pub fn resolver(&self) -> &ContractResolver {
        &self.resolver
    }

    pub fn to_document<E: Serialize>(&self, entity: &E) -> Result<DocumentBody, StoreError> {
        match serde_json::to_value(entity)? {
            Value::Object(mut body) => {
                self.resolver.apply(&mut body);
                Ok(body)
            }
            other => Err(StoreError::NotAnObject(json_kind(&other))),
        }
    }

    pub fn from_document<E: DeserializeOwned>(&self, body: DocumentBody) -> Result<E, StoreError> {
        Ok(serde_json::from_value(Value::Object(body))?)
    }

    /// Encode a single value, preferring a registered converter over serde.
    pub fn encode<V: Serialize + Any>(&self, value: &V) -> Result<Value, StoreError> {
        let ty = TypeKey::of::<V>();
        match self.converters.iter().find(|c| c.can_convert(ty)) {
            Some(converter) => Ok(converter.write_json(Some(value), ty)?),
            None => Ok(serde_json::to_value(value)?),
        }
    }

    /// Decode a single value, preferring a registered converter over serde.
    pub fn decode<V: DeserializeOwned + Any>(&self, token: &Value) -> Result<Option<V>, StoreError> {
        let ty = TypeKey::of::<V>();
        match self.converters.iter().find(|c| c.can_convert(ty)) {
            Some(converter) => match converter.read_json(token, ty)? {
                None => Ok(None),
                Some(value) => value
                    .downcast::<V>()
                    .map(|value| Some(*value))
                    .map_err(|_| StoreError::Id(IdError::type_mismatch(ty.name()))),
            },
            None if token.is_null() => Ok(None),
            None => Ok(Some(serde_json::from_value(token.clone())?)),
        }
    }
}

impl core::fmt::Debug for DocumentSerializer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DocumentSerializer")
            .field("converters", &self.converters.len())
            .field("resolver", &self.resolver)
            .finish()
    }
}

/// Serializer with the strongly typed id converter registered and the `id`
/// property kept out of document bodies (it travels as the document key).
pub fn create_custom_json_serialization(registry: Arc<IdRegistry>) -> DocumentSerializer {
    DocumentSerializer::new(ContractResolver::new([ID_PROPERTY]))
        .with_converter(IdJsonConverter::new(registry))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docid_products::{Product, ProductId};
    use serde_json::json;

    fn serializer() -> DocumentSerializer {
        let registry = docid_products::register(IdRegistry::builder()).build();
        create_custom_json_serialization(Arc::new(registry))
    }

    #[test]
    fn resolver_strips_id_from_body() {
        let body = serializer()
            .to_document(&Product::new(ProductId::new("p-1"), "Test"))
            .unwrap();
        assert_eq!(Value::Object(body), json!({ "name": "Test" }));
    }

    #[test]
    fn resolver_only_strips_listed_properties() {
        let resolver = ContractResolver::new(["secret"]);
        assert!(!resolver.should_serialize("secret"));
        assert!(resolver.should_serialize("id"));
    }

    #[test]
    fn resolver_strips_nested_objects_and_arrays() {
        let serializer = serializer();
        let Value::Object(mut body) = json!({
            "id": "o-1",
            "customer": { "id": "c-1", "name": "My Customer" },
            "lines": [{ "id": "l-1", "quantity": 1 }, 7],
        }) else {
            unreachable!()
        };

        serializer.resolver().apply(&mut body);
        assert_eq!(
            Value::Object(body),
            json!({
                "customer": { "name": "My Customer" },
                "lines": [{ "quantity": 1 }, 7],
            })
        );
    }

    #[test]
    fn non_object_entities_are_rejected() {
        let err = serializer().to_document(&"just a string").unwrap_err();
        assert!(matches!(err, StoreError::NotAnObject("string")));
    }

    #[test]
    fn encode_uses_id_converter() {
        let token = serializer().encode(&ProductId::new("01HXYZ")).unwrap();
        assert_eq!(token, json!("01HXYZ"));
    }

    #[test]
    fn encode_falls_back_to_serde() {
        let token = serializer().encode(&42u32).unwrap();
        assert_eq!(token, json!(42));
    }

    #[test]
    fn decode_round_trips_through_converter() {
        let serializer = serializer();
        let id: Option<ProductId> = serializer.decode(&json!("01HXYZ")).unwrap();
        assert_eq!(id, Some(ProductId::new("01HXYZ")));

        let none: Option<ProductId> = serializer.decode(&Value::Null).unwrap();
        assert_eq!(none, None);

        let plain: Option<String> = serializer.decode(&json!("raw")).unwrap();
        assert_eq!(plain.as_deref(), Some("raw"));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: bodies never carry `id`, and the key restores it.
            #[test]
            fn body_plus_key_restores_entity(raw in "[0-9A-Z]{26}", name in "[A-Za-z ]{1,30}") {
                let serializer = serializer();
                let product = Product::new(ProductId::new(raw.clone()), name);
                let mut body = serializer.to_document(&product).unwrap();
                prop_assert!(!body.contains_key(ID_PROPERTY));

                body.insert(ID_PROPERTY.to_string(), Value::String(raw));
                let back: Product = serializer.from_document(body).unwrap();
                prop_assert_eq!(back, product);
            }
        }
    }
}
