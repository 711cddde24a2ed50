use serde::{Deserialize, Serialize};

use docid_core::{Entity, IdRegistryBuilder, new_unique_key, strongly_typed_id};

strongly_typed_id! {
    /// Customer identifier.
    pub struct CustomerId(String);
}

impl CustomerId {
    /// Create a new identifier (time-ordered, globally unique).
    pub fn create() -> Self {
        Self::new(new_unique_key())
    }
}

/// Customer document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(default)]
    id: Option<CustomerId>,
    name: String,
}

impl Customer {
    pub fn new(id: CustomerId, name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Entity for Customer {
    type Id = CustomerId;
    const COLLECTION: &'static str = "customers";

    fn id(&self) -> Option<&CustomerId> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: CustomerId) {
        self.id = Some(id);
    }
}

pub fn register(builder: IdRegistryBuilder) -> IdRegistryBuilder {
    builder.id::<CustomerId>().entity::<Customer>()
}
