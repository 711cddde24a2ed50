use serde::{Deserialize, Serialize};

use docid_core::{Entity, IdRegistryBuilder, new_unique_key, strongly_typed_id};
use docid_customers::CustomerId;
use docid_products::ProductId;

strongly_typed_id! {
    /// Sales order identifier.
    pub struct OrderId(String);
}

impl OrderId {
    /// Create a new identifier (time-ordered, globally unique).
    pub fn create() -> Self {
        Self::new(new_unique_key())
    }
}

/// Order status lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Draft,
    Confirmed,
    Closed,
}

/// Order line: product and quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Order document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    #[serde(default)]
    id: Option<OrderId>,
    order_no: String,
    customer_id: CustomerId,
    #[serde(default)]
    status: OrderStatus,
    #[serde(default)]
    lines: Vec<OrderLine>,
}

impl Order {
    pub fn new(id: OrderId, order_no: impl Into<String>, customer_id: CustomerId) -> Self {
        Self {
            id: Some(id),
            order_no: order_no.into(),
            customer_id,
            status: OrderStatus::Draft,
            lines: Vec::new(),
        }
    }

    pub fn with_line(mut self, product_id: ProductId, quantity: u32) -> Self {
        self.lines.push(OrderLine {
            product_id,
            quantity,
        });
        self
    }

    pub fn order_no(&self) -> &str {
        &self.order_no
    }

    pub fn customer_id(&self) -> &CustomerId {
        &self.customer_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn confirm(&mut self) {
        self.status = OrderStatus::Confirmed;
    }
}

impl Entity for Order {
    type Id = OrderId;
    const COLLECTION: &'static str = "orders";

    fn id(&self) -> Option<&OrderId> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: OrderId) {
        self.id = Some(id);
    }
}

/// Register the order id and entity. Line and customer ids belong to their
/// own modules and are registered there.
pub fn register(builder: IdRegistryBuilder) -> IdRegistryBuilder {
    builder.id::<OrderId>().entity::<Order>()
}
