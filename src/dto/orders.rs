use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Order, OrderItem};

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemRequest>,
    pub delivery_address: String,
    pub delivery_date: Option<String>,
    pub delivery_time: Option<String>,
    pub customer_phone: String,
    pub customer_name: String,
    pub recipient_name: Option<String>,
    pub recipient_phone: Option<String>,
    pub special_instructions: Option<String>,
    pub payment_method: Option<String>,
    pub is_gift: Option<bool>,
    pub gift_message: Option<String>,
    pub is_anonymous: Option<bool>,
}

/// What `POST /api/orders` returns: enough for the confirmation screen.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: Uuid,
    pub order_number: String,
    pub status: String,
    pub total_amount: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}
