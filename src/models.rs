use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Closed category list for the flower-shop catalog.
pub const CATEGORIES: &[&str] = &[
    "Комбо",
    "Сборные букеты",
    "Композиции",
    "Розы",
    "Комнатные растения",
    "Сладости",
    "Игрушки",
];

pub fn is_valid_category(category: &str) -> bool {
    CATEGORIES.contains(&category)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Confirmed,
    Delivering,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "confirmed" => Some(Self::Confirmed),
            "delivering" => Some(Self::Delivering),
            "delivered" => Some(Self::Delivered),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Confirmed => "confirmed",
            Self::Delivering => "delivering",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// No transition leaves `delivered` or `cancelled`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Cancellation is reachable from every non-terminal state.
    pub fn can_cancel(&self) -> bool {
        !self.is_terminal()
    }

    /// Statuses that block user deletion while an order is in flight.
    pub const ACTIVE: &'static [&'static str] =
        &["pending", "processing", "confirmed", "delivering"];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    Online,
}

impl PaymentMethod {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cash" => Some(Self::Cash),
            "card" => Some(Self::Card),
            "online" => Some(Self::Online),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Card => "card",
            Self::Online => "online",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Prices are minor currency units (kopecks), never floats.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub discount_price: Option<i64>,
    pub category: String,
    pub images: Vec<String>,
    pub in_stock: i32,
    pub is_new: bool,
    pub is_ready: bool,
    pub is_budget: bool,
    pub rating: f64,
    pub review_count: i32,
    pub is_active: bool,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Authoritative unit price: the discount price wins when present.
    pub fn effective_price(&self) -> i64 {
        self.discount_price.unwrap_or(self.price)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub price_at_time: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub status: String,
    pub total_amount: i64,
    pub delivery_address: String,
    pub delivery_date: Option<DateTime<Utc>>,
    pub delivery_time: Option<String>,
    pub customer_phone: String,
    pub customer_name: String,
    pub recipient_name: Option<String>,
    pub recipient_phone: Option<String>,
    pub special_instructions: Option<String>,
    pub payment_status: String,
    pub payment_method: String,
    pub is_gift: bool,
    pub gift_message: Option<String>,
    pub is_anonymous: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: i64,
    pub total_price: i64,
    pub product_name: String,
    pub product_image: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_status_round_trips() {
        for s in [
            "pending",
            "processing",
            "confirmed",
            "delivering",
            "delivered",
            "cancelled",
        ] {
            assert_eq!(OrderStatus::parse(s).unwrap().as_str(), s);
        }
        assert!(OrderStatus::parse("shipped").is_none());
    }

    #[test]
    fn terminal_states_cannot_cancel() {
        assert!(OrderStatus::Pending.can_cancel());
        assert!(OrderStatus::Delivering.can_cancel());
        assert!(!OrderStatus::Delivered.can_cancel());
        assert!(!OrderStatus::Cancelled.can_cancel());
    }

    #[test]
    fn discount_price_wins_when_present() {
        let mut product = Product {
            id: Uuid::new_v4(),
            name: "Розы".into(),
            description: None,
            price: 15000,
            discount_price: Some(10000),
            category: "Розы".into(),
            images: vec![],
            in_stock: 5,
            is_new: false,
            is_ready: true,
            is_budget: false,
            rating: 0.0,
            review_count: 0,
            is_active: true,
            tags: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(product.effective_price(), 10000);
        product.discount_price = None;
        assert_eq!(product.effective_price(), 15000);
    }
}
