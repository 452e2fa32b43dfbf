use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Product;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub discount_price: Option<i64>,
    pub category: String,
    /// Filenames returned by the upload endpoint; the first is the primary image.
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub in_stock: i32,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default = "default_true")]
    pub is_ready: bool,
    #[serde(default)]
    pub is_budget: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    // Nested Option so `"discountPrice": null` clears the discount.
    #[serde(default, with = "double_option")]
    pub discount_price: Option<Option<i64>>,
    pub category: Option<String>,
    pub images: Option<Vec<String>>,
    pub in_stock: Option<i32>,
    pub is_new: Option<bool>,
    pub is_ready: Option<bool>,
    pub is_budget: Option<bool>,
    pub is_active: Option<bool>,
    pub tags: Option<Vec<String>>,
}

mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(de).map(Some)
    }
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryList {
    pub categories: Vec<String>,
    pub count: usize,
}
