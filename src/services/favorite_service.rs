use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    db::DbPool,
    dto::favorites::{FavoriteProductList, FavoriteRequest, FavoriteState},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Favorite, Product},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
};

#[derive(FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    price: i64,
    discount_price: Option<i64>,
    category: String,
    images: serde_json::Value,
    in_stock: i32,
    is_new: bool,
    is_ready: bool,
    is_budget: bool,
    rating: f64,
    review_count: i32,
    is_active: bool,
    tags: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn string_vec(value: serde_json::Value) -> Vec<String> {
    value
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            discount_price: row.discount_price,
            category: row.category,
            images: string_vec(row.images),
            in_stock: row.in_stock,
            is_new: row.is_new,
            is_ready: row.is_ready,
            is_budget: row.is_budget,
            rating: row.rating,
            review_count: row.review_count,
            is_active: row.is_active,
            tags: string_vec(row.tags),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub async fn list_favorites(
    pool: &DbPool,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<FavoriteProductList>> {
    let (page, limit, offset) = pagination.normalize();
    let rows = sqlx::query_as::<_, ProductRow>(
        r#"
        SELECT p.*
        FROM favorites f
        JOIN products p ON p.id = f.product_id
        WHERE f.user_id = $1 AND p.is_active = TRUE
        ORDER BY f.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user.user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM favorites f
        JOIN products p ON p.id = f.product_id
        WHERE f.user_id = $1 AND p.is_active = TRUE
        "#,
    )
    .bind(user.user_id)
    .fetch_one(pool)
    .await?;

    let meta = Meta::new(page, limit, total.0);
    let data = FavoriteProductList {
        items: rows.into_iter().map(Product::from).collect(),
    };
    Ok(ApiResponse::success("Favorites", data, Some(meta)))
}

pub async fn check_favorite(
    pool: &DbPool,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<FavoriteState>> {
    let existing: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM favorites WHERE user_id = $1 AND product_id = $2")
            .bind(user.user_id)
            .bind(product_id)
            .fetch_optional(pool)
            .await?;

    Ok(ApiResponse::success(
        "Favorite state",
        FavoriteState {
            is_favorite: existing.is_some(),
        },
        None,
    ))
}

pub async fn add_favorite(
    pool: &DbPool,
    user: &AuthUser,
    payload: FavoriteRequest,
) -> AppResult<ApiResponse<Favorite>> {
    let product_exists: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM products WHERE id = $1 AND is_active = TRUE")
            .bind(payload.product_id)
            .fetch_optional(pool)
            .await?;

    if product_exists.is_none() {
        return Err(AppError::BadRequest("Product not found".into()));
    }

    let existing: Option<Favorite> =
        sqlx::query_as("SELECT * FROM favorites WHERE user_id = $1 AND product_id = $2")
            .bind(user.user_id)
            .bind(payload.product_id)
            .fetch_optional(pool)
            .await?;

    // Adding the same product twice is a no-op.
    let favorite = if let Some(fav) = existing {
        fav
    } else {
        sqlx::query_as::<_, Favorite>(
            r#"
            INSERT INTO favorites (id, user_id, product_id)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user.user_id)
        .bind(payload.product_id)
        .fetch_one(pool)
        .await?
    };

    Ok(ApiResponse::success("Added to favorites", favorite, None))
}

pub async fn remove_favorite(
    pool: &DbPool,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND product_id = $2")
        .bind(user.user_id)
        .bind(product_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    Ok(ApiResponse::success(
        "Removed from favorites",
        serde_json::json!({}),
        None,
    ))
}

pub async fn toggle_favorite(
    pool: &DbPool,
    user: &AuthUser,
    payload: FavoriteRequest,
) -> AppResult<ApiResponse<FavoriteState>> {
    let existing: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM favorites WHERE user_id = $1 AND product_id = $2")
            .bind(user.user_id)
            .bind(payload.product_id)
            .fetch_optional(pool)
            .await?;

    let is_favorite = if let Some((id,)) = existing {
        sqlx::query("DELETE FROM favorites WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        false
    } else {
        let product_exists: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM products WHERE id = $1 AND is_active = TRUE")
                .bind(payload.product_id)
                .fetch_optional(pool)
                .await?;
        if product_exists.is_none() {
            return Err(AppError::BadRequest("Product not found".into()));
        }

        sqlx::query("INSERT INTO favorites (id, user_id, product_id) VALUES ($1, $2, $3)")
            .bind(Uuid::new_v4())
            .bind(user.user_id)
            .bind(payload.product_id)
            .execute(pool)
            .await?;
        true
    };

    Ok(ApiResponse::success(
        "Favorite toggled",
        FavoriteState { is_favorite },
        None,
    ))
}
