use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    db::DbPool,
    dto::cart::{AddToCartRequest, CartItemView, CartView, UpdateCartItemRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::ApiResponse,
};

#[derive(FromRow)]
struct CartItemRow {
    id: Uuid,
    product_id: Uuid,
    quantity: i32,
    price_at_time: i64,
    name: String,
    images: serde_json::Value,
    price: i64,
    discount_price: Option<i64>,
    in_stock: i32,
}

#[derive(FromRow)]
struct ProductStockRow {
    price: i64,
    discount_price: Option<i64>,
    in_stock: i32,
    is_active: bool,
}

/// Every user has at most one `active` cart; create it lazily.
async fn get_or_create_cart(pool: &DbPool, user_id: Uuid) -> AppResult<Uuid> {
    let existing: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM carts WHERE user_id = $1 AND status = 'active'")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    if let Some((id,)) = existing {
        return Ok(id);
    }

    let (id,): (Uuid,) =
        sqlx::query_as("INSERT INTO carts (id, user_id, status) VALUES ($1, $2, 'active') RETURNING id")
            .bind(Uuid::new_v4())
            .bind(user_id)
            .fetch_one(pool)
            .await?;
    Ok(id)
}

async fn load_cart_view(pool: &DbPool, cart_id: Uuid) -> AppResult<CartView> {
    let rows = sqlx::query_as::<_, CartItemRow>(
        r#"
        SELECT ci.id, ci.product_id, ci.quantity, ci.price_at_time,
               p.name, p.images, p.price, p.discount_price, p.in_stock
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.cart_id = $1
        ORDER BY ci.created_at
        "#,
    )
    .bind(cart_id)
    .fetch_all(pool)
    .await?;

    let mut items = Vec::with_capacity(rows.len());
    let mut total_amount = 0i64;
    let mut items_count = 0i64;

    for row in rows {
        // Checkout prices from the live product, not the add-time snapshot.
        let current_price = row.discount_price.unwrap_or(row.price);
        let line_total = current_price * row.quantity as i64;
        total_amount += line_total;
        items_count += row.quantity as i64;

        let image = row
            .images
            .as_array()
            .and_then(|arr| arr.first())
            .and_then(|v| v.as_str())
            .map(str::to_string);

        items.push(CartItemView {
            id: row.id,
            product_id: row.product_id,
            name: row.name,
            image,
            quantity: row.quantity,
            price_at_time: row.price_at_time,
            current_price,
            line_total,
            in_stock: row.in_stock,
        });
    }

    Ok(CartView {
        id: cart_id,
        status: "active".to_string(),
        items,
        total_amount,
        items_count,
    })
}

pub async fn get_cart(pool: &DbPool, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    let cart_id = get_or_create_cart(pool, user.user_id).await?;
    let view = load_cart_view(pool, cart_id).await?;
    Ok(ApiResponse::success("Cart", view, None))
}

pub async fn add_to_cart(
    pool: &DbPool,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartView>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let product: Option<ProductStockRow> = sqlx::query_as(
        "SELECT price, discount_price, in_stock, is_active FROM products WHERE id = $1",
    )
    .bind(payload.product_id)
    .fetch_optional(pool)
    .await?;

    let product = match product {
        Some(p) if p.is_active => p,
        _ => return Err(AppError::BadRequest("product not found".to_string())),
    };

    let cart_id = get_or_create_cart(pool, user.user_id).await?;

    let existing: Option<(Uuid, i32)> = sqlx::query_as(
        "SELECT id, quantity FROM cart_items WHERE cart_id = $1 AND product_id = $2",
    )
    .bind(cart_id)
    .bind(payload.product_id)
    .fetch_optional(pool)
    .await?;

    let requested = existing.map(|(_, q)| q).unwrap_or(0) + payload.quantity;
    if requested > product.in_stock {
        return Err(AppError::BadRequest(format!(
            "Only {} left in stock",
            product.in_stock
        )));
    }

    let price_at_time = product.discount_price.unwrap_or(product.price);

    if let Some((item_id, _)) = existing {
        // Same product added twice merges into one line, snapshot refreshed.
        sqlx::query(
            "UPDATE cart_items SET quantity = $2, price_at_time = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(item_id)
        .bind(requested)
        .bind(price_at_time)
        .execute(pool)
        .await?;
    } else {
        sqlx::query(
            "INSERT INTO cart_items (id, cart_id, product_id, quantity, price_at_time) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::new_v4())
        .bind(cart_id)
        .bind(payload.product_id)
        .bind(payload.quantity)
        .bind(price_at_time)
        .execute(pool)
        .await?;
    }

    let view = load_cart_view(pool, cart_id).await?;
    Ok(ApiResponse::success("Added to cart", view, None))
}

pub async fn update_cart_item(
    pool: &DbPool,
    user: &AuthUser,
    item_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartView>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    // Ownership check goes through the cart join.
    let row: Option<(Uuid, Uuid, i32)> = sqlx::query_as(
        r#"
        SELECT ci.id, c.id AS cart_id, p.in_stock
        FROM cart_items ci
        JOIN carts c ON c.id = ci.cart_id
        JOIN products p ON p.id = ci.product_id
        WHERE ci.id = $1 AND c.user_id = $2 AND c.status = 'active'
        "#,
    )
    .bind(item_id)
    .bind(user.user_id)
    .fetch_optional(pool)
    .await?;

    let (item_id, cart_id, in_stock) = row.ok_or(AppError::NotFound)?;

    if payload.quantity > in_stock {
        return Err(AppError::BadRequest(format!("Only {} left in stock", in_stock)));
    }

    sqlx::query("UPDATE cart_items SET quantity = $2, updated_at = NOW() WHERE id = $1")
        .bind(item_id)
        .bind(payload.quantity)
        .execute(pool)
        .await?;

    let view = load_cart_view(pool, cart_id).await?;
    Ok(ApiResponse::success("Cart updated", view, None))
}

pub async fn remove_from_cart(
    pool: &DbPool,
    user: &AuthUser,
    item_id: Uuid,
) -> AppResult<ApiResponse<CartView>> {
    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        SELECT c.id
        FROM cart_items ci
        JOIN carts c ON c.id = ci.cart_id
        WHERE ci.id = $1 AND c.user_id = $2 AND c.status = 'active'
        "#,
    )
    .bind(item_id)
    .bind(user.user_id)
    .fetch_optional(pool)
    .await?;

    let (cart_id,) = row.ok_or(AppError::NotFound)?;

    sqlx::query("DELETE FROM cart_items WHERE id = $1")
        .bind(item_id)
        .execute(pool)
        .await?;

    let view = load_cart_view(pool, cart_id).await?;
    Ok(ApiResponse::success("Removed from cart", view, None))
}

pub async fn clear_cart(
    pool: &DbPool,
    user: &AuthUser,
) -> AppResult<ApiResponse<CartView>> {
    let cart_id = get_or_create_cart(pool, user.user_id).await?;

    sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
        .bind(cart_id)
        .execute(pool)
        .await?;

    let view = load_cart_view(pool, cart_id).await?;
    Ok(ApiResponse::success("Cart cleared", view, None))
}
