use uuid::Uuid;

use crate::dto::products::{
    CategoryList, CreateProductRequest, ProductList, UpdateProductRequest,
};
use crate::{
    entity::products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{CATEGORIES, Product, is_valid_category},
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SearchQuery, ShowcaseQuery, SortOrder},
    state::AppState,
};
use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all();

    // Storefront sees active products only; `isActive=false` is the admin view.
    if query.is_active.unwrap_or(true) {
        condition = condition.add(Column::IsActive.eq(true));
    }

    if let Some(category) = query.category.as_ref().filter(|c| !c.is_empty()) {
        condition = condition.add(Column::Category.eq(category.as_str()));
    }

    if let Some(search) = query.search.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Name).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern)),
        );
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }

    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    if query.is_new == Some(true) {
        condition = condition.add(Column::IsNew.eq(true));
    }

    if query.is_budget == Some(true) {
        condition = condition.add(Column::IsBudget.eq(true));
    }

    if query.has_discount == Some(true) {
        condition = condition.add(Column::DiscountPrice.is_not_null());
    }

    let sort_by = ProductSortBy::parse_lenient(query.sort_by.as_deref());
    let sort_order = SortOrder::parse_lenient(query.sort_order.as_deref());
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Name => Column::Name,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Category => Column::Category,
        ProductSortBy::InStock => Column::InStock,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    let data = ProductList { items };
    Ok(ApiResponse::success("Products", data, Some(meta)))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let result = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .filter(|p| p.is_active)
        .map(product_from_entity);
    let result = match result {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };
    Ok(ApiResponse::success("Product", result, None))
}

/// Quick text search over the active catalog, newest match first.
pub async fn search_products(
    state: &AppState,
    query: SearchQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let term = query.q.as_deref().unwrap_or("").trim().to_string();
    if term.chars().count() < 2 {
        return Err(AppError::BadRequest(
            "Search query must be at least 2 characters".into(),
        ));
    }

    let pattern = format!("%{}%", term);
    let mut condition = Condition::all().add(Column::IsActive.eq(true)).add(
        Condition::any()
            .add(Expr::col(Column::Name).ilike(pattern.clone()))
            .add(Expr::col(Column::Description).ilike(pattern)),
    );
    if let Some(category) = query.category.as_ref().filter(|c| !c.is_empty()) {
        condition = condition.add(Column::Category.eq(category.as_str()));
    }

    let limit = query.limit.unwrap_or(10).clamp(1, 100);
    let items: Vec<Product> = Products::find()
        .filter(condition)
        .order_by_desc(Column::CreatedAt)
        .limit(limit as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Search results",
        ProductList { items },
        None,
    ))
}

/// Storefront showcase: best rated active products first, review count
/// and recency breaking ties.
pub async fn popular_products(
    state: &AppState,
    query: ShowcaseQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let items: Vec<Product> = Products::find()
        .filter(Column::IsActive.eq(true))
        .order_by_desc(Column::Rating)
        .order_by_desc(Column::ReviewCount)
        .order_by_desc(Column::CreatedAt)
        .limit(query.limit_or(8) as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Popular products",
        ProductList { items },
        None,
    ))
}

/// Active products flagged as new arrivals, newest first.
pub async fn new_products(
    state: &AppState,
    query: ShowcaseQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let items: Vec<Product> = Products::find()
        .filter(
            Condition::all()
                .add(Column::IsActive.eq(true))
                .add(Column::IsNew.eq(true)),
        )
        .order_by_desc(Column::CreatedAt)
        .limit(query.limit_or(8) as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "New products",
        ProductList { items },
        None,
    ))
}

/// The fixed catalog categories plus any distinct category already in use.
pub async fn list_categories(state: &AppState) -> AppResult<ApiResponse<CategoryList>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT DISTINCT category FROM products WHERE is_active = TRUE ORDER BY category",
    )
    .fetch_all(&state.pool)
    .await?;

    let mut categories: Vec<String> = CATEGORIES.iter().map(|c| c.to_string()).collect();
    for (category,) in rows {
        if !categories.contains(&category) {
            categories.push(category);
        }
    }

    let count = categories.len();
    Ok(ApiResponse::success(
        "Categories",
        CategoryList { categories, count },
        None,
    ))
}

fn validate_name(name: &str) -> AppResult<()> {
    let len = name.chars().count();
    if !(3..=200).contains(&len) {
        return Err(AppError::BadRequest(
            "Name must be 3 to 200 characters".into(),
        ));
    }
    Ok(())
}

fn validate_prices(price: i64, discount_price: Option<i64>) -> AppResult<()> {
    if price <= 0 {
        return Err(AppError::BadRequest("Price must be positive".into()));
    }
    if let Some(discount) = discount_price {
        if discount <= 0 {
            return Err(AppError::BadRequest("Discount price must be positive".into()));
        }
        if discount >= price {
            return Err(AppError::BadRequest(
                "Discount price must be lower than the regular price".into(),
            ));
        }
    }
    Ok(())
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;

    validate_name(&payload.name)?;
    if !is_valid_category(&payload.category) {
        return Err(AppError::BadRequest(format!(
            "Unknown category: {}",
            payload.category
        )));
    }
    validate_prices(payload.price, payload.discount_price)?;
    if payload.in_stock < 0 {
        return Err(AppError::BadRequest("Stock cannot be negative".into()));
    }

    let active = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name),
        description: Set(payload.description),
        price: Set(payload.price),
        discount_price: Set(payload.discount_price),
        category: Set(payload.category),
        images: Set(serde_json::json!(payload.images)),
        in_stock: Set(payload.in_stock),
        is_new: Set(payload.is_new),
        is_ready: Set(payload.is_ready),
        is_budget: Set(payload.is_budget),
        rating: Set(0.0),
        review_count: Set(0),
        is_active: Set(true),
        tags: Set(serde_json::json!(payload.tags)),
        created_at: NotSet,
        updated_at: NotSet,
    };
    let product = active.insert(&state.orm).await?;

    Ok(ApiResponse::success(
        "Product created",
        product_from_entity(product),
        None,
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let existing = Products::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let new_price = payload.price.unwrap_or(existing.price);
    let new_discount = match payload.discount_price {
        Some(value) => value,
        None => existing.discount_price,
    };
    validate_prices(new_price, new_discount)?;

    if let Some(name) = payload.name.as_deref() {
        validate_name(name)?;
    }
    if let Some(category) = payload.category.as_deref()
        && !is_valid_category(category)
    {
        return Err(AppError::BadRequest(format!("Unknown category: {category}")));
    }
    if let Some(in_stock) = payload.in_stock
        && in_stock < 0
    {
        return Err(AppError::BadRequest("Stock cannot be negative".into()));
    }

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(discount_price) = payload.discount_price {
        // `null` in the body clears the discount.
        active.discount_price = Set(discount_price);
    }
    if let Some(category) = payload.category {
        active.category = Set(category);
    }
    if let Some(images) = payload.images {
        active.images = Set(serde_json::json!(images));
    }
    if let Some(in_stock) = payload.in_stock {
        active.in_stock = Set(in_stock);
    }
    if let Some(is_new) = payload.is_new {
        active.is_new = Set(is_new);
    }
    if let Some(is_ready) = payload.is_ready {
        active.is_ready = Set(is_ready);
    }
    if let Some(is_budget) = payload.is_budget {
        active.is_budget = Set(is_budget);
    }
    if let Some(is_active) = payload.is_active {
        active.is_active = Set(is_active);
    }
    if let Some(tags) = payload.tags {
        active.tags = Set(serde_json::json!(tags));
    }
    active.updated_at = Set(Utc::now().into());

    let product = active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Updated",
        product_from_entity(product),
        None,
    ))
}

/// Soft delete: the row stays so order history keeps its product reference.
pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let existing = Products::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let mut active: ActiveModel = existing.into();
    active.is_active = Set(false);
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;

    Ok(ApiResponse::success("Deleted", serde_json::json!({}), None))
}

fn string_vec(value: &serde_json::Value) -> Vec<String> {
    value
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

pub fn product_from_entity(model: ProductModel) -> Product {
    Product {
        id: model.id,
        name: model.name,
        description: model.description,
        price: model.price,
        discount_price: model.discount_price,
        category: model.category,
        images: string_vec(&model.images),
        in_stock: model.in_stock,
        is_new: model.is_new,
        is_ready: model.is_ready,
        is_budget: model.is_budget,
        rating: model.rating,
        review_count: model.review_count,
        is_active: model.is_active,
        tags: string_vec(&model.tags),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discount_must_undercut_price() {
        assert!(validate_prices(10000, Some(8000)).is_ok());
        assert!(validate_prices(10000, Some(10000)).is_err());
        assert!(validate_prices(10000, Some(12000)).is_err());
        assert!(validate_prices(0, None).is_err());
    }

    #[test]
    fn product_name_length_is_bounded() {
        assert!(validate_name("Розы").is_ok());
        assert!(validate_name("ab").is_err());
        assert!(validate_name(&"x".repeat(201)).is_err());
    }

    #[test]
    fn json_arrays_become_string_vecs() {
        let v = serde_json::json!(["a.jpg", "b.jpg"]);
        assert_eq!(string_vec(&v), vec!["a.jpg", "b.jpg"]);
        assert!(string_vec(&serde_json::json!(null)).is_empty());
    }
}
