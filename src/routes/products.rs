use axum::{
    Json, Router,
    extract::{Path, Query, State},
};
use uuid::Uuid;

use crate::{
    dto::products::{CategoryList, CreateProductRequest, ProductList, UpdateProductRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Product,
    response::ApiResponse,
    routes::params::{ProductQuery, SearchQuery, ShowcaseQuery},
    services::product_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", axum::routing::get(list_products))
        .route("/", axum::routing::post(create_product))
        .route("/categories", axum::routing::get(list_categories))
        .route("/search", axum::routing::get(search_products))
        .route("/popular", axum::routing::get(popular_products))
        .route("/new", axum::routing::get(new_products))
        .route("/{id}", axum::routing::get(get_product))
        .route("/{id}", axum::routing::put(update_product))
        .route("/{id}", axum::routing::delete(delete_product))
}

#[utoipa::path(
    get,
    path = "/api/products",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("limit" = Option<i64>, Query, description = "Items per page, default 20"),
        ("category" = Option<String>, Query, description = "Exact category match"),
        ("search" = Option<String>, Query, description = "Substring over name and description"),
        ("minPrice" = Option<i64>, Query, description = "Minimum price in kopecks"),
        ("maxPrice" = Option<i64>, Query, description = "Maximum price in kopecks"),
        ("isNew" = Option<bool>, Query, description = "Only new arrivals"),
        ("isBudget" = Option<bool>, Query, description = "Only budget picks"),
        ("hasDiscount" = Option<bool>, Query, description = "Only discounted products"),
        ("isActive" = Option<bool>, Query, description = "false includes inactive products"),
        ("sortBy" = Option<String>, Query, description = "createdAt | name | price | category | inStock"),
        ("sortOrder" = Option<String>, Query, description = "asc | desc, default desc"),
    ),
    responses(
        (status = 200, description = "List products", body = ApiResponse<ProductList>)
    ),
    tag = "products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    Ok(Json(product_service::list_products(&state, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/products/categories",
    responses(
        (status = 200, description = "Catalog categories", body = ApiResponse<CategoryList>)
    ),
    tag = "products"
)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<CategoryList>>> {
    Ok(Json(product_service::list_categories(&state).await?))
}

#[utoipa::path(
    get,
    path = "/api/products/search",
    params(
        ("q" = String, Query, description = "Search term, at least 2 characters"),
        ("category" = Option<String>, Query, description = "Exact category match"),
        ("limit" = Option<i64>, Query, description = "Max results, default 10"),
    ),
    responses(
        (status = 200, description = "Matching products, newest first", body = ApiResponse<ProductList>),
        (status = 400, description = "Search term too short"),
    ),
    tag = "products"
)]
pub async fn search_products(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    Ok(Json(product_service::search_products(&state, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/products/popular",
    params(
        ("limit" = Option<i64>, Query, description = "Max results, default 8"),
    ),
    responses(
        (status = 200, description = "Best rated products", body = ApiResponse<ProductList>)
    ),
    tag = "products"
)]
pub async fn popular_products(
    State(state): State<AppState>,
    Query(query): Query<ShowcaseQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    Ok(Json(product_service::popular_products(&state, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/products/new",
    params(
        ("limit" = Option<i64>, Query, description = "Max results, default 8"),
    ),
    responses(
        (status = 200, description = "New arrivals", body = ApiResponse<ProductList>)
    ),
    tag = "products"
)]
pub async fn new_products(
    State(state): State<AppState>,
    Query(query): Query<ShowcaseQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    Ok(Json(product_service::new_products(&state, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Get product", body = ApiResponse<Product>),
        (status = 404, description = "Product not found"),
    ),
    tag = "products"
)]
pub async fn get_product(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Product>>> {
    Ok(Json(product_service::get_product(&state, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/products",
    request_body = CreateProductRequest,
    responses(
        (status = 200, description = "Create product", body = ApiResponse<Product>),
        (status = 403, description = "Admin only"),
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    Ok(Json(
        product_service::create_product(&state, &user, payload).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/api/products/{id}",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Updated product", body = ApiResponse<Product>),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    Ok(Json(
        product_service::update_product(&state, &user, id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Product deactivated"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    Ok(Json(
        product_service::delete_product(&state, &user, id).await?,
    ))
}
