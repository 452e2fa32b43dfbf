use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post},
};
use uuid::Uuid;

use crate::{
    dto::favorites::{FavoriteProductList, FavoriteRequest, FavoriteState},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Favorite,
    response::ApiResponse,
    routes::params::Pagination,
    services::favorite_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_favorites))
        .route("/", post(add_favorite))
        .route("/toggle", post(toggle_favorite))
        .route("/{product_id}", delete(remove_favorite))
        .route("/{product_id}/check", get(check_favorite))
}

#[utoipa::path(
    get,
    path = "/api/favorites",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("limit" = Option<i64>, Query, description = "Items per page, default 20"),
    ),
    responses(
        (status = 200, description = "Favorite products", body = ApiResponse<FavoriteProductList>),
    ),
    security(("bearer_auth" = [])),
    tag = "Favorites"
)]
pub async fn list_favorites(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<FavoriteProductList>>> {
    Ok(Json(
        favorite_service::list_favorites(&state.pool, &user, pagination).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/favorites",
    request_body = FavoriteRequest,
    responses(
        (status = 200, description = "Added to favorites", body = ApiResponse<Favorite>),
        (status = 400, description = "Unknown product"),
    ),
    security(("bearer_auth" = [])),
    tag = "Favorites"
)]
pub async fn add_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<FavoriteRequest>,
) -> AppResult<Json<ApiResponse<Favorite>>> {
    Ok(Json(
        favorite_service::add_favorite(&state.pool, &user, payload).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/favorites/toggle",
    request_body = FavoriteRequest,
    responses(
        (status = 200, description = "New favorite state", body = ApiResponse<FavoriteState>),
    ),
    security(("bearer_auth" = [])),
    tag = "Favorites"
)]
pub async fn toggle_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<FavoriteRequest>,
) -> AppResult<Json<ApiResponse<FavoriteState>>> {
    Ok(Json(
        favorite_service::toggle_favorite(&state.pool, &user, payload).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/favorites/{product_id}/check",
    params(
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Whether the product is a favorite", body = ApiResponse<FavoriteState>),
    ),
    security(("bearer_auth" = [])),
    tag = "Favorites"
)]
pub async fn check_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<FavoriteState>>> {
    Ok(Json(
        favorite_service::check_favorite(&state.pool, &user, product_id).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/favorites/{product_id}",
    params(
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Removed from favorites"),
        (status = 404, description = "Not in favorites"),
    ),
    security(("bearer_auth" = [])),
    tag = "Favorites"
)]
pub async fn remove_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    Ok(Json(
        favorite_service::remove_favorite(&state.pool, &user, product_id).await?,
    ))
}
