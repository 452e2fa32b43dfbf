use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::users::{
        CreateUserRequest, CurrentUserProfile, TopBuyersList, UpdateUserRequest, UserList,
        UserWithStats, UsersStatistics,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::User,
    response::ApiResponse,
    routes::params::{Pagination, TopBuyersQuery},
    services::user_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/", post(create_user))
        .route("/statistics", get(users_statistics))
        .route("/top-buyers", get(top_buyers))
        .route("/{id}", get(get_user))
        .route("/{id}", put(update_user))
        .route("/{id}", delete(delete_user))
}

#[utoipa::path(
    get,
    path = "/api/admin/users",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("limit" = Option<i64>, Query, description = "Items per page, default 20"),
    ),
    responses(
        (status = 200, description = "Users with order stats", body = ApiResponse<UserList>),
        (status = 403, description = "Admin only"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<UserList>>> {
    Ok(Json(
        user_service::list_users(&state.pool, &user, pagination).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/admin/users/{id}",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User with order stats", body = ApiResponse<UserWithStats>),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<UserWithStats>>> {
    Ok(Json(user_service::get_user(&state.pool, &user, id).await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/users/statistics",
    responses(
        (status = 200, description = "Counters over the user base", body = ApiResponse<UsersStatistics>),
        (status = 403, description = "Admin only"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn users_statistics(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<UsersStatistics>>> {
    Ok(Json(
        user_service::users_statistics(&state.pool, &user).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/admin/users/top-buyers",
    params(
        ("limit" = Option<i64>, Query, description = "Max buyers, default 10"),
        ("period" = Option<String>, Query, description = "all | month | year | 30days, default all"),
    ),
    responses(
        (status = 200, description = "Buyers ranked by paid order totals", body = ApiResponse<TopBuyersList>),
        (status = 400, description = "Unknown period"),
        (status = 403, description = "Admin only"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn top_buyers(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<TopBuyersQuery>,
) -> AppResult<Json<ApiResponse<TopBuyersList>>> {
    Ok(Json(
        user_service::top_buyers(&state.pool, &user, query).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/users/me",
    responses(
        (status = 200, description = "The caller's account with order stats", body = ApiResponse<CurrentUserProfile>),
        (status = 401, description = "Not authenticated"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn current_user(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CurrentUserProfile>>> {
    Ok(Json(user_service::current_user(&state.pool, &user).await?))
}

#[utoipa::path(
    post,
    path = "/api/admin/users",
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "User created", body = ApiResponse<User>),
        (status = 400, description = "Email or phone already taken"),
        (status = 403, description = "Admin only"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateUserRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    Ok(Json(
        user_service::create_user(&state.pool, &user, payload).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/api/admin/users/{id}",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = ApiResponse<User>),
        (status = 400, description = "Email or phone already taken"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    Ok(Json(
        user_service::update_user(&state.pool, &user, id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/admin/users/{id}",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User deleted"),
        (status = 400, description = "User still has active orders"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    Ok(Json(
        user_service::delete_user(&state.pool, &user, id).await?,
    ))
}
