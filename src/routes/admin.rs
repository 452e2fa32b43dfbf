use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch, put},
};
use uuid::Uuid;

use crate::{
    dto::admin::{OrdersStatistics, OrdersTotalSum, PeriodBucket, UpdateOrderStatusRequest},
    dto::orders::{OrderList, OrderWithItems},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Order,
    response::ApiResponse,
    routes::params::{AdminOrderQuery, PeriodQuery, TotalSumQuery},
    services::admin_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_all_orders))
        .route("/orders/total-sum", get(orders_total_sum))
        .route("/orders/statistics", get(orders_statistics))
        .route("/orders/sum-by-period", get(sum_by_period))
        .route("/orders/{id}", get(get_order_admin))
        // The storefront calls this with PUT; PATCH is kept for API clients.
        .route(
            "/orders/{id}/status",
            put(update_order_status).patch(update_order_status),
        )
}

#[utoipa::path(
    get,
    path = "/api/admin/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("limit" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("search" = Option<String>, Query, description = "Substring over order number, customer name, phone"),
        ("startDate" = Option<String>, Query, description = "YYYY-MM-DD, inclusive"),
        ("endDate" = Option<String>, Query, description = "YYYY-MM-DD, inclusive"),
    ),
    responses(
        (status = 200, description = "All orders, newest first", body = ApiResponse<OrderList>),
        (status = 403, description = "Admin only"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<AdminOrderQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    Ok(Json(
        admin_service::list_all_orders(&state, &user, query).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Any order with its items", body = ApiResponse<OrderWithItems>),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn get_order_admin(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    Ok(Json(
        admin_service::get_order_admin(&state, &user, id).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/api/admin/orders/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<Order>),
        (status = 400, description = "Unknown status or terminal order"),
        (status = 403, description = "Admin only"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    Ok(Json(
        admin_service::update_order_status(&state, &user, id, payload).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders/total-sum",
    params(
        ("startDate" = Option<String>, Query, description = "YYYY-MM-DD, inclusive"),
        ("endDate" = Option<String>, Query, description = "YYYY-MM-DD, inclusive"),
        ("excludeCancelled" = Option<bool>, Query, description = "Default true"),
    ),
    responses(
        (status = 200, description = "Revenue aggregate", body = ApiResponse<OrdersTotalSum>),
        (status = 403, description = "Admin only"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn orders_total_sum(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<TotalSumQuery>,
) -> AppResult<Json<ApiResponse<OrdersTotalSum>>> {
    Ok(Json(
        admin_service::orders_total_sum(&state, &user, query).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders/statistics",
    responses(
        (status = 200, description = "Per-status and rolling-range counters", body = ApiResponse<OrdersStatistics>),
        (status = 403, description = "Admin only"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn orders_statistics(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<OrdersStatistics>>> {
    Ok(Json(admin_service::orders_statistics(&state, &user).await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders/sum-by-period",
    params(
        ("period" = Option<String>, Query, description = "day | week | month | year, default month"),
        ("limit" = Option<i64>, Query, description = "Number of buckets, default 12"),
    ),
    responses(
        (status = 200, description = "Revenue per period bucket", body = ApiResponse<Vec<PeriodBucket>>),
        (status = 403, description = "Admin only"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn sum_by_period(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<PeriodQuery>,
) -> AppResult<Json<ApiResponse<Vec<PeriodBucket>>>> {
    Ok(Json(
        admin_service::sum_by_period(&state, &user, query).await?,
    ))
}
