use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
};
use sqlx::FromRow;
use uuid::Uuid;

use crate::services::order_service::{order_from_entity, order_item_from_entity};
use crate::{
    dto::admin::{
        OrdersStatistics, OrdersTotalSum, PeriodBucket, RangeStats, StatusBucket,
        UpdateOrderStatusRequest,
    },
    dto::orders::{OrderList, OrderWithItems},
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, OrderStatus},
    response::{ApiResponse, Meta},
    routes::params::{AdminOrderQuery, PeriodQuery, TotalSumQuery},
    state::AppState,
};

fn parse_day(raw: &str, field: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("{field} must be YYYY-MM-DD")))
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: AdminOrderQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        if OrderStatus::parse(status).is_none() {
            return Err(AppError::BadRequest(format!("Unknown status: {status}")));
        }
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }

    if let Some(search) = query.search.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(OrderCol::OrderNumber).ilike(pattern.clone()))
                .add(Expr::col(OrderCol::CustomerName).ilike(pattern.clone()))
                .add(Expr::col(OrderCol::CustomerPhone).ilike(pattern)),
        );
    }

    if let Some(raw) = query.start_date.as_deref().filter(|s| !s.is_empty()) {
        let start = day_start(parse_day(raw, "startDate")?);
        condition = condition.add(OrderCol::CreatedAt.gte(start));
    }
    if let Some(raw) = query.end_date.as_deref().filter(|s| !s.is_empty()) {
        // End bound is inclusive of the whole day.
        let end = day_start(parse_day(raw, "endDate")? + Duration::days(1));
        condition = condition.add(OrderCol::CreatedAt.lt(end));
    }

    let finder = Orders::find()
        .filter(condition)
        .order_by_desc(OrderCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Orders",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order_admin(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(user)?;
    let order = Orders::find_by_id(id).one(&state.orm).await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Order",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        None,
    ))
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;

    let next = OrderStatus::parse(&payload.status)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown status: {}", payload.status)))?;

    let txn = state.orm.begin().await?;

    let existing = Orders::find_by_id(id).one(&txn).await?;
    let existing = match existing {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let current = OrderStatus::parse(&existing.status)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("corrupt order status")))?;

    // Terminal orders are frozen; even a same-status update is rejected.
    if current.is_terminal() {
        return Err(AppError::BadRequest(format!(
            "Order in status '{}' cannot change",
            existing.status
        )));
    }

    // Moving into cancelled returns the reserved stock.
    if next == OrderStatus::Cancelled {
        let items = OrderItems::find()
            .filter(OrderItemCol::OrderId.eq(existing.id))
            .all(&txn)
            .await?;
        for item in &items {
            Products::update_many()
                .col_expr(
                    ProdCol::InStock,
                    Expr::col(ProdCol::InStock).add(item.quantity),
                )
                .filter(ProdCol::Id.eq(item.product_id))
                .exec(&txn)
                .await?;
        }
    }

    let mut active: OrderActive = existing.into();
    active.status = Set(next.as_str().into());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    tracing::info!(order_number = %order.order_number, status = %order.status, "status updated");

    Ok(ApiResponse::success(
        "Order updated",
        order_from_entity(order),
        None,
    ))
}

#[derive(FromRow)]
struct SumRow {
    total_sum: Option<i64>,
    orders_count: i64,
}

pub async fn orders_total_sum(
    state: &AppState,
    user: &AuthUser,
    query: TotalSumQuery,
) -> AppResult<ApiResponse<OrdersTotalSum>> {
    ensure_admin(user)?;

    let start = match query.start_date.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(day_start(parse_day(raw, "startDate")?)),
        None => None,
    };
    let end = match query.end_date.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(day_start(parse_day(raw, "endDate")? + Duration::days(1))),
        None => None,
    };
    let exclude_cancelled = query.exclude_cancelled.unwrap_or(true);

    // SUM(bigint) comes back as NUMERIC, hence the cast.
    let row: SumRow = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(total_amount), 0)::BIGINT AS total_sum,
               COUNT(*) AS orders_count
        FROM orders
        WHERE ($1::timestamptz IS NULL OR created_at >= $1)
          AND ($2::timestamptz IS NULL OR created_at < $2)
          AND (NOT $3 OR status <> 'cancelled')
        "#,
    )
    .bind(start)
    .bind(end)
    .bind(exclude_cancelled)
    .fetch_one(&state.pool)
    .await?;

    let total_sum = row.total_sum.unwrap_or(0);
    let average_order_value = if row.orders_count > 0 {
        total_sum as f64 / row.orders_count as f64
    } else {
        0.0
    };

    Ok(ApiResponse::success(
        "Orders total",
        OrdersTotalSum {
            total_sum,
            orders_count: row.orders_count,
            average_order_value,
        },
        None,
    ))
}

#[derive(FromRow)]
struct StatusRow {
    status: String,
    count: i64,
    sum: Option<i64>,
}

async fn range_stats(
    state: &AppState,
    from: DateTime<Utc>,
) -> AppResult<RangeStats> {
    let row: SumRow = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(total_amount), 0)::BIGINT AS total_sum,
               COUNT(*) AS orders_count
        FROM orders
        WHERE created_at >= $1 AND status <> 'cancelled'
        "#,
    )
    .bind(from)
    .fetch_one(&state.pool)
    .await?;

    Ok(RangeStats {
        count: row.orders_count,
        sum: row.total_sum.unwrap_or(0),
    })
}

pub async fn orders_statistics(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<OrdersStatistics>> {
    ensure_admin(user)?;

    let rows: Vec<StatusRow> = sqlx::query_as(
        r#"
        SELECT status, COUNT(*) AS count, COALESCE(SUM(total_amount), 0)::BIGINT AS sum
        FROM orders
        GROUP BY status
        ORDER BY count DESC
        "#,
    )
    .fetch_all(&state.pool)
    .await?;

    let status_stats = rows
        .into_iter()
        .map(|r| StatusBucket {
            status: r.status,
            count: r.count,
            sum: r.sum.unwrap_or(0),
        })
        .collect();

    let now = Utc::now();
    let today = day_start(now.date_naive());
    // The reporting week starts on Monday.
    let week = today - Duration::days(now.weekday().num_days_from_monday() as i64);
    let month = day_start(
        now.date_naive()
            .with_day(1)
            .unwrap_or_else(|| now.date_naive()),
    );

    let today_stats = range_stats(state, today).await?;
    let week_stats = range_stats(state, week).await?;
    let month_stats = range_stats(state, month).await?;

    Ok(ApiResponse::success(
        "Statistics",
        OrdersStatistics {
            status_stats,
            today_stats,
            week_stats,
            month_stats,
        },
        None,
    ))
}

#[derive(FromRow)]
struct PeriodRow {
    period: String,
    count: i64,
    sum: Option<i64>,
}

pub async fn sum_by_period(
    state: &AppState,
    user: &AuthUser,
    query: PeriodQuery,
) -> AppResult<ApiResponse<Vec<PeriodBucket>>> {
    ensure_admin(user)?;

    let fmt = match query.period.as_deref().unwrap_or("month") {
        "day" => "YYYY-MM-DD",
        "week" => "IYYY-IW",
        "month" => "YYYY-MM",
        "year" => "YYYY",
        other => {
            return Err(AppError::BadRequest(format!("Unknown period: {other}")));
        }
    };
    let limit = query.limit.unwrap_or(12).clamp(1, 100);

    let rows: Vec<PeriodRow> = sqlx::query_as(
        r#"
        SELECT to_char(created_at, $1) AS period,
               COUNT(*) AS count,
               COALESCE(SUM(total_amount), 0)::BIGINT AS sum
        FROM orders
        WHERE status <> 'cancelled'
        GROUP BY 1
        ORDER BY 1 DESC
        LIMIT $2
        "#,
    )
    .bind(fmt)
    .bind(limit)
    .fetch_all(&state.pool)
    .await?;

    let buckets = rows
        .into_iter()
        .map(|r| PeriodBucket {
            period: r.period,
            count: r.count,
            sum: r.sum.unwrap_or(0),
        })
        .collect();

    Ok(ApiResponse::success("Revenue by period", buckets, None))
}
