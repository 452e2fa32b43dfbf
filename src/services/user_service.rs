use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::services::auth_service::hash_password;
use crate::validation::is_valid_phone;
use crate::{
    db::DbPool,
    dto::users::{
        CreateUserRequest, CurrentUserProfile, ProfileStatistics, TopBuyer, TopBuyersList,
        UpdateUserRequest, UserList, UserWithStats, UsersStatistics,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{OrderStatus, User},
    response::{ApiResponse, Meta},
    routes::params::{Pagination, TopBuyersQuery},
};

#[derive(FromRow)]
struct UserStatsRow {
    #[sqlx(flatten)]
    user: User,
    total_orders: i64,
    total_spent: Option<i64>,
}

const VALID_ROLES: &[&str] = &["user", "admin"];

fn validate_role(role: &str) -> AppResult<()> {
    if VALID_ROLES.contains(&role) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("Unknown role: {role}")))
    }
}

pub async fn list_users(
    pool: &DbPool,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<UserList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();

    let rows: Vec<UserStatsRow> = sqlx::query_as(
        r#"
        SELECT u.*,
               COUNT(o.id) AS total_orders,
               COALESCE(SUM(o.total_amount) FILTER (WHERE o.status <> 'cancelled'), 0)::BIGINT AS total_spent
        FROM users u
        LEFT JOIN orders o ON o.user_id = u.id
        GROUP BY u.id
        ORDER BY u.created_at DESC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;

    let items = rows
        .into_iter()
        .map(|r| UserWithStats {
            user: r.user,
            total_orders: r.total_orders,
            total_spent: r.total_spent.unwrap_or(0),
        })
        .collect();

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success("Users", UserList { items }, Some(meta)))
}

pub async fn get_user(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<UserWithStats>> {
    ensure_admin(user)?;

    let row: Option<UserStatsRow> = sqlx::query_as(
        r#"
        SELECT u.*,
               COUNT(o.id) AS total_orders,
               COALESCE(SUM(o.total_amount) FILTER (WHERE o.status <> 'cancelled'), 0)::BIGINT AS total_spent
        FROM users u
        LEFT JOIN orders o ON o.user_id = u.id
        WHERE u.id = $1
        GROUP BY u.id
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let row = row.ok_or(AppError::NotFound)?;

    Ok(ApiResponse::success(
        "User",
        UserWithStats {
            user: row.user,
            total_orders: row.total_orders,
            total_spent: row.total_spent.unwrap_or(0),
        },
        None,
    ))
}

#[derive(FromRow)]
struct UsersStatsRow {
    total_users: i64,
    active_users: i64,
    admin_users: i64,
    users_with_orders: i64,
    new_users_last_month: i64,
}

/// Back-office counters over the whole user base.
pub async fn users_statistics(
    pool: &DbPool,
    user: &AuthUser,
) -> AppResult<ApiResponse<UsersStatistics>> {
    ensure_admin(user)?;

    let row: UsersStatsRow = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM users) AS total_users,
            (SELECT COUNT(*) FROM users WHERE is_active) AS active_users,
            (SELECT COUNT(*) FROM users WHERE role = 'admin') AS admin_users,
            (SELECT COUNT(DISTINCT user_id) FROM orders) AS users_with_orders,
            (SELECT COUNT(*) FROM users WHERE created_at >= NOW() - INTERVAL '1 month')
                AS new_users_last_month
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(ApiResponse::success(
        "Users statistics",
        UsersStatistics {
            total_users: row.total_users,
            active_users: row.active_users,
            inactive_users: row.total_users - row.active_users,
            admin_users: row.admin_users,
            regular_users: row.total_users - row.admin_users,
            users_with_orders: row.users_with_orders,
            users_without_orders: row.total_users - row.users_with_orders,
            new_users_last_month: row.new_users_last_month,
        },
        None,
    ))
}

fn buyers_period_start(period: &str) -> AppResult<Option<DateTime<Utc>>> {
    let now = Utc::now();
    let start = match period {
        "all" => None,
        "month" => Some(
            now.date_naive()
                .with_day(1)
                .unwrap_or_else(|| now.date_naive())
                .and_time(NaiveTime::MIN)
                .and_utc(),
        ),
        "year" => Some(
            now.date_naive()
                .with_ordinal(1)
                .unwrap_or_else(|| now.date_naive())
                .and_time(NaiveTime::MIN)
                .and_utc(),
        ),
        "30days" => Some(now - Duration::days(30)),
        other => {
            return Err(AppError::BadRequest(format!("Unknown period: {other}")));
        }
    };
    Ok(start)
}

#[derive(FromRow)]
struct TopBuyerRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    total_orders: i64,
    total_spent: Option<i64>,
}

/// Customers ranked by what they actually paid: only delivered and
/// confirmed orders count towards the total.
pub async fn top_buyers(
    pool: &DbPool,
    user: &AuthUser,
    query: TopBuyersQuery,
) -> AppResult<ApiResponse<TopBuyersList>> {
    ensure_admin(user)?;

    let limit = query.limit.unwrap_or(10).clamp(1, 100);
    let since = buyers_period_start(query.period.as_deref().unwrap_or("all"))?;

    let rows: Vec<TopBuyerRow> = sqlx::query_as(
        r#"
        SELECT u.id, u.first_name, u.last_name, u.email, u.phone,
               COUNT(o.id) AS total_orders,
               SUM(o.total_amount)::BIGINT AS total_spent
        FROM users u
        JOIN orders o ON o.user_id = u.id
        WHERE o.status IN ('delivered', 'confirmed')
          AND ($1::timestamptz IS NULL OR o.created_at >= $1)
        GROUP BY u.id
        ORDER BY total_spent DESC
        LIMIT $2
        "#,
    )
    .bind(since)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let buyers: Vec<TopBuyer> = rows
        .into_iter()
        .map(|r| {
            let total_spent = r.total_spent.unwrap_or(0);
            let avg_order_value = if r.total_orders > 0 {
                total_spent as f64 / r.total_orders as f64
            } else {
                0.0
            };
            TopBuyer {
                id: r.id,
                first_name: r.first_name,
                last_name: r.last_name,
                email: r.email,
                phone: r.phone,
                total_orders: r.total_orders,
                total_spent,
                avg_order_value,
            }
        })
        .collect();

    let count = buyers.len();
    Ok(ApiResponse::success(
        "Top buyers",
        TopBuyersList { buyers, count },
        None,
    ))
}

#[derive(FromRow)]
struct ProfileStatsRow {
    total_orders: i64,
    total_spent: Option<i64>,
    completed_orders: i64,
    pending_orders: i64,
    processing_orders: i64,
    cancelled_orders: i64,
    first_order_date: Option<DateTime<Utc>>,
    last_order_date: Option<DateTime<Utc>>,
}

/// The caller's own account with an order-history rollup. Any
/// authenticated user may call this; there is no admin gate.
pub async fn current_user(
    pool: &DbPool,
    user: &AuthUser,
) -> AppResult<ApiResponse<CurrentUserProfile>> {
    let account: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user.user_id)
        .fetch_optional(pool)
        .await?;
    let account = account.ok_or(AppError::NotFound)?;

    let row: ProfileStatsRow = sqlx::query_as(
        r#"
        SELECT COUNT(*) AS total_orders,
               COALESCE(SUM(total_amount), 0)::BIGINT AS total_spent,
               COUNT(*) FILTER (WHERE status = 'delivered') AS completed_orders,
               COUNT(*) FILTER (WHERE status = 'pending') AS pending_orders,
               COUNT(*) FILTER (WHERE status = 'processing') AS processing_orders,
               COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled_orders,
               MIN(created_at) AS first_order_date,
               MAX(created_at) AS last_order_date
        FROM orders
        WHERE user_id = $1
        "#,
    )
    .bind(user.user_id)
    .fetch_one(pool)
    .await?;

    let total_spent = row.total_spent.unwrap_or(0);
    let avg_order_value = if row.total_orders > 0 {
        total_spent as f64 / row.total_orders as f64
    } else {
        0.0
    };

    Ok(ApiResponse::success(
        "Current user",
        CurrentUserProfile {
            user: account,
            statistics: ProfileStatistics {
                total_orders: row.total_orders,
                total_spent,
                completed_orders: row.completed_orders,
                pending_orders: row.pending_orders,
                processing_orders: row.processing_orders,
                cancelled_orders: row.cancelled_orders,
                avg_order_value,
                first_order_date: row.first_order_date,
                last_order_date: row.last_order_date,
            },
        },
        None,
    ))
}

async fn email_taken(pool: &DbPool, email: &str, exclude: Option<Uuid>) -> AppResult<bool> {
    let existing: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM users WHERE email = $1 AND ($2::uuid IS NULL OR id <> $2)")
            .bind(email)
            .bind(exclude)
            .fetch_optional(pool)
            .await?;
    Ok(existing.is_some())
}

async fn phone_taken(pool: &DbPool, phone: &str, exclude: Option<Uuid>) -> AppResult<bool> {
    let existing: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM users WHERE phone = $1 AND ($2::uuid IS NULL OR id <> $2)")
            .bind(phone)
            .bind(exclude)
            .fetch_optional(pool)
            .await?;
    Ok(existing.is_some())
}

pub async fn create_user(
    pool: &DbPool,
    user: &AuthUser,
    payload: CreateUserRequest,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(user)?;

    if payload.password.len() < 6 {
        return Err(AppError::BadRequest(
            "Password must be at least 6 characters".into(),
        ));
    }
    let role = payload.role.as_deref().unwrap_or("user");
    validate_role(role)?;

    if email_taken(pool, &payload.email, None).await? {
        return Err(AppError::BadRequest("Email is already taken".into()));
    }

    let phone = payload.phone.filter(|p| !p.is_empty());
    if let Some(phone) = phone.as_deref() {
        if !is_valid_phone(phone) {
            return Err(AppError::BadRequest("Invalid phone number".into()));
        }
        if phone_taken(pool, phone, None).await? {
            return Err(AppError::BadRequest("Phone is already taken".into()));
        }
    }

    let password_hash = hash_password(&payload.password)?;

    let created: User = sqlx::query_as(
        "INSERT INTO users (id, email, password_hash, first_name, last_name, phone, address, role) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(payload.email.as_str())
    .bind(password_hash)
    .bind(payload.first_name.trim())
    .bind(payload.last_name.trim())
    .bind(phone)
    .bind(payload.address)
    .bind(role)
    .fetch_one(pool)
    .await?;

    Ok(ApiResponse::success("User created", created, None))
}

pub async fn update_user(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateUserRequest,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(user)?;

    let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    let existing = existing.ok_or(AppError::NotFound)?;

    let email = payload.email.unwrap_or(existing.email);
    if email_taken(pool, &email, Some(id)).await? {
        return Err(AppError::BadRequest("Email is already taken".into()));
    }

    // Empty string clears the phone.
    let phone = match payload.phone {
        Some(p) if p.is_empty() => None,
        Some(p) => Some(p),
        None => existing.phone,
    };
    if let Some(phone) = phone.as_deref() {
        if !is_valid_phone(phone) {
            return Err(AppError::BadRequest("Invalid phone number".into()));
        }
        if phone_taken(pool, phone, Some(id)).await? {
            return Err(AppError::BadRequest("Phone is already taken".into()));
        }
    }

    let role = payload.role.unwrap_or(existing.role);
    validate_role(&role)?;

    let password_hash = match payload.password {
        Some(p) if !p.is_empty() => {
            if p.len() < 6 {
                return Err(AppError::BadRequest(
                    "Password must be at least 6 characters".into(),
                ));
            }
            hash_password(&p)?
        }
        _ => existing.password_hash,
    };

    let updated: User = sqlx::query_as(
        r#"
        UPDATE users
        SET first_name = $2, last_name = $3, email = $4, phone = $5,
            password_hash = $6, role = $7, address = $8, is_active = $9,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(payload.first_name.unwrap_or(existing.first_name))
    .bind(payload.last_name.unwrap_or(existing.last_name))
    .bind(email)
    .bind(phone)
    .bind(password_hash)
    .bind(role)
    .bind(payload.address.or(existing.address))
    .bind(payload.is_active.unwrap_or(existing.is_active))
    .fetch_one(pool)
    .await?;

    Ok(ApiResponse::success("User updated", updated, None))
}

pub async fn delete_user(
    pool: &DbPool,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let active_orders: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM orders WHERE user_id = $1 AND status = ANY($2)",
    )
    .bind(id)
    .bind(OrderStatus::ACTIVE)
    .fetch_one(pool)
    .await?;

    if active_orders.0 > 0 {
        return Err(AppError::BadRequest(format!(
            "User has {} active orders and cannot be deleted",
            active_orders.0
        )));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    Ok(ApiResponse::success("User deleted", serde_json::json!({}), None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buyer_periods_resolve_to_starts() {
        assert!(buyers_period_start("all").unwrap().is_none());

        let month = buyers_period_start("month").unwrap().unwrap();
        assert_eq!(month.date_naive().day(), 1);

        let year = buyers_period_start("year").unwrap().unwrap();
        assert_eq!(year.date_naive().ordinal(), 1);

        let cutoff = buyers_period_start("30days").unwrap().unwrap();
        assert!(cutoff < Utc::now());

        assert!(buyers_period_start("fortnight").is_err());
    }
}
