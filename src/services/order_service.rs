use chrono::Utc;
use rand::Rng;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    dto::orders::{CreateOrderRequest, OrderItemRequest, OrderList, OrderSummary, OrderWithItems},
    entity::{
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel,
        },
        products::{Column as ProdCol, Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, OrderStatus},
    response::{ApiResponse, Meta},
    routes::params::OrderListQuery,
    state::AppState,
    validation::{normalize_delivery_date, validate_create_order},
};

pub async fn list_user_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        if OrderStatus::parse(status).is_none() {
            return Err(AppError::BadRequest(format!("Unknown status: {status}")));
        }
        condition = condition.add(OrderCol::Status.eq(status.clone()));
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

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = find_owned_order(&state.orm, user, id).await?;

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

/// A priced order line, resolved against the live catalog before insert.
struct PricedLine {
    product: ProductModel,
    quantity: i32,
    unit_price: i64,
}

/// Resolves requested items against the catalog: the product must exist,
/// be active, and have enough stock. Pricing uses the discount price when
/// present. The stock check here is advisory; the guarded decrement inside
/// the transaction is what actually closes the race.
async fn price_items<C: ConnectionTrait>(
    conn: &C,
    items: &[OrderItemRequest],
) -> AppResult<Vec<PricedLine>> {
    let ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
    let products = Products::find()
        .filter(ProdCol::Id.is_in(ids))
        .all(conn)
        .await?;

    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        let product = match products.iter().find(|p| p.id == item.product_id) {
            Some(p) if p.is_active => p,
            Some(p) => {
                return Err(AppError::BadRequest(format!(
                    "Product \"{}\" is no longer available",
                    p.name
                )));
            }
            None => {
                return Err(AppError::BadRequest(format!(
                    "Product {} is unavailable",
                    item.product_id
                )));
            }
        };

        if product.in_stock < item.quantity {
            return Err(AppError::BadRequest(format!(
                "Not enough stock for {}: {} left",
                product.name, product.in_stock
            )));
        }

        let unit_price = product.discount_price.unwrap_or(product.price);
        lines.push(PricedLine {
            product: product.clone(),
            quantity: item.quantity,
            unit_price,
        });
    }
    Ok(lines)
}

/// `ORD-YYYYMMDD-NNNN` with a random 4-digit suffix, checked for
/// uniqueness inside the surrounding transaction. After ten collisions
/// the suffix falls back to six hex chars of the order id, which is
/// unique by construction.
async fn generate_order_number<C: ConnectionTrait>(conn: &C, order_id: Uuid) -> AppResult<String> {
    let date = Utc::now().format("%Y%m%d");

    for _ in 0..10 {
        let suffix: u32 = rand::rng().random_range(0..10_000);
        let candidate = format!("ORD-{}-{:04}", date, suffix);
        let taken = Orders::find()
            .filter(OrderCol::OrderNumber.eq(candidate.as_str()))
            .count(conn)
            .await?;
        if taken == 0 {
            return Ok(candidate);
        }
    }

    let hex = order_id.simple().to_string();
    Ok(format!("ORD-{}-{}", date, &hex[..6]))
}

/// Inserts the order row, its items, and decrements stock with a guarded
/// update (`in_stock >= quantity` in the WHERE clause). Zero rows affected
/// means a concurrent order won the remaining stock and the whole
/// transaction is rolled back by the caller via `?`.
async fn insert_order<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    payload: &CreateOrderRequest,
    lines: &[PricedLine],
) -> AppResult<(OrderModel, Vec<OrderItemModel>)> {
    let order_id = Uuid::new_v4();
    let order_number = generate_order_number(conn, order_id).await?;

    let total_amount: i64 = lines
        .iter()
        .map(|l| l.unit_price * l.quantity as i64)
        .sum();

    let delivery_date = match payload.delivery_date.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            normalize_delivery_date(raw)
                .ok_or_else(|| AppError::BadRequest("Invalid delivery date".into()))?,
        ),
        None => None,
    };

    let order = OrderActive {
        id: Set(order_id),
        order_number: Set(order_number),
        user_id: Set(user_id),
        status: Set(OrderStatus::Pending.as_str().into()),
        total_amount: Set(total_amount),
        delivery_address: Set(payload.delivery_address.trim().to_string()),
        delivery_date: Set(delivery_date.map(Into::into)),
        delivery_time: Set(payload.delivery_time.clone().filter(|s| !s.is_empty())),
        customer_phone: Set(payload.customer_phone.trim().to_string()),
        customer_name: Set(payload.customer_name.trim().to_string()),
        recipient_name: Set(payload.recipient_name.clone().filter(|s| !s.is_empty())),
        recipient_phone: Set(payload.recipient_phone.clone().filter(|s| !s.is_empty())),
        special_instructions: Set(payload
            .special_instructions
            .clone()
            .filter(|s| !s.is_empty())),
        payment_status: Set("pending".into()),
        payment_method: Set(payload
            .payment_method
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "cash".into())),
        is_gift: Set(payload.is_gift.unwrap_or(false)),
        gift_message: Set(payload.gift_message.clone().filter(|s| !s.is_empty())),
        is_anonymous: Set(payload.is_anonymous.unwrap_or(false)),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(conn)
    .await?;

    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product.id),
            quantity: Set(line.quantity),
            price: Set(line.unit_price),
            total_price: Set(line.unit_price * line.quantity as i64),
            product_name: Set(line.product.name.clone()),
            product_image: Set(line
                .product
                .images
                .as_array()
                .and_then(|arr| arr.first())
                .and_then(|v| v.as_str())
                .map(str::to_string)),
            created_at: NotSet,
        }
        .insert(conn)
        .await?;
        items.push(item);

        let result = Products::update_many()
            .col_expr(
                ProdCol::InStock,
                Expr::col(ProdCol::InStock).sub(line.quantity),
            )
            .filter(ProdCol::Id.eq(line.product.id))
            .filter(ProdCol::InStock.gte(line.quantity))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::BadRequest(format!(
                "Not enough stock for {}",
                line.product.name
            )));
        }
    }

    Ok((order, items))
}

pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderSummary>> {
    let errors = validate_create_order(&payload);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let txn = state.orm.begin().await?;

    let lines = price_items(&txn, &payload.items).await?;
    let (order, _items) = insert_order(&txn, user.user_id, &payload, &lines).await?;

    txn.commit().await?;

    tracing::info!(order_number = %order.order_number, user_id = %user.user_id, "order created");

    Ok(ApiResponse::success(
        "Order created",
        OrderSummary {
            id: order.id,
            order_number: order.order_number,
            status: order.status,
            total_amount: order.total_amount,
        },
        None,
    ))
}

pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let txn = state.orm.begin().await?;

    let order = find_owned_order(&txn, user, id).await?;

    let status = OrderStatus::parse(&order.status)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("corrupt order status")))?;
    if !status.can_cancel() {
        return Err(AppError::BadRequest(format!(
            "Order in status '{}' cannot be cancelled",
            order.status
        )));
    }

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&txn)
        .await?;

    // Cancelled stock goes back on the shelf.
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

    let mut active: OrderActive = order.into();
    active.status = Set(OrderStatus::Cancelled.as_str().into());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    tracing::info!(order_number = %order.order_number, "order cancelled");

    Ok(ApiResponse::success(
        "Order cancelled",
        order_from_entity(order),
        None,
    ))
}

/// Places a new order with the same items as a past one. Everything is
/// re-validated and re-priced against the current catalog; only the
/// address and contact fields carry over.
pub async fn reorder(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderSummary>> {
    let source = find_owned_order(&state.orm, user, id).await?;

    let source_items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(source.id))
        .all(&state.orm)
        .await?;

    if source_items.is_empty() {
        return Err(AppError::BadRequest("Order has no items".into()));
    }

    // Availability errors name the product as it was sold; the catalog
    // row may have been retired since.
    let ids: Vec<Uuid> = source_items.iter().map(|i| i.product_id).collect();
    let live = Products::find()
        .filter(ProdCol::Id.is_in(ids))
        .all(&state.orm)
        .await?;
    for item in &source_items {
        let available = live.iter().any(|p| p.id == item.product_id && p.is_active);
        if !available {
            return Err(AppError::BadRequest(format!(
                "Product \"{}\" is no longer available",
                item.product_name
            )));
        }
    }

    let payload = CreateOrderRequest {
        items: source_items
            .iter()
            .map(|i| OrderItemRequest {
                product_id: i.product_id,
                quantity: i.quantity,
            })
            .collect(),
        delivery_address: source.delivery_address.clone(),
        delivery_date: None,
        delivery_time: None,
        customer_phone: source.customer_phone.clone(),
        customer_name: source.customer_name.clone(),
        recipient_name: source.recipient_name.clone(),
        recipient_phone: source.recipient_phone.clone(),
        special_instructions: None,
        // Payment is chosen anew on every order.
        payment_method: None,
        is_gift: None,
        gift_message: None,
        is_anonymous: None,
    };

    let txn = state.orm.begin().await?;

    let lines = price_items(&txn, &payload.items).await?;
    let (order, _items) = insert_order(&txn, user.user_id, &payload, &lines).await?;

    txn.commit().await?;

    tracing::info!(
        source = %source.order_number,
        order_number = %order.order_number,
        "reorder created"
    );

    Ok(ApiResponse::success(
        "Order created",
        OrderSummary {
            id: order.id,
            order_number: order.order_number,
            status: order.status,
            total_amount: order.total_amount,
        },
        None,
    ))
}

async fn find_owned_order<C: ConnectionTrait>(
    conn: &C,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<OrderModel> {
    Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}

pub fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        order_number: model.order_number,
        user_id: model.user_id,
        status: model.status,
        total_amount: model.total_amount,
        delivery_address: model.delivery_address,
        delivery_date: model.delivery_date.map(|dt| dt.with_timezone(&Utc)),
        delivery_time: model.delivery_time,
        customer_phone: model.customer_phone,
        customer_name: model.customer_name,
        recipient_name: model.recipient_name,
        recipient_phone: model.recipient_phone,
        special_instructions: model.special_instructions,
        payment_status: model.payment_status,
        payment_method: model.payment_method,
        is_gift: model.is_gift,
        gift_message: model.gift_message,
        is_anonymous: model.is_anonymous,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        quantity: model.quantity,
        price: model.price,
        total_price: model.total_price,
        product_name: model.product_name,
        product_image: model.product_image,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
