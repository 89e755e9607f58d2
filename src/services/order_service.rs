use std::collections::HashMap;

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};

use crate::{
    audit::log_activity,
    dto::orders::{
        AdminOrder, AdminOrderList, CreateOrderRequest, OrderHistory, OrderPlaced, OrderWithItems,
        UpdateOrderStatusRequest,
    },
    entity::{
        inventory_logs::ActiveModel as InventoryLogActive,
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
        },
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel,
        },
        products::{Column as ProdCol, Entity as Products},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, OrderItemView},
    response::ApiResponse,
    state::AppState,
};

const VALID_STATUSES: [&str; 5] = ["pending", "confirmed", "shipped", "delivered", "cancelled"];

/// Every order ships to the storefront's single delivery region for now.
const DELIVERY_ADDRESS: &str = "Pakistan";

pub fn validate_order_status(status: &str) -> Result<(), AppError> {
    if VALID_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(AppError::BadRequest("Invalid order status".into()))
    }
}

/// Place an order: one transaction covering the stock check, the order and
/// order-item inserts, and the stock decrement. Any early return drops the
/// transaction, which rolls everything back.
pub async fn place_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderPlaced>> {
    if payload.items.is_empty() {
        return Err(AppError::BadRequest("Order has no items".into()));
    }
    for item in &payload.items {
        if item.quantity <= 0 {
            return Err(AppError::BadRequest(format!(
                "Invalid quantity for product {}",
                item.product_id
            )));
        }
    }
    let status = payload.status.unwrap_or_else(|| "pending".to_string());
    validate_order_status(&status)?;

    let txn = state.orm.begin().await?;

    let requester = Users::find_by_id(user.id).one(&txn).await?;
    if requester.is_none() {
        return Err(AppError::NotFound("User not found".into()));
    }

    // Lock each product row for the rest of the transaction so the stock
    // check and the decrement below cannot interleave with another order.
    let mut locked = Vec::with_capacity(payload.items.len());
    for item in &payload.items {
        let product = Products::find_by_id(item.product_id)
            .lock(LockType::Update)
            .one(&txn)
            .await?;

        let product = match product {
            Some(p) => p,
            None => {
                return Err(AppError::BadRequest(format!(
                    "Insufficient stock for product {}. Available: 0, Requested: {}",
                    item.product_id, item.quantity
                )));
            }
        };

        if product.stock < item.quantity {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for product {}. Available: {}, Requested: {}",
                item.product_id, product.stock, item.quantity
            )));
        }

        locked.push(product);
    }

    let order = OrderActive {
        id: NotSet,
        user_id: Set(user.id),
        total_amount: Set(payload.total_amount),
        status: Set(status),
        delivery_address: Set(DELIVERY_ADDRESS.to_string()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    for (item, product) in payload.items.iter().zip(&locked) {
        // Snapshot price from the locked row, never the client's copy.
        OrderItemActive {
            id: NotSet,
            order_id: Set(order.id),
            product_id: Set(item.product_id),
            quantity: Set(item.quantity),
            price: Set(product.price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;

        // Conditional decrement as a second guard behind the row lock: zero
        // rows affected means the stock moved underneath us, abort.
        let result = Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(item.quantity))
            .filter(ProdCol::Id.eq(item.product_id))
            .filter(ProdCol::Stock.gte(item.quantity))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for product {}. Available: {}, Requested: {}",
                item.product_id, product.stock, item.quantity
            )));
        }

        InventoryLogActive {
            id: NotSet,
            product_id: Set(item.product_id),
            old_stock: Set(product.stock),
            new_stock: Set(product.stock - item.quantity),
            action: Set("order_placed".into()),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
    }

    txn.commit().await?;

    tracing::info!(order_id = order.id, user_id = user.id, "order placed");

    Ok(ApiResponse::success(
        "Order created successfully",
        OrderPlaced { order_id: order.id },
    ))
}

pub async fn list_user_orders(
    state: &AppState,
    _user: &AuthUser,
    user_id: i32,
) -> AppResult<ApiResponse<OrderHistory>> {
    let orders = Orders::find()
        .filter(OrderCol::UserId.eq(user_id))
        .order_by_desc(OrderCol::CreatedAt)
        .all(&state.orm)
        .await?;

    let mut items_by_order = load_items(state, orders.iter().map(|o| o.id).collect()).await?;

    let orders: Vec<OrderWithItems> = orders
        .into_iter()
        .map(|model| {
            let items = items_by_order.remove(&model.id).unwrap_or_default();
            OrderWithItems {
                order: order_from_entity(model),
                items,
            }
        })
        .collect();

    let total = orders.len() as u64;
    Ok(ApiResponse::list("Ok", OrderHistory { orders }, total))
}

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<AdminOrderList>> {
    ensure_admin(user)?;

    let orders = Orders::find()
        .find_also_related(Users)
        .order_by_desc(OrderCol::CreatedAt)
        .all(&state.orm)
        .await?;

    let mut items_by_order =
        load_items(state, orders.iter().map(|(o, _)| o.id).collect()).await?;

    let orders: Vec<AdminOrder> = orders
        .into_iter()
        .map(|(model, customer)| {
            let items = items_by_order.remove(&model.id).unwrap_or_default();
            let (customer_name, customer_phone) = match customer {
                Some(u) => (u.name, u.phone),
                None => (String::new(), None),
            };
            AdminOrder {
                order: order_from_entity(model),
                customer_name,
                customer_phone,
                items,
            }
        })
        .collect();

    let total = orders.len() as u64;
    Ok(ApiResponse::list("Orders", AdminOrderList { orders }, total))
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: i32,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    validate_order_status(&payload.status)?;

    let existing = Orders::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(o) => o,
        None => return Err(AppError::NotFound("Order not found".into())),
    };

    let mut active: OrderActive = existing.into();
    active.status = Set(payload.status);
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&state.orm).await?;

    if let Err(err) = log_activity(
        state,
        user.id,
        &format!("Order {} status updated", order.id),
        Some(format!("New status: {}", order.status)),
    )
    .await
    {
        tracing::warn!(error = %err, "activity log failed");
    }

    Ok(ApiResponse::success(
        "Order status updated",
        order_from_entity(order),
    ))
}

/// Fetch the line items of a set of orders with their product names,
/// grouped by order id.
async fn load_items(
    state: &AppState,
    order_ids: Vec<i32>,
) -> AppResult<HashMap<i32, Vec<OrderItemView>>> {
    let mut grouped: HashMap<i32, Vec<OrderItemView>> = HashMap::new();
    if order_ids.is_empty() {
        return Ok(grouped);
    }

    let rows = OrderItems::find()
        .filter(OrderItemCol::OrderId.is_in(order_ids))
        .find_also_related(Products)
        .all(&state.orm)
        .await?;

    for (item, product) in rows {
        grouped.entry(item.order_id).or_default().push(OrderItemView {
            product_id: item.product_id,
            product_name: product.map(|p| p.name).unwrap_or_default(),
            quantity: item.quantity,
            price: item.price,
        });
    }

    Ok(grouped)
}

fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        total_amount: model.total_amount,
        status: model.status,
        delivery_address: model.delivery_address,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_validation_accepts_the_allowed_set() {
        for status in ["pending", "confirmed", "shipped", "delivered", "cancelled"] {
            assert!(validate_order_status(status).is_ok());
        }
    }

    #[test]
    fn status_validation_rejects_unknown_values() {
        for status in ["paid", "PENDING", "", "complete"] {
            assert!(validate_order_status(status).is_err());
        }
    }
}
