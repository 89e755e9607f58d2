use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, FromQueryResult, PaginatorTrait,
    QueryFilter, Set, Statement,
};

use crate::{
    audit::log_activity,
    dto::admin::{
        CountStats, CustomerList, CustomerStatusRequest, OrderStats, ReportResponse, ReportRow,
    },
    entity::{
        orders::{Column as OrderCol, Entity as Orders},
        products::Entity as Products,
        users::{ActiveModel as UserActive, Entity as Users},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Customer,
    response::ApiResponse,
    routes::params::ReportPeriod,
    state::AppState,
};

/// Only these statuses count towards revenue.
const REVENUE_STATUSES: [&str; 3] = ["confirmed", "shipped", "delivered"];

pub async fn user_stats(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CountStats>> {
    ensure_admin(user)?;
    let count = Users::find().count(&state.orm).await? as i64;
    Ok(ApiResponse::success(
        "Ok",
        CountStats { count },
    ))
}

pub async fn product_stats(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<CountStats>> {
    ensure_admin(user)?;
    let count = Products::find().count(&state.orm).await? as i64;
    Ok(ApiResponse::success(
        "Ok",
        CountStats { count },
    ))
}

pub async fn order_stats(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<OrderStats>> {
    ensure_admin(user)?;

    let count = Orders::find()
        .filter(OrderCol::Status.is_in(REVENUE_STATUSES))
        .count(&state.orm)
        .await? as i64;

    #[derive(FromQueryResult)]
    struct SalesRow {
        total_sales: i64,
    }

    let backend = state.orm.get_database_backend();
    let sales = SalesRow::find_by_statement(Statement::from_string(
        backend,
        "SELECT COALESCE(SUM(total_amount), 0)::BIGINT AS total_sales \
         FROM orders WHERE status IN ('confirmed', 'shipped', 'delivered')",
    ))
    .one(&state.orm)
    .await?
    .map(|row| row.total_sales)
    .unwrap_or(0);

    Ok(ApiResponse::success(
        "Ok",
        OrderStats {
            count,
            total_sales: sales,
        },
    ))
}

pub async fn list_customers(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<CustomerList>> {
    ensure_admin(user)?;

    #[derive(FromQueryResult)]
    struct CustomerRow {
        id: i32,
        name: String,
        email: String,
        phone: Option<String>,
        status: String,
        order_count: i64,
    }

    let backend = state.orm.get_database_backend();
    let rows = CustomerRow::find_by_statement(Statement::from_string(
        backend,
        "SELECT u.id, u.name, u.email, u.phone, u.status, COUNT(o.id) AS order_count \
         FROM users u LEFT JOIN orders o ON o.user_id = u.id \
         GROUP BY u.id, u.name, u.email, u.phone, u.status \
         ORDER BY u.id",
    ))
    .all(&state.orm)
    .await?;

    let customers: Vec<Customer> = rows
        .into_iter()
        .map(|r| Customer {
            id: r.id,
            name: r.name,
            email: r.email,
            phone: r.phone,
            status: r.status,
            order_count: r.order_count,
        })
        .collect();

    let total = customers.len() as u64;
    Ok(ApiResponse::list("Customers", CustomerList { customers }, total))
}

pub async fn set_customer_status(
    state: &AppState,
    user: &AuthUser,
    customer_id: i32,
    payload: CustomerStatusRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    validate_customer_status(&payload.status)?;

    let existing = Users::find_by_id(customer_id).one(&state.orm).await?;
    let existing = match existing {
        Some(u) => u,
        None => return Err(AppError::NotFound("User not found".into())),
    };

    let mut active: UserActive = existing.into();
    active.status = Set(payload.status.clone());
    active.update(&state.orm).await?;

    if let Err(err) = log_activity(
        state,
        user.id,
        &format!("Customer {customer_id} status updated"),
        Some(format!("Status: {}", payload.status)),
    )
    .await
    {
        tracing::warn!(error = %err, "activity log failed");
    }

    Ok(ApiResponse::success(
        "Customer updated",
        serde_json::json!({}),
    ))
}

/// Orders and revenue grouped by day (last 7 days) or month (last 12 months),
/// newest first, over the revenue-bearing statuses.
pub async fn reports(
    state: &AppState,
    user: &AuthUser,
    period: ReportPeriod,
) -> AppResult<ApiResponse<ReportResponse>> {
    ensure_admin(user)?;

    let sql = match period {
        ReportPeriod::Monthly => {
            "SELECT to_char(date_trunc('month', created_at), 'YYYY-MM-01') AS date, \
                    COUNT(*) AS orders, \
                    COALESCE(SUM(total_amount), 0)::BIGINT AS revenue \
             FROM orders \
             WHERE status IN ('confirmed', 'shipped', 'delivered') \
               AND created_at >= now() - INTERVAL '12 months' \
             GROUP BY date_trunc('month', created_at) \
             ORDER BY date DESC"
        }
        ReportPeriod::Daily => {
            "SELECT to_char(date_trunc('day', created_at), 'YYYY-MM-DD') AS date, \
                    COUNT(*) AS orders, \
                    COALESCE(SUM(total_amount), 0)::BIGINT AS revenue \
             FROM orders \
             WHERE status IN ('confirmed', 'shipped', 'delivered') \
               AND created_at >= now() - INTERVAL '7 days' \
             GROUP BY date_trunc('day', created_at) \
             ORDER BY date DESC"
        }
    };

    #[derive(FromQueryResult)]
    struct RawRow {
        date: String,
        orders: i64,
        revenue: i64,
    }

    let backend = state.orm.get_database_backend();
    let rows = RawRow::find_by_statement(Statement::from_string(backend, sql))
        .all(&state.orm)
        .await?;

    let total_orders = rows.iter().map(|r| r.orders).sum();
    let total_revenue = rows.iter().map(|r| r.revenue).sum();
    let report_data = rows
        .into_iter()
        .map(|r| ReportRow {
            date: r.date,
            orders: r.orders,
            revenue: r.revenue,
        })
        .collect();

    Ok(ApiResponse::success(
        "Report",
        ReportResponse {
            report_data,
            total_orders,
            total_revenue,
        },
    ))
}

fn validate_customer_status(status: &str) -> Result<(), AppError> {
    const VALID: [&str; 3] = ["active", "inactive", "blocked"];
    if VALID.contains(&status) {
        Ok(())
    } else {
        Err(AppError::BadRequest("Invalid customer status".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn customer_status_validation() {
        assert!(validate_customer_status("active").is_ok());
        assert!(validate_customer_status("blocked").is_ok());
        assert!(validate_customer_status("deleted").is_err());
    }
}
