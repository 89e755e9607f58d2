use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Customer;

#[derive(Debug, Serialize, ToSchema)]
pub struct CountStats {
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderStats {
    pub count: i64,
    pub total_sales: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CustomerList {
    pub customers: Vec<Customer>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CustomerStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReportRow {
    pub date: String,
    pub orders: i64,
    pub revenue: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReportResponse {
    pub report_data: Vec<ReportRow>,
    pub total_orders: i64,
    pub total_revenue: i64,
}
