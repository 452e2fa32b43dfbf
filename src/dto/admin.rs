use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrdersTotalSum {
    pub total_sum: i64,
    pub orders_count: i64,
    pub average_order_value: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusBucket {
    pub status: String,
    pub count: i64,
    pub sum: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RangeStats {
    pub count: i64,
    pub sum: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrdersStatistics {
    pub status_stats: Vec<StatusBucket>,
    pub today_stats: RangeStats,
    pub week_stats: RangeStats,
    pub month_stats: RangeStats,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PeriodBucket {
    pub period: String,
    pub count: i64,
    pub sum: i64,
}
