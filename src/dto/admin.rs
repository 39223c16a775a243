use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{Order, Product, UserProfile};

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_products: usize,
    pub total_customers: usize,
    pub total_orders: usize,
    pub total_revenue: i64,
    pub recent_orders: Vec<Order>,
    pub low_stock_products: Vec<Product>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct UserList {
    #[schema(value_type = Vec<UserProfile>)]
    pub items: Vec<UserProfile>,
}
