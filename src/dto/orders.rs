use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Address, Order, OrderStatus};
use crate::services::pricing::Quote;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub coupon_code: Option<String>,
    pub shipping_address: Option<Address>,
    pub payment_method: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct OrderList {
    #[schema(value_type = Vec<Order>)]
    pub items: Vec<Order>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct QuoteRequest {
    pub coupon_code: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutQuote {
    pub quote: Quote,
    pub item_count: u64,
}
