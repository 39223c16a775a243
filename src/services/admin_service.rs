use serde_json::Value;

use crate::{
    dto::{
        admin::{DashboardStats, UserList},
        orders::{OrderList, UpdateOrderStatusRequest},
        products::{ProductList, RestockRequest},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, OrderPatch, Product, Role, Settings, UserPatch, UserProfile},
    response::{ApiResponse, Meta},
    routes::params::{LowStockQuery, OrderListQuery},
    services::{data_service::DataService, order_service::page_orders},
    state::AppState,
};

pub const LOW_STOCK_THRESHOLD: i32 = 10;
const RECENT_ORDERS: usize = 5;

pub fn dashboard_stats(data: &DataService) -> DashboardStats {
    let products = data.get_products();
    let users = data.get_users();
    let orders = data.get_orders();

    let total_revenue = orders.iter().map(|o| o.total).fold(0, i64::saturating_add);
    let recent_orders = orders.iter().rev().take(RECENT_ORDERS).cloned().collect();
    let low_stock_products = products
        .iter()
        .filter(|p| p.stock_quantity < LOW_STOCK_THRESHOLD)
        .cloned()
        .collect();

    DashboardStats {
        total_products: products.len(),
        total_customers: users.iter().filter(|u| u.role == Role::Customer).count(),
        total_orders: orders.len(),
        total_revenue,
        recent_orders,
        low_stock_products,
    }
}

pub fn dashboard(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<DashboardStats>> {
    ensure_admin(user)?;
    Ok(ApiResponse::success(
        "Dashboard",
        dashboard_stats(&state.data),
        Some(Meta::empty()),
    ))
}

/// Add a positive amount to a product's stock and refresh its in-stock flag.
pub fn restock(data: &DataService, id: i64, amount: i32) -> AppResult<Product> {
    if amount <= 0 {
        return Err(AppError::BadRequest(
            "restock amount must be greater than 0".to_string(),
        ));
    }
    let product = data.adjust_stock(id, amount).ok_or(AppError::NotFound)?;
    tracing::info!(product_id = id, amount, stock_quantity = product.stock_quantity, "product restocked");
    Ok(product)
}

pub fn restock_product(
    state: &AppState,
    user: &AuthUser,
    id: i64,
    payload: RestockRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let product = restock(&state.data, id, payload.amount)?;
    Ok(ApiResponse::success("Restocked", product, Some(Meta::empty())))
}

pub fn list_low_stock(
    state: &AppState,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination().normalize();
    let threshold = query.threshold.unwrap_or(LOW_STOCK_THRESHOLD);

    let mut products: Vec<Product> = state
        .data
        .get_products()
        .into_iter()
        .filter(|p| p.stock_quantity < threshold)
        .collect();
    products.sort_by_key(|p| (p.stock_quantity, p.id));

    let total = products.len() as i64;
    let items = products
        .into_iter()
        .skip(usize::try_from(offset).unwrap_or(usize::MAX))
        .take(limit as usize)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Low stock", ProductList { items }, Some(meta)))
}

pub fn list_users(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<UserList>> {
    ensure_admin(user)?;
    let items: Vec<_> = state.data.get_users().iter().map(|u| u.profile()).collect();
    let meta = Meta::count(items.len());
    Ok(ApiResponse::success("Users", UserList { items }, Some(meta)))
}

pub fn update_user(
    state: &AppState,
    user: &AuthUser,
    id: i64,
    payload: UserPatch,
) -> AppResult<ApiResponse<UserProfile>> {
    ensure_admin(user)?;
    if let Some(email) = payload.email.as_deref() {
        if state.data.get_user_by_email(email).is_some_and(|u| u.id != id) {
            return Err(AppError::BadRequest("Email is already taken".to_string()));
        }
    }
    let updated = state
        .data
        .update_user(id, payload)
        .ok_or(AppError::NotFound)?;
    tracing::info!(user_id = id, role = ?updated.role, "user updated by admin");
    Ok(ApiResponse::success("User updated", updated.profile(), None))
}

pub fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    Ok(page_orders(state.data.get_orders(), query, "Orders"))
}

pub fn get_order_admin(
    state: &AppState,
    user: &AuthUser,
    id: i64,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    let order = state.data.get_order(id).ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("OK", order, Some(Meta::empty())))
}

pub fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: i64,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    let order = state
        .data
        .update_order(
            id,
            OrderPatch {
                status: Some(payload.status),
                ..OrderPatch::default()
            },
        )
        .ok_or(AppError::NotFound)?;
    tracing::info!(order_id = id, status = ?order.status, "order status updated");
    Ok(ApiResponse::success("Order updated", order, Some(Meta::empty())))
}

pub fn get_settings(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Value>> {
    ensure_admin(user)?;
    Ok(ApiResponse::success(
        "Settings",
        Value::Object(state.data.get_settings()),
        None,
    ))
}

pub fn update_settings(
    state: &AppState,
    user: &AuthUser,
    payload: Value,
) -> AppResult<ApiResponse<Value>> {
    ensure_admin(user)?;
    let Value::Object(updates) = payload else {
        return Err(AppError::BadRequest("settings must be a JSON object".into()));
    };
    let settings: Settings = state.data.update_settings(updates);
    Ok(ApiResponse::success(
        "Settings updated",
        Value::Object(settings),
        Some(Meta::empty()),
    ))
}
