use crate::{
    dto::orders::{CheckoutQuote, CheckoutRequest, OrderList, QuoteRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{NewOrder, Order, OrderLine},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::{
        cart_service::Cart,
        data_service::DataService,
        pricing,
    },
    state::AppState,
};

/// Turn a cart into a pending order and empty the cart.
///
/// Prices come from the cart lines as they were added. The cart is re-read
/// from storage first, so a handle loaded before another checkout sees the
/// emptied cart. The cart is left untouched when the order is rejected.
pub fn checkout_cart(
    data: &DataService,
    cart: &mut Cart,
    user_id: i64,
    request: CheckoutRequest,
) -> AppResult<Order> {
    cart.reload();
    if cart.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    let quote = pricing::quote(cart.items(), request.coupon_code.as_deref())?;
    let items = cart
        .items()
        .iter()
        .map(|item| OrderLine {
            product_id: item.id,
            name: item.name.clone(),
            price: item.price,
            quantity: item.quantity,
            variant: item.variant.clone(),
        })
        .collect();

    let order = data.place_order(NewOrder {
        user_id,
        items,
        subtotal: quote.subtotal,
        shipping: quote.shipping,
        discount: quote.discount,
        total: quote.total,
        coupon_code: request
            .coupon_code
            .filter(|_| quote.discount > 0)
            .map(|c| c.trim().to_ascii_uppercase()),
        shipping_address: request.shipping_address,
        payment_method: request.payment_method,
    })?;

    cart.clear_cart();
    Ok(order)
}

pub fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<Order>> {
    let order = state.with_cart(user.user_id, |cart| {
        checkout_cart(&state.data, cart, user.user_id, payload)
    })?;
    Ok(ApiResponse::success(
        "Checkout success",
        order,
        Some(Meta::empty()),
    ))
}

pub fn quote_cart(
    state: &AppState,
    user: &AuthUser,
    payload: QuoteRequest,
) -> AppResult<ApiResponse<CheckoutQuote>> {
    let (quote, item_count) = state.with_cart(user.user_id, |cart| {
        pricing::quote(cart.items(), payload.coupon_code.as_deref())
            .map(|quote| (quote, cart.item_count()))
    })?;
    Ok(ApiResponse::success(
        "Quote",
        CheckoutQuote { quote, item_count },
        None,
    ))
}

pub fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let orders = state.data.get_user_orders(user.user_id);
    Ok(page_orders(orders, query, "Ok"))
}

/// Filter by status, sort by creation time and cut a page.
pub fn page_orders(
    mut orders: Vec<Order>,
    query: OrderListQuery,
    message: &str,
) -> ApiResponse<OrderList> {
    let (page, limit, offset) = query.pagination().normalize();
    if let Some(status) = query.status {
        orders.retain(|o| o.status == status);
    }
    match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => orders.sort_by_key(|o| (o.created_at, o.id)),
        SortOrder::Desc => {
            orders.sort_by_key(|o| (o.created_at, o.id));
            orders.reverse();
        }
    }

    let total = orders.len() as i64;
    let items = orders
        .into_iter()
        .skip(usize::try_from(offset).unwrap_or(usize::MAX))
        .take(limit as usize)
        .collect();

    ApiResponse::success(message, OrderList { items }, Some(Meta::new(page, limit, total)))
}

pub fn get_order(state: &AppState, user: &AuthUser, id: i64) -> AppResult<ApiResponse<Order>> {
    let order = state
        .data
        .get_order(id)
        .filter(|o| o.user_id == user.user_id)
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("OK", order, Some(Meta::empty())))
}
