use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, patch, post},
};

use crate::{
    dto::{
        cart::{AddToCartRequest, CartView, UpdateQuantityRequest},
        orders::{CheckoutQuote, QuoteRequest},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
    services::{cart_service::Cart, order_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(cart_view).post(add_to_cart).delete(clear_cart))
        .route("/quote", post(quote))
        .route("/{id}", patch(update_quantity).delete(remove_from_cart))
        .route("/{id}/save", post(save_for_later))
        .route("/saved/{id}", delete(remove_from_saved))
        .route("/saved/{id}/move", post(move_to_cart))
}

fn view(message: &str, cart: &Cart) -> Json<ApiResponse<CartView>> {
    let view = cart.view();
    let meta = Meta::count(view.items.len());
    Json(ApiResponse::success(message, view, Some(meta)))
}

#[utoipa::path(
    get,
    path = "/api/cart",
    responses(
        (status = 200, description = "Cart and saved-for-later items", body = ApiResponse<CartView>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn cart_view(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CartView>>> {
    Ok(state.with_cart(user.user_id, |cart| view("OK", cart)))
}

#[utoipa::path(
    post,
    path = "/api/cart",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Add or merge a cart line", body = ApiResponse<CartView>),
        (status = 400, description = "Bad request"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddToCartRequest>,
) -> AppResult<Json<ApiResponse<CartView>>> {
    if payload.quantity == 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }
    let product = state
        .data
        .get_product(payload.product_id)
        .ok_or_else(|| AppError::BadRequest("product not found".to_string()))?;
    if !product.in_stock {
        return Err(AppError::BadRequest("product is out of stock".to_string()));
    }

    let resp = state.with_cart(user.user_id, |cart| {
        cart.add_product(&product, payload.quantity);
        view("OK", cart)
    });
    tracing::debug!(user_id = user.user_id, product_id = product.id, quantity = payload.quantity, "cart add");
    Ok(resp)
}

#[utoipa::path(
    patch,
    path = "/api/cart/{id}",
    params(
        ("id" = i64, Path, description = "Product ID")
    ),
    request_body = UpdateQuantityRequest,
    responses(
        (status = 200, description = "Quantity set; zero or less removes the line", body = ApiResponse<CartView>),
        (status = 404, description = "Cart item not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_quantity(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> AppResult<Json<ApiResponse<CartView>>> {
    state.with_cart(user.user_id, |cart| {
        if !cart.items().iter().any(|i| i.id == id) {
            return Err(AppError::NotFound);
        }
        cart.update_quantity(id, payload.quantity);
        Ok(view("OK", cart))
    })
}

#[utoipa::path(
    delete,
    path = "/api/cart/{id}",
    params(
        ("id" = i64, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Removed from cart", body = ApiResponse<CartView>),
        (status = 404, description = "Cart item not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<CartView>>> {
    state.with_cart(user.user_id, |cart| {
        if !cart.remove_from_cart(id) {
            return Err(AppError::NotFound);
        }
        Ok(view("Removed from cart", cart))
    })
}

#[utoipa::path(
    delete,
    path = "/api/cart",
    responses(
        (status = 200, description = "Cart emptied", body = ApiResponse<CartView>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CartView>>> {
    Ok(state.with_cart(user.user_id, |cart| {
        cart.clear_cart();
        view("Cart cleared", cart)
    }))
}

#[utoipa::path(
    post,
    path = "/api/cart/{id}/save",
    params(
        ("id" = i64, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Moved to saved-for-later", body = ApiResponse<CartView>),
        (status = 404, description = "Cart item not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn save_for_later(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<CartView>>> {
    state.with_cart(user.user_id, |cart| {
        if !cart.save_for_later(id) {
            return Err(AppError::NotFound);
        }
        Ok(view("Saved for later", cart))
    })
}

#[utoipa::path(
    post,
    path = "/api/cart/saved/{id}/move",
    params(
        ("id" = i64, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Moved back to the cart", body = ApiResponse<CartView>),
        (status = 404, description = "Saved item not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn move_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<CartView>>> {
    state.with_cart(user.user_id, |cart| {
        if !cart.move_to_cart(id) {
            return Err(AppError::NotFound);
        }
        Ok(view("Moved to cart", cart))
    })
}

#[utoipa::path(
    delete,
    path = "/api/cart/saved/{id}",
    params(
        ("id" = i64, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Removed from saved items", body = ApiResponse<CartView>),
        (status = 404, description = "Saved item not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_from_saved(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<CartView>>> {
    state.with_cart(user.user_id, |cart| {
        if !cart.remove_from_saved(id) {
            return Err(AppError::NotFound);
        }
        Ok(view("Removed from saved items", cart))
    })
}

#[utoipa::path(
    post,
    path = "/api/cart/quote",
    request_body = QuoteRequest,
    responses(
        (status = 200, description = "Subtotal, shipping, discount and total", body = ApiResponse<CheckoutQuote>),
        (status = 400, description = "Unknown coupon"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn quote(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<QuoteRequest>,
) -> AppResult<Json<ApiResponse<CheckoutQuote>>> {
    let resp = order_service::quote_cart(&state, &user, payload)?;
    Ok(Json(resp))
}
