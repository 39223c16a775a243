use crate::{
    dto::wishlist::{AddWishlistRequest, WishlistProductList},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

fn wishlist_of(state: &AppState, user: &AuthUser) -> AppResult<Vec<i64>> {
    state
        .data
        .get_user(user.user_id)
        .map(|u| u.wishlist)
        .ok_or(AppError::NotFound)
}

/// Products on the wishlist, most recently added first. Ids whose product
/// has since been deleted are skipped.
pub fn list_wishlist(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<WishlistProductList>> {
    let (page, limit, offset) = pagination.normalize();
    let products: Vec<Product> = wishlist_of(state, user)?
        .into_iter()
        .rev()
        .filter_map(|id| state.data.get_product(id))
        .collect();

    let total = products.len() as i64;
    let items = products
        .into_iter()
        .skip(usize::try_from(offset).unwrap_or(usize::MAX))
        .take(limit as usize)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("OK", WishlistProductList { items }, Some(meta)))
}

pub fn add_to_wishlist(
    state: &AppState,
    user: &AuthUser,
    payload: AddWishlistRequest,
) -> AppResult<ApiResponse<Product>> {
    let product = state
        .data
        .get_product(payload.product_id)
        .ok_or_else(|| AppError::BadRequest("product not found".to_string()))?;

    let added = state
        .data
        .add_to_wishlist(user.user_id, product.id)
        .ok_or(AppError::NotFound)?;
    if added {
        tracing::info!(user_id = user.user_id, product_id = product.id, "wishlist add");
    }

    Ok(ApiResponse::success("Added to wishlist", product, None))
}

pub fn remove_from_wishlist(
    state: &AppState,
    user: &AuthUser,
    product_id: i64,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let removed = state
        .data
        .remove_from_wishlist(user.user_id, product_id)
        .ok_or(AppError::NotFound)?;
    if !removed {
        return Err(AppError::NotFound);
    }
    tracing::info!(user_id = user.user_id, product_id, "wishlist remove");

    Ok(ApiResponse::success(
        "Removed from wishlist",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
