use std::cmp::Ordering;

use crate::{
    dto::products::ProductList,
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Category, NewProduct, Product, ProductPatch},
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

fn matches(product: &Product, query: &ProductQuery) -> bool {
    if let Some(search) = query.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let needle = search.to_lowercase();
        let hit = product.name.to_lowercase().contains(&needle)
            || product
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle))
            || product
                .brand
                .as_deref()
                .is_some_and(|b| b.to_lowercase().contains(&needle));
        if !hit {
            return false;
        }
    }
    if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
        if product.category != category {
            return false;
        }
    }
    if let Some(brand) = query.brand.as_deref().filter(|b| !b.is_empty()) {
        if product.brand.as_deref() != Some(brand) {
            return false;
        }
    }
    if query.min_price.is_some_and(|min| product.price < min) {
        return false;
    }
    if query.max_price.is_some_and(|max| product.price > max) {
        return false;
    }
    if query.in_stock == Some(true) && !product.in_stock {
        return false;
    }
    true
}

fn compare(a: &Product, b: &Product, sort_by: ProductSortBy) -> Ordering {
    match sort_by {
        ProductSortBy::Id => a.id.cmp(&b.id),
        ProductSortBy::Price => a.price.cmp(&b.price).then(a.id.cmp(&b.id)),
        ProductSortBy::Name => a
            .name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then(a.id.cmp(&b.id)),
        ProductSortBy::Rating => a
            .rating
            .unwrap_or(0.0)
            .total_cmp(&b.rating.unwrap_or(0.0))
            .then(a.id.cmp(&b.id)),
    }
}

/// Filter, sort and page the catalogue.
pub fn search_products(products: Vec<Product>, query: &ProductQuery) -> (Vec<Product>, Meta) {
    let (page, limit, offset) = query.pagination().normalize();
    let mut items: Vec<Product> = products.into_iter().filter(|p| matches(p, query)).collect();

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::Id);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Asc);
    items.sort_by(|a, b| match sort_order {
        SortOrder::Asc => compare(a, b, sort_by),
        SortOrder::Desc => compare(b, a, sort_by),
    });

    let total = items.len() as i64;
    let items = items
        .into_iter()
        .skip(usize::try_from(offset).unwrap_or(usize::MAX))
        .take(limit as usize)
        .collect();
    (items, Meta::new(page, limit, total))
}

pub fn list_products(state: &AppState, query: ProductQuery) -> AppResult<ApiResponse<ProductList>> {
    let (items, meta) = search_products(state.data.get_products(), &query);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub fn get_product(state: &AppState, id: i64) -> AppResult<ApiResponse<Product>> {
    let product = state.data.get_product(id).ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Product", product, None))
}

pub fn list_categories(state: &AppState) -> ApiResponse<Vec<Category>> {
    let categories = state.data.categories().to_vec();
    let meta = Meta::count(categories.len());
    ApiResponse::success("Categories", categories, Some(meta))
}

pub fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: NewProduct,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name is required".to_string()));
    }
    if payload.price < 0 || payload.stock_quantity < 0 {
        return Err(AppError::BadRequest(
            "price and stock must not be negative".to_string(),
        ));
    }
    let product = state.data.add_product(payload);
    Ok(ApiResponse::success(
        "Product created",
        product,
        Some(Meta::empty()),
    ))
}

pub fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: i64,
    payload: ProductPatch,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let product = state
        .data
        .update_product(id, payload)
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Updated", product, Some(Meta::empty())))
}

pub fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: i64,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    if !state.data.delete_product(id) {
        return Err(AppError::NotFound);
    }
    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
