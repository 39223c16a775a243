use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::CartItem,
};

/// Orders at or above this subtotal ship free (₹499).
pub const FREE_SHIPPING_THRESHOLD: i64 = 49_900;
/// Flat shipping fee below the threshold (₹49).
pub const SHIPPING_FEE: i64 = 4_900;
pub const FLAT10_CODE: &str = "FLAT10";
/// Minimum subtotal for FLAT10 (₹1499).
pub const FLAT10_MINIMUM: i64 = 149_900;
const FLAT10_PERCENT: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Quote {
    pub subtotal: i64,
    pub shipping: i64,
    pub discount: i64,
    pub total: i64,
}

pub fn subtotal(items: &[CartItem]) -> i64 {
    items
        .iter()
        .map(CartItem::line_total)
        .fold(0, i64::saturating_add)
}

pub fn shipping_for(subtotal: i64) -> i64 {
    if subtotal >= FREE_SHIPPING_THRESHOLD {
        0
    } else {
        SHIPPING_FEE
    }
}

/// Discount for a coupon against a subtotal. Codes are matched
/// case-insensitively; an unknown code is an error, an unmet minimum is not.
pub fn discount_for(coupon: Option<&str>, subtotal: i64) -> AppResult<i64> {
    let Some(code) = coupon.map(str::trim).filter(|c| !c.is_empty()) else {
        return Ok(0);
    };
    if !code.eq_ignore_ascii_case(FLAT10_CODE) {
        return Err(AppError::BadRequest(format!("unknown coupon {code}")));
    }
    if subtotal >= FLAT10_MINIMUM {
        let discount = i128::from(subtotal) * i128::from(FLAT10_PERCENT) / 100;
        Ok(i64::try_from(discount).unwrap_or(subtotal))
    } else {
        Ok(0)
    }
}

pub fn quote(items: &[CartItem], coupon: Option<&str>) -> AppResult<Quote> {
    let subtotal = subtotal(items);
    let shipping = shipping_for(subtotal);
    let discount = discount_for(coupon, subtotal)?;
    Ok(Quote {
        subtotal,
        shipping,
        discount,
        total: subtotal.saturating_add(shipping).saturating_sub(discount),
    })
}
