use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Paise.
    pub price: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<i64>,
    #[serde(default)]
    pub stock_quantity: i32,
    #[serde(default)]
    pub in_stock: bool,
    #[serde(default)]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default)]
    pub badges: Vec<String>,
    #[serde(default)]
    pub dietary: Vec<String>,
    #[serde(default)]
    pub variants: Vec<Variant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_quantity: Option<i32>,
}

/// Product payload without an id; the store assigns one.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: i64,
    #[serde(default)]
    pub original_price: Option<i64>,
    #[serde(default)]
    pub stock_quantity: i32,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default)]
    pub badges: Vec<String>,
    #[serde(default)]
    pub dietary: Vec<String>,
    #[serde(default)]
    pub variants: Vec<Variant>,
}

impl NewProduct {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub(crate) fn into_product(self, id: i64) -> Product {
        Product {
            id,
            name: self.name,
            description: self.description,
            price: self.price,
            original_price: self.original_price,
            in_stock: self.stock_quantity > 0,
            stock_quantity: self.stock_quantity,
            category: self.category,
            brand: self.brand,
            image: self.image,
            rating: self.rating,
            review_count: 0,
            badges: self.badges,
            dietary: self.dietary,
            variants: self.variants,
        }
    }
}

/// Shallow patch: every present field replaces the stored one wholesale.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub original_price: Option<i64>,
    pub stock_quantity: Option<i32>,
    pub in_stock: Option<bool>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub image: Option<String>,
    pub rating: Option<f32>,
    pub review_count: Option<u32>,
    pub badges: Option<Vec<String>>,
    pub dietary: Option<Vec<String>>,
    pub variants: Option<Vec<Variant>>,
}

impl ProductPatch {
    pub(crate) fn apply(self, product: &mut Product) {
        if let Some(name) = self.name {
            product.name = name;
        }
        if let Some(description) = self.description {
            product.description = Some(description);
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(original_price) = self.original_price {
            product.original_price = Some(original_price);
        }
        if let Some(stock_quantity) = self.stock_quantity {
            product.stock_quantity = stock_quantity;
        }
        if let Some(in_stock) = self.in_stock {
            product.in_stock = in_stock;
        }
        if let Some(category) = self.category {
            product.category = category;
        }
        if let Some(brand) = self.brand {
            product.brand = Some(brand);
        }
        if let Some(image) = self.image {
            product.image = Some(image);
        }
        if let Some(rating) = self.rating {
            product.rating = Some(rating);
        }
        if let Some(review_count) = self.review_count {
            product.review_count = review_count;
        }
        if let Some(badges) = self.badges {
            product.badges = badges;
        }
        if let Some(dietary) = self.dietary {
            product.dietary = dietary;
        }
        if let Some(variants) = self.variants {
            product.variants = variants;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Customer,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub name: String,
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub password_hash: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub orders: Vec<i64>,
    #[serde(default)]
    pub wishlist: Vec<i64>,
    #[serde(default)]
    pub addresses: Vec<Address>,
    /// Bumped on logout and password change; tokens carrying an older value
    /// are rejected.
    #[serde(default)]
    pub token_version: u32,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile::from(self)
    }
}

/// A user as it leaves the service: everything except the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub username: Option<String>,
    pub role: Role,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub orders: Vec<i64>,
    pub wishlist: Vec<i64>,
    pub addresses: Vec<Address>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            username: user.username.clone(),
            role: user.role,
            phone: user.phone.clone(),
            created_at: user.created_at,
            orders: user.orders.clone(),
            wishlist: user.wishlist.clone(),
            addresses: user.addresses.clone(),
        }
    }
}

/// User payload for insertion. The password is already hashed by the caller.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub username: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub phone: Option<String>,
    pub role: Option<Role>,
    pub wishlist: Option<Vec<i64>>,
    pub addresses: Option<Vec<Address>>,
}

impl UserPatch {
    pub(crate) fn apply(self, user: &mut User) {
        if let Some(name) = self.name {
            user.name = name;
        }
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(username) = self.username {
            user.username = Some(username);
        }
        if let Some(phone) = self.phone {
            user.phone = Some(phone);
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(wishlist) = self.wishlist {
            user.wishlist = wishlist;
        }
        if let Some(addresses) = self.addresses {
            user.addresses = addresses;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: i64,
    pub name: String,
    pub price: i64,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub items: Vec<OrderLine>,
    #[serde(default)]
    pub subtotal: i64,
    #[serde(default)]
    pub shipping: i64,
    #[serde(default)]
    pub discount: i64,
    pub total: i64,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub invoice_number: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewOrder {
    pub user_id: i64,
    pub items: Vec<OrderLine>,
    pub subtotal: i64,
    pub shipping: i64,
    pub discount: i64,
    pub total: i64,
    pub coupon_code: Option<String>,
    pub shipping_address: Option<Address>,
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderPatch {
    pub status: Option<OrderStatus>,
    pub shipping_address: Option<Address>,
    pub payment_method: Option<String>,
}

impl OrderPatch {
    pub(crate) fn apply(self, order: &mut Order) {
        if let Some(status) = self.status {
            order.status = status;
        }
        if let Some(address) = self.shipping_address {
            order.shipping_address = Some(address);
        }
        if let Some(payment_method) = self.payment_method {
            order.payment_method = Some(payment_method);
        }
    }
}

/// Free-form store settings, merged key by key on update.
pub type Settings = Map<String, Value>;

/// Pointer to the signed-in user, persisted apart from the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: i64,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl Session {
    pub fn start(user_id: i64) -> Self {
        Self {
            user_id,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// A cart line: a denormalized copy of the product's display fields.
///
/// The price is frozen when the item is first added and never reconciled
/// with later product edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: i64,
    pub name: String,
    pub price: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    pub quantity: u32,
}

impl CartItem {
    pub fn from_product(product: &Product, quantity: u32) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            price: product.price,
            image: product.image.clone(),
            category: Some(product.category.clone()).filter(|c| !c.is_empty()),
            variant: None,
            quantity,
        }
    }

    /// Saturates instead of overflowing on absurd prices.
    pub fn line_total(&self) -> i64 {
        self.price.saturating_mul(i64::from(self.quantity))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Category {
    pub id: &'static str,
    pub name: &'static str,
}

pub const CATEGORIES: &[Category] = &[
    Category { id: "unpolished-pulses-dals-rice", name: "Unpolished Pulses, Dals & Rice" },
    Category { id: "poha-aval", name: "Poha / Aval" },
    Category { id: "sugars-honey", name: "Sugars & Honey" },
    Category { id: "haircare-products", name: "Haircare Products" },
    Category { id: "skincare-products", name: "Skincare Products" },
    Category { id: "millet-items", name: "Millet Items" },
    Category { id: "powders", name: "Powders" },
    Category { id: "fries", name: "Fries" },
    Category { id: "herbal-handmade-soaps", name: "Herbal Handmade Soaps" },
    Category { id: "snacks", name: "Snacks" },
    Category { id: "herbal-products", name: "Herbal Products" },
    Category { id: "herbal-powders", name: "Herbal Powders" },
];
