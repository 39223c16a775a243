//! The data-access façade over the in-memory snapshot.
//!
//! One `DataService` is built at start-up and shared by reference. Reads
//! return clones; every mutation rewrites the whole snapshot to storage.
//! A failed write is logged and otherwise ignored, so the mutation is still
//! visible in memory for the rest of the process.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::{
    db::{KeyValueStore, keys},
    error::{AppError, AppResult},
    models::{
        CATEGORIES, Category, NewOrder, NewProduct, NewUser, Order, OrderPatch, OrderStatus,
        Product, ProductPatch, Settings, User, UserPatch,
    },
    services::auth_service::verify_password,
};

const BUNDLED_DATABASE: &str = include_str!("../../data/database.json");

/// The whole persisted document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Database {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub orders: Vec<Order>,
    #[serde(default)]
    pub settings: Settings,
}

impl Database {
    /// The catalogue shipped with the binary.
    pub fn bundled() -> Self {
        match serde_json::from_str(BUNDLED_DATABASE) {
            Ok(db) => db,
            Err(err) => {
                tracing::error!(error = %err, "bundled database is malformed; starting empty");
                Self::default()
            }
        }
    }
}

fn next_id(ids: impl Iterator<Item = i64>) -> i64 {
    ids.max().unwrap_or(0).max(0) + 1
}

fn build_invoice_number() -> String {
    let date = Utc::now().format("%Y%m%d");
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("INV-{}-{}", date, &suffix[..8])
}

pub struct DataService {
    storage: Arc<dyn KeyValueStore>,
    data: RwLock<Database>,
}

impl DataService {
    /// Load the persisted snapshot, falling back to the bundled catalogue when
    /// nothing is stored or the stored document cannot be read.
    pub fn open(storage: Arc<dyn KeyValueStore>) -> Self {
        let data = match storage.get(keys::DATABASE) {
            Ok(Some(raw)) => match serde_json::from_str::<Database>(&raw) {
                Ok(db) => {
                    tracing::debug!(
                        products = db.products.len(),
                        users = db.users.len(),
                        orders = db.orders.len(),
                        "loaded stored snapshot"
                    );
                    db
                }
                Err(err) => {
                    tracing::error!(error = %err, "stored snapshot is corrupt; using bundled data");
                    Database::bundled()
                }
            },
            Ok(None) => Database::bundled(),
            Err(err) => {
                tracing::error!(error = ?err, "failed to read stored snapshot; using bundled data");
                Database::bundled()
            }
        };
        Self::with_database(storage, data)
    }

    /// Start from an explicit document, ignoring whatever is stored.
    pub fn with_database(storage: Arc<dyn KeyValueStore>, data: Database) -> Self {
        Self {
            storage,
            data: RwLock::new(data),
        }
    }

    pub fn storage(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.storage)
    }

    pub fn snapshot(&self) -> Database {
        self.data.read().clone()
    }

    /// Persist the current document, surfacing the error to the caller.
    pub fn flush(&self) -> AppResult<()> {
        let data = self.data.read();
        self.write_snapshot(&data)
    }

    fn write_snapshot(&self, data: &Database) -> AppResult<()> {
        let raw = serde_json::to_string(data)?;
        self.storage.set(keys::DATABASE, &raw)
    }

    fn persist(&self, data: &Database) {
        if let Err(err) = self.write_snapshot(data) {
            tracing::error!(error = ?err, "failed to persist snapshot; change kept in memory only");
        }
    }

    // Products

    pub fn get_products(&self) -> Vec<Product> {
        self.data.read().products.clone()
    }

    pub fn get_product(&self, id: i64) -> Option<Product> {
        self.data.read().products.iter().find(|p| p.id == id).cloned()
    }

    pub fn add_product(&self, product: NewProduct) -> Product {
        let mut data = self.data.write();
        let id = next_id(data.products.iter().map(|p| p.id));
        let product = product.into_product(id);
        data.products.push(product.clone());
        self.persist(&data);
        tracing::info!(product_id = id, "product added");
        product
    }

    pub fn update_product(&self, id: i64, patch: ProductPatch) -> Option<Product> {
        let mut data = self.data.write();
        let product = data.products.iter_mut().find(|p| p.id == id)?;
        patch.apply(product);
        let updated = product.clone();
        self.persist(&data);
        Some(updated)
    }

    /// Add `delta` to a product's stock in one step, saturating at the
    /// `i32` bounds and refreshing `in_stock`.
    pub fn adjust_stock(&self, id: i64, delta: i32) -> Option<Product> {
        let mut data = self.data.write();
        let product = data.products.iter_mut().find(|p| p.id == id)?;
        product.stock_quantity = product.stock_quantity.saturating_add(delta);
        product.in_stock = product.stock_quantity > 0;
        let updated = product.clone();
        self.persist(&data);
        Some(updated)
    }

    pub fn delete_product(&self, id: i64) -> bool {
        let mut data = self.data.write();
        let before = data.products.len();
        data.products.retain(|p| p.id != id);
        let removed = data.products.len() != before;
        if removed {
            self.persist(&data);
            tracing::info!(product_id = id, "product deleted");
        }
        removed
    }

    // Users

    pub fn get_users(&self) -> Vec<User> {
        self.data.read().users.clone()
    }

    pub fn get_user(&self, id: i64) -> Option<User> {
        self.data.read().users.iter().find(|u| u.id == id).cloned()
    }

    pub fn get_user_by_email(&self, email: &str) -> Option<User> {
        self.data.read().users.iter().find(|u| u.email == email).cloned()
    }

    /// Insert a user with a fresh id, a creation timestamp and empty
    /// order, wishlist and address lists.
    pub fn add_user(&self, user: NewUser) -> User {
        let mut data = self.data.write();
        let id = next_id(data.users.iter().map(|u| u.id));
        let user = User {
            id,
            name: user.name,
            email: user.email,
            username: user.username,
            password_hash: user.password_hash,
            role: user.role,
            phone: user.phone,
            created_at: Utc::now(),
            orders: Vec::new(),
            wishlist: Vec::new(),
            addresses: Vec::new(),
            token_version: 0,
        };
        data.users.push(user.clone());
        self.persist(&data);
        tracing::info!(user_id = id, role = ?user.role, "user added");
        user
    }

    pub fn update_user(&self, id: i64, patch: UserPatch) -> Option<User> {
        let mut data = self.data.write();
        let user = data.users.iter_mut().find(|u| u.id == id)?;
        patch.apply(user);
        let updated = user.clone();
        self.persist(&data);
        Some(updated)
    }

    /// Replace the password hash. Tokens issued before the change stop working.
    pub fn set_password_hash(&self, id: i64, password_hash: String) -> Option<User> {
        let mut data = self.data.write();
        let user = data.users.iter_mut().find(|u| u.id == id)?;
        user.password_hash = password_hash;
        user.token_version = user.token_version.wrapping_add(1);
        let updated = user.clone();
        self.persist(&data);
        Some(updated)
    }

    /// Invalidate every token issued to the user so far.
    pub fn revoke_tokens(&self, id: i64) -> Option<User> {
        let mut data = self.data.write();
        let user = data.users.iter_mut().find(|u| u.id == id)?;
        user.token_version = user.token_version.wrapping_add(1);
        let updated = user.clone();
        self.persist(&data);
        tracing::info!(user_id = id, "tokens revoked");
        Some(updated)
    }

    /// Append a product to the user's wishlist unless it is already there.
    /// Returns whether the list changed, or `None` for an unknown user.
    pub fn add_to_wishlist(&self, user_id: i64, product_id: i64) -> Option<bool> {
        let mut data = self.data.write();
        let user = data.users.iter_mut().find(|u| u.id == user_id)?;
        if user.wishlist.contains(&product_id) {
            return Some(false);
        }
        user.wishlist.push(product_id);
        self.persist(&data);
        Some(true)
    }

    /// Drop a product from the user's wishlist. Returns whether it was there,
    /// or `None` for an unknown user.
    pub fn remove_from_wishlist(&self, user_id: i64, product_id: i64) -> Option<bool> {
        let mut data = self.data.write();
        let user = data.users.iter_mut().find(|u| u.id == user_id)?;
        let before = user.wishlist.len();
        user.wishlist.retain(|id| *id != product_id);
        let removed = user.wishlist.len() != before;
        if removed {
            self.persist(&data);
        }
        Some(removed)
    }

    /// Exact, case-sensitive match on email or username, then the password.
    pub fn authenticate(&self, identifier: &str, password: &str) -> Option<User> {
        let data = self.data.read();
        data.users
            .iter()
            .filter(|u| u.email == identifier || u.username.as_deref() == Some(identifier))
            .find(|u| verify_password(password, &u.password_hash))
            .cloned()
    }

    // Orders

    pub fn get_orders(&self) -> Vec<Order> {
        self.data.read().orders.clone()
    }

    pub fn get_order(&self, id: i64) -> Option<Order> {
        self.data.read().orders.iter().find(|o| o.id == id).cloned()
    }

    pub fn get_user_orders(&self, user_id: i64) -> Vec<Order> {
        self.data
            .read()
            .orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Insert an order as `pending`, stamped with the current time.
    pub fn add_order(&self, order: NewOrder) -> Order {
        let mut data = self.data.write();
        let order = Self::insert_order(&mut data, order);
        self.persist(&data);
        tracing::info!(order_id = order.id, user_id = order.user_id, "order added");
        order
    }

    fn insert_order(data: &mut Database, order: NewOrder) -> Order {
        let id = next_id(data.orders.iter().map(|o| o.id));
        let order = Order {
            id,
            user_id: order.user_id,
            items: order.items,
            subtotal: order.subtotal,
            shipping: order.shipping,
            discount: order.discount,
            total: order.total,
            status: OrderStatus::Pending,
            coupon_code: order.coupon_code,
            shipping_address: order.shipping_address,
            payment_method: order.payment_method,
            invoice_number: build_invoice_number(),
            created_at: Utc::now(),
        };
        data.orders.push(order.clone());
        order
    }

    /// Insert an order and take its lines out of stock in one step.
    ///
    /// Every line must name an existing product with enough stock, otherwise
    /// nothing changes. The order id is also appended to the buyer's record
    /// when the buyer exists.
    pub fn place_order(&self, order: NewOrder) -> AppResult<Order> {
        let mut data = self.data.write();

        for line in &order.items {
            let product = data
                .products
                .iter()
                .find(|p| p.id == line.product_id)
                .ok_or_else(|| {
                    AppError::BadRequest(format!("product {} no longer exists", line.product_id))
                })?;
            let wanted = i64::from(line.quantity);
            let needed: i64 = order
                .items
                .iter()
                .filter(|l| l.product_id == line.product_id)
                .map(|l| i64::from(l.quantity))
                .sum();
            if wanted == 0 || i64::from(product.stock_quantity) < needed {
                return Err(AppError::BadRequest(format!(
                    "Insufficient stock for product {}",
                    line.product_id
                )));
            }
        }

        for line in &order.items {
            if let Some(product) = data.products.iter_mut().find(|p| p.id == line.product_id) {
                product.stock_quantity -= line.quantity as i32;
                product.in_stock = product.stock_quantity > 0;
            }
        }

        let order = Self::insert_order(&mut data, order);
        if let Some(user) = data.users.iter_mut().find(|u| u.id == order.user_id) {
            user.orders.push(order.id);
        }
        self.persist(&data);
        tracing::info!(order_id = order.id, user_id = order.user_id, total = order.total, "order placed");
        Ok(order)
    }

    pub fn update_order(&self, id: i64, patch: OrderPatch) -> Option<Order> {
        let mut data = self.data.write();
        let order = data.orders.iter_mut().find(|o| o.id == id)?;
        patch.apply(order);
        let updated = order.clone();
        self.persist(&data);
        Some(updated)
    }

    // Settings and catalogue metadata

    pub fn get_settings(&self) -> Settings {
        self.data.read().settings.clone()
    }

    /// Merge top-level keys; nested objects are replaced, not merged.
    pub fn update_settings(&self, updates: Settings) -> Settings {
        let mut data = self.data.write();
        for (key, value) in updates {
            data.settings.insert(key, value);
        }
        let settings = data.settings.clone();
        self.persist(&data);
        settings
    }

    pub fn categories(&self) -> &'static [Category] {
        CATEGORIES
    }
}
