//! Active cart and saved-for-later list.
//!
//! Both lists live under their own storage keys and are rewritten in full on
//! every change. Nothing here reads or writes the product or order
//! collections; items carry the display fields they were added with.

use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;

use crate::{
    db::{KeyValueStore, keys},
    dto::cart::CartView,
    models::{CartItem, Product},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartKeys {
    pub cart: String,
    pub saved: String,
}

impl CartKeys {
    /// The single cart of a local, single-user client.
    pub fn local() -> Self {
        Self {
            cart: keys::CART.to_string(),
            saved: keys::SAVED_ITEMS.to_string(),
        }
    }

    pub fn for_user(user_id: i64) -> Self {
        Self {
            cart: keys::user_cart(user_id),
            saved: keys::user_saved_items(user_id),
        }
    }
}

pub struct Cart {
    storage: Arc<dyn KeyValueStore>,
    keys: CartKeys,
    items: Vec<CartItem>,
    saved: Vec<CartItem>,
}

impl Cart {
    pub fn load(storage: Arc<dyn KeyValueStore>, keys: CartKeys) -> Self {
        let items = read_list(storage.as_ref(), &keys.cart);
        let saved = read_list(storage.as_ref(), &keys.saved);
        Self {
            storage,
            keys,
            items,
            saved,
        }
    }

    /// Re-read both lists, dropping whatever this handle held.
    pub fn reload(&mut self) {
        self.items = read_list(self.storage.as_ref(), &self.keys.cart);
        self.saved = read_list(self.storage.as_ref(), &self.keys.saved);
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn saved_items(&self) -> &[CartItem] {
        &self.saved
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add `quantity` of an item, merging with an existing line of the same id.
    /// A zero quantity changes nothing.
    pub fn add_to_cart(&mut self, mut item: CartItem, quantity: u32) {
        if quantity == 0 {
            return;
        }
        match self.items.iter_mut().find(|i| i.id == item.id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(quantity),
            None => {
                item.quantity = quantity;
                self.items.push(item);
            }
        }
        self.persist_cart();
    }

    pub fn add_product(&mut self, product: &Product, quantity: u32) {
        self.add_to_cart(CartItem::from_product(product, quantity), quantity);
    }

    /// Overwrite a line's quantity; zero or less removes the line.
    pub fn update_quantity(&mut self, id: i64, quantity: i64) {
        if quantity <= 0 {
            self.remove_from_cart(id);
            return;
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        if let Some(item) = self.items.iter_mut().find(|i| i.id == id) {
            item.quantity = quantity;
            self.persist_cart();
        }
    }

    pub fn remove_from_cart(&mut self, id: i64) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.id != id);
        let removed = self.items.len() != before;
        if removed {
            self.persist_cart();
        }
        removed
    }

    /// Move a line to the saved list with its quantity reset to one.
    pub fn save_for_later(&mut self, id: i64) -> bool {
        let Some(pos) = self.items.iter().position(|i| i.id == id) else {
            return false;
        };
        let mut item = self.items.remove(pos);
        item.quantity = 1;
        self.saved.retain(|s| s.id != id);
        self.saved.push(item);
        self.persist_saved();
        self.persist_cart();
        true
    }

    /// Move a saved item back, adding one to the cart.
    pub fn move_to_cart(&mut self, id: i64) -> bool {
        let Some(pos) = self.saved.iter().position(|s| s.id == id) else {
            return false;
        };
        let item = self.saved.remove(pos);
        self.add_to_cart(item, 1);
        self.persist_saved();
        true
    }

    pub fn remove_from_saved(&mut self, id: i64) -> bool {
        let before = self.saved.len();
        self.saved.retain(|s| s.id != id);
        let removed = self.saved.len() != before;
        if removed {
            self.persist_saved();
        }
        removed
    }

    pub fn clear_cart(&mut self) {
        self.items.clear();
        self.persist_cart();
    }

    pub fn total(&self) -> i64 {
        self.items
            .iter()
            .map(CartItem::line_total)
            .fold(0, i64::saturating_add)
    }

    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }

    pub fn view(&self) -> CartView {
        CartView {
            items: self.items.clone(),
            saved: self.saved.clone(),
            total: self.total(),
            item_count: self.item_count(),
        }
    }

    fn persist_cart(&self) {
        write_list(self.storage.as_ref(), &self.keys.cart, &self.items);
    }

    fn persist_saved(&self) {
        write_list(self.storage.as_ref(), &self.keys.saved, &self.saved);
    }
}

/// Per-user cart locks shared by every request handler.
///
/// A cart is a read-modify-write of two storage keys, so two requests for the
/// same user must not interleave between load and write.
#[derive(Default)]
pub struct CartLocks {
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl CartLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, user_id: i64) -> Arc<Mutex<()>> {
        self.locks.lock().entry(user_id).or_default().clone()
    }

    /// Load the user's cart and run `f` on it while holding that user's lock.
    pub fn with_cart<T>(
        &self,
        storage: Arc<dyn KeyValueStore>,
        user_id: i64,
        f: impl FnOnce(&mut Cart) -> T,
    ) -> T {
        let lock = self.lock_for(user_id);
        let _guard = lock.lock();
        let mut cart = Cart::load(storage, CartKeys::for_user(user_id));
        f(&mut cart)
    }
}

fn read_list(storage: &dyn KeyValueStore, key: &str) -> Vec<CartItem> {
    match storage.get(key) {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
            tracing::warn!(key, error = %err, "stored cart list is corrupt; starting empty");
            Vec::new()
        }),
        Ok(None) => Vec::new(),
        Err(err) => {
            tracing::error!(key, error = ?err, "failed to read cart list");
            Vec::new()
        }
    }
}

fn write_list(storage: &dyn KeyValueStore, key: &str, items: &[CartItem]) {
    let result = serde_json::to_string(items)
        .map_err(Into::into)
        .and_then(|raw| storage.set(key, &raw));
    if let Err(err) = result {
        tracing::error!(key, error = ?err, "failed to persist cart list");
    }
}
