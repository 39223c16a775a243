use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::KeyValueStore,
    services::{
        cart_service::{Cart, CartLocks},
        data_service::DataService,
    },
};

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
}

#[derive(Clone)]
pub struct AppState {
    pub data: Arc<DataService>,
    pub auth: AuthSettings,
    pub carts: Arc<CartLocks>,
}

impl AppState {
    pub fn new(data: Arc<DataService>, auth: AuthSettings) -> Self {
        Self {
            data,
            auth,
            carts: Arc::new(CartLocks::new()),
        }
    }

    pub fn from_config(config: &AppConfig, data: Arc<DataService>) -> Self {
        Self::new(
            data,
            AuthSettings {
                jwt_secret: config.jwt_secret.clone(),
                token_ttl_hours: config.token_ttl_hours,
            },
        )
    }

    pub fn storage(&self) -> Arc<dyn KeyValueStore> {
        self.data.storage()
    }

    /// Run `f` on the user's cart with the cart locked for the whole call.
    pub fn with_cart<T>(&self, user_id: i64, f: impl FnOnce(&mut Cart) -> T) -> T {
        self.carts.with_cart(self.storage(), user_id, f)
    }
}
