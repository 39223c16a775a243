use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        admin::{DashboardStats, UserList},
        auth::{ChangePasswordRequest, LoginRequest, LoginResponse, RegisterRequest},
        cart::{AddToCartRequest, CartView, UpdateQuantityRequest},
        orders::{CheckoutQuote, CheckoutRequest, OrderList, QuoteRequest, UpdateOrderStatusRequest},
        products::{ProductList, RestockRequest},
        wishlist::{AddWishlistRequest, WishlistProductList},
    },
    models::{
        Address, CartItem, Category, NewProduct, Order, OrderLine, OrderStatus, Product,
        ProductPatch, Role, UserPatch, UserProfile, Variant,
    },
    response::{ApiResponse, Meta},
    routes::{
        admin, auth, cart, health, orders, params, products as product_routes, wishlist,
    },
    services::pricing::Quote,
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::logout,
        auth::me,
        auth::update_me,
        auth::change_password,
        product_routes::list_products,
        product_routes::get_product,
        product_routes::list_categories,
        cart::cart_view,
        cart::add_to_cart,
        cart::update_quantity,
        cart::remove_from_cart,
        cart::clear_cart,
        cart::save_for_later,
        cart::move_to_cart,
        cart::remove_from_saved,
        cart::quote,
        orders::list_order,
        orders::checkout,
        orders::get_order,
        wishlist::list_wishlist,
        wishlist::add_to_wishlist,
        wishlist::remove_from_wishlist,
        admin::dashboard,
        admin::create_product,
        admin::update_product,
        admin::delete_product,
        admin::restock_product,
        admin::list_low_stock,
        admin::list_users,
        admin::update_user,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::get_settings,
        admin::update_settings
    ),
    components(
        schemas(
            Product,
            Variant,
            NewProduct,
            ProductPatch,
            Category,
            Role,
            Address,
            UserProfile,
            UserPatch,
            Order,
            OrderLine,
            OrderStatus,
            CartItem,
            Quote,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            ChangePasswordRequest,
            auth::UpdateProfileRequest,
            AddToCartRequest,
            UpdateQuantityRequest,
            CartView,
            CheckoutRequest,
            CheckoutQuote,
            QuoteRequest,
            UpdateOrderStatusRequest,
            OrderList,
            ProductList,
            RestockRequest,
            AddWishlistRequest,
            WishlistProductList,
            DashboardStats,
            UserList,
            params::Pagination,
            params::SortOrder,
            params::ProductSortBy,
            params::ProductQuery,
            params::OrderListQuery,
            params::LowStockQuery,
            health::HealthData,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<Order>,
            ApiResponse<OrderList>,
            ApiResponse<CartView>,
            ApiResponse<UserProfile>,
            ApiResponse<LoginResponse>,
            ApiResponse<DashboardStats>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration, login and profile endpoints"),
        (name = "Products", description = "Catalogue endpoints"),
        (name = "Cart", description = "Cart and saved-for-later endpoints"),
        (name = "Orders", description = "Checkout and order history endpoints"),
        (name = "Wishlist", description = "Wishlist endpoints"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
