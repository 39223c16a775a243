use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use storefront_api::{
    db::MemoryStore,
    models::Role,
    routes::create_app,
    services::{
        auth_service::create_user,
        data_service::{Database, DataService},
    },
    state::{AppState, AuthSettings},
};
use tower::ServiceExt;

#[derive(Clone)]
struct TestApp {
    router: Router,
    data: Arc<DataService>,
}

impl TestApp {
    fn new() -> Self {
        let data = Arc::new(DataService::with_database(
            Arc::new(MemoryStore::new()),
            Database::bundled(),
        ));
        let state = AppState::new(
            data.clone(),
            AuthSettings {
                jwt_secret: "test-secret".into(),
                token_ttl_hours: 1,
            },
        );
        Self {
            router: create_app(state),
            data,
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> anyhow::Result<(StatusCode, Value)> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, token);
        }
        let body = match body {
            Some(value) => Body::from(serde_json::to_vec(&value)?),
            None => Body::empty(),
        };

        let response = self.router.clone().oneshot(builder.body(body)?).await?;
        let status = response.status();
        let bytes = response.into_body().collect().await?.to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, json))
    }

    async fn login(&self, email: &str, password: &str) -> anyhow::Result<String> {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": email, "password": password })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        Ok(body["data"]["token"].as_str().unwrap_or_default().to_string())
    }
}

#[tokio::test]
async fn register_then_login() -> anyhow::Result<()> {
    let app = TestApp::new();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "name": "Anu", "email": "anu@example.com", "password": "pw123" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "anu@example.com");
    assert_eq!(body["data"]["role"], "customer");
    assert!(body["data"].get("passwordHash").is_none());

    let (status, _) = app
        .send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "name": "Anu", "email": "anu@example.com", "password": "other" })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "anu@example.com", "password": "wrong" })),
        )
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = app.login("anu@example.com", "pw123").await?;
    assert!(token.starts_with("Bearer "));

    let (status, body) = app.send(Method::GET, "/api/auth/me", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Anu");
    Ok(())
}

#[tokio::test]
async fn protected_routes_need_a_token() -> anyhow::Result<()> {
    let app = TestApp::new();

    let (status, _) = app.send(Method::GET, "/api/cart", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(Method::GET, "/api/cart", Some("Bearer not-a-jwt"), None)
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.send(Method::GET, "/api/cart", Some("Basic abc"), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn catalogue_is_public_and_filterable() -> anyhow::Result<()> {
    let app = TestApp::new();

    let (status, body) = app
        .send(
            Method::GET,
            "/api/products?in_stock=true&sort_by=price&sort_order=desc&per_page=2",
            None,
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    let items = body["data"].as_array().cloned().unwrap_or_default();
    assert_eq!(items.len(), 2);
    assert!(items[0]["price"].as_i64() >= items[1]["price"].as_i64());
    assert!(items.iter().all(|p| p["inStock"] == true));
    assert_eq!(body["meta"]["per_page"], 2);

    let (status, body) = app
        .send(Method::GET, "/api/products?category=millet-items", None, None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(
        body["data"]
            .as_array()
            .is_some_and(|items| items.iter().all(|p| p["category"] == "millet-items"))
    );

    let (status, _) = app.send(Method::GET, "/api/products/999", None, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.send(Method::GET, "/api/categories", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(12));
    Ok(())
}

#[tokio::test]
async fn cart_to_checkout_flow() -> anyhow::Result<()> {
    let app = TestApp::new();
    create_user(&app.data, "Devi", "devi@example.com", "pw123", Role::Customer)?;
    let token = app.login("devi@example.com", "pw123").await?;
    let stock_before = app.data.get_product(1).map(|p| p.stock_quantity).unwrap_or_default();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/cart",
            Some(&token),
            Some(json!({ "product_id": 1, "quantity": 2 })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["itemCount"], 2);

    // Out of stock products cannot be added.
    let (status, _) = app
        .send(
            Method::POST,
            "/api/cart",
            Some(&token),
            Some(json!({ "product_id": 4, "quantity": 1 })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send(Method::POST, "/api/cart/quote", Some(&token), Some(json!({})))
        .await?;
    assert_eq!(status, StatusCode::OK);
    let subtotal = body["data"]["quote"]["subtotal"].as_i64().unwrap_or_default();
    let total = body["data"]["quote"]["total"].as_i64().unwrap_or_default();
    assert_eq!(subtotal, 2 * 18_900);
    assert_eq!(total, subtotal + 4_900);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/orders/checkout",
            Some(&token),
            Some(json!({ "payment_method": "upi" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["total"], total);
    let order_id = body["data"]["id"].as_i64().unwrap_or_default();

    let (_, body) = app.send(Method::GET, "/api/cart", Some(&token), None).await?;
    assert_eq!(body["data"]["items"].as_array().map(Vec::len), Some(0));

    let (status, body) = app.send(Method::GET, "/api/orders", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["id"], order_id);

    let (status, _) = app
        .send(Method::GET, &format!("/api/orders/{order_id}"), Some(&token), None)
        .await?;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(
        app.data.get_product(1).map(|p| p.stock_quantity),
        Some(stock_before - 2)
    );

    let (status, _) = app
        .send(Method::POST, "/api/orders/checkout", Some(&token), Some(json!({})))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn orders_are_private_to_their_owner() -> anyhow::Result<()> {
    let app = TestApp::new();
    create_user(&app.data, "A", "a@example.com", "pw", Role::Customer)?;
    create_user(&app.data, "B", "b@example.com", "pw", Role::Customer)?;
    let a = app.login("a@example.com", "pw").await?;
    let b = app.login("b@example.com", "pw").await?;

    app.send(
        Method::POST,
        "/api/cart",
        Some(&a),
        Some(json!({ "product_id": 2, "quantity": 1 })),
    )
    .await?;
    let (_, body) = app
        .send(Method::POST, "/api/orders/checkout", Some(&a), Some(json!({})))
        .await?;
    let order_id = body["data"]["id"].as_i64().unwrap_or_default();

    let (status, _) = app
        .send(Method::GET, &format!("/api/orders/{order_id}"), Some(&b), None)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn admin_routes_check_the_stored_role() -> anyhow::Result<()> {
    let app = TestApp::new();
    let customer = create_user(&app.data, "Cust", "cust@example.com", "pw", Role::Customer)?;
    create_user(&app.data, "Admin", "admin@example.com", "pw", Role::Admin)?;
    let customer_token = app.login("cust@example.com", "pw").await?;
    let admin_token = app.login("admin@example.com", "pw").await?;

    let (status, _) = app
        .send(Method::GET, "/api/admin/dashboard", Some(&customer_token), None)
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(Method::GET, "/api/admin/dashboard", Some(&admin_token), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_customers"], 1);
    assert_eq!(
        body["data"]["total_products"].as_u64(),
        Some(app.data.get_products().len() as u64)
    );

    let (status, body) = app
        .send(
            Method::POST,
            "/api/admin/products",
            Some(&admin_token),
            Some(json!({ "name": "Foxtail Millet", "price": 15900, "stockQuantity": 4, "category": "millet-items" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    let product_id = body["data"]["id"].as_i64().unwrap_or_default();
    assert_eq!(body["data"]["inStock"], true);

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/admin/products/{product_id}/restock"),
            Some(&admin_token),
            Some(json!({ "amount": 6 })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["stockQuantity"], 10);

    let (status, body) = app
        .send(
            Method::PATCH,
            "/api/admin/settings",
            Some(&admin_token),
            Some(json!({ "storeName": "Renamed" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["storeName"], "Renamed");
    assert_eq!(body["data"]["currency"], "INR");

    // Promotion takes effect on the next request with the same token.
    let (status, _) = app
        .send(
            Method::PATCH,
            &format!("/api/admin/users/{}", customer.id),
            Some(&admin_token),
            Some(json!({ "role": "admin" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .send(Method::GET, "/api/admin/users", Some(&customer_token), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn admin_can_move_an_order_along() -> anyhow::Result<()> {
    let app = TestApp::new();
    create_user(&app.data, "Cust", "cust@example.com", "pw", Role::Customer)?;
    create_user(&app.data, "Admin", "admin@example.com", "pw", Role::Admin)?;
    let customer = app.login("cust@example.com", "pw").await?;
    let admin = app.login("admin@example.com", "pw").await?;

    app.send(
        Method::POST,
        "/api/cart",
        Some(&customer),
        Some(json!({ "product_id": 5, "quantity": 1 })),
    )
    .await?;
    let (_, body) = app
        .send(Method::POST, "/api/orders/checkout", Some(&customer), Some(json!({})))
        .await?;
    let order_id = body["data"]["id"].as_i64().unwrap_or_default();

    let (status, body) = app
        .send(
            Method::PATCH,
            &format!("/api/admin/orders/{order_id}/status"),
            Some(&admin),
            Some(json!({ "status": "shipped" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "shipped");

    let (status, body) = app
        .send(Method::GET, "/api/admin/orders?status=shipped", Some(&admin), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn wishlist_round_trip() -> anyhow::Result<()> {
    let app = TestApp::new();
    create_user(&app.data, "W", "w@example.com", "pw", Role::Customer)?;
    let token = app.login("w@example.com", "pw").await?;

    for product_id in [1, 3, 1] {
        let (status, _) = app
            .send(
                Method::POST,
                "/api/wishlist",
                Some(&token),
                Some(json!({ "product_id": product_id })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = app.send(Method::GET, "/api/wishlist", Some(&token), None).await?;
    let ids: Vec<i64> = body["data"]
        .as_array()
        .map(|items| items.iter().filter_map(|p| p["id"].as_i64()).collect())
        .unwrap_or_default();
    assert_eq!(ids, [3, 1]);

    let (status, _) = app.send(Method::DELETE, "/api/wishlist/3", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.send(Method::DELETE, "/api/wishlist/3", Some(&token), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn unknown_paths_get_a_json_404() -> anyhow::Result<()> {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/nope", None, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["data"]["path"], "/nope");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cart_adds_all_land() -> anyhow::Result<()> {
    let app = TestApp::new();
    create_user(&app.data, "Kavi", "kavi@example.com", "pw", Role::Customer)?;
    let token = app.login("kavi@example.com", "pw").await?;

    for _ in 0..10 {
        let tasks: Vec<_> = [1, 2, 3, 5, 6]
            .into_iter()
            .map(|product_id| {
                let (app, token) = (app.clone(), token.clone());
                tokio::spawn(async move {
                    app.send(
                        Method::POST,
                        "/api/cart",
                        Some(&token),
                        Some(json!({ "product_id": product_id, "quantity": 1 })),
                    )
                    .await
                })
            })
            .collect();
        for task in tasks {
            let (status, _) = task.await??;
            assert_eq!(status, StatusCode::OK);
        }

        let (_, body) = app.send(Method::GET, "/api/cart", Some(&token), None).await?;
        assert_eq!(body["data"]["items"].as_array().map(Vec::len), Some(5));
        let (status, _) = app.send(Method::DELETE, "/api/cart", Some(&token), None).await?;
        assert_eq!(status, StatusCode::OK);
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checkouts_place_one_order() -> anyhow::Result<()> {
    let app = TestApp::new();
    let user = create_user(&app.data, "Uma", "uma@example.com", "pw", Role::Customer)?;
    let token = app.login("uma@example.com", "pw").await?;
    let stock_before = app.data.get_product(1).map(|p| p.stock_quantity).unwrap_or_default();

    let (status, _) = app
        .send(
            Method::POST,
            "/api/cart",
            Some(&token),
            Some(json!({ "product_id": 1, "quantity": 3 })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let (app, token) = (app.clone(), token.clone());
            tokio::spawn(async move {
                app.send(Method::POST, "/api/orders/checkout", Some(&token), Some(json!({})))
                    .await
            })
        })
        .collect();
    let mut placed = 0;
    for task in tasks {
        let (status, body) = task.await??;
        match status {
            StatusCode::OK => placed += 1,
            StatusCode::BAD_REQUEST => assert_eq!(body["message"], "Bad Request Cart is empty"),
            other => panic!("unexpected status {other}: {body}"),
        }
    }

    assert_eq!(placed, 1);
    assert_eq!(app.data.get_user_orders(user.id).len(), 1);
    assert_eq!(
        app.data.get_product(1).map(|p| p.stock_quantity),
        Some(stock_before - 3)
    );
    Ok(())
}

#[tokio::test]
async fn huge_page_numbers_return_an_empty_page() -> anyhow::Result<()> {
    let app = TestApp::new();
    create_user(&app.data, "Pari", "pari@example.com", "pw", Role::Customer)?;
    let token = app.login("pari@example.com", "pw").await?;

    let (status, body) = app
        .send(
            Method::GET,
            "/api/products?page=9223372036854775807&per_page=100",
            None,
            None,
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(0));
    assert_eq!(body["meta"]["page"], i64::MAX);

    for uri in [
        "/api/orders?page=9223372036854775807",
        "/api/wishlist?page=9223372036854775807",
    ] {
        let (status, _) = app.send(Method::GET, uri, Some(&token), None).await?;
        assert_eq!(status, StatusCode::OK, "{uri}");
    }
    Ok(())
}

#[tokio::test]
async fn logout_invalidates_issued_tokens() -> anyhow::Result<()> {
    let app = TestApp::new();
    create_user(&app.data, "Sita", "sita@example.com", "pw", Role::Customer)?;
    let token = app.login("sita@example.com", "pw").await?;

    let (status, _) = app.send(Method::POST, "/api/auth/logout", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.send(Method::GET, "/api/auth/me", Some(&token), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.send(Method::POST, "/api/auth/logout", Some(&token), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let fresh = app.login("sita@example.com", "pw").await?;
    let (status, _) = app.send(Method::GET, "/api/auth/me", Some(&fresh), None).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn password_change_invalidates_old_tokens() -> anyhow::Result<()> {
    let app = TestApp::new();
    create_user(&app.data, "Hari", "hari@example.com", "old-pw", Role::Customer)?;
    let token = app.login("hari@example.com", "old-pw").await?;

    let (status, _) = app
        .send(
            Method::POST,
            "/api/auth/me/password",
            Some(&token),
            Some(json!({ "current_password": "old-pw", "new_password": "new-pw" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.send(Method::GET, "/api/cart", Some(&token), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let fresh = app.login("hari@example.com", "new-pw").await?;
    let (status, _) = app.send(Method::GET, "/api/cart", Some(&fresh), None).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}
