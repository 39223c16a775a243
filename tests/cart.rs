use std::sync::Arc;

use storefront_api::{
    db::{KeyValueStore, MemoryStore, keys},
    dto::orders::CheckoutRequest,
    error::AppError,
    models::{CartItem, NewProduct, ProductPatch, Role},
    services::{
        auth_service::create_user,
        cart_service::{Cart, CartKeys, CartLocks},
        data_service::{Database, DataService},
        order_service::checkout_cart,
    },
};

fn item(id: i64, price: i64) -> CartItem {
    CartItem {
        id,
        name: format!("item {id}"),
        price,
        image: None,
        category: None,
        variant: None,
        quantity: 1,
    }
}

fn local_cart(store: &Arc<MemoryStore>) -> Cart {
    Cart::load(store.clone(), CartKeys::local())
}

#[tokio::test]
async fn adding_the_same_id_merges_quantities() {
    let store = Arc::new(MemoryStore::new());
    let mut cart = local_cart(&store);

    cart.add_to_cart(item(1, 10_000), 2);
    cart.add_to_cart(item(1, 10_000), 3);
    cart.add_to_cart(item(2, 5_000), 1);

    assert_eq!(cart.items().len(), 2);
    assert_eq!(cart.items()[0].quantity, 5);
    assert_eq!(cart.total(), 55_000);
    assert_eq!(cart.item_count(), 6);
}

#[tokio::test]
async fn zero_quantity_add_is_ignored() {
    let store = Arc::new(MemoryStore::new());
    let mut cart = local_cart(&store);

    cart.add_to_cart(item(1, 10_000), 0);
    assert!(cart.is_empty());
    assert!(!store.contains(keys::CART));
}

#[tokio::test]
async fn update_quantity_to_zero_removes_the_line() {
    let store = Arc::new(MemoryStore::new());
    let mut cart = local_cart(&store);
    cart.add_to_cart(item(1, 10_000), 2);
    cart.add_to_cart(item(2, 5_000), 1);

    cart.update_quantity(1, 4);
    assert_eq!(cart.items()[0].quantity, 4);

    cart.update_quantity(1, 0);
    assert_eq!(cart.items().iter().map(|i| i.id).collect::<Vec<_>>(), [2]);

    cart.update_quantity(2, -3);
    assert!(cart.is_empty());
}

#[tokio::test]
async fn save_for_later_and_move_back() {
    let store = Arc::new(MemoryStore::new());
    let mut cart = local_cart(&store);
    cart.add_to_cart(item(1, 10_000), 3);

    assert!(cart.save_for_later(1));
    assert!(cart.is_empty());
    assert_eq!(cart.saved_items().len(), 1);
    assert_eq!(cart.saved_items()[0].quantity, 1);
    assert!(!cart.save_for_later(1));

    assert!(cart.move_to_cart(1));
    assert!(cart.saved_items().is_empty());
    assert_eq!(cart.items()[0].quantity, 1);
    assert!(!cart.move_to_cart(1));
}

#[tokio::test]
async fn saving_twice_keeps_one_saved_entry() {
    let store = Arc::new(MemoryStore::new());
    let mut cart = local_cart(&store);

    cart.add_to_cart(item(1, 10_000), 1);
    cart.save_for_later(1);
    cart.add_to_cart(item(1, 10_000), 1);
    cart.save_for_later(1);

    assert_eq!(cart.saved_items().len(), 1);
    assert!(cart.remove_from_saved(1));
    assert!(!cart.remove_from_saved(1));
}

#[tokio::test]
async fn cart_and_saved_lists_persist_separately() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    {
        let mut cart = local_cart(&store);
        cart.add_to_cart(item(1, 10_000), 2);
        cart.add_to_cart(item(2, 5_000), 1);
        cart.save_for_later(2);
    }

    let reloaded = local_cart(&store);
    assert_eq!(reloaded.items().len(), 1);
    assert_eq!(reloaded.items()[0].quantity, 2);
    assert_eq!(reloaded.saved_items().len(), 1);

    let raw = store.get(keys::SAVED_ITEMS)?.expect("saved list written");
    let saved: Vec<CartItem> = serde_json::from_str(&raw)?;
    assert_eq!(saved[0].id, 2);
    Ok(())
}

#[tokio::test]
async fn user_carts_do_not_share_storage() {
    let store = Arc::new(MemoryStore::new());
    let mut first = Cart::load(store.clone(), CartKeys::for_user(1));
    first.add_to_cart(item(1, 10_000), 1);

    let second = Cart::load(store.clone(), CartKeys::for_user(2));
    assert!(second.is_empty());
    assert!(store.contains("cart.1"));
}

#[tokio::test]
async fn corrupt_cart_list_loads_empty() {
    let store = Arc::new(MemoryStore::new().with_entry(keys::CART, "[{"));
    assert!(local_cart(&store).is_empty());
}

#[tokio::test]
async fn prices_stay_frozen_after_product_edits() {
    let store = Arc::new(MemoryStore::new());
    let data = DataService::with_database(store.clone(), Database::default());
    let product = data.add_product(NewProduct {
        price: 10_000,
        stock_quantity: 5,
        ..NewProduct::named("Ragi")
    });

    let mut cart = local_cart(&store);
    cart.add_product(&product, 1);
    data.update_product(
        product.id,
        ProductPatch {
            price: Some(20_000),
            ..ProductPatch::default()
        },
    );
    cart.add_product(&data.get_product(product.id).expect("product exists"), 1);

    assert_eq!(cart.items()[0].price, 10_000);
    assert_eq!(cart.total(), 20_000);
}

#[tokio::test]
async fn checkout_turns_the_cart_into_an_order() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    let data = DataService::with_database(store.clone(), Database::default());
    let user = create_user(&data, "Nila", "nila@example.com", "pw", Role::Customer)?;
    let product = data.add_product(NewProduct {
        price: 80_000,
        stock_quantity: 5,
        ..NewProduct::named("Cold Pressed Oil")
    });

    let mut cart = Cart::load(store.clone(), CartKeys::for_user(user.id));
    cart.add_product(&product, 2);

    let order = checkout_cart(
        &data,
        &mut cart,
        user.id,
        CheckoutRequest {
            coupon_code: Some("flat10".into()),
            ..CheckoutRequest::default()
        },
    )?;

    assert_eq!(order.subtotal, 160_000);
    assert_eq!(order.shipping, 0);
    assert_eq!(order.discount, 16_000);
    assert_eq!(order.total, 144_000);
    assert_eq!(order.coupon_code.as_deref(), Some("FLAT10"));
    assert!(cart.is_empty());
    assert_eq!(data.get_product(product.id).map(|p| p.stock_quantity), Some(3));

    let again = checkout_cart(&data, &mut cart, user.id, CheckoutRequest::default());
    assert!(again.is_err());
    Ok(())
}

#[tokio::test]
async fn rejected_checkout_keeps_the_cart() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    let data = DataService::with_database(store.clone(), Database::default());
    let product = data.add_product(NewProduct {
        price: 10_000,
        stock_quantity: 1,
        ..NewProduct::named("Honey")
    });

    let mut cart = local_cart(&store);
    cart.add_product(&product, 2);

    assert!(checkout_cart(&data, &mut cart, 1, CheckoutRequest::default()).is_err());
    assert_eq!(cart.item_count(), 2);
    assert!(data.get_orders().is_empty());
    Ok(())
}

#[tokio::test]
async fn stale_cart_handle_cannot_check_out_twice() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    let data = DataService::with_database(store.clone(), Database::default());
    let user = create_user(&data, "Ravi", "ravi@example.com", "pw", Role::Customer)?;
    let product = data.add_product(NewProduct {
        price: 10_000,
        stock_quantity: 10,
        ..NewProduct::named("Millet")
    });
    Cart::load(store.clone(), CartKeys::for_user(user.id)).add_product(&product, 3);

    let mut first = Cart::load(store.clone(), CartKeys::for_user(user.id));
    let mut second = Cart::load(store.clone(), CartKeys::for_user(user.id));

    checkout_cart(&data, &mut first, user.id, CheckoutRequest::default())?;
    let again = checkout_cart(&data, &mut second, user.id, CheckoutRequest::default());

    assert!(
        matches!(&again, Err(AppError::BadRequest(msg)) if msg == "Cart is empty"),
        "{again:?}"
    );
    assert_eq!(data.get_orders().len(), 1);
    assert_eq!(data.get_product(product.id).map(|p| p.stock_quantity), Some(7));
    Ok(())
}

#[tokio::test]
async fn locked_cart_changes_from_many_threads_all_land() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let locks = CartLocks::new();

    std::thread::scope(|scope| {
        for worker in 0..4_i64 {
            let (store, locks) = (&store, &locks);
            scope.spawn(move || {
                for n in 0..20 {
                    locks.with_cart(store.clone(), 7, |cart| {
                        cart.add_to_cart(item(worker * 100 + n, 1_000), 1);
                    });
                }
            });
        }
    });

    let cart = Cart::load(store, CartKeys::for_user(7));
    assert_eq!(cart.items().len(), 80);
    assert_eq!(cart.total(), 80_000);
}

#[tokio::test]
async fn locked_checkouts_from_many_threads_place_one_order() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    let data = DataService::with_database(store.clone(), Database::default());
    let user = create_user(&data, "Leela", "leela@example.com", "pw", Role::Customer)?;
    let product = data.add_product(NewProduct {
        price: 10_000,
        stock_quantity: 10,
        ..NewProduct::named("Turmeric")
    });
    Cart::load(store.clone(), CartKeys::for_user(user.id)).add_product(&product, 3);

    let locks = CartLocks::new();
    let storage: Arc<dyn KeyValueStore> = store.clone();
    let placed = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    locks.with_cart(storage.clone(), user.id, |cart| {
                        checkout_cart(&data, cart, user.id, CheckoutRequest::default()).is_ok()
                    })
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or(false))
            .filter(|ok| *ok)
            .count()
    });

    assert_eq!(placed, 1);
    assert_eq!(data.get_orders().len(), 1);
    assert_eq!(data.get_product(product.id).map(|p| p.stock_quantity), Some(7));
    Ok(())
}

#[tokio::test]
async fn huge_prices_do_not_overflow_totals() {
    let store = Arc::new(MemoryStore::new());
    let mut cart = local_cart(&store);

    cart.add_to_cart(item(1, i64::MAX / 2), 3);
    cart.add_to_cart(item(2, i64::MAX), 1);

    assert_eq!(cart.items()[0].line_total(), i64::MAX);
    assert_eq!(cart.total(), i64::MAX);
}
