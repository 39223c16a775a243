use std::sync::Arc;

use storefront_api::{
    config::AppConfig,
    db::FileStore,
    models::{NewProduct, Role, UserPatch},
    services::{auth_service::create_user, data_service::DataService},
};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let storage = FileStore::open(&config.data_dir)?;
    let data = DataService::open(Arc::new(storage));

    let admin_id = ensure_user(&data, "Store Admin", "admin@example.com", "admin123", Role::Admin)?;
    let user_id = ensure_user(&data, "Demo Customer", "user@example.com", "user123", Role::Customer)?;
    seed_products(&data);

    data.flush()?;
    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

fn ensure_user(
    data: &DataService,
    name: &str,
    email: &str,
    password: &str,
    role: Role,
) -> anyhow::Result<i64> {
    // Existing accounts keep their password; only the role is enforced.
    let user_id = match data.get_user_by_email(email) {
        Some(existing) => {
            data.update_user(
                existing.id,
                UserPatch {
                    role: Some(role),
                    ..UserPatch::default()
                },
            );
            existing.id
        }
        None => create_user(data, name, email, password, role)?.id,
    };

    println!("Ensured user {email} (role={role:?})");
    Ok(user_id)
}

fn seed_products(data: &DataService) {
    let products = [
        ("Kodo Millet 1kg", "millet-items", "Unpolished kodo millet", 18_900, 40),
        ("Moringa Leaf Powder 200g", "herbal-powders", "Shade dried moringa leaves", 24_900, 25),
        ("Organic Jaggery Powder 500g", "sugars-honey", "Chemical free cane jaggery", 9_900, 8),
    ];

    let existing: Vec<String> = data.get_products().into_iter().map(|p| p.name).collect();
    for (name, category, description, price, stock) in products {
        if existing.iter().any(|n| n == name) {
            continue;
        }
        data.add_product(NewProduct {
            description: Some(description.to_string()),
            category: category.to_string(),
            price,
            stock_quantity: stock,
            ..NewProduct::named(name)
        });
    }

    println!("Seeded products");
}
