use std::path::PathBuf;

use basketwise_cli::commands::{mine, optimize, recommend, recover};
use basketwise_core::config::EngineConfig;
use basketwise_core::domain::{
    Cart, CartId, CartItem, CustomerId, Order, OrderId, OrderLine, Product, ProductId, Purchase,
};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use tempfile::TempDir;

fn write_json<T: Serialize>(dir: &TempDir, name: &str, value: &T) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, serde_json::to_string_pretty(value).expect("serialize fixture"))
        .expect("write fixture");
    path
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output must be JSON")
}

fn product(id: &str, category: &str, cents: i64) -> Product {
    Product {
        id: ProductId::new(id),
        name: id.to_string(),
        category: category.to_string(),
        brand: None,
        price: Decimal::new(cents, 2),
        tags: Vec::new(),
        color: None,
        size: None,
        stock: 20,
        volume_tiers: Vec::new(),
        flash_sale_ends_at: None,
    }
}

fn order(id: &str, customer: &str, products: &[&str]) -> Order {
    Order {
        id: OrderId(id.to_string()),
        customer_id: CustomerId::new(customer),
        lines: products
            .iter()
            .map(|product| OrderLine {
                product_id: ProductId::new(*product),
                quantity: 1,
                unit_price: Decimal::new(1500, 2),
            })
            .collect(),
        created_at: Utc::now() - Duration::days(3),
    }
}

fn purchase(customer: &str, product: &str) -> Purchase {
    Purchase {
        customer_id: CustomerId::new(customer),
        product_id: ProductId::new(product),
        rating: 1.0,
        purchased_at: Utc::now() - Duration::days(2),
    }
}

#[test]
fn mine_reports_positively_correlated_rules() {
    let dir = TempDir::new().expect("temp dir");
    // a and b always co-occur while c stands alone, so a<->b has lift 2.
    let orders_path = write_json(
        &dir,
        "orders.json",
        &vec![
            order("o1", "c1", &["a", "b"]),
            order("o2", "c2", &["a", "b"]),
            order("o3", "c3", &["c"]),
            order("o4", "c4", &["c"]),
        ],
    );
    let products_path = write_json(
        &dir,
        "products.json",
        &vec![product("a", "pantry", 1500), product("b", "pantry", 900), product("c", "misc", 500)],
    );

    let result =
        mine::run(&EngineConfig::default(), &orders_path, &products_path, Some(0.0), Some(0.0));
    assert_eq!(result.exit_code, 0, "mine failed: {}", result.output);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "mine");
    assert_eq!(payload["status"], "ok");
    assert_eq!(payload["data"]["orders"], 4);
    assert!(payload["data"]["rules"].as_u64().unwrap() > 0);
}

#[test]
fn mine_fails_cleanly_on_a_missing_fixture() {
    let dir = TempDir::new().expect("temp dir");
    let products_path = write_json(&dir, "products.json", &Vec::<Product>::new());

    let result = mine::run(
        &EngineConfig::default(),
        &dir.path().join("nope.json"),
        &products_path,
        None,
        None,
    );

    assert_ne!(result.exit_code, 0);
    let payload = parse_payload(&result.output);
    assert_eq!(payload["status"], "error");
    assert_eq!(payload["error_class"], "fixture");
}

#[test]
fn recommend_serves_popularity_from_purchase_fixtures() {
    let dir = TempDir::new().expect("temp dir");
    let purchases_path = write_json(
        &dir,
        "purchases.json",
        &vec![purchase("c1", "a"), purchase("c2", "a"), purchase("c2", "b")],
    );
    let products_path = write_json(
        &dir,
        "products.json",
        &vec![product("a", "pantry", 1500), product("b", "pantry", 900)],
    );

    let result = recommend::run(
        EngineConfig::default(),
        recommend::Args {
            purchases: purchases_path,
            products: products_path,
            events: None,
            strategy: "popularity".to_string(),
            customer: None,
            session: None,
            context: Vec::new(),
            max: 5,
        },
    );
    assert_eq!(result.exit_code, 0, "recommend failed: {}", result.output);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "recommend");
    let recommendations = payload["data"]["recommendations"].as_array().expect("array");
    assert!(!recommendations.is_empty());
    assert_eq!(recommendations[0]["product_id"], "a");
}

#[test]
fn recommend_rejects_an_unknown_strategy() {
    let dir = TempDir::new().expect("temp dir");
    let purchases_path = write_json(&dir, "purchases.json", &Vec::<Purchase>::new());
    let products_path = write_json(&dir, "products.json", &Vec::<Product>::new());

    let result = recommend::run(
        EngineConfig::default(),
        recommend::Args {
            purchases: purchases_path,
            products: products_path,
            events: None,
            strategy: "turbo".to_string(),
            customer: None,
            session: None,
            context: Vec::new(),
            max: 5,
        },
    );

    assert_eq!(result.exit_code, 2);
    let payload = parse_payload(&result.output);
    assert_eq!(payload["error_class"], "invalid_strategy");
}

#[test]
fn optimize_reports_free_shipping_for_a_qualified_cart() {
    let dir = TempDir::new().expect("temp dir");
    let cart = Cart::new(
        CartId::new("cart-1"),
        None,
        vec![CartItem {
            product_id: ProductId::new("a"),
            quantity: 1,
            unit_price: Decimal::new(8000, 2),
        }],
    );
    let cart_path = write_json(&dir, "cart.json", &cart);
    let products_path = write_json(&dir, "products.json", &vec![product("a", "pantry", 8000)]);

    let result = optimize::run(EngineConfig::default(), &cart_path, &products_path, None);
    assert_eq!(result.exit_code, 0, "optimize failed: {}", result.output);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "optimize");
    assert_eq!(payload["data"]["free_shipping"]["qualified"], true);
}

#[test]
fn recover_scores_an_abandoned_cart() {
    let dir = TempDir::new().expect("temp dir");
    let mut cart = Cart::new(
        CartId::new("cart-1"),
        None,
        vec![CartItem {
            product_id: ProductId::new("a"),
            quantity: 1,
            unit_price: Decimal::new(2000, 2),
        }],
    );
    cart.last_updated = Utc::now() - Duration::hours(2);
    let cart_path = write_json(&dir, "cart.json", &cart);
    let products_path = write_json(&dir, "products.json", &vec![product("a", "pantry", 2000)]);

    let result = recover::run(EngineConfig::default(), &cart_path, &products_path, "aggressive");
    assert_eq!(result.exit_code, 0, "recover failed: {}", result.output);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "recover");
    let probability =
        payload["data"]["estimated_recovery_probability"].as_f64().expect("probability");
    assert!(probability > 0.0 && probability <= 0.95);
}

#[test]
fn recover_rejects_an_unknown_strategy() {
    let dir = TempDir::new().expect("temp dir");
    let cart = Cart::new(CartId::new("cart-1"), None, Vec::new());
    let cart_path = write_json(&dir, "cart.json", &cart);
    let products_path = write_json(&dir, "products.json", &Vec::<Product>::new());

    let result = recover::run(EngineConfig::default(), &cart_path, &products_path, "pushy");

    assert_eq!(result.exit_code, 2);
    let payload = parse_payload(&result.output);
    assert_eq!(payload["error_class"], "invalid_strategy");
}
