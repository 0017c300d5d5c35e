mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::*;
use rust_decimal_macros::dec;
use serde_json::json;
use shopfront_catalog::{Coupon, Product, ProductRepository};
use uuid::Uuid;

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new();
    let res = send(&app.router, get("/health", None)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "healthy");
}

#[tokio::test]
async fn test_orders_require_authentication() {
    let app = TestApp::new();

    let res = send(&app.router, post_json("/orders", None, &json!({}))).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert!(res.body["error"].is_string());

    let res = send(&app.router, get("/orders", Some("not-a-jwt"))).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_place_order_with_coupon() {
    let app = TestApp::new();
    let lamp = app
        .store
        .insert_product(Product::new("Desk Lamp", dec!(20.00), 5).with_discount(dec!(15.00)))
        .await;
    let bulb = app.store.insert_product(Product::new("Bulb", dec!(9.99), 5)).await;
    let coupon = app
        .store
        .insert_coupon(Coupon::new("SAVE10", dec!(10), Utc::now() + Duration::days(3)).unwrap())
        .await;

    let body = json!({
        "items": [
            {"productId": lamp, "quantity": 2},
            {"productId": bulb, "quantity": 1}
        ],
        "shippingAddress": address(),
        "couponId": coupon
    });
    let res = send(&app.router, post_json("/orders", Some(&token("alice")), &body)).await;

    assert_eq!(res.status, StatusCode::CREATED, "{}", res.text);
    assert_eq!(decimal(&res.body["totalAmount"]), dec!(35.99));
    assert_eq!(res.body["totalAmount"], "35.99");
    assert_eq!(res.body["paymentStatus"], "pending");
    assert!(res.body["orderId"].as_str().unwrap().parse::<Uuid>().is_ok());

    let lamp_after = app.store.get_product(lamp).await.unwrap().unwrap();
    assert_eq!(lamp_after.stock, 3);

    let listed = send(&app.router, get("/orders", Some(&token("alice")))).await;
    assert_eq!(listed.status, StatusCode::OK);
    let orders = listed.body.as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["status"], "pending");
    assert_eq!(orders[0]["items"][0]["price"], "15.00");
    assert_eq!(orders[0]["shippingAddress"]["postalCode"], "49007");

    let others = send(&app.router, get("/orders", Some(&token("bob")))).await;
    assert_eq!(others.body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_exact_stock_marks_product_out_of_stock() {
    let app = TestApp::new();
    let chair = app.store.insert_product(Product::new("Chair", dec!(45.00), 3)).await;

    let body = json!({"items": [{"productId": chair, "quantity": 3}], "shippingAddress": address()});
    let res = send(&app.router, post_json("/orders", Some(&token("alice")), &body)).await;
    assert_eq!(res.status, StatusCode::CREATED);

    let product = app.store.get_product(chair).await.unwrap().unwrap();
    assert_eq!(product.stock, 0);
    assert!(!product.in_stock);
}

#[tokio::test]
async fn test_out_of_stock_is_rejected_without_side_effects() {
    let app = TestApp::new();
    let chair = app.store.insert_product(Product::new("Chair", dec!(45.00), 2)).await;

    let body = json!({"items": [{"productId": chair, "quantity": 3}], "shippingAddress": address()});
    let res = send(&app.router, post_json("/orders", Some(&token("alice")), &body)).await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.body["error"].as_str().unwrap().contains("out of stock"));
    assert_eq!(app.store.get_product(chair).await.unwrap().unwrap().stock, 2);
    assert_eq!(app.store.order_count().await, 0);
}

#[tokio::test]
async fn test_expired_coupon_is_rejected() {
    let app = TestApp::new();
    let chair = app.store.insert_product(Product::new("Chair", dec!(45.00), 2)).await;
    let mut coupon = Coupon::new("SUMMER", dec!(20), Utc::now() + Duration::days(1)).unwrap();
    coupon.expiry_date = Utc::now() - Duration::hours(1);
    let coupon = app.store.insert_coupon(coupon).await;

    let body = json!({
        "items": [{"productId": chair, "quantity": 1}],
        "shippingAddress": address(),
        "couponId": coupon
    });
    let res = send(&app.router, post_json("/orders", Some(&token("alice")), &body)).await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(res.body["error"].as_str().unwrap().contains("expired"));
    assert_eq!(app.store.order_count().await, 0);
    assert_eq!(app.store.get_product(chair).await.unwrap().unwrap().stock, 2);
}

#[tokio::test]
async fn test_invalid_payloads() {
    let app = TestApp::new();
    let chair = app.store.insert_product(Product::new("Chair", dec!(45.00), 2)).await;
    let bearer = token("alice");

    let cases = [
        json!({"items": [], "shippingAddress": address()}),
        json!({"items": [{"productId": chair, "quantity": 0}], "shippingAddress": address()}),
        json!({"items": [{"productId": chair, "quantity": 1}]}),
        json!({"items": [{"productId": chair, "quantity": 1}], "shippingAddress": {"street": "x", "city": "y"}}),
        json!({"items": [{"productId": "not-a-uuid", "quantity": 1}], "shippingAddress": address()}),
        json!({"items": [{"productId": chair, "quantity": 1}], "shippingAddress": address(), "paymentMethod": "barter"}),
    ];

    for body in cases {
        let res = send(&app.router, post_json("/orders", Some(&bearer), &body)).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST, "payload {} gave {}", body, res.text);
        assert!(res.body["error"].is_string());
    }

    let res = send(&app.router, post_json("/orders", Some(&bearer), &json!({
        "items": [{"productId": Uuid::new_v4(), "quantity": 1}],
        "shippingAddress": address()
    })))
    .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    assert_eq!(app.store.get_product(chair).await.unwrap().unwrap().stock, 2);
}

#[tokio::test]
async fn test_concurrent_orders_for_last_unit() {
    let app = TestApp::new();
    let last = app.store.insert_product(Product::new("Signed Print", dec!(250.00), 1)).await;
    let body = json!({"items": [{"productId": last, "quantity": 1}], "shippingAddress": address()});

    let first = {
        let router = app.router.clone();
        let body = body.clone();
        tokio::spawn(async move { send(&router, post_json("/orders", Some(&token("alice")), &body)).await })
    };
    let second = {
        let router = app.router.clone();
        let body = body.clone();
        tokio::spawn(async move { send(&router, post_json("/orders", Some(&token("bob")), &body)).await })
    };

    let mut statuses = vec![first.await.unwrap().status, second.await.unwrap().status];
    statuses.sort();

    assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::BAD_REQUEST]);
    let product = app.store.get_product(last).await.unwrap().unwrap();
    assert_eq!(product.stock, 0);
    assert!(!product.in_stock);
    assert_eq!(app.store.order_count().await, 1);
}

#[tokio::test]
async fn test_metrics_count_orders() {
    let app = TestApp::new();
    let chair = app.store.insert_product(Product::new("Chair", dec!(45.00), 1)).await;
    let body = json!({"items": [{"productId": chair, "quantity": 1}], "shippingAddress": address()});

    send(&app.router, post_json("/orders", Some(&token("alice")), &body)).await;
    send(&app.router, post_json("/orders", Some(&token("alice")), &body)).await;

    let res = send(&app.router, get("/metrics", None)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.text.contains("shopfront_orders_placed_total 1"));
    assert!(res.text.contains("shopfront_order_failures_total{reason=\"out_of_stock\"} 1"));
}
