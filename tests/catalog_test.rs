mod common;

use axum::http::{Method, StatusCode};
use common::{order_request, response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn category_names_are_unique() {
    let app = TestApp::new().await;

    let created = app
        .request(
            Method::POST,
            "/api/v1/categories",
            Some(json!({ "name": "Inks", "description": "Pigments" })),
        )
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let body = response_json(created).await;
    assert_eq!(body["data"]["name"], "Inks");
    assert_eq!(body["data"]["isActive"], true);

    let duplicate = app
        .request(
            Method::POST,
            "/api/v1/categories",
            Some(json!({ "name": "Inks" })),
        )
        .await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    let body = response_json(duplicate).await;
    assert_eq!(body["message"], "Category with name 'Inks' already exists.");

    let listed = app.request(Method::GET, "/api/v1/categories", None).await;
    assert_eq!(
        response_json(listed).await["data"].as_array().map(Vec::len),
        Some(1)
    );
}

#[tokio::test]
async fn products_carry_their_category() {
    let app = TestApp::new().await;
    let needles = app.seed_category("Needles").await;
    app.seed_category("Aftercare").await;

    let created = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "title": "Round Liner 5RL",
                "price": "24.99",
                "categoryId": needles,
                "stockAmount": 40
            })),
        )
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let body = response_json(created).await;
    let product_id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["category"]["name"], "Needles");
    assert_eq!(body["data"]["inStock"], true);

    app.seed_product("Loose Gloves", dec!(9.00), 0).await;

    let filtered = app
        .request(
            Method::GET,
            &format!("/api/v1/products?category_id={needles}"),
            None,
        )
        .await;
    let body = response_json(filtered).await;
    let products = body["data"].as_array().unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["id"], product_id);
    assert_eq!(products[0]["price"], "24.99");

    let all = app.request(Method::GET, "/api/v1/products", None).await;
    let body = response_json(all).await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["data"][1]["inStock"], false);
    assert!(body["data"][1]["category"].is_null());
}

#[tokio::test]
async fn unknown_category_is_not_found() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({ "title": "Orphan", "price": "1.00", "categoryId": 404 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = response_json(response).await;
    assert_eq!(body["message"], "Category with ID 404 not found.");
}

#[tokio::test]
async fn restocking_makes_a_sold_out_product_orderable() {
    let app = TestApp::new().await;
    let product = app.seed_product("Thermal Printer", dec!(199.00), 1).await;
    app.state
        .services
        .orders
        .create_order(order_request(&[(product.id, 1)], dec!(0)))
        .await
        .unwrap();
    assert!(!app.product(product.id).await.in_stock);

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/products/{}/stock", product.id),
            Some(json!({ "stockAmount": 4 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["stockAmount"], 4);
    assert_eq!(body["data"]["inStock"], true);
    assert!(body["data"]["updatedAt"].is_string());

    app.state
        .services
        .orders
        .create_order(order_request(&[(product.id, 2)], dec!(0)))
        .await
        .unwrap();
    assert_eq!(app.product(product.id).await.stock_amount, 2);
}

#[tokio::test]
async fn negative_stock_is_rejected() {
    let app = TestApp::new().await;
    let product = app.seed_product("Stencil Gel", dec!(14.00), 3).await;

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/products/{}/stock", product.id),
            Some(json!({ "stockAmount": -1 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.product(product.id).await.stock_amount, 3);
}
