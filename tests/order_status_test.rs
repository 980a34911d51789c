mod common;

use assert_matches::assert_matches;
use atsyn_api::{
    entities::order::OrderStatus,
    errors::ServiceError,
    services::{order_projection::OrderResponse, order_status::UpdateOrderStatusRequest},
};
use axum::http::{Method, StatusCode};
use common::{order_request, response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

async fn pending_order(app: &TestApp) -> OrderResponse {
    let product = app.seed_product("Liner Needles", dec!(15.00), 50).await;
    app.state
        .services
        .orders
        .create_order(order_request(&[(product.id, 1)], dec!(4.00)))
        .await
        .unwrap()
}

fn to(status: OrderStatus) -> UpdateOrderStatusRequest {
    UpdateOrderStatusRequest {
        status,
        notes: None,
        changed_by: None,
    }
}

#[tokio::test]
async fn skipping_ahead_is_rejected_and_next_step_is_accepted() {
    let app = TestApp::new().await;
    let order = pending_order(&app).await;
    let uri = format!("/api/v1/orders/{}/status", order.id);

    let rejected = app
        .request(Method::PUT, &uri, Some(json!({ "status": "Shipped" })))
        .await;
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
    let body = response_json(rejected).await;
    assert_eq!(
        body["message"],
        "Invalid status transition from Pending to Shipped"
    );

    let accepted = app
        .request(Method::PUT, &uri, Some(json!({ "status": "Confirmed" })))
        .await;
    assert_eq!(accepted.status(), StatusCode::NO_CONTENT);

    let current = app.state.services.orders.get_order(order.id).await.unwrap();
    assert_eq!(current.status, OrderStatus::Confirmed);
    assert!(current.updated_at >= order.updated_at);
}

#[tokio::test]
async fn status_can_be_sent_as_ordinal() {
    let app = TestApp::new().await;
    let order = pending_order(&app).await;

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/orders/{}/status", order.id),
            Some(json!({ "status": 6, "notes": "Customer changed their mind" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let current = app.state.services.orders.get_order(order.id).await.unwrap();
    assert_eq!(current.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn history_is_newest_first_with_default_actor() {
    let app = TestApp::new().await;
    let order = pending_order(&app).await;
    let status = &app.state.services.order_status;

    status.update_status(order.id, to(OrderStatus::Confirmed)).await.unwrap();
    status
        .update_status(
            order.id,
            UpdateOrderStatusRequest {
                status: OrderStatus::Processing,
                notes: Some("Picked from shelf B".into()),
                changed_by: Some("warehouse-kim".into()),
            },
        )
        .await
        .unwrap();

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}/status-history", order.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 3);

    assert_eq!(rows[0]["fromStatus"], "Confirmed");
    assert_eq!(rows[0]["toStatus"], "Processing");
    assert_eq!(rows[0]["changedBy"], "warehouse-kim");
    assert_eq!(rows[0]["notes"], "Picked from shelf B");

    assert_eq!(rows[1]["fromStatus"], "Pending");
    assert_eq!(rows[1]["toStatus"], "Confirmed");
    assert_eq!(rows[1]["changedBy"], "System");

    assert_eq!(rows[2]["fromStatus"], "Pending");
    assert_eq!(rows[2]["toStatus"], "Pending");
    assert_eq!(rows[2]["notes"], "Order created");
}

#[tokio::test]
async fn full_fulfilment_path_then_refund() {
    let app = TestApp::new().await;
    let order = pending_order(&app).await;
    let status = &app.state.services.order_status;

    for next in [
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Refunded,
    ] {
        let updated = status.update_status(order.id, to(next)).await.unwrap();
        assert_eq!(updated.status, next);
    }

    let err = status
        .update_status(order.id, to(OrderStatus::Pending))
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::InvalidTransition {
            from: OrderStatus::Refunded,
            to: OrderStatus::Pending
        }
    );
}

#[tokio::test]
async fn rejected_transition_writes_no_history() {
    let app = TestApp::new().await;
    let order = pending_order(&app).await;

    let err = app
        .state
        .services
        .order_status
        .update_status(order.id, to(OrderStatus::Delivered))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidTransition { .. });

    let history = app
        .state
        .services
        .orders
        .get_status_history(order.id)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn unknown_order_is_not_found() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::PUT,
            "/api/v1/orders/777/status",
            Some(json!({ "status": "Confirmed" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let history = app
        .request(Method::GET, "/api/v1/orders/777/status-history", None)
        .await;
    assert_eq!(history.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_status_name_is_a_structured_bad_request() {
    let app = TestApp::new().await;
    let order = pending_order(&app).await;

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/orders/{}/status", order.id),
            Some(json!({ "status": "Bogus" })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Bad Request");
    assert!(body["details"][0]
        .as_str()
        .unwrap()
        .contains("Unknown order status 'Bogus'"));

    let current = app.state.services.orders.get_order(order.id).await.unwrap();
    assert_eq!(current.status, OrderStatus::Pending);
}
