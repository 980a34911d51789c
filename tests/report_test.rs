mod common;

use std::sync::Arc;

use atsyn_api::{entities::order::OrderStatus, services::order_status::UpdateOrderStatusRequest};
use axum::http::{Method, StatusCode};
use chrono::{DateTime, TimeZone, Utc};
use common::{intent, order_request, response_json, FakeProcessor, TestApp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
}

async fn deliver(app: &TestApp, order_id: i32) {
    for status in [
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ] {
        app.state
            .services
            .order_status
            .update_status(
                order_id,
                UpdateOrderStatusRequest {
                    status,
                    notes: None,
                    changed_by: None,
                },
            )
            .await
            .unwrap();
    }
}

/// Two delivered 2024 orders (27.69 in June, 10.85 in February), one pending
/// June order (10.85) and one delivered order from the previous year.
async fn seed_2024(app: &TestApp) {
    let product = app.seed_product("Black Ink 8oz", dec!(10.00), 100).await;
    let orders = &app.state.services.orders;

    let june = orders
        .create_order_at(order_request(&[(product.id, 2)], dec!(5.99)), at(2024, 6, 3))
        .await
        .unwrap();
    let february = orders
        .create_order_at(order_request(&[(product.id, 1)], dec!(0)), at(2024, 2, 10))
        .await
        .unwrap();
    orders
        .create_order_at(order_request(&[(product.id, 1)], dec!(0)), at(2024, 6, 5))
        .await
        .unwrap();
    let last_year = orders
        .create_order_at(order_request(&[(product.id, 3)], dec!(0)), at(2023, 12, 31))
        .await
        .unwrap();

    assert_eq!(june.total_amount, dec!(27.69));
    assert_eq!(february.total_amount, dec!(10.85));

    deliver(app, june.id).await;
    deliver(app, february.id).await;
    deliver(app, last_year.id).await;
}

fn processor_for_2024() -> Arc<FakeProcessor> {
    Arc::new(FakeProcessor::with_intents(vec![
        intent("pi_1", 2769, "succeeded", at(2024, 6, 3).timestamp()),
        intent("pi_2", 1085, "succeeded", at(2024, 2, 10).timestamp()),
        intent("pi_3", 500, "requires_payment_method", at(2024, 6, 4).timestamp()),
        intent("pi_4", 999, "succeeded", at(2023, 12, 31).timestamp()),
    ]))
}

#[tokio::test]
async fn financial_report_sums_delivered_orders() {
    let app = TestApp::with_processor(processor_for_2024()).await;
    seed_2024(&app).await;

    let report = app
        .state
        .services
        .reports
        .financial_report_at(Some(2024), at(2024, 6, 20))
        .await
        .unwrap();

    assert_eq!(report.year, 2024);
    assert_eq!(report.year_to_date, dec!(38.54));
    assert_eq!(report.current_month, dec!(27.69));
    assert_eq!(report.transaction_count, 2);
    assert_eq!(report.total_fees, dec!(1.72));
    assert_eq!(report.net_revenue, dec!(36.82));

    let months: Vec<(&str, Decimal, u64)> = report
        .monthly_revenue
        .iter()
        .map(|m| (m.month.as_str(), m.revenue, m.transactions))
        .collect();
    assert_eq!(
        months,
        vec![("February", dec!(10.85), 1), ("June", dec!(27.69), 1)]
    );

    assert!(report.processor_available);
    assert_eq!(report.processor_revenue, dec!(38.54));
    assert_eq!(report.processor_transaction_count, 2);
}

#[tokio::test]
async fn fees_follow_processor_payments_not_local_orders() {
    let processor = Arc::new(FakeProcessor::with_intents(vec![intent(
        "pi_big",
        10_000,
        "succeeded",
        at(2024, 4, 1).timestamp(),
    )]));
    let app = TestApp::with_processor(processor).await;
    seed_2024(&app).await;

    let report = app
        .state
        .services
        .reports
        .financial_report_at(Some(2024), at(2024, 6, 20))
        .await
        .unwrap();

    assert_eq!(report.year_to_date, dec!(38.54));
    assert_eq!(report.processor_revenue, dec!(100.00));
    assert_eq!(report.total_fees, dec!(3.20));
    assert_eq!(report.net_revenue, dec!(35.34));
}

#[tokio::test]
async fn past_year_has_no_current_month() {
    let app = TestApp::with_processor(processor_for_2024()).await;
    seed_2024(&app).await;

    let report = app
        .state
        .services
        .reports
        .financial_report_at(Some(2024), at(2026, 6, 20))
        .await
        .unwrap();
    assert_eq!(report.current_month, Decimal::ZERO);
    assert_eq!(report.year_to_date, dec!(38.54));

    let orders = app
        .state
        .services
        .reports
        .order_report_at(Some(2024), at(2026, 6, 20))
        .await
        .unwrap();
    assert_eq!(orders.current_month, 0);
    assert_eq!(orders.year_to_date, 3);
}

#[tokio::test]
async fn order_report_buckets_every_status() {
    let app = TestApp::with_processor(processor_for_2024()).await;
    seed_2024(&app).await;

    let report = app
        .state
        .services
        .reports
        .order_report_at(Some(2024), at(2024, 6, 20))
        .await
        .unwrap();

    assert_eq!(report.current_month, 2);
    assert_eq!(report.year_to_date, 3);
    assert_eq!(report.delivered_orders, 2);
    assert_eq!(report.pending_orders, 1);
    assert_eq!(report.cancelled_orders, 0);
    assert_eq!(report.processor_verified_payments, 2);
    assert!(report.processor_available);

    assert_eq!(report.monthly_orders.len(), 2);
    let june = &report.monthly_orders[1];
    assert_eq!(june.month, "June");
    assert_eq!(june.orders, 2);
    assert_eq!(june.delivered_orders, 1);
    assert_eq!(june.average_order_value, dec!(19.27));
    assert_eq!(june.total_revenue, dec!(27.69));
}

#[tokio::test]
async fn processor_outage_degrades_instead_of_failing() {
    let app = TestApp::with_processor(Arc::new(FakeProcessor::failing())).await;
    seed_2024(&app).await;

    let response = app
        .request(Method::GET, "/api/v1/report/financial?year=2024", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let report = &body["data"];
    assert_eq!(report["yearToDate"], "38.54");
    assert_eq!(report["processorAvailable"], false);
    assert_eq!(report["processorRevenue"], "0");
    assert_eq!(report["processorTransactionCount"], 0);
    assert_eq!(report["totalFees"], "0");
    assert_eq!(report["netRevenue"], "38.54");

    let response = app
        .request(Method::GET, "/api/v1/report/orders?year=2024", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["processorAvailable"], false);
    assert_eq!(body["data"]["yearToDate"], 3);
}

#[tokio::test]
async fn processor_pages_are_followed_to_the_end() {
    let created = at(2024, 3, 1).timestamp();
    let intents = (0..150)
        .map(|i| intent(&format!("pi_{i:03}"), 100, "succeeded", created))
        .collect();
    let processor = Arc::new(FakeProcessor::with_intents(intents));
    let app = TestApp::with_processor(processor.clone()).await;

    let report = app
        .state
        .services
        .reports
        .financial_report_at(Some(2024), at(2024, 6, 20))
        .await
        .unwrap();
    assert_eq!(report.processor_transaction_count, 150);
    assert_eq!(report.processor_revenue, dec!(150.00));

    let calls = processor.list_calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].limit, 100);
    assert_eq!(calls[0].starting_after, None);
    assert_eq!(calls[1].starting_after.as_deref(), Some("pi_099"));
    assert_eq!(
        calls[0].created_gte,
        Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap().timestamp())
    );
    assert_eq!(
        calls[0].created_lte,
        Some(Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap().timestamp())
    );
}

#[tokio::test]
async fn dashboard_covers_current_month_and_year() {
    let app = TestApp::new().await;
    seed_2024(&app).await;

    let summary = app
        .state
        .services
        .reports
        .dashboard_summary_at(at(2024, 6, 20))
        .await
        .unwrap();

    assert_eq!(summary.year_orders, 3);
    assert_eq!(summary.year_revenue, dec!(38.54));
    assert_eq!(summary.year_pending_orders, 1);
    assert_eq!(summary.month_orders, 2);
    assert_eq!(summary.month_revenue, dec!(27.69));
    assert_eq!(summary.month_pending_orders, 1);
    assert_eq!(summary.average_order_value, dec!(16.46));
    assert_eq!(summary.total_delivered, 2);
    assert_eq!(summary.total_pending, 1);
}

#[tokio::test]
async fn invalid_year_is_rejected() {
    let app = TestApp::new().await;
    let response = app
        .request(Method::GET, "/api/v1/report/financial?year=0", None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
