mod common;

use std::collections::HashSet;

use assert_matches::assert_matches;
use atsyn_api::errors::ServiceError;
use common::{order_request, TestApp};
use rust_decimal_macros::dec;

#[tokio::test]
async fn last_unit_is_sold_exactly_once() {
    let app = TestApp::new().await;
    let product = app.seed_product("Limited Flash Print", dec!(45.00), 1).await;

    let orders = app.state.services.orders.clone();
    let first = {
        let orders = orders.clone();
        tokio::spawn(async move {
            orders
                .create_order(order_request(&[(product.id, 1)], dec!(0)))
                .await
        })
    };
    let second = {
        let orders = orders.clone();
        tokio::spawn(async move {
            orders
                .create_order(order_request(&[(product.id, 1)], dec!(0)))
                .await
        })
    };

    let results = vec![first.await.unwrap(), second.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one checkout should win: {results:?}");

    let failure = results.into_iter().find_map(Result::err).unwrap();
    assert_matches!(failure, ServiceError::InsufficientStock(_));

    let product = app.product(product.id).await;
    assert_eq!(product.stock_amount, 0);
    assert!(!product.in_stock);
}

#[tokio::test]
async fn racing_pairs_on_a_shared_pool_never_fail_with_database_errors() {
    let app = TestApp::new().await;

    for round in 0..10 {
        let product = app
            .seed_product(&format!("Flash Sheet {round}"), dec!(12.00), 1)
            .await;
        let tasks: Vec<_> = (0..2)
            .map(|_| {
                let orders = app.state.services.orders.clone();
                tokio::spawn(async move {
                    orders
                        .create_order(order_request(&[(product.id, 1)], dec!(0)))
                        .await
                })
            })
            .collect();

        let mut successes = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => successes += 1,
                Err(e) => assert_matches!(e, ServiceError::InsufficientStock(_), "round {round}"),
            }
        }
        assert_eq!(successes, 1, "round {round}");
        assert_eq!(app.product(product.id).await.stock_amount, 0);
    }
}

#[tokio::test]
async fn concurrent_orders_never_oversell_or_share_numbers() {
    let app = TestApp::new().await;
    let product = app.seed_product("Practice Skin", dec!(3.00), 5).await;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let orders = app.state.services.orders.clone();
        tasks.push(tokio::spawn(async move {
            orders
                .create_order(order_request(&[(product.id, 1)], dec!(0)))
                .await
        }));
    }

    let mut numbers = HashSet::new();
    let mut failures = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(order) => {
                assert!(numbers.insert(order.order_number));
            }
            Err(e) => {
                assert_matches!(e, ServiceError::InsufficientStock(_));
                failures += 1;
            }
        }
    }

    assert_eq!(numbers.len(), 5);
    assert_eq!(failures, 3);
    assert_eq!(app.product(product.id).await.stock_amount, 0);
}
