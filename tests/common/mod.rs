#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use atsyn_api::{
    config::AppConfig,
    db,
    events::{self, EventHandler, EventSender},
    handlers::AppServices,
    services::{
        catalog::{CreateCategoryRequest, CreateProductRequest, ProductResponse},
        notifications::{PurchaseReceipt, ReceiptNotificationHandler, ReceiptSender},
        orders::{CreateOrderItemRequest, CreateOrderRequest},
        payments::{
            CreatedPaymentIntent, ListPaymentIntentsParams, PaymentIntentPage,
            PaymentIntentRecord, PaymentProcessor, PaymentProcessorError,
        },
    },
    AppState,
};
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    Router,
};
use rust_decimal::Decimal;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;

/// Processor double that serves a fixed list of intents, or fails every call.
pub struct FakeProcessor {
    intents: Vec<PaymentIntentRecord>,
    fail: bool,
    pub list_calls: Mutex<Vec<ListPaymentIntentsParams>>,
}

impl FakeProcessor {
    pub fn with_intents(intents: Vec<PaymentIntentRecord>) -> Self {
        Self {
            intents,
            fail: false,
            list_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            intents: Vec::new(),
            fail: true,
            list_calls: Mutex::new(Vec::new()),
        }
    }
}

pub fn intent(id: &str, amount: i64, status: &str, created: i64) -> PaymentIntentRecord {
    PaymentIntentRecord {
        id: id.to_string(),
        amount,
        status: status.to_string(),
        created,
    }
}

#[async_trait]
impl PaymentProcessor for FakeProcessor {
    async fn create_payment_intent(
        &self,
        amount_cents: i64,
        _currency: &str,
    ) -> Result<CreatedPaymentIntent, PaymentProcessorError> {
        if self.fail {
            return Err(PaymentProcessorError::NotConfigured);
        }
        Ok(CreatedPaymentIntent {
            id: format!("pi_test_{amount_cents}"),
            client_secret: format!("pi_test_{amount_cents}_secret"),
        })
    }

    async fn list_payment_intents(
        &self,
        params: &ListPaymentIntentsParams,
    ) -> Result<PaymentIntentPage, PaymentProcessorError> {
        self.list_calls.lock().unwrap().push(params.clone());
        if self.fail {
            return Err(PaymentProcessorError::NotConfigured);
        }
        let start = match &params.starting_after {
            Some(cursor) => self
                .intents
                .iter()
                .position(|i| &i.id == cursor)
                .map(|p| p + 1)
                .unwrap_or(self.intents.len()),
            None => 0,
        };
        let end = (start + params.limit as usize).min(self.intents.len());
        Ok(PaymentIntentPage {
            data: self.intents[start..end].to_vec(),
            has_more: end < self.intents.len(),
        })
    }
}

/// Captures receipts instead of mailing them.
#[derive(Default)]
pub struct RecordingReceiptSender {
    pub sent: Mutex<Vec<PurchaseReceipt>>,
}

#[async_trait]
impl ReceiptSender for RecordingReceiptSender {
    async fn send_purchase_receipt(&self, receipt: &PurchaseReceipt) -> Result<(), String> {
        self.sent.lock().unwrap().push(receipt.clone());
        Ok(())
    }
}

/// Application wired against a throwaway SQLite file.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub receipts: Arc<RecordingReceiptSender>,
    _event_task: tokio::task::JoinHandle<()>,
    _db_dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_processor(Arc::new(FakeProcessor::with_intents(Vec::new()))).await
    }

    pub async fn with_processor(processor: Arc<dyn PaymentProcessor>) -> Self {
        let db_dir = tempfile::tempdir().expect("temp dir for test database");
        let db_path = db_dir.path().join("atsyn_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.auto_migrate = true;
        cfg.db_max_connections = 5;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let services = AppServices::new(db_arc.clone(), event_sender.clone(), processor);

        let receipts = Arc::new(RecordingReceiptSender::default());
        let handlers: Vec<Arc<dyn EventHandler>> = vec![Arc::new(ReceiptNotificationHandler::new(
            services.orders.clone(),
            receipts.clone(),
            cfg.email_sender.clone(),
        ))];
        let event_task = tokio::spawn(events::process_events(event_rx, handlers));

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let router = Router::new()
            .nest("/api/v1", atsyn_api::api_v1_routes())
            .layer(axum::middleware::from_fn(
                atsyn_api::middleware_helpers::request_id::request_id_middleware,
            ))
            .with_state(state.clone());

        Self {
            router,
            state,
            receipts,
            _event_task: event_task,
            _db_dir: db_dir,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn seed_category(&self, name: &str) -> i32 {
        self.state
            .services
            .catalog
            .create_category(CreateCategoryRequest {
                name: name.to_string(),
                description: format!("{name} supplies"),
                is_active: true,
            })
            .await
            .expect("seed category")
            .id
    }

    pub async fn seed_product(&self, title: &str, price: Decimal, stock: i32) -> ProductResponse {
        self.state
            .services
            .catalog
            .create_product(CreateProductRequest {
                title: title.to_string(),
                description: String::new(),
                price,
                category_id: None,
                brand_id: None,
                stock_amount: stock,
                is_visible: true,
            })
            .await
            .expect("seed product")
    }

    pub async fn product(&self, id: i32) -> ProductResponse {
        self.state
            .services
            .catalog
            .get_product(id)
            .await
            .expect("product exists")
    }

    /// Waits for the event processor to deliver `count` receipts.
    pub async fn wait_for_receipts(&self, count: usize) -> Vec<PurchaseReceipt> {
        for _ in 0..100 {
            {
                let sent = self.receipts.sent.lock().unwrap();
                if sent.len() >= count {
                    return sent.clone();
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.receipts.sent.lock().unwrap().clone()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub fn order_request(items: &[(i32, i32)], shipping_cost: Decimal) -> CreateOrderRequest {
    CreateOrderRequest {
        customer_name: "Dana Reyes".to_string(),
        customer_email: "dana@example.com".to_string(),
        shipping_address: "12 Needle Lane, Austin TX".to_string(),
        is_pickup: false,
        billing_address: "12 Needle Lane, Austin TX".to_string(),
        shipping_cost,
        notes: None,
        order_items: items
            .iter()
            .map(|(product_id, quantity)| CreateOrderItemRequest {
                product_id: *product_id,
                quantity: *quantity,
            })
            .collect(),
    }
}

pub async fn response_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body is json")
    }
}
