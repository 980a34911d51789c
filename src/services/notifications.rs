use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument};

use crate::{
    config::AppConfig,
    errors::ServiceError,
    events::{Event, EventHandler},
    middleware_helpers::retry::{with_retry, HttpCallError, RetryConfig, TransientHttpPolicy},
    services::{order_projection::OrderResponse, orders::OrderService},
};

pub const RECEIPT_TEMPLATE_ID: &str = "purchase_receipt";

/// Receipt email payload in the provider's wire format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchaseReceipt {
    pub sender: String,
    pub to: Vec<String>,
    pub subject: String,
    pub template_id: String,
    pub template_data: ReceiptTemplateData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceiptTemplateData {
    pub customer_name: String,
    pub order_number: String,
    pub order_date: String,
    pub is_pickup: bool,
    pub shipping_address: String,
    pub billing_address: String,
    pub subtotal: String,
    pub tax_amount: String,
    pub shipping_cost: String,
    pub total_amount: String,
    pub items: Vec<ReceiptLine>,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceiptLine {
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: String,
    pub total_price: String,
}

fn money(value: Decimal) -> String {
    format!("${:.2}", value)
}

impl PurchaseReceipt {
    pub fn for_order(order: &OrderResponse, sender: &str) -> Self {
        let subject = if order.is_pickup {
            format!("Order Ready for Pickup - {}", order.order_number)
        } else {
            format!("Order Confirmation - {}", order.order_number)
        };

        Self {
            sender: sender.to_string(),
            to: vec![order.customer_email.clone()],
            subject,
            template_id: RECEIPT_TEMPLATE_ID.to_string(),
            template_data: ReceiptTemplateData {
                customer_name: order.customer_name.clone(),
                order_number: order.order_number.clone(),
                order_date: order.order_date.format("%B %d, %Y").to_string(),
                is_pickup: order.is_pickup,
                shipping_address: order.shipping_address.clone(),
                billing_address: order.billing_address.clone(),
                subtotal: money(order.subtotal),
                tax_amount: money(order.tax_amount),
                shipping_cost: money(order.shipping_cost),
                total_amount: money(order.total_amount),
                items: order
                    .order_items
                    .iter()
                    .map(|item| ReceiptLine {
                        product_name: item.product_name.clone(),
                        quantity: item.quantity,
                        unit_price: money(item.unit_price),
                        total_price: money(item.total_price),
                    })
                    .collect(),
                notes: order.notes.clone().unwrap_or_default(),
            },
        }
    }
}

#[async_trait]
pub trait ReceiptSender: Send + Sync {
    async fn send_purchase_receipt(&self, receipt: &PurchaseReceipt) -> Result<(), String>;
}

/// SMTP2GO-compatible template mail API.
pub struct Smtp2GoSender {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    retry: RetryConfig,
}

impl Smtp2GoSender {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_url: api_url.into(),
            api_key: api_key.into(),
            retry: RetryConfig::single_retry(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn post(&self, receipt: &PurchaseReceipt) -> Result<(), HttpCallError> {
        let response = self
            .http
            .post(&self.api_url)
            .header("X-Smtp2go-Api-Key", &self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(receipt)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(HttpCallError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}

#[async_trait]
impl ReceiptSender for Smtp2GoSender {
    async fn send_purchase_receipt(&self, receipt: &PurchaseReceipt) -> Result<(), String> {
        with_retry(&self.retry, TransientHttpPolicy, || self.post(receipt))
            .await
            .map_err(|e| format!("Failed to send email: {}", e))
    }
}

/// Stand-in when no mail API key is configured.
pub struct LogOnlySender;

#[async_trait]
impl ReceiptSender for LogOnlySender {
    async fn send_purchase_receipt(&self, receipt: &PurchaseReceipt) -> Result<(), String> {
        info!(subject = %receipt.subject, "Email delivery not configured; skipping receipt");
        Ok(())
    }
}

pub fn build_receipt_sender(config: &AppConfig) -> Result<Arc<dyn ReceiptSender>, ServiceError> {
    match config.email_key() {
        Some(key) => Ok(Arc::new(Smtp2GoSender::new(
            config.email_api_url.clone(),
            key,
            Duration::from_secs(config.notification_timeout_secs),
        )?)),
        None => Ok(Arc::new(LogOnlySender)),
    }
}

/// Sends the purchase receipt once an order has been committed.
pub struct ReceiptNotificationHandler {
    orders: Arc<OrderService>,
    sender: Arc<dyn ReceiptSender>,
    from_address: String,
}

impl ReceiptNotificationHandler {
    pub fn new(
        orders: Arc<OrderService>,
        sender: Arc<dyn ReceiptSender>,
        from_address: impl Into<String>,
    ) -> Self {
        Self {
            orders,
            sender,
            from_address: from_address.into(),
        }
    }
}

#[async_trait]
impl EventHandler for ReceiptNotificationHandler {
    fn name(&self) -> &'static str {
        "purchase_receipt"
    }

    #[instrument(skip(self, event), fields(order_id = event.order_id()))]
    async fn handle_event(&self, event: &Event) -> Result<(), String> {
        let Event::OrderCreated { order_id, .. } = event else {
            return Ok(());
        };

        let order = self
            .orders
            .get_order(*order_id)
            .await
            .map_err(|e| e.to_string())?;
        let receipt = PurchaseReceipt::for_order(&order, &self.from_address);
        self.sender.send_purchase_receipt(&receipt).await?;

        info!(order_number = %order.order_number, "Purchase receipt sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::order::OrderStatus;
    use crate::services::order_projection::OrderItemResponse;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn order(is_pickup: bool) -> OrderResponse {
        let placed = Utc.with_ymd_and_hms(2025, 1, 5, 14, 0, 0).unwrap();
        OrderResponse {
            id: 1,
            order_number: "ORD-20250105-0001".into(),
            order_date: placed,
            customer_name: "Rae Lin".into(),
            customer_email: "rae@example.com".into(),
            shipping_address: "12 Harbor St".into(),
            billing_address: "12 Harbor St".into(),
            is_pickup,
            subtotal: dec!(20.00),
            tax_amount: dec!(1.70),
            shipping_cost: dec!(5.99),
            total_amount: dec!(27.69),
            status: OrderStatus::Pending,
            status_name: "Pending".into(),
            notes: None,
            created_at: placed,
            updated_at: placed,
            order_items: vec![OrderItemResponse {
                id: 1,
                product_id: 3,
                product_name: "Black Ink 8oz".into(),
                unit_price: dec!(10.00),
                quantity: 2,
                total_price: dec!(20.00),
                product: None,
            }],
        }
    }

    #[test]
    fn subject_depends_on_pickup() {
        let shipped = PurchaseReceipt::for_order(&order(false), "orders@atsyn.com");
        let pickup = PurchaseReceipt::for_order(&order(true), "orders@atsyn.com");
        assert_eq!(shipped.subject, "Order Confirmation - ORD-20250105-0001");
        assert_eq!(pickup.subject, "Order Ready for Pickup - ORD-20250105-0001");
    }

    #[test]
    fn template_data_formats_money_and_dates() {
        let receipt = PurchaseReceipt::for_order(&order(false), "orders@atsyn.com");
        assert_eq!(receipt.template_id, "purchase_receipt");
        assert_eq!(receipt.template_data.order_date, "January 05, 2025");
        assert_eq!(receipt.template_data.total_amount, "$27.69");
        assert_eq!(receipt.template_data.items[0].unit_price, "$10.00");
        assert_eq!(receipt.to, vec!["rae@example.com".to_string()]);
    }

    #[tokio::test]
    async fn smtp2go_sender_posts_template_with_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-Smtp2go-Api-Key", "api-test"))
            .and(body_partial_json(serde_json::json!({
                "template_id": "purchase_receipt",
                "subject": "Order Confirmation - ORD-20250105-0001"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let sender = Smtp2GoSender::new(server.uri(), "api-test", Duration::from_secs(2)).unwrap();
        let receipt = PurchaseReceipt::for_order(&order(false), "orders@atsyn.com");
        sender.send_purchase_receipt(&receipt).await.unwrap();
    }

    #[tokio::test]
    async fn smtp2go_sender_retries_once_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let sender = Smtp2GoSender::new(server.uri(), "api-test", Duration::from_secs(2))
            .unwrap()
            .with_retry(RetryConfig {
                initial_delay: Duration::from_millis(5),
                ..RetryConfig::single_retry()
            });
        let receipt = PurchaseReceipt::for_order(&order(true), "orders@atsyn.com");
        let err = sender.send_purchase_receipt(&receipt).await.unwrap_err();
        assert!(err.starts_with("Failed to send email"));
    }
}
