use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    config::AppConfig,
    errors::ServiceError,
    middleware_helpers::retry::{with_retry, HttpCallError, RetryConfig, TransientHttpPolicy},
};

pub const DEFAULT_CURRENCY: &str = "usd";
pub const PAGE_LIMIT: u32 = 100;

#[derive(Debug, thiserror::Error)]
pub enum PaymentProcessorError {
    #[error("payment processor is not configured")]
    NotConfigured,
    #[error(transparent)]
    Http(#[from] HttpCallError),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedPaymentIntent {
    pub id: String,
    pub client_secret: String,
}

/// Filter and cursor for one page of payment intents. Times are unix seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPaymentIntentsParams {
    pub created_gte: Option<i64>,
    pub created_lte: Option<i64>,
    pub limit: u32,
    pub starting_after: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentIntentRecord {
    pub id: String,
    /// Minor units (cents)
    pub amount: i64,
    pub status: String,
    /// Unix seconds
    pub created: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PaymentIntentPage {
    pub data: Vec<PaymentIntentRecord>,
    pub has_more: bool,
}

/// The card processor, as seen by the order service.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn create_payment_intent(
        &self,
        amount_cents: i64,
        currency: &str,
    ) -> Result<CreatedPaymentIntent, PaymentProcessorError>;

    async fn list_payment_intents(
        &self,
        params: &ListPaymentIntentsParams,
    ) -> Result<PaymentIntentPage, PaymentProcessorError>;
}

/// Stripe-compatible REST client.
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
    list_retry: RetryConfig,
}

impl StripeClient {
    pub fn new(
        api_base: impl Into<String>,
        secret_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
            list_retry: RetryConfig::single_retry(),
        })
    }

    pub fn with_list_retry(mut self, retry: RetryConfig) -> Self {
        self.list_retry = retry;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn fetch_page(
        &self,
        params: &ListPaymentIntentsParams,
    ) -> Result<PaymentIntentPage, HttpCallError> {
        let mut query: Vec<(&str, String)> = vec![("limit", params.limit.max(1).to_string())];
        if let Some(gte) = params.created_gte {
            query.push(("created[gte]", gte.to_string()));
        }
        if let Some(lte) = params.created_lte {
            query.push(("created[lte]", lte.to_string()));
        }
        if let Some(cursor) = &params.starting_after {
            query.push(("starting_after", cursor.clone()));
        }

        let response = self
            .http
            .get(self.url("/v1/payment_intents"))
            .bearer_auth(&self.secret_key)
            .query(&query)
            .send()
            .await?;
        decode_json(response).await
    }
}

async fn decode_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, HttpCallError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(HttpCallError::Status {
            status: status.as_u16(),
            body,
        });
    }
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| HttpCallError::Decode(e.to_string()))
}

#[async_trait]
impl PaymentProcessor for StripeClient {
    #[instrument(skip(self))]
    async fn create_payment_intent(
        &self,
        amount_cents: i64,
        currency: &str,
    ) -> Result<CreatedPaymentIntent, PaymentProcessorError> {
        let form = [
            ("amount", amount_cents.to_string()),
            ("currency", currency.to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
        ];
        // Creating an intent is not idempotent, so there is no retry here.
        let response = self
            .http
            .post(self.url("/v1/payment_intents"))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(HttpCallError::from)?;
        Ok(decode_json(response).await?)
    }

    async fn list_payment_intents(
        &self,
        params: &ListPaymentIntentsParams,
    ) -> Result<PaymentIntentPage, PaymentProcessorError> {
        let page = with_retry(&self.list_retry, TransientHttpPolicy, || self.fetch_page(params)).await?;
        Ok(page)
    }
}

/// Used when no processor key is configured. Reports treat it as unreachable.
pub struct UnconfiguredProcessor;

#[async_trait]
impl PaymentProcessor for UnconfiguredProcessor {
    async fn create_payment_intent(
        &self,
        _amount_cents: i64,
        _currency: &str,
    ) -> Result<CreatedPaymentIntent, PaymentProcessorError> {
        Err(PaymentProcessorError::NotConfigured)
    }

    async fn list_payment_intents(
        &self,
        _params: &ListPaymentIntentsParams,
    ) -> Result<PaymentIntentPage, PaymentProcessorError> {
        Err(PaymentProcessorError::NotConfigured)
    }
}

/// Picks the Stripe client when a secret key is present.
pub fn build_payment_processor(
    config: &AppConfig,
) -> Result<Arc<dyn PaymentProcessor>, ServiceError> {
    match config.stripe_key() {
        Some(key) => Ok(Arc::new(StripeClient::new(
            config.stripe_api_base.clone(),
            key,
            Duration::from_secs(config.payment_timeout_secs),
        )?)),
        None => {
            info!("No payment processor key configured; processor features are disabled");
            Ok(Arc::new(UnconfiguredProcessor))
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntentRequest {
    /// Amount in cents
    #[validate(range(min = 1, message = "Amount must be greater than zero"))]
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntentResponse {
    pub client_secret: String,
    pub payment_intent_id: String,
}

#[derive(Clone)]
pub struct PaymentService {
    processor: Arc<dyn PaymentProcessor>,
}

impl PaymentService {
    pub fn new(processor: Arc<dyn PaymentProcessor>) -> Self {
        Self { processor }
    }

    #[instrument(skip(self, request), fields(amount = request.amount))]
    pub async fn create_intent(
        &self,
        request: CreatePaymentIntentRequest,
    ) -> Result<CreatePaymentIntentResponse, ServiceError> {
        request.validate()?;

        let intent = self
            .processor
            .create_payment_intent(request.amount, DEFAULT_CURRENCY)
            .await
            .map_err(|e| {
                error!(error = %e, "Payment intent creation failed");
                ServiceError::ExternalServiceError(e.to_string())
            })?;

        info!(payment_intent_id = %intent.id, "Payment intent created");
        Ok(CreatePaymentIntentResponse {
            client_secret: intent.client_secret,
            payment_intent_id: intent.id,
        })
    }
}
