pub mod catalog;
pub mod content;
pub mod merchandising;
pub mod orders;
pub mod payments;
pub mod reports;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{
    attributes::AttributeService,
    brands::BrandService,
    catalog::CatalogService,
    contact::ContactService,
    news::NewsService,
    order_status::OrderStatusService,
    orders::OrderService,
    payments::{PaymentProcessor, PaymentService},
    reports::ReportService,
    reviews::ReviewService,
    sales::SaleService,
};
use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::errors::ServiceError;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub order_status: Arc<OrderStatusService>,
    pub reports: Arc<ReportService>,
    pub catalog: Arc<CatalogService>,
    pub payments: Arc<PaymentService>,
    pub brands: Arc<BrandService>,
    pub attributes: Arc<AttributeService>,
    pub sales: Arc<SaleService>,
    pub reviews: Arc<ReviewService>,
    pub contact: Arc<ContactService>,
    pub news: Arc<NewsService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: EventSender,
        processor: Arc<dyn PaymentProcessor>,
    ) -> Self {
        Self {
            orders: Arc::new(OrderService::new(db_pool.clone(), event_sender.clone())),
            order_status: Arc::new(OrderStatusService::new(db_pool.clone(), event_sender)),
            reports: Arc::new(ReportService::new(db_pool.clone(), processor.clone())),
            catalog: Arc::new(CatalogService::new(db_pool.clone())),
            payments: Arc::new(PaymentService::new(processor)),
            brands: Arc::new(BrandService::new(db_pool.clone())),
            attributes: Arc::new(AttributeService::new(db_pool.clone())),
            sales: Arc::new(SaleService::new(db_pool.clone())),
            reviews: Arc::new(ReviewService::new(db_pool.clone())),
            contact: Arc::new(ContactService::new(db_pool.clone())),
            news: Arc::new(NewsService::new(db_pool)),
        }
    }
}

/// JSON body extractor whose rejections render as a 400 `ErrorResponse`
/// instead of axum's plain-text 422.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}
