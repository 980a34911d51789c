use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::{
    entities::{
        product::Entity as ProductEntity,
        sale::{self, Entity as SaleEntity},
    },
    errors::ServiceError,
    services::pricing::round_currency,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaleResponse {
    pub id: i32,
    pub product_id: i32,
    pub sale_price: Decimal,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub name: String,
    pub description: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<sale::Model> for SaleResponse {
    fn from(model: sale::Model) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            sale_price: round_currency(model.sale_price),
            start_date: model.start_date,
            end_date: model.end_date,
            name: model.name,
            description: model.description,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleRequest {
    pub product_id: i32,
    #[validate(custom = "non_negative_price")]
    pub sale_price: Decimal,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    #[validate(length(max = 200, message = "Sale name cannot exceed 200 characters"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 1000, message = "Description cannot exceed 1000 characters"))]
    pub description: String,
}

/// Update keeps the sale bound to its product.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSaleRequest {
    #[validate(custom = "non_negative_price")]
    pub sale_price: Decimal,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    #[validate(length(max = 200, message = "Sale name cannot exceed 200 characters"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 1000, message = "Description cannot exceed 1000 characters"))]
    pub description: String,
}

fn non_negative_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() {
        let mut err = ValidationError::new("negative_sale_price");
        err.message = Some("Sale price cannot be negative".into());
        return Err(err);
    }
    Ok(())
}

fn check_window(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Result<(), ServiceError> {
    match end {
        Some(end) if end < start => Err(ServiceError::ValidationError(vec![
            "Sale end date cannot be before its start date".into(),
        ])),
        _ => Ok(()),
    }
}

/// Time-boxed product promotions.
#[derive(Clone)]
pub struct SaleService {
    db: Arc<DatabaseConnection>,
}

impl SaleService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(product_id = request.product_id))]
    pub async fn create_sale(&self, request: CreateSaleRequest) -> Result<SaleResponse, ServiceError> {
        request.validate()?;
        check_window(request.start_date, request.end_date)?;

        if ProductEntity::find_by_id(request.product_id)
            .one(&*self.db)
            .await?
            .is_none()
        {
            return Err(ServiceError::ValidationError(vec![format!(
                "Product with ID {} does not exist.",
                request.product_id
            )]));
        }

        let created = sale::ActiveModel {
            product_id: Set(request.product_id),
            sale_price: Set(round_currency(request.sale_price)),
            start_date: Set(request.start_date),
            end_date: Set(request.end_date),
            name: Set(request.name.trim().to_string()),
            description: Set(request.description),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(sale_id = created.id, "Sale created");
        Ok(created.into())
    }

    pub async fn get_sale(&self, id: i32) -> Result<SaleResponse, ServiceError> {
        self.find(id).await.map(Into::into)
    }

    /// Every sale, including deactivated ones, newest first.
    pub async fn list_sales(&self) -> Result<Vec<SaleResponse>, ServiceError> {
        let sales = SaleEntity::find()
            .order_by_desc(sale::Column::CreatedAt)
            .order_by_desc(sale::Column::Id)
            .all(&*self.db)
            .await?;
        Ok(sales.into_iter().map(Into::into).collect())
    }

    pub async fn list_active_sales(&self) -> Result<Vec<SaleResponse>, ServiceError> {
        self.list_active_at(Utc::now()).await
    }

    /// Active sales whose window contains `now`. An open-ended sale has no end date.
    pub async fn list_active_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<SaleResponse>, ServiceError> {
        let sales = SaleEntity::find()
            .filter(sale::Column::IsActive.eq(true))
            .filter(sale::Column::StartDate.lte(now))
            .filter(
                Condition::any()
                    .add(sale::Column::EndDate.is_null())
                    .add(sale::Column::EndDate.gte(now)),
            )
            .order_by_desc(sale::Column::CreatedAt)
            .order_by_desc(sale::Column::Id)
            .all(&*self.db)
            .await?;
        Ok(sales.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, request))]
    pub async fn update_sale(
        &self,
        id: i32,
        request: UpdateSaleRequest,
    ) -> Result<SaleResponse, ServiceError> {
        request.validate()?;
        check_window(request.start_date, request.end_date)?;
        let existing = self.find(id).await?;

        let mut active: sale::ActiveModel = existing.into();
        active.sale_price = Set(round_currency(request.sale_price));
        active.start_date = Set(request.start_date);
        active.end_date = Set(request.end_date);
        active.name = Set(request.name.trim().to_string());
        active.description = Set(request.description);
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&*self.db).await?;

        info!(sale_id = id, "Sale updated");
        Ok(updated.into())
    }

    /// Soft delete: the sale stays listed but never shows as active again.
    #[instrument(skip(self))]
    pub async fn deactivate_sale(&self, id: i32) -> Result<(), ServiceError> {
        let existing = self.find(id).await?;
        let mut active: sale::ActiveModel = existing.into();
        active.is_active = Set(false);
        active.updated_at = Set(Some(Utc::now()));
        active.update(&*self.db).await?;

        info!(sale_id = id, "Sale deactivated");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_sale_permanently(&self, id: i32) -> Result<(), ServiceError> {
        let result = SaleEntity::delete_by_id(id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(sale_not_found(id));
        }
        info!(sale_id = id, "Sale deleted");
        Ok(())
    }

    async fn find(&self, id: i32) -> Result<sale::Model, ServiceError> {
        SaleEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| sale_not_found(id))
    }
}

fn sale_not_found(id: i32) -> ServiceError {
    ServiceError::NotFound(format!("Sale with ID {} not found.", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn end_before_start_is_rejected() {
        let start = Utc.with_ymd_and_hms(2025, 6, 10, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 6, 9, 0, 0, 0).unwrap();
        let err = check_window(start, Some(end)).unwrap_err();
        assert_eq!(
            err.details(),
            Some(vec!["Sale end date cannot be before its start date".to_string()])
        );
        assert!(check_window(start, None).is_ok());
        assert!(check_window(start, Some(start)).is_ok());
    }

    #[test]
    fn negative_sale_price_is_rejected() {
        let request = UpdateSaleRequest {
            sale_price: dec!(-0.01),
            start_date: Utc::now(),
            end_date: None,
            name: "Flash".into(),
            description: String::new(),
        };
        let err: ServiceError = request.validate().unwrap_err().into();
        assert_eq!(err.details(), Some(vec!["Sale price cannot be negative".to_string()]));
    }
}
