use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    entities::{
        attribute_option::{self, Entity as AttributeOptionEntity},
        category::Entity as CategoryEntity,
        product_attribute::{self, Entity as ProductAttributeEntity},
    },
    errors::{is_unique_violation, ServiceError},
};

/// How a storefront renders an attribute input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AttributeType {
    Text,
    Number,
    Select,
    Multiselect,
}

impl AttributeType {
    /// Only choice attributes carry a fixed option list.
    pub fn has_options(self) -> bool {
        matches!(self, Self::Select | Self::Multiselect)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttributeOptionResponse {
    pub id: i32,
    pub value: String,
    pub display_order: i32,
}

impl From<attribute_option::Model> for AttributeOptionResponse {
    fn from(model: attribute_option::Model) -> Self {
        Self {
            id: model.id,
            value: model.value,
            display_order: model.display_order,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttributeResponse {
    pub id: i32,
    pub name: String,
    #[serde(rename = "type")]
    pub attribute_type: String,
    pub category_id: i32,
    pub is_required: bool,
    pub display_order: i32,
    pub options: Vec<AttributeOptionResponse>,
}

impl AttributeResponse {
    fn from_parts(model: product_attribute::Model, options: Vec<attribute_option::Model>) -> Self {
        Self {
            id: model.id,
            name: model.name,
            attribute_type: model.attribute_type,
            category_id: model.category_id,
            is_required: model.is_required,
            display_order: model.display_order,
            options: options.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttributeOptionRequest {
    #[validate(length(min = 1, max = 100, message = "Option value must be 1-100 characters"))]
    pub value: String,
    #[serde(default)]
    pub display_order: i32,
}

/// Body for both create and update. Update replaces the option list.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttributeRequest {
    #[validate(length(min = 1, max = 100, message = "Attribute name must be 1-100 characters"))]
    pub name: String,
    /// `text`, `number`, `select` or `multiselect`, any case.
    #[serde(rename = "type")]
    pub attribute_type: String,
    pub category_id: i32,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default)]
    #[validate]
    pub options: Vec<AttributeOptionRequest>,
}

impl AttributeRequest {
    fn parsed_type(&self) -> Result<AttributeType, ServiceError> {
        AttributeType::from_str(self.attribute_type.trim()).map_err(|_| {
            ServiceError::ValidationError(vec![format!(
                "Unknown attribute type '{}'. Expected text, number, select or multiselect.",
                self.attribute_type.trim()
            )])
        })
    }
}

/// Per-category attribute definitions and their choice lists.
#[derive(Clone)]
pub struct AttributeService {
    db: Arc<DatabaseConnection>,
}

impl AttributeService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Every attribute, grouped by category and then display order.
    pub async fn list_attributes(&self) -> Result<Vec<AttributeResponse>, ServiceError> {
        let attributes = ProductAttributeEntity::find()
            .order_by_asc(product_attribute::Column::CategoryId)
            .order_by_asc(product_attribute::Column::DisplayOrder)
            .all(&*self.db)
            .await?;
        self.with_options(attributes).await
    }

    pub async fn list_for_category(
        &self,
        category_id: i32,
    ) -> Result<Vec<AttributeResponse>, ServiceError> {
        if CategoryEntity::find_by_id(category_id)
            .one(&*self.db)
            .await?
            .is_none()
        {
            return Err(ServiceError::NotFound(format!(
                "Category with ID {} not found.",
                category_id
            )));
        }

        let attributes = ProductAttributeEntity::find()
            .filter(product_attribute::Column::CategoryId.eq(category_id))
            .order_by_asc(product_attribute::Column::DisplayOrder)
            .all(&*self.db)
            .await?;
        self.with_options(attributes).await
    }

    pub async fn get_attribute(&self, id: i32) -> Result<AttributeResponse, ServiceError> {
        let attribute = self.find(id).await?;
        let mut loaded = self.with_options(vec![attribute]).await?;
        loaded
            .pop()
            .ok_or_else(|| ServiceError::InternalError(format!("attribute {} vanished", id)))
    }

    #[instrument(skip(self, request), fields(name = %request.name, category_id = request.category_id))]
    pub async fn create_attribute(
        &self,
        request: AttributeRequest,
    ) -> Result<AttributeResponse, ServiceError> {
        let attribute_type = self.check_request(&request, None).await?;
        let name = request.name.trim().to_string();

        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to begin attribute transaction");
            ServiceError::DatabaseError(e)
        })?;

        let created = product_attribute::ActiveModel {
            name: Set(name.clone()),
            attribute_type: Set(attribute_type.to_string()),
            category_id: Set(request.category_id),
            is_required: Set(request.is_required),
            display_order: Set(request.display_order),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| map_write_error(e, &name))?;

        if attribute_type.has_options() {
            insert_options(&txn, created.id, &request.options).await?;
        }
        txn.commit().await?;

        info!(attribute_id = created.id, %attribute_type, "Attribute created");
        self.get_attribute(created.id).await
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn update_attribute(
        &self,
        id: i32,
        request: AttributeRequest,
    ) -> Result<AttributeResponse, ServiceError> {
        let existing = self.find(id).await?;
        let attribute_type = self.check_request(&request, Some(id)).await?;
        let name = request.name.trim().to_string();

        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to begin attribute transaction");
            ServiceError::DatabaseError(e)
        })?;

        let mut active: product_attribute::ActiveModel = existing.into();
        active.name = Set(name.clone());
        active.attribute_type = Set(attribute_type.to_string());
        active.category_id = Set(request.category_id);
        active.is_required = Set(request.is_required);
        active.display_order = Set(request.display_order);
        active
            .update(&txn)
            .await
            .map_err(|e| map_write_error(e, &name))?;

        AttributeOptionEntity::delete_many()
            .filter(attribute_option::Column::AttributeId.eq(id))
            .exec(&txn)
            .await?;
        if attribute_type.has_options() {
            insert_options(&txn, id, &request.options).await?;
        }
        txn.commit().await?;

        info!(attribute_id = id, %attribute_type, "Attribute updated");
        self.get_attribute(id).await
    }

    #[instrument(skip(self))]
    pub async fn delete_attribute(&self, id: i32) -> Result<(), ServiceError> {
        self.find(id).await?;

        let txn = self.db.begin().await?;
        AttributeOptionEntity::delete_many()
            .filter(attribute_option::Column::AttributeId.eq(id))
            .exec(&txn)
            .await?;
        ProductAttributeEntity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        info!(attribute_id = id, "Attribute deleted");
        Ok(())
    }

    async fn find(&self, id: i32) -> Result<product_attribute::Model, ServiceError> {
        ProductAttributeEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Attribute with ID {} not found.", id)))
    }

    /// Validates the body, its type, the category and name uniqueness within it.
    async fn check_request(
        &self,
        request: &AttributeRequest,
        except: Option<i32>,
    ) -> Result<AttributeType, ServiceError> {
        request.validate()?;
        let attribute_type = request.parsed_type()?;

        if CategoryEntity::find_by_id(request.category_id)
            .one(&*self.db)
            .await?
            .is_none()
        {
            return Err(ServiceError::ValidationError(vec!["Category not found.".into()]));
        }

        let name = request.name.trim();
        let mut query = ProductAttributeEntity::find()
            .filter(product_attribute::Column::CategoryId.eq(request.category_id))
            .filter(product_attribute::Column::Name.eq(name));
        if let Some(id) = except {
            query = query.filter(product_attribute::Column::Id.ne(id));
        }
        if query.one(&*self.db).await?.is_some() {
            return Err(duplicate_attribute(name));
        }

        Ok(attribute_type)
    }

    async fn with_options(
        &self,
        attributes: Vec<product_attribute::Model>,
    ) -> Result<Vec<AttributeResponse>, ServiceError> {
        let ids: Vec<i32> = attributes.iter().map(|a| a.id).collect();
        let mut options: HashMap<i32, Vec<attribute_option::Model>> = HashMap::new();
        if !ids.is_empty() {
            for option in AttributeOptionEntity::find()
                .filter(attribute_option::Column::AttributeId.is_in(ids))
                .order_by_asc(attribute_option::Column::DisplayOrder)
                .order_by_asc(attribute_option::Column::Id)
                .all(&*self.db)
                .await?
            {
                options.entry(option.attribute_id).or_default().push(option);
            }
        }

        Ok(attributes
            .into_iter()
            .map(|a| {
                let opts = options.remove(&a.id).unwrap_or_default();
                AttributeResponse::from_parts(a, opts)
            })
            .collect())
    }
}

async fn insert_options<C: ConnectionTrait>(
    conn: &C,
    attribute_id: i32,
    options: &[AttributeOptionRequest],
) -> Result<(), ServiceError> {
    for option in options {
        attribute_option::ActiveModel {
            attribute_id: Set(attribute_id),
            value: Set(option.value.trim().to_string()),
            display_order: Set(option.display_order),
            ..Default::default()
        }
        .insert(conn)
        .await?;
    }
    Ok(())
}

fn map_write_error(err: sea_orm::DbErr, name: &str) -> ServiceError {
    if is_unique_violation(&err) {
        duplicate_attribute(name)
    } else {
        error!(error = %err, "Failed to write attribute");
        ServiceError::DatabaseError(err)
    }
}

fn duplicate_attribute(name: &str) -> ServiceError {
    ServiceError::Conflict(format!(
        "Attribute with name '{}' already exists in this category.",
        name
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_types_parse_in_any_case_and_render_lowercase() {
        let parsed = AttributeType::from_str("MultiSelect").unwrap();
        assert_eq!(parsed, AttributeType::Multiselect);
        assert_eq!(parsed.to_string(), "multiselect");
        assert!(AttributeType::from_str("colour").is_err());
    }

    #[test]
    fn only_choice_types_keep_options() {
        assert!(AttributeType::Select.has_options());
        assert!(AttributeType::Multiselect.has_options());
        assert!(!AttributeType::Text.has_options());
        assert!(!AttributeType::Number.has_options());
    }
}
