use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    entities::contact_submission::{self, Entity as ContactEntity},
    errors::ServiceError,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactSubmissionResponse {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub submitted_at: DateTime<Utc>,
    pub is_read: bool,
}

impl From<contact_submission::Model> for ContactSubmissionResponse {
    fn from(model: contact_submission::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
            subject: model.subject,
            message: model.message,
            submitted_at: model.submitted_at,
            is_read: model.is_read,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
    #[validate(email(message = "Email must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, max = 200, message = "Subject must be 1-200 characters"))]
    pub subject: String,
    #[validate(length(min = 1, max = 5000, message = "Message must be 1-5000 characters"))]
    pub message: String,
}

/// Storefront contact form inbox.
#[derive(Clone)]
pub struct ContactService {
    db: Arc<DatabaseConnection>,
}

impl ContactService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(subject = %request.subject))]
    pub async fn submit(
        &self,
        request: ContactRequest,
    ) -> Result<ContactSubmissionResponse, ServiceError> {
        request.validate()?;

        let created = contact_submission::ActiveModel {
            name: Set(request.name.trim().to_string()),
            email: Set(request.email.trim().to_string()),
            subject: Set(request.subject.trim().to_string()),
            message: Set(request.message),
            submitted_at: Set(Utc::now()),
            is_read: Set(false),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(submission_id = created.id, "Contact submission received");
        Ok(created.into())
    }

    pub async fn list_submissions(&self) -> Result<Vec<ContactSubmissionResponse>, ServiceError> {
        let submissions = ContactEntity::find()
            .order_by_desc(contact_submission::Column::SubmittedAt)
            .order_by_desc(contact_submission::Column::Id)
            .all(&*self.db)
            .await?;
        Ok(submissions.into_iter().map(Into::into).collect())
    }

    /// Flips the read flag and returns the new state.
    #[instrument(skip(self))]
    pub async fn toggle_read(&self, id: i32) -> Result<ContactSubmissionResponse, ServiceError> {
        let existing = ContactEntity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| submission_not_found(id))?;

        let is_read = !existing.is_read;
        let mut active: contact_submission::ActiveModel = existing.into();
        active.is_read = Set(is_read);
        let updated = active.update(&*self.db).await?;

        info!(submission_id = id, is_read, "Contact submission read flag toggled");
        Ok(updated.into())
    }

    #[instrument(skip(self))]
    pub async fn delete_submission(&self, id: i32) -> Result<(), ServiceError> {
        let result = ContactEntity::delete_by_id(id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(submission_not_found(id));
        }
        info!(submission_id = id, "Contact submission deleted");
        Ok(())
    }
}

fn submission_not_found(id: i32) -> ServiceError {
    ServiceError::NotFound(format!("Contact submission with ID {} not found.", id))
}
