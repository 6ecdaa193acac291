use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthenticatedUser;
use crate::entities::{feedback, Feedback, FeedbackModel, Product, User, UserModel};
use crate::errors::ServiceError;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct NewFeedback {
    pub product_id: Uuid,
    #[validate(length(
        min = 10,
        max = 500,
        message = "Description must be between 10 and 500 characters"
    ))]
    pub description: String,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,
    #[validate(length(max = 5, message = "At most five images are allowed"))]
    #[serde(default)]
    pub images: Vec<String>,
}

/// Product reviews. One user may review the same product more than once;
/// the storefront shows them all, newest first.
#[derive(Clone)]
pub struct FeedbackService {
    db: Arc<DatabaseConnection>,
}

impl FeedbackService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, input), fields(user_id = %principal.id))]
    pub async fn submit(
        &self,
        principal: &AuthenticatedUser,
        input: NewFeedback,
    ) -> Result<FeedbackModel, ServiceError> {
        Product::find_by_id(input.product_id)
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;

        let images = serde_json::to_value(&input.images)
            .map_err(|e| ServiceError::InternalError(format!("Image list: {}", e)))?;

        let model = feedback::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(principal.id),
            product_id: Set(input.product_id),
            description: Set(input.description),
            rating: Set(input.rating),
            images: Set(images),
            created_at: Set(chrono::Utc::now()),
        };

        model
            .insert(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Reviews for a product with each author attached, newest first.
    #[instrument(skip(self))]
    pub async fn for_product(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<(FeedbackModel, Option<UserModel>)>, ServiceError> {
        Feedback::find()
            .filter(feedback::Column::ProductId.eq(product_id))
            .find_also_related(User)
            .order_by_desc(feedback::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Author or admin may delete a review.
    #[instrument(skip(self), fields(user_id = %principal.id))]
    pub async fn delete(
        &self,
        principal: &AuthenticatedUser,
        feedback_id: Uuid,
    ) -> Result<(), ServiceError> {
        let row = Feedback::find_by_id(feedback_id)
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Feedback {} not found", feedback_id)))?;

        if row.user_id != principal.id && !principal.is_admin() {
            return Err(ServiceError::Forbidden(
                "You can only delete your own feedback".to_string(),
            ));
        }

        Feedback::delete_by_id(feedback_id)
            .exec(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(())
    }
}
