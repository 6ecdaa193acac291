use std::sync::Arc;

use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set};
use tracing::instrument;
use uuid::Uuid;

use crate::entities::{offer, Offer, OfferModel};
use crate::errors::ServiceError;

/// Promotional banners: public listing, admin create and delete.
#[derive(Clone)]
pub struct OfferService {
    db: Arc<DatabaseConnection>,
}

impl OfferService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> Result<Vec<OfferModel>, ServiceError> {
        Offer::find()
            .order_by_desc(offer::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    #[instrument(skip(self))]
    pub async fn create(&self, offer_image: String) -> Result<OfferModel, ServiceError> {
        if offer_image.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Offer image is required".to_string(),
            ));
        }

        let model = offer::ActiveModel {
            id: Set(Uuid::new_v4()),
            offer_image: Set(offer_image),
            created_at: Set(chrono::Utc::now()),
        };

        model
            .insert(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, offer_id: Uuid) -> Result<(), ServiceError> {
        let result = Offer::delete_by_id(offer_id)
            .exec(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Offer {} not found",
                offer_id
            )));
        }
        Ok(())
    }
}
