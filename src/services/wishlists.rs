use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::instrument;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::entities::{
    wishlist_item, Product, ProductModel, WishlistItem, WishlistItemModel,
};
use crate::errors::ServiceError;

/// Per-user saved products. Adding the same product twice is a conflict
/// rather than a silent no-op, so clients can distinguish the cases.
#[derive(Clone)]
pub struct WishlistService {
    db: Arc<DatabaseConnection>,
}

impl WishlistService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// The user's wishlist with the current catalog row for each entry,
    /// newest first.
    #[instrument(skip(self), fields(user_id = %principal.id))]
    pub async fn list(
        &self,
        principal: &AuthenticatedUser,
    ) -> Result<Vec<(WishlistItemModel, Option<ProductModel>)>, ServiceError> {
        WishlistItem::find()
            .filter(wishlist_item::Column::UserId.eq(principal.id))
            .find_also_related(Product)
            .order_by_desc(wishlist_item::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    #[instrument(skip(self), fields(user_id = %principal.id))]
    pub async fn add(
        &self,
        principal: &AuthenticatedUser,
        product_id: Uuid,
    ) -> Result<WishlistItemModel, ServiceError> {
        Product::find_by_id(product_id)
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let existing = WishlistItem::find()
            .filter(wishlist_item::Column::UserId.eq(principal.id))
            .filter(wishlist_item::Column::ProductId.eq(product_id))
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "Product is already in the wishlist".to_string(),
            ));
        }

        let model = wishlist_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(principal.id),
            product_id: Set(product_id),
            created_at: Set(chrono::Utc::now()),
        };

        model
            .insert(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    #[instrument(skip(self), fields(user_id = %principal.id))]
    pub async fn remove(
        &self,
        principal: &AuthenticatedUser,
        product_id: Uuid,
    ) -> Result<(), ServiceError> {
        let result = WishlistItem::delete_many()
            .filter(wishlist_item::Column::UserId.eq(principal.id))
            .filter(wishlist_item::Column::ProductId.eq(product_id))
            .exec(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(
                "Product is not in the wishlist".to_string(),
            ));
        }
        Ok(())
    }
}
