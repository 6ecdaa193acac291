use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Deserialize;
use tracing::{error, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::{
    product, product_variant, Product, ProductModel, ProductVariant, ProductVariantModel,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Admin input for creating a product.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct NewProduct {
    #[validate(length(min = 1, max = 50, message = "Title must be at most 50 characters"))]
    pub title: String,
    #[validate(length(
        min = 100,
        max = 500,
        message = "Description must be between 100 and 500 characters"
    ))]
    pub description: String,
    pub base_price: Decimal,
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,
    pub badge: String,
    #[validate(range(min = 0, max = 99, message = "Discount must be between 0 and 99"))]
    pub discount_percentage: Option<i32>,
}

/// Admin input for updating a product in place. All fields optional.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ProductPatch {
    #[validate(length(min = 1, max = 50, message = "Title must be at most 50 characters"))]
    pub title: Option<String>,
    #[validate(length(
        min = 100,
        max = 500,
        message = "Description must be between 100 and 500 characters"
    ))]
    pub description: Option<String>,
    pub base_price: Option<Decimal>,
    pub category: Option<String>,
    pub badge: Option<String>,
    #[validate(range(min = 0, max = 99, message = "Discount must be between 0 and 99"))]
    pub discount_percentage: Option<i32>,
}

/// Admin input for creating a variant under a product.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct NewVariant {
    #[validate(length(min = 1, message = "Brand is required"))]
    pub brand: String,
    pub storage: String,
    #[validate(length(min = 1, message = "Color is required"))]
    pub color: String,
    pub additional_price: Decimal,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: i32,
    #[validate(length(min = 1, message = "At least one image is required"))]
    pub images: Vec<String>,
    pub screen_type: Option<String>,
    pub cpu: Option<String>,
    #[validate(range(min = 1, max = 8, message = "Cores must be between 1 and 8"))]
    pub cores: Option<i32>,
    pub main_camera: Option<String>,
    pub front_camera: Option<String>,
    #[validate(range(
        min = 1500,
        max = 6000,
        message = "Battery capacity must be between 1500 and 6000"
    ))]
    pub battery_capacity: Option<i32>,
    pub delivery_time: Option<String>,
    pub guarantee: Option<String>,
}

/// Admin input for updating a variant. Stock changes here are catalog
/// corrections; sale decrements go through the order workflow only.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct VariantPatch {
    pub brand: Option<String>,
    pub storage: Option<String>,
    pub color: Option<String>,
    pub additional_price: Option<Decimal>,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: Option<i32>,
    #[validate(length(min = 1, message = "At least one image is required"))]
    pub images: Option<Vec<String>>,
    pub screen_type: Option<String>,
    pub cpu: Option<String>,
    #[validate(range(min = 1, max = 8, message = "Cores must be between 1 and 8"))]
    pub cores: Option<i32>,
    pub main_camera: Option<String>,
    pub front_camera: Option<String>,
    #[validate(range(
        min = 1500,
        max = 6000,
        message = "Battery capacity must be between 1500 and 6000"
    ))]
    pub battery_capacity: Option<i32>,
    pub delivery_time: Option<String>,
    pub guarantee: Option<String>,
}

/// Product and variant catalog management.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

fn word_count(value: &str) -> usize {
    value.split_whitespace().count()
}

/// Derives the stored discounted price from the base price and percentage.
fn discounted_price(base_price: Decimal, percentage: i32) -> Decimal {
    let factor = Decimal::from(100 - percentage) / Decimal::from(100);
    (base_price * factor).round_dp(2)
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    fn check_badge(badge: &str) -> Result<(), ServiceError> {
        if word_count(badge) < 2 {
            return Err(ServiceError::ValidationError(
                "Badge must contain at least two words".to_string(),
            ));
        }
        Ok(())
    }

    fn check_storage(storage: &str) -> Result<(), ServiceError> {
        if storage.is_empty() || word_count(storage) > 2 {
            return Err(ServiceError::ValidationError(
                "Storage must be one or two words".to_string(),
            ));
        }
        Ok(())
    }

    async fn check_title_unique(&self, title: &str, exclude: Option<Uuid>) -> Result<(), ServiceError> {
        let mut query = Product::find().filter(product::Column::Title.eq(title));
        if let Some(id) = exclude {
            query = query.filter(product::Column::Id.ne(id));
        }
        if query
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?
            .is_some()
        {
            return Err(ServiceError::Conflict(format!(
                "A product titled '{}' already exists",
                title
            )));
        }
        Ok(())
    }

    /// (color, storage) must be unique among a product's variants,
    /// case-insensitively.
    async fn check_variant_unique(
        &self,
        product_id: Uuid,
        color: &str,
        storage: &str,
        exclude: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let siblings = ProductVariant::find()
            .filter(product_variant::Column::ProductId.eq(product_id))
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?;

        let clash = siblings.iter().any(|v| {
            Some(v.id) != exclude
                && v.color.eq_ignore_ascii_case(color)
                && v.storage.eq_ignore_ascii_case(storage)
        });

        if clash {
            return Err(ServiceError::Conflict(format!(
                "A variant with color '{}' and storage '{}' already exists",
                color, storage
            )));
        }
        Ok(())
    }

    #[instrument(skip(self, input))]
    pub async fn create_product(&self, input: NewProduct) -> Result<ProductModel, ServiceError> {
        if input.base_price <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Base price must be greater than zero".to_string(),
            ));
        }
        Self::check_badge(&input.badge)?;
        self.check_title_unique(&input.title, None).await?;

        let discounted = input
            .discount_percentage
            .map(|pct| discounted_price(input.base_price, pct));

        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(input.title),
            description: Set(input.description),
            base_price: Set(input.base_price),
            category: Set(input.category),
            badge: Set(input.badge),
            discount_percentage: Set(input.discount_percentage),
            discounted_price: Set(discounted),
            ..Default::default()
        };

        let saved = model.insert(self.db.as_ref()).await.map_err(|e| {
            error!("Failed to insert product: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        self.event_sender
            .send_or_log(Event::ProductCreated(saved.id))
            .await;

        Ok(saved)
    }

    #[instrument(skip(self, patch))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        patch: ProductPatch,
    ) -> Result<ProductModel, ServiceError> {
        let existing = self.get_product(product_id).await?;

        if let Some(title) = &patch.title {
            self.check_title_unique(title, Some(product_id)).await?;
        }
        if let Some(badge) = &patch.badge {
            Self::check_badge(badge)?;
        }
        if let Some(base_price) = patch.base_price {
            if base_price <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Base price must be greater than zero".to_string(),
                ));
            }
        }

        let base_price = patch.base_price.unwrap_or(existing.base_price);
        let percentage = patch.discount_percentage.or(existing.discount_percentage);

        let mut active: product::ActiveModel = existing.into();
        if let Some(title) = patch.title {
            active.title = Set(title);
        }
        if let Some(description) = patch.description {
            active.description = Set(description);
        }
        if let Some(price) = patch.base_price {
            active.base_price = Set(price);
        }
        if let Some(category) = patch.category {
            active.category = Set(category);
        }
        if let Some(badge) = patch.badge {
            active.badge = Set(badge);
        }
        active.discount_percentage = Set(percentage);
        active.discounted_price = Set(percentage.map(|pct| discounted_price(base_price, pct)));

        let updated = active
            .update(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?;

        self.event_sender
            .send_or_log(Event::ProductUpdated(updated.id))
            .await;

        Ok(updated)
    }

    /// Deletes a product and all of its variants.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, product_id: Uuid) -> Result<(), ServiceError> {
        self.get_product(product_id).await?;

        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        ProductVariant::delete_many()
            .filter(product_variant::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Product::delete_by_id(product_id)
            .exec(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        self.event_sender
            .send_or_log(Event::ProductDeleted(product_id))
            .await;

        Ok(())
    }

    pub async fn get_product(&self, product_id: Uuid) -> Result<ProductModel, ServiceError> {
        Product::find_by_id(product_id)
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    /// Product detail together with its variants.
    pub async fn get_product_with_variants(
        &self,
        product_id: Uuid,
    ) -> Result<(ProductModel, Vec<ProductVariantModel>), ServiceError> {
        let product = self.get_product(product_id).await?;
        let variants = ProductVariant::find()
            .filter(product_variant::Column::ProductId.eq(product_id))
            .order_by_asc(product_variant::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok((product, variants))
    }

    /// Public catalog listing, optionally filtered by category.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        category: Option<String>,
    ) -> Result<Vec<ProductModel>, ServiceError> {
        let mut query = Product::find().order_by_desc(product::Column::CreatedAt);
        if let Some(category) = category {
            query = query.filter(product::Column::Category.eq(category));
        }
        query
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    #[instrument(skip(self, input))]
    pub async fn create_variant(
        &self,
        product_id: Uuid,
        input: NewVariant,
    ) -> Result<ProductVariantModel, ServiceError> {
        self.get_product(product_id).await?;
        Self::check_storage(&input.storage)?;
        if input.additional_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Additional price cannot be negative".to_string(),
            ));
        }
        self.check_variant_unique(product_id, &input.color, &input.storage, None)
            .await?;

        let images = serde_json::to_value(&input.images)
            .map_err(|e| ServiceError::InternalError(format!("Image list: {}", e)))?;

        let model = product_variant::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            brand: Set(input.brand),
            storage: Set(input.storage),
            color: Set(input.color),
            additional_price: Set(input.additional_price),
            stock: Set(input.stock),
            images: Set(images),
            screen_type: Set(input.screen_type),
            cpu: Set(input.cpu),
            cores: Set(input.cores),
            main_camera: Set(input.main_camera),
            front_camera: Set(input.front_camera),
            battery_capacity: Set(input.battery_capacity),
            delivery_time: Set(input.delivery_time),
            guarantee: Set(input.guarantee),
            ..Default::default()
        };

        let saved = model
            .insert(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?;

        self.event_sender
            .send_or_log(Event::VariantCreated {
                product_id,
                variant_id: saved.id,
            })
            .await;

        Ok(saved)
    }

    #[instrument(skip(self, patch))]
    pub async fn update_variant(
        &self,
        variant_id: Uuid,
        patch: VariantPatch,
    ) -> Result<ProductVariantModel, ServiceError> {
        let existing = ProductVariant::find_by_id(variant_id)
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::VariantNotFound(format!("Variant {} not found", variant_id))
            })?;

        let color = patch.color.clone().unwrap_or_else(|| existing.color.clone());
        let storage = patch
            .storage
            .clone()
            .unwrap_or_else(|| existing.storage.clone());
        Self::check_storage(&storage)?;
        self.check_variant_unique(existing.product_id, &color, &storage, Some(variant_id))
            .await?;

        if let Some(price) = patch.additional_price {
            if price < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Additional price cannot be negative".to_string(),
                ));
            }
        }

        let images = match &patch.images {
            Some(images) => Some(
                serde_json::to_value(images)
                    .map_err(|e| ServiceError::InternalError(format!("Image list: {}", e)))?,
            ),
            None => None,
        };

        let mut active: product_variant::ActiveModel = existing.into();
        if let Some(brand) = patch.brand {
            active.brand = Set(brand);
        }
        active.storage = Set(storage);
        active.color = Set(color);
        if let Some(price) = patch.additional_price {
            active.additional_price = Set(price);
        }
        if let Some(stock) = patch.stock {
            active.stock = Set(stock);
        }
        if let Some(images) = images {
            active.images = Set(images);
        }
        if let Some(screen_type) = patch.screen_type {
            active.screen_type = Set(Some(screen_type));
        }
        if let Some(cpu) = patch.cpu {
            active.cpu = Set(Some(cpu));
        }
        if let Some(cores) = patch.cores {
            active.cores = Set(Some(cores));
        }
        if let Some(main_camera) = patch.main_camera {
            active.main_camera = Set(Some(main_camera));
        }
        if let Some(front_camera) = patch.front_camera {
            active.front_camera = Set(Some(front_camera));
        }
        if let Some(battery) = patch.battery_capacity {
            active.battery_capacity = Set(Some(battery));
        }
        if let Some(delivery_time) = patch.delivery_time {
            active.delivery_time = Set(Some(delivery_time));
        }
        if let Some(guarantee) = patch.guarantee {
            active.guarantee = Set(Some(guarantee));
        }

        active
            .update(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    #[instrument(skip(self))]
    pub async fn delete_variant(&self, variant_id: Uuid) -> Result<(), ServiceError> {
        let result = ProductVariant::delete_by_id(variant_id)
            .exec(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?;

        if result.rows_affected == 0 {
            return Err(ServiceError::VariantNotFound(format!(
                "Variant {} not found",
                variant_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn discounted_price_rounds_to_cents() {
        assert_eq!(discounted_price(dec!(1000), 10), dec!(900.00));
        assert_eq!(discounted_price(dec!(699.99), 25), dec!(524.99));
        assert_eq!(discounted_price(dec!(50), 0), dec!(50.00));
    }

    #[test]
    fn badge_needs_two_words() {
        assert!(CatalogService::check_badge("Best Seller").is_ok());
        assert!(CatalogService::check_badge("New Arrival Today").is_ok());
        assert!(CatalogService::check_badge("Hot").is_err());
    }

    #[test]
    fn storage_allows_at_most_two_words() {
        assert!(CatalogService::check_storage("256GB").is_ok());
        assert!(CatalogService::check_storage("256 GB").is_ok());
        assert!(CatalogService::check_storage("256 GB UFS").is_err());
        assert!(CatalogService::check_storage("").is_err());
    }
}
