use std::sync::Arc;

use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder,
};
use tracing::{error, instrument, warn};
use uuid::Uuid;

use crate::entities::{product_variant, Product, ProductVariant, ProductVariantModel};
use crate::errors::ServiceError;

/// One line of a stock check: the product being bought and how many units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockRequirement {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Validates and mutates per-variant stock counts.
///
/// `validate_availability` is advisory: it is run before order creation and
/// again before finalization, but the authoritative guard is
/// `decrement_guarded`, whose conditional update can only take stock to
/// zero, never below. Two finalizations racing for the last unit both pass
/// the advisory check; exactly one survives the decrement.
#[derive(Clone)]
pub struct StockService {
    db: Arc<DatabaseConnection>,
}

impl StockService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Confirms every requirement has a variant with enough stock.
    /// Fails fast on the first shortfall.
    #[instrument(skip(self, items))]
    pub async fn validate_availability(
        &self,
        items: &[StockRequirement],
    ) -> Result<(), ServiceError> {
        Self::validate_availability_on(self.db.as_ref(), items).await
    }

    /// Transaction-aware variant of [`Self::validate_availability`].
    pub async fn validate_availability_on<C: ConnectionTrait>(
        conn: &C,
        items: &[StockRequirement],
    ) -> Result<(), ServiceError> {
        for item in items {
            let (title, variant) = Self::resolve_variant(conn, item.product_id).await?;

            if variant.stock < item.quantity {
                warn!(
                    product_id = %item.product_id,
                    available = variant.stock,
                    requested = item.quantity,
                    "insufficient stock"
                );
                return Err(ServiceError::InsufficientStock {
                    product: title,
                    available: variant.stock,
                    requested: item.quantity,
                });
            }
        }

        Ok(())
    }

    /// Decrements a variant's stock by `quantity` with a floor at zero.
    ///
    /// The condition lives in the UPDATE itself, so concurrent callers
    /// cannot both take the last unit: the loser matches zero rows and gets
    /// `InsufficientStock`. Meant to run inside the finalize transaction so
    /// a failed line rolls the whole order back.
    pub async fn decrement_guarded<C: ConnectionTrait>(
        conn: &C,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<ProductVariantModel, ServiceError> {
        let (title, variant) = Self::resolve_variant(conn, product_id).await?;

        let result = ProductVariant::update_many()
            .col_expr(
                product_variant::Column::Stock,
                Expr::col(product_variant::Column::Stock).sub(quantity),
            )
            .filter(product_variant::Column::Id.eq(variant.id))
            .filter(product_variant::Column::Stock.gte(quantity))
            .exec(conn)
            .await
            .map_err(|e| {
                error!("Failed to decrement stock for variant {}: {}", variant.id, e);
                ServiceError::DatabaseError(e)
            })?;

        if result.rows_affected == 0 {
            let current = ProductVariant::find_by_id(variant.id)
                .one(conn)
                .await
                .map_err(ServiceError::DatabaseError)?
                .map(|v| v.stock)
                .unwrap_or(0);
            return Err(ServiceError::InsufficientStock {
                product: title,
                available: current,
                requested: quantity,
            });
        }

        Ok(variant)
    }

    /// Finds the variant backing a product, with the product title for error
    /// reporting. A product without any variant is a catalog defect surfaced
    /// as `VariantNotFound`.
    async fn resolve_variant<C: ConnectionTrait>(
        conn: &C,
        product_id: Uuid,
    ) -> Result<(String, ProductVariantModel), ServiceError> {
        let product = Product::find_by_id(product_id)
            .one(conn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let variant = ProductVariant::find()
            .filter(product_variant::Column::ProductId.eq(product_id))
            .order_by_asc(product_variant::Column::CreatedAt)
            .one(conn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::VariantNotFound(format!(
                    "No variant found for product {}",
                    product.title
                ))
            })?;

        Ok((product.title, variant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_requirement_list_passes() {
        let service = StockService::new(Arc::new(DatabaseConnection::Disconnected));
        assert!(service.validate_availability(&[]).await.is_ok());
    }
}
