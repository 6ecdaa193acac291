use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Product variant. (color, storage) is unique per product case-insensitively,
/// enforced by the catalog service. Stock is the only field the order
/// workflow mutates.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_variants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub brand: String,
    pub storage: String,
    pub color: String,
    /// Added to the product base price for display
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub additional_price: Decimal,
    pub stock: i32,
    /// JSON array of image URLs, at least one
    #[sea_orm(column_type = "Json")]
    pub images: Json,
    #[sea_orm(nullable)]
    pub screen_type: Option<String>,
    #[sea_orm(nullable)]
    pub cpu: Option<String>,
    #[sea_orm(nullable)]
    pub cores: Option<i32>,
    #[sea_orm(nullable)]
    pub main_camera: Option<String>,
    #[sea_orm(nullable)]
    pub front_camera: Option<String>,
    #[sea_orm(nullable)]
    pub battery_capacity: Option<i32>,
    #[sea_orm(nullable)]
    pub delivery_time: Option<String>,
    #[sea_orm(nullable)]
    pub guarantee: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            active_model.created_at = Set(now);
        }
        if let ActiveValue::NotSet = active_model.updated_at {
            active_model.updated_at = Set(Some(now));
        }

        Ok(active_model)
    }
}
