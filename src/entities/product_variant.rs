use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A purchasable priced configuration of a product (size/weight/unit).
///
/// Once a variant is referenced by a placed order line it is treated as
/// immutable: the order line captures the price, it is never re-read.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_variants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub price: Decimal,
    /// Pre-discount price, when the variant is on offer.
    #[sea_orm(column_type = "Decimal(Some((16, 4)))", nullable)]
    pub original_price: Option<Decimal>,
    #[sea_orm(nullable)]
    pub weight: Option<String>,
    #[sea_orm(nullable)]
    pub unit: Option<String>,
    #[sea_orm(nullable)]
    pub image_url: Option<String>,
    /// At most one variant per product should carry this flag while
    /// active; enforced by convention, resolution falls back gracefully.
    pub is_default: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
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

impl ActiveModelBehavior for ActiveModel {}
