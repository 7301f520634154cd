use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Delivery address owned by one user.
///
/// At most one address per user carries `is_default`; the address
/// service unsets the previous default in the same transaction that
/// sets a new one.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "addresses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub address_line1: String,
    #[sea_orm(nullable)]
    pub area: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
    #[sea_orm(nullable)]
    pub landmark: Option<String>,
    #[sea_orm(nullable)]
    pub latitude: Option<f64>,
    #[sea_orm(nullable)]
    pub longitude: Option<f64>,
    pub address_type: String,
    pub is_default: bool,
    /// Fee precomputed at address save time, when coordinates were
    /// available. Display hint only; checkout re-quotes.
    #[sea_orm(column_type = "Decimal(Some((16, 4)))", nullable)]
    pub delivery_fee: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
