use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A stocked raw material owned by exactly one vendor.
///
/// `0 <= available_quantity <= total_quantity` holds after every committed
/// command; `total_quantity - available_quantity` is what products consumed.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "materials")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub category: String,
    pub unit: String,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub price_per_unit: Decimal,
    pub vendor_id: i32,
    pub total_quantity: i64,
    pub available_quantity: i64,
    pub added_at: DateTimeUtc,
    pub is_active: bool,
}

impl Model {
    /// Quantity already bound to products.
    pub fn consumed_quantity(&self) -> i64 {
        self.total_quantity - self.available_quantity
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::vendor::Entity",
        from = "Column::VendorId",
        to = "super::vendor::Column::Id"
    )]
    Vendor,
    #[sea_orm(has_many = "super::product_material_usage::Entity")]
    Usages,
}

impl Related<super::vendor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vendor.def()
    }
}

impl Related<super::product_material_usage::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Usages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
