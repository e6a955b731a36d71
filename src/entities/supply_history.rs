use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// What happened to the material quantity in a history row.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupplyKind {
    /// Stock delivered by the vendor (initial listing or restock).
    #[sea_orm(string_value = "RECEIVED")]
    #[strum(serialize = "RECEIVED")]
    Received,
    /// Stock bound to a product.
    #[sea_orm(string_value = "USED")]
    #[strum(serialize = "USED")]
    Used,
    /// Unconsumed stock taken back by the vendor.
    #[sea_orm(string_value = "RETURNED")]
    #[strum(serialize = "RETURNED")]
    Returned,
}

/// Append-only movement log. Rows are inserted once and never updated.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "supply_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub material_id: i32,
    pub vendor_id: i32,
    /// 0 when the movement is not tied to a product.
    pub product_id: i32,
    pub quantity: i64,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub price_per_unit: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub total_amount: Decimal,
    pub kind: SupplyKind,
    pub actor: String,
    pub supplied_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::material::Entity",
        from = "Column::MaterialId",
        to = "super::material::Column::Id"
    )]
    Material,
}

impl Related<super::material::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Material.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
