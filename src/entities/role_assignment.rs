use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Registry a role-holding identity was enrolled in.
///
/// The Owner is not stored here: it is fixed by configuration when the
/// ledger is opened.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum RoleKind {
    #[sea_orm(string_value = "VENDOR")]
    Vendor,
    #[sea_orm(string_value = "MANUFACTURER")]
    Manufacturer,
    #[sea_orm(string_value = "DISTRIBUTOR")]
    Distributor,
    #[sea_orm(string_value = "RETAILER")]
    Retailer,
}

/// One row per registered identity. The primary key on `identity` is what
/// keeps an identity from holding two roles across the four registries.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "role_assignments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub identity: String,
    pub role: RoleKind,
    pub role_id: i32,
    pub assigned_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
