use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;
use serde::{Deserialize, Serialize};

use super::product::Stage;

/// When a product first reached each stage. `None` means not reached yet;
/// once set a field is never overwritten.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "product_timelines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub product_id: i32,
    pub created_at: DateTimeUtc,
    pub materials_assigned_at: Option<DateTimeUtc>,
    pub manufacturing_started_at: Option<DateTimeUtc>,
    pub distribution_started_at: Option<DateTimeUtc>,
    pub retail_received_at: Option<DateTimeUtc>,
    pub sold_at: Option<DateTimeUtc>,
}

impl Model {
    pub fn reached_at(&self, stage: Stage) -> Option<DateTimeUtc> {
        match stage {
            Stage::Init => Some(self.created_at),
            Stage::MaterialsAssigned => self.materials_assigned_at,
            Stage::Manufacturing => self.manufacturing_started_at,
            Stage::Distribution => self.distribution_started_at,
            Stage::Retail => self.retail_received_at,
            Stage::Sold => self.sold_at,
        }
    }
}

impl ActiveModel {
    /// Stamps the milestone for `stage` unless it is already recorded.
    pub fn stamp(&mut self, current: &Model, stage: Stage, at: DateTimeUtc) {
        if current.reached_at(stage).is_some() {
            return;
        }
        match stage {
            Stage::Init => {}
            Stage::MaterialsAssigned => self.materials_assigned_at = Set(Some(at)),
            Stage::Manufacturing => self.manufacturing_started_at = Set(Some(at)),
            Stage::Distribution => self.distribution_started_at = Set(Some(at)),
            Stage::Retail => self.retail_received_at = Set(Some(at)),
            Stage::Sold => self.sold_at = Set(Some(at)),
        }
    }
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
