use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle stage of a product. Stages only ever move forward, one step at a time.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
pub enum Stage {
    #[sea_orm(num_value = 0)]
    Init,
    #[sea_orm(num_value = 1)]
    MaterialsAssigned,
    #[sea_orm(num_value = 2)]
    Manufacturing,
    #[sea_orm(num_value = 3)]
    Distribution,
    #[sea_orm(num_value = 4)]
    Retail,
    #[sea_orm(num_value = 5)]
    Sold,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Init,
        Stage::MaterialsAssigned,
        Stage::Manufacturing,
        Stage::Distribution,
        Stage::Retail,
        Stage::Sold,
    ];

    pub fn code(self) -> i32 {
        match self {
            Stage::Init => 0,
            Stage::MaterialsAssigned => 1,
            Stage::Manufacturing => 2,
            Stage::Distribution => 3,
            Stage::Retail => 4,
            Stage::Sold => 5,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.code() == code)
    }

    /// The only stage reachable from `self`, if any.
    pub fn next(self) -> Option<Self> {
        Self::from_code(self.code() + 1)
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Init => "Product Created - Awaiting Materials",
            Stage::MaterialsAssigned => "Materials Assigned - Ready for Manufacturing",
            Stage::Manufacturing => "Manufacturing in Progress",
            Stage::Distribution => "In Distribution",
            Stage::Retail => "At Retail Store",
            Stage::Sold => "Sold to Consumer",
        }
    }

    /// Materials may still be added while nobody has started building.
    pub fn accepts_materials(self) -> bool {
        matches!(self, Stage::Init | Stage::MaterialsAssigned)
    }
}

/// Label for a raw stage number; anything outside 0..=5 is "Unknown".
pub fn stage_label(code: i32) -> &'static str {
    Stage::from_code(code).map(Stage::label).unwrap_or("Unknown")
}

/// A product moving through the supply chain.
///
/// `manufacturer_id`, `distributor_id` and `retailer_id` stay 0 until the
/// stage transition that assigns them.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub description: String,
    pub target_quantity: i64,
    pub manufacturer_id: i32,
    pub distributor_id: i32,
    pub retailer_id: i32,
    pub stage: Stage,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::product_material_usage::Entity")]
    Usages,
    #[sea_orm(has_one = "super::product_timeline::Entity")]
    Timeline,
}

impl Related<super::product_material_usage::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Usages.def()
    }
}

impl Related<super::product_timeline::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Timeline.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, "Product Created - Awaiting Materials")]
    #[case(1, "Materials Assigned - Ready for Manufacturing")]
    #[case(2, "Manufacturing in Progress")]
    #[case(3, "In Distribution")]
    #[case(4, "At Retail Store")]
    #[case(5, "Sold to Consumer")]
    #[case(6, "Unknown")]
    #[case(-1, "Unknown")]
    fn labels_by_code(#[case] code: i32, #[case] expected: &str) {
        assert_eq!(stage_label(code), expected);
    }

    #[test]
    fn stages_advance_one_step_at_a_time() {
        let mut walked = vec![Stage::Init];
        while let Some(next) = walked.last().and_then(|s| s.next()) {
            walked.push(next);
        }
        assert_eq!(walked, Stage::ALL.to_vec());
        assert!(walked.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(Stage::Sold.next(), None);
    }

    #[test]
    fn only_early_stages_accept_materials() {
        assert!(Stage::Init.accepts_materials());
        assert!(Stage::MaterialsAssigned.accepts_materials());
        assert!(!Stage::Manufacturing.accepts_materials());
        assert!(!Stage::Sold.accepts_materials());
    }
}
