use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lowest accepted rating (1.0 stars).
pub const MIN_RATING: i32 = 10;
/// Highest accepted rating (5.0 stars).
pub const MAX_RATING: i32 = 50;
/// Ratings move in half-star steps.
pub const RATING_STEP: i32 = 5;

/// Per-vendor activity counters. `rating` is tenths of a star, 0 = unrated.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vendor_performance")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub vendor_id: i32,
    pub total_orders: i64,
    pub completed_orders: i64,
    pub total_quantity_supplied: i64,
    pub last_activity_at: Option<DateTimeUtc>,
    pub rating: i32,
    pub is_verified: bool,
}

impl Model {
    /// Rating in stars, e.g. 45 -> 4.5.
    pub fn stars(&self) -> f32 {
        self.rating as f32 / 10.0
    }
}

/// Whether `rating` lies on the 1.0..=5.0 half-star scale.
pub fn is_valid_rating(rating: i32) -> bool {
    (MIN_RATING..=MAX_RATING).contains(&rating) && rating % RATING_STEP == 0
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::vendor::Entity",
        from = "Column::VendorId",
        to = "super::vendor::Column::Id"
    )]
    Vendor,
}

impl Related<super::vendor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vendor.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(10, true)]
    #[case(15, true)]
    #[case(45, true)]
    #[case(50, true)]
    #[case(0, false)]
    #[case(5, false)]
    #[case(12, false)]
    #[case(55, false)]
    #[case(-10, false)]
    fn rating_scale(#[case] rating: i32, #[case] valid: bool) {
        assert_eq!(is_valid_rating(rating), valid);
    }
}
