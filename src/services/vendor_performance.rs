use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    IntoActiveModel, QueryFilter, Set,
};
use tracing::instrument;

use super::{observe, LedgerContext};
use crate::auth::Identity;
use crate::entities::{
    vendor,
    vendor_performance::{self, is_valid_rating, MAX_RATING, MIN_RATING, RATING_STEP},
};
use crate::errors::ServiceError;
use crate::events::Event;

/// Opens the zeroed performance row for a newly registered vendor.
pub async fn open_account<C: ConnectionTrait>(conn: &C, vendor_id: i32) -> Result<(), DbErr> {
    vendor_performance::ActiveModel {
        vendor_id: Set(vendor_id),
        total_orders: Set(0),
        completed_orders: Set(0),
        total_quantity_supplied: Set(0),
        last_activity_at: Set(None),
        rating: Set(0),
        is_verified: Set(false),
    }
    .insert(conn)
    .await?;
    Ok(())
}

/// A RECEIVED movement: one more order and `quantity` more units supplied.
pub async fn record_received<C: ConnectionTrait>(
    conn: &C,
    vendor_id: i32,
    quantity: i64,
    at: DateTime<Utc>,
) -> Result<(), ServiceError> {
    let Some(performance) = vendor_performance::Entity::find_by_id(vendor_id)
        .one(conn)
        .await?
    else {
        return Ok(());
    };
    let supplied = performance
        .total_quantity_supplied
        .checked_add(quantity)
        .ok_or_else(|| {
            ServiceError::InvalidInput(format!(
                "vendor {} cannot be credited with {} more units",
                vendor_id, quantity
            ))
        })?;

    let total_orders = performance.total_orders + 1;
    let mut active = performance.into_active_model();
    active.total_orders = Set(total_orders);
    active.total_quantity_supplied = Set(supplied);
    active.last_activity_at = Set(Some(at));
    active.update(conn).await?;
    Ok(())
}

/// A USED movement: the vendor's stock went into a product.
pub async fn record_used<C: ConnectionTrait>(
    conn: &C,
    vendor_id: i32,
    at: DateTime<Utc>,
) -> Result<(), DbErr> {
    vendor_performance::Entity::update_many()
        .col_expr(
            vendor_performance::Column::CompletedOrders,
            Expr::col(vendor_performance::Column::CompletedOrders).add(1),
        )
        .col_expr(
            vendor_performance::Column::LastActivityAt,
            Expr::value(Some(at)),
        )
        .filter(vendor_performance::Column::VendorId.eq(vendor_id))
        .exec(conn)
        .await?;
    Ok(())
}

pub async fn record_returned<C: ConnectionTrait>(
    conn: &C,
    vendor_id: i32,
    at: DateTime<Utc>,
) -> Result<(), DbErr> {
    vendor_performance::Entity::update_many()
        .col_expr(
            vendor_performance::Column::LastActivityAt,
            Expr::value(Some(at)),
        )
        .filter(vendor_performance::Column::VendorId.eq(vendor_id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Owner-managed verification flag and rating per vendor.
#[derive(Debug, Clone)]
pub struct VendorPerformanceService {
    ctx: LedgerContext,
}

impl VendorPerformanceService {
    pub fn new(ctx: LedgerContext) -> Self {
        Self { ctx }
    }

    /// Marks a vendor verified. Verifying twice is a no-op.
    #[instrument(skip(self), fields(caller = %caller))]
    pub async fn verify_vendor(&self, caller: &Identity, vendor_id: i32) -> Result<(), ServiceError> {
        observe("verify_vendor", self.try_verify_vendor(caller, vendor_id).await)
    }

    async fn try_verify_vendor(&self, caller: &Identity, vendor_id: i32) -> Result<(), ServiceError> {
        let (txn, actor) = self.ctx.begin(caller).await?;
        actor.require_owner("verify vendors")?;

        let performance = find_performance(&*txn, vendor_id).await?;
        let changed = !performance.is_verified;
        if changed {
            let mut active = performance.into_active_model();
            active.is_verified = Set(true);
            active.update(&*txn).await?;
        }
        txn.commit().await?;

        if changed {
            self.ctx.publish([Event::VendorVerified(vendor_id)]);
        }
        Ok(())
    }

    /// Overwrites the vendor's rating. `rating` is tenths of a star on the
    /// 10..=50 half-star scale.
    #[instrument(skip(self), fields(caller = %caller))]
    pub async fn rate_vendor(
        &self,
        caller: &Identity,
        vendor_id: i32,
        rating: i32,
    ) -> Result<(), ServiceError> {
        observe("rate_vendor", self.try_rate_vendor(caller, vendor_id, rating).await)
    }

    async fn try_rate_vendor(
        &self,
        caller: &Identity,
        vendor_id: i32,
        rating: i32,
    ) -> Result<(), ServiceError> {
        let (txn, actor) = self.ctx.begin(caller).await?;
        actor.require_owner("rate vendors")?;

        if !is_valid_rating(rating) {
            return Err(ServiceError::InvalidInput(format!(
                "rating must be between {} and {} in steps of {}, got {}",
                MIN_RATING, MAX_RATING, RATING_STEP, rating
            )));
        }

        let mut active = find_performance(&*txn, vendor_id).await?.into_active_model();
        active.rating = Set(rating);
        active.update(&*txn).await?;
        txn.commit().await?;

        self.ctx.publish([Event::VendorRated { vendor_id, rating }]);
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn vendor_performance(
        &self,
        vendor_id: i32,
    ) -> Result<vendor_performance::Model, ServiceError> {
        find_performance(self.ctx.store().conn(), vendor_id).await
    }
}

async fn find_performance<C: ConnectionTrait>(
    conn: &C,
    vendor_id: i32,
) -> Result<vendor_performance::Model, ServiceError> {
    if vendor::Entity::find_by_id(vendor_id).one(conn).await?.is_none() {
        return Err(ServiceError::VendorNotFound(vendor_id));
    }
    vendor_performance::Entity::find_by_id(vendor_id)
        .one(conn)
        .await?
        .ok_or(ServiceError::VendorNotFound(vendor_id))
}
