use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, NotSet,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use validator::Validate;

use super::{
    audit::{self, HistoryEntry},
    non_negative, not_blank, observe, require_positive, require_price, validated,
    vendor_performance, LedgerContext,
};
use crate::auth::{Actor, Caller, Identity};
use crate::entities::{material, vendor};
use crate::errors::ServiceError;
use crate::events::Event;

/// A new stock listing. The owning vendor is chosen by the caller's role.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MaterialDetails {
    #[validate(length(max = 255), custom = "not_blank")]
    pub name: String,
    #[validate(custom = "not_blank")]
    pub category: String,
    #[validate(custom = "not_blank")]
    pub unit: String,
    #[validate(range(min = 1))]
    pub quantity: i64,
    #[validate(custom = "non_negative")]
    pub price_per_unit: Decimal,
}

/// Raw-material stock per vendor: what was received, what is still free.
#[derive(Debug, Clone)]
pub struct InventoryService {
    ctx: LedgerContext,
}

impl InventoryService {
    pub fn new(ctx: LedgerContext) -> Self {
        Self { ctx }
    }

    /// Lists new stock for `vendor_id`. The Owner may list for any active
    /// vendor; a vendor always lists for itself, whatever `vendor_id` says.
    #[instrument(skip(self, details), fields(caller = %caller, material = %details.name))]
    pub async fn add_material(
        &self,
        caller: &Identity,
        vendor_id: i32,
        details: MaterialDetails,
    ) -> Result<i32, ServiceError> {
        observe(
            "add_material",
            self.try_add_material(caller, Some(vendor_id), details).await,
        )
    }

    /// Vendor self-service listing; only vendors may call it.
    #[instrument(skip(self, details), fields(caller = %caller, material = %details.name))]
    pub async fn vendor_add_material(
        &self,
        caller: &Identity,
        details: MaterialDetails,
    ) -> Result<i32, ServiceError> {
        observe(
            "vendor_add_material",
            self.try_add_material(caller, None, details).await,
        )
    }

    async fn try_add_material(
        &self,
        caller: &Identity,
        requested_vendor: Option<i32>,
        details: MaterialDetails,
    ) -> Result<i32, ServiceError> {
        require_positive("quantity", details.quantity)?;
        require_price(details.price_per_unit)?;
        validated(&details)?;

        let (txn, actor) = self.ctx.begin(caller).await?;
        let vendor_id = match (actor.caller, requested_vendor) {
            (Caller::Owner, Some(vendor_id)) => vendor_id,
            (Caller::Vendor(own_id), _) => own_id,
            _ => return Err(actor.denied("list materials")),
        };

        let vendor = vendor::Entity::find_by_id(vendor_id)
            .one(&*txn)
            .await?
            .filter(|v| v.is_active)
            .ok_or(ServiceError::VendorNotFound(vendor_id))?;

        let now = Utc::now();
        let material = material::ActiveModel {
            id: NotSet,
            name: Set(details.name.trim().to_string()),
            category: Set(details.category.trim().to_string()),
            unit: Set(details.unit.trim().to_string()),
            price_per_unit: Set(details.price_per_unit),
            vendor_id: Set(vendor.id),
            total_quantity: Set(details.quantity),
            available_quantity: Set(details.quantity),
            added_at: Set(now),
            is_active: Set(true),
        }
        .insert(&*txn)
        .await?;

        audit::record_supply(
            &*txn,
            HistoryEntry::for_material(&material, details.quantity, actor.identity.as_str(), now),
        )
        .await?;
        vendor_performance::record_received(&*txn, vendor.id, details.quantity, now).await?;
        txn.commit().await?;

        info!(
            material_id = material.id,
            vendor_id = vendor.id,
            quantity = details.quantity,
            "Material added"
        );
        self.ctx.publish([Event::MaterialAdded {
            material_id: material.id,
            vendor_id: vendor.id,
            quantity: details.quantity,
            price_per_unit: material.price_per_unit,
        }]);
        Ok(material.id)
    }

    /// Adds `quantity` to both total and available stock at a new unit price.
    #[instrument(skip(self), fields(caller = %caller))]
    pub async fn restock_material(
        &self,
        caller: &Identity,
        material_id: i32,
        quantity: i64,
        price_per_unit: Decimal,
    ) -> Result<material::Model, ServiceError> {
        observe(
            "restock_material",
            self.try_restock(caller, material_id, quantity, price_per_unit, false)
                .await,
        )
    }

    /// Vendor self-service restock of one of the caller's own materials.
    #[instrument(skip(self), fields(caller = %caller))]
    pub async fn vendor_restock_material(
        &self,
        caller: &Identity,
        material_id: i32,
        quantity: i64,
        price_per_unit: Decimal,
    ) -> Result<material::Model, ServiceError> {
        observe(
            "vendor_restock_material",
            self.try_restock(caller, material_id, quantity, price_per_unit, true)
                .await,
        )
    }

    async fn try_restock(
        &self,
        caller: &Identity,
        material_id: i32,
        quantity: i64,
        price_per_unit: Decimal,
        vendor_only: bool,
    ) -> Result<material::Model, ServiceError> {
        require_positive("quantity", quantity)?;
        require_price(price_per_unit)?;

        let (txn, actor) = self.ctx.begin(caller).await?;
        let allowed = match actor.caller {
            Caller::Vendor(_) => true,
            Caller::Owner => !vendor_only,
            _ => false,
        };
        if !allowed {
            return Err(actor.denied("restock materials"));
        }
        let material = active_material(&*txn, material_id).await?;
        ensure_stock_keeper(&actor, &material, "restock this material")?;

        let vendor = vendor::Entity::find_by_id(material.vendor_id)
            .one(&*txn)
            .await?
            .filter(|v| v.is_active)
            .ok_or(ServiceError::VendorNotFound(material.vendor_id))?;

        let (total, available) = match (
            material.total_quantity.checked_add(quantity),
            material.available_quantity.checked_add(quantity),
        ) {
            (Some(total), Some(available)) => (total, available),
            _ => {
                return Err(ServiceError::InvalidInput(format!(
                    "restocking {} units would overflow the stock of material {}",
                    quantity, material_id
                )))
            }
        };

        let now = Utc::now();
        let mut active = material.into_active_model();
        active.total_quantity = Set(total);
        active.available_quantity = Set(available);
        active.price_per_unit = Set(price_per_unit);
        let material = active.update(&*txn).await?;

        audit::record_supply(
            &*txn,
            HistoryEntry::for_material(&material, quantity, actor.identity.as_str(), now),
        )
        .await?;
        vendor_performance::record_received(&*txn, vendor.id, quantity, now).await?;
        txn.commit().await?;

        self.ctx.publish([Event::MaterialRestocked {
            material_id,
            quantity,
            total_quantity: material.total_quantity,
        }]);
        Ok(material)
    }

    /// Hands unconsumed stock back to the vendor, shrinking total and available.
    #[instrument(skip(self), fields(caller = %caller))]
    pub async fn return_material(
        &self,
        caller: &Identity,
        material_id: i32,
        quantity: i64,
    ) -> Result<material::Model, ServiceError> {
        observe(
            "return_material",
            self.try_return(caller, material_id, quantity).await,
        )
    }

    async fn try_return(
        &self,
        caller: &Identity,
        material_id: i32,
        quantity: i64,
    ) -> Result<material::Model, ServiceError> {
        require_positive("quantity", quantity)?;

        let (txn, actor) = self.ctx.begin(caller).await?;
        if !matches!(actor.caller, Caller::Owner | Caller::Vendor(_)) {
            return Err(actor.denied("return materials"));
        }
        let material = active_material(&*txn, material_id).await?;
        ensure_stock_keeper(&actor, &material, "return this material")?;

        if quantity > material.available_quantity {
            return Err(ServiceError::InsufficientInventory {
                material_id,
                requested: quantity,
                available: material.available_quantity,
            });
        }

        let now = Utc::now();
        let vendor_id = material.vendor_id;
        let total = material.total_quantity - quantity;
        let available = material.available_quantity - quantity;
        let mut active = material.into_active_model();
        active.total_quantity = Set(total);
        active.available_quantity = Set(available);
        let material = active.update(&*txn).await?;

        audit::record_return(
            &*txn,
            HistoryEntry::for_material(&material, quantity, actor.identity.as_str(), now),
        )
        .await?;
        vendor_performance::record_returned(&*txn, vendor_id, now).await?;
        txn.commit().await?;

        self.ctx.publish([Event::MaterialReturned {
            material_id,
            quantity,
            available_quantity: material.available_quantity,
        }]);
        Ok(material)
    }

    /// Retires a material. Idempotent; its history stays readable.
    #[instrument(skip(self), fields(caller = %caller))]
    pub async fn deactivate_material(
        &self,
        caller: &Identity,
        material_id: i32,
    ) -> Result<(), ServiceError> {
        observe(
            "deactivate_material",
            self.try_deactivate(caller, material_id).await,
        )
    }

    async fn try_deactivate(&self, caller: &Identity, material_id: i32) -> Result<(), ServiceError> {
        let (txn, actor) = self.ctx.begin(caller).await?;
        if !matches!(actor.caller, Caller::Owner | Caller::Vendor(_)) {
            return Err(actor.denied("deactivate materials"));
        }
        let material = material::Entity::find_by_id(material_id)
            .one(&*txn)
            .await?
            .ok_or(ServiceError::MaterialNotFound(material_id))?;
        ensure_stock_keeper(&actor, &material, "deactivate this material")?;

        let changed = material.is_active;
        if changed {
            let mut active = material.into_active_model();
            active.is_active = Set(false);
            active.update(&*txn).await?;
        }
        txn.commit().await?;

        if changed {
            self.ctx.publish([Event::MaterialDeactivated(material_id)]);
        }
        Ok(())
    }

    pub async fn get_material(&self, material_id: i32) -> Result<material::Model, ServiceError> {
        material::Entity::find_by_id(material_id)
            .one(self.ctx.store().conn())
            .await?
            .ok_or(ServiceError::MaterialNotFound(material_id))
    }

    pub async fn list_materials(&self) -> Result<Vec<material::Model>, ServiceError> {
        Ok(material::Entity::find()
            .order_by_asc(material::Column::Id)
            .all(self.ctx.store().conn())
            .await?)
    }

    pub async fn materials_by_vendor(
        &self,
        vendor_id: i32,
    ) -> Result<Vec<material::Model>, ServiceError> {
        let conn = self.ctx.store().conn();
        if vendor::Entity::find_by_id(vendor_id).one(conn).await?.is_none() {
            return Err(ServiceError::VendorNotFound(vendor_id));
        }
        Ok(material::Entity::find()
            .filter(material::Column::VendorId.eq(vendor_id))
            .order_by_asc(material::Column::Id)
            .all(conn)
            .await?)
    }

    pub async fn material_count(&self) -> Result<u64, ServiceError> {
        Ok(material::Entity::find()
            .count(self.ctx.store().conn())
            .await?)
    }
}

/// Takes `quantity` out of a material's free stock on behalf of `product_id`
/// and appends the matching USED row.
///
/// Must run in the same transaction that writes the product's usage record.
pub(crate) async fn deduct<C: ConnectionTrait>(
    conn: &C,
    actor: &Actor,
    material_id: i32,
    product_id: i32,
    quantity: i64,
) -> Result<material::Model, ServiceError> {
    let material = active_material(conn, material_id).await?;
    if quantity > material.available_quantity {
        return Err(ServiceError::InsufficientInventory {
            material_id,
            requested: quantity,
            available: material.available_quantity,
        });
    }

    let now = Utc::now();
    let available = material.available_quantity - quantity;
    let mut active = material.into_active_model();
    active.available_quantity = Set(available);
    let material = active.update(conn).await?;

    audit::record_usage(
        conn,
        HistoryEntry::for_material(&material, quantity, actor.identity.as_str(), now)
            .with_product(product_id),
    )
    .await?;
    vendor_performance::record_used(conn, material.vendor_id, now).await?;
    Ok(material)
}

async fn active_material<C: ConnectionTrait>(
    conn: &C,
    material_id: i32,
) -> Result<material::Model, ServiceError> {
    material::Entity::find_by_id(material_id)
        .one(conn)
        .await?
        .filter(|m| m.is_active)
        .ok_or(ServiceError::MaterialNotFound(material_id))
}

/// Owner, or the vendor that owns `material`.
fn ensure_stock_keeper(
    actor: &Actor,
    material: &material::Model,
    operation: &str,
) -> Result<(), ServiceError> {
    match actor.caller {
        Caller::Owner => Ok(()),
        Caller::Vendor(id) if id == material.vendor_id => Ok(()),
        _ => Err(actor.denied(operation)),
    }
}
