use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, EntityTrait, IntoActiveModel, NotSet, PaginatorTrait,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use validator::Validate;

use super::{not_blank, observe, validated, vendor_performance, LedgerContext};
use crate::auth::{resolve_caller, Caller, Identity};
use crate::entities::{
    distributor, manufacturer, retailer,
    role_assignment::{self, RoleKind},
    vendor,
};
use crate::errors::ServiceError;
use crate::events::Event;

/// Enrollment details for a raw-material supplier.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VendorRegistration {
    #[validate(custom = "not_blank")]
    pub identity: String,
    #[validate(length(max = 255), custom = "not_blank")]
    pub name: String,
    #[validate(length(max = 255))]
    pub location: String,
    #[validate(length(max = 255))]
    pub contact_info: String,
    /// Free-form list of what the vendor supplies, e.g. "Metal, Plastic".
    #[validate(length(max = 255))]
    pub material_types: String,
}

/// Enrollment details shared by manufacturers, distributors and retailers.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ParticipantRegistration {
    #[validate(custom = "not_blank")]
    pub identity: String,
    #[validate(length(max = 255), custom = "not_blank")]
    pub name: String,
    #[validate(length(max = 255))]
    pub location: String,
}

/// The Owner-managed catalogs of vendors, manufacturers, distributors and
/// retailers. Entries are never removed; vendors can only be deactivated.
#[derive(Debug, Clone)]
pub struct RegistryService {
    ctx: LedgerContext,
}

impl RegistryService {
    pub fn new(ctx: LedgerContext) -> Self {
        Self { ctx }
    }

    /// Registers a vendor and opens its performance record. Returns the new id.
    #[instrument(skip(self, input), fields(caller = %caller, identity = %input.identity))]
    pub async fn register_vendor(
        &self,
        caller: &Identity,
        input: VendorRegistration,
    ) -> Result<i32, ServiceError> {
        observe("register_vendor", self.try_register_vendor(caller, input).await)
    }

    async fn try_register_vendor(
        &self,
        caller: &Identity,
        input: VendorRegistration,
    ) -> Result<i32, ServiceError> {
        validated(&input)?;
        let identity = Identity::parse(&input.identity)?;

        let (txn, actor) = self.ctx.begin(caller).await?;
        actor.require_owner("register vendors")?;
        self.ensure_unassigned(&*txn, &identity).await?;

        let now = Utc::now();
        let vendor = vendor::ActiveModel {
            id: NotSet,
            identity: Set(identity.to_string()),
            name: Set(input.name.trim().to_string()),
            location: Set(input.location),
            contact_info: Set(input.contact_info),
            material_types: Set(input.material_types),
            registered_at: Set(now),
            is_active: Set(true),
        }
        .insert(&*txn)
        .await?;

        assign_role(&*txn, &identity, RoleKind::Vendor, vendor.id, now).await?;
        vendor_performance::open_account(&*txn, vendor.id).await?;
        txn.commit().await?;

        info!(vendor_id = vendor.id, "Vendor registered");
        self.ctx.publish([Event::VendorRegistered {
            vendor_id: vendor.id,
            identity: identity.to_string(),
        }]);
        Ok(vendor.id)
    }

    #[instrument(skip(self, input), fields(caller = %caller, identity = %input.identity))]
    pub async fn register_manufacturer(
        &self,
        caller: &Identity,
        input: ParticipantRegistration,
    ) -> Result<i32, ServiceError> {
        observe(
            "register_manufacturer",
            self.register_participant(caller, RoleKind::Manufacturer, input)
                .await,
        )
    }

    #[instrument(skip(self, input), fields(caller = %caller, identity = %input.identity))]
    pub async fn register_distributor(
        &self,
        caller: &Identity,
        input: ParticipantRegistration,
    ) -> Result<i32, ServiceError> {
        observe(
            "register_distributor",
            self.register_participant(caller, RoleKind::Distributor, input)
                .await,
        )
    }

    #[instrument(skip(self, input), fields(caller = %caller, identity = %input.identity))]
    pub async fn register_retailer(
        &self,
        caller: &Identity,
        input: ParticipantRegistration,
    ) -> Result<i32, ServiceError> {
        observe(
            "register_retailer",
            self.register_participant(caller, RoleKind::Retailer, input)
                .await,
        )
    }

    async fn register_participant(
        &self,
        caller: &Identity,
        role: RoleKind,
        input: ParticipantRegistration,
    ) -> Result<i32, ServiceError> {
        validated(&input)?;
        let identity = Identity::parse(&input.identity)?;

        let (txn, actor) = self.ctx.begin(caller).await?;
        actor.require_owner(&format!("register {}s", role.to_string().to_lowercase()))?;
        self.ensure_unassigned(&*txn, &identity).await?;

        let now = Utc::now();
        let name = input.name.trim().to_string();
        let id = match role {
            RoleKind::Manufacturer => {
                manufacturer::ActiveModel {
                    id: NotSet,
                    identity: Set(identity.to_string()),
                    name: Set(name),
                    location: Set(input.location),
                    registered_at: Set(now),
                }
                .insert(&*txn)
                .await?
                .id
            }
            RoleKind::Distributor => {
                distributor::ActiveModel {
                    id: NotSet,
                    identity: Set(identity.to_string()),
                    name: Set(name),
                    location: Set(input.location),
                    registered_at: Set(now),
                }
                .insert(&*txn)
                .await?
                .id
            }
            RoleKind::Retailer => {
                retailer::ActiveModel {
                    id: NotSet,
                    identity: Set(identity.to_string()),
                    name: Set(name),
                    location: Set(input.location),
                    registered_at: Set(now),
                }
                .insert(&*txn)
                .await?
                .id
            }
            RoleKind::Vendor => {
                return Err(ServiceError::InternalError(
                    "vendors register through register_vendor".to_string(),
                ))
            }
        };

        assign_role(&*txn, &identity, role, id, now).await?;
        txn.commit().await?;

        info!(role = %role, id, "Participant registered");
        self.ctx.publish([Event::ParticipantRegistered {
            role,
            id,
            identity: identity.to_string(),
        }]);
        Ok(id)
    }

    /// Stops a vendor from listing or restocking materials. Idempotent; the
    /// vendor's materials and history stay readable.
    #[instrument(skip(self), fields(caller = %caller))]
    pub async fn deactivate_vendor(
        &self,
        caller: &Identity,
        vendor_id: i32,
    ) -> Result<(), ServiceError> {
        observe(
            "deactivate_vendor",
            self.try_deactivate_vendor(caller, vendor_id).await,
        )
    }

    async fn try_deactivate_vendor(
        &self,
        caller: &Identity,
        vendor_id: i32,
    ) -> Result<(), ServiceError> {
        let (txn, actor) = self.ctx.begin(caller).await?;
        actor.require_owner("deactivate vendors")?;

        let vendor = vendor::Entity::find_by_id(vendor_id)
            .one(&*txn)
            .await?
            .ok_or(ServiceError::VendorNotFound(vendor_id))?;

        let changed = vendor.is_active;
        if changed {
            let mut active = vendor.into_active_model();
            active.is_active = Set(false);
            active.update(&*txn).await?;
        }
        txn.commit().await?;

        if changed {
            self.ctx.publish([Event::VendorDeactivated(vendor_id)]);
        }
        Ok(())
    }

    /// Current role of `identity`.
    pub async fn resolve_role(&self, identity: &Identity) -> Result<Caller, ServiceError> {
        resolve_caller(self.ctx.store().conn(), self.ctx.owner(), identity).await
    }

    pub async fn get_vendor(&self, id: i32) -> Result<vendor::Model, ServiceError> {
        vendor::Entity::find_by_id(id)
            .one(self.ctx.store().conn())
            .await?
            .ok_or(ServiceError::VendorNotFound(id))
    }

    pub async fn get_manufacturer(&self, id: i32) -> Result<manufacturer::Model, ServiceError> {
        manufacturer::Entity::find_by_id(id)
            .one(self.ctx.store().conn())
            .await?
            .ok_or(ServiceError::ManufacturerNotFound(id))
    }

    pub async fn get_distributor(&self, id: i32) -> Result<distributor::Model, ServiceError> {
        distributor::Entity::find_by_id(id)
            .one(self.ctx.store().conn())
            .await?
            .ok_or(ServiceError::DistributorNotFound(id))
    }

    pub async fn get_retailer(&self, id: i32) -> Result<retailer::Model, ServiceError> {
        retailer::Entity::find_by_id(id)
            .one(self.ctx.store().conn())
            .await?
            .ok_or(ServiceError::RetailerNotFound(id))
    }

    pub async fn list_vendors(&self) -> Result<Vec<vendor::Model>, ServiceError> {
        Ok(vendor::Entity::find()
            .order_by_asc(vendor::Column::Id)
            .all(self.ctx.store().conn())
            .await?)
    }

    pub async fn list_manufacturers(&self) -> Result<Vec<manufacturer::Model>, ServiceError> {
        Ok(manufacturer::Entity::find()
            .order_by_asc(manufacturer::Column::Id)
            .all(self.ctx.store().conn())
            .await?)
    }

    pub async fn list_distributors(&self) -> Result<Vec<distributor::Model>, ServiceError> {
        Ok(distributor::Entity::find()
            .order_by_asc(distributor::Column::Id)
            .all(self.ctx.store().conn())
            .await?)
    }

    pub async fn list_retailers(&self) -> Result<Vec<retailer::Model>, ServiceError> {
        Ok(retailer::Entity::find()
            .order_by_asc(retailer::Column::Id)
            .all(self.ctx.store().conn())
            .await?)
    }

    pub async fn vendor_count(&self) -> Result<u64, ServiceError> {
        Ok(vendor::Entity::find()
            .count(self.ctx.store().conn())
            .await?)
    }

    pub async fn manufacturer_count(&self) -> Result<u64, ServiceError> {
        Ok(manufacturer::Entity::find()
            .count(self.ctx.store().conn())
            .await?)
    }

    pub async fn distributor_count(&self) -> Result<u64, ServiceError> {
        Ok(distributor::Entity::find()
            .count(self.ctx.store().conn())
            .await?)
    }

    pub async fn retailer_count(&self) -> Result<u64, ServiceError> {
        Ok(retailer::Entity::find()
            .count(self.ctx.store().conn())
            .await?)
    }

    async fn ensure_unassigned<C: ConnectionTrait>(
        &self,
        conn: &C,
        identity: &Identity,
    ) -> Result<(), ServiceError> {
        match resolve_caller(conn, self.ctx.owner(), identity).await? {
            Caller::Unregistered => Ok(()),
            _ => Err(ServiceError::DuplicateIdentity(identity.to_string())),
        }
    }
}

async fn assign_role<C: ConnectionTrait>(
    conn: &C,
    identity: &Identity,
    role: RoleKind,
    role_id: i32,
    at: DateTime<Utc>,
) -> Result<(), ServiceError> {
    role_assignment::ActiveModel {
        identity: Set(identity.to_string()),
        role: Set(role),
        role_id: Set(role_id),
        assigned_at: Set(at),
    }
    .insert(conn)
    .await?;
    Ok(())
}
