use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, NotSet,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use validator::Validate;

use super::{inventory, not_blank, observe, require_positive, validated, LedgerContext};
use crate::auth::{Actor, Caller, Identity};
use crate::entities::{
    product::{self, Stage},
    product_material_usage, product_timeline,
};
use crate::errors::ServiceError;
use crate::events::Event;

pub use crate::entities::product::stage_label;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewProduct {
    #[validate(length(max = 255), custom = "not_blank")]
    pub name: String,
    #[validate(length(max = 1024))]
    pub description: String,
    #[validate(range(min = 1))]
    pub target_quantity: i64,
}

/// Stage transitions after materials are in place. Each one is legal from
/// exactly one stage and for exactly one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    StartManufacturing,
    StartDistribution,
    ReceiveAtRetail,
    MarkAsSold,
}

impl Transition {
    fn operation(self) -> &'static str {
        match self {
            Transition::StartManufacturing => "start_manufacturing",
            Transition::StartDistribution => "start_distribution",
            Transition::ReceiveAtRetail => "receive_at_retail",
            Transition::MarkAsSold => "mark_as_sold",
        }
    }

    fn from(self) -> Stage {
        match self {
            Transition::StartManufacturing => Stage::MaterialsAssigned,
            Transition::StartDistribution => Stage::Manufacturing,
            Transition::ReceiveAtRetail => Stage::Distribution,
            Transition::MarkAsSold => Stage::Retail,
        }
    }

    fn to(self) -> Stage {
        match self {
            Transition::StartManufacturing => Stage::Manufacturing,
            Transition::StartDistribution => Stage::Distribution,
            Transition::ReceiveAtRetail => Stage::Retail,
            Transition::MarkAsSold => Stage::Sold,
        }
    }

    /// Registry id of the caller if its role may attempt this transition.
    fn party(self, caller: Caller) -> Option<i32> {
        match (self, caller) {
            (Transition::StartManufacturing, Caller::Manufacturer(id)) => Some(id),
            (Transition::StartDistribution, Caller::Distributor(id)) => Some(id),
            (Transition::ReceiveAtRetail, Caller::Retailer(id)) => Some(id),
            (Transition::MarkAsSold, Caller::Retailer(id)) => Some(id),
            _ => None,
        }
    }
}

/// The product stage machine:
/// Init -> MaterialsAssigned -> Manufacturing -> Distribution -> Retail -> Sold.
#[derive(Debug, Clone)]
pub struct LifecycleService {
    ctx: LedgerContext,
}

impl LifecycleService {
    pub fn new(ctx: LedgerContext) -> Self {
        Self { ctx }
    }

    /// Creates a product in `Init` with nobody assigned. Returns the new id.
    #[instrument(skip(self, input), fields(caller = %caller, product = %input.name))]
    pub async fn create_product(
        &self,
        caller: &Identity,
        input: NewProduct,
    ) -> Result<i32, ServiceError> {
        observe("create_product", self.try_create_product(caller, input).await)
    }

    async fn try_create_product(
        &self,
        caller: &Identity,
        input: NewProduct,
    ) -> Result<i32, ServiceError> {
        require_positive("target_quantity", input.target_quantity)?;
        validated(&input)?;

        let (txn, actor) = self.ctx.begin(caller).await?;
        actor.require_owner("create products")?;

        let now = Utc::now();
        let product = product::ActiveModel {
            id: NotSet,
            name: Set(input.name.trim().to_string()),
            description: Set(input.description),
            target_quantity: Set(input.target_quantity),
            manufacturer_id: Set(0),
            distributor_id: Set(0),
            retailer_id: Set(0),
            stage: Set(Stage::Init),
            created_at: Set(now),
        }
        .insert(&*txn)
        .await?;

        product_timeline::ActiveModel {
            product_id: Set(product.id),
            created_at: Set(now),
            materials_assigned_at: Set(None),
            manufacturing_started_at: Set(None),
            distribution_started_at: Set(None),
            retail_received_at: Set(None),
            sold_at: Set(None),
        }
        .insert(&*txn)
        .await?;
        txn.commit().await?;

        info!(product_id = product.id, "Product created");
        self.ctx.publish([Event::ProductCreated(product.id)]);
        Ok(product.id)
    }

    /// Binds `quantity` of a material to a product, taking it from the
    /// material's free stock.
    ///
    /// The Owner or any registered manufacturer may contribute, while the
    /// product is still in `Init` or `MaterialsAssigned`. Assigning the same
    /// material twice accumulates into one usage record.
    #[instrument(skip(self), fields(caller = %caller))]
    pub async fn assign_material(
        &self,
        caller: &Identity,
        product_id: i32,
        material_id: i32,
        quantity: i64,
    ) -> Result<product_material_usage::Model, ServiceError> {
        observe(
            "assign_material",
            self.try_assign_material(caller, product_id, material_id, quantity)
                .await,
        )
    }

    async fn try_assign_material(
        &self,
        caller: &Identity,
        product_id: i32,
        material_id: i32,
        quantity: i64,
    ) -> Result<product_material_usage::Model, ServiceError> {
        require_positive("quantity", quantity)?;

        let (txn, actor) = self.ctx.begin(caller).await?;
        if !matches!(actor.caller, Caller::Owner | Caller::Manufacturer(_)) {
            return Err(actor.denied("assign materials"));
        }

        let product = find_product(&*txn, product_id).await?;
        if !product.stage.accepts_materials() {
            return Err(ServiceError::InvalidStage {
                product_id,
                stage: product.stage,
                operation: "assign_material",
            });
        }

        inventory::deduct(&*txn, &actor, material_id, product_id, quantity).await?;

        let now = Utc::now();
        let existing = product_material_usage::Entity::find()
            .filter(product_material_usage::Column::ProductId.eq(product_id))
            .filter(product_material_usage::Column::MaterialId.eq(material_id))
            .one(&*txn)
            .await?;
        let usage = match existing {
            Some(usage) => {
                let merged = usage.quantity_used + quantity;
                let mut active = usage.into_active_model();
                active.quantity_used = Set(merged);
                active.update(&*txn).await?
            }
            None => {
                product_material_usage::ActiveModel {
                    id: NotSet,
                    product_id: Set(product_id),
                    material_id: Set(material_id),
                    quantity_used: Set(quantity),
                    assigned_at: Set(now),
                }
                .insert(&*txn)
                .await?
            }
        };

        let mut events = vec![Event::MaterialAssigned {
            product_id,
            material_id,
            quantity,
        }];
        if product.stage == Stage::Init {
            let mut active = product.into_active_model();
            active.stage = Set(Stage::MaterialsAssigned);
            active.update(&*txn).await?;
            stamp_timeline(&*txn, product_id, Stage::MaterialsAssigned, now).await?;
            events.push(Event::StageAdvanced {
                product_id,
                from: Stage::Init,
                to: Stage::MaterialsAssigned,
                at: now,
            });
        }
        txn.commit().await?;

        info!(
            product_id,
            material_id,
            quantity,
            total_used = usage.quantity_used,
            "Material assigned"
        );
        self.ctx.publish(events);
        Ok(usage)
    }

    /// Manufacturer takes a product with materials into production and is
    /// recorded as its manufacturer.
    #[instrument(skip(self), fields(caller = %caller))]
    pub async fn start_manufacturing(
        &self,
        caller: &Identity,
        product_id: i32,
    ) -> Result<product::Model, ServiceError> {
        self.transition(caller, product_id, Transition::StartManufacturing)
            .await
    }

    #[instrument(skip(self), fields(caller = %caller))]
    pub async fn start_distribution(
        &self,
        caller: &Identity,
        product_id: i32,
    ) -> Result<product::Model, ServiceError> {
        self.transition(caller, product_id, Transition::StartDistribution)
            .await
    }

    #[instrument(skip(self), fields(caller = %caller))]
    pub async fn receive_at_retail(
        &self,
        caller: &Identity,
        product_id: i32,
    ) -> Result<product::Model, ServiceError> {
        self.transition(caller, product_id, Transition::ReceiveAtRetail)
            .await
    }

    /// Only the retailer that received the product may sell it.
    #[instrument(skip(self), fields(caller = %caller))]
    pub async fn mark_as_sold(
        &self,
        caller: &Identity,
        product_id: i32,
    ) -> Result<product::Model, ServiceError> {
        self.transition(caller, product_id, Transition::MarkAsSold)
            .await
    }

    async fn transition(
        &self,
        caller: &Identity,
        product_id: i32,
        transition: Transition,
    ) -> Result<product::Model, ServiceError> {
        observe(
            transition.operation(),
            self.try_transition(caller, product_id, transition).await,
        )
    }

    async fn try_transition(
        &self,
        caller: &Identity,
        product_id: i32,
        transition: Transition,
    ) -> Result<product::Model, ServiceError> {
        let (txn, actor) = self.ctx.begin(caller).await?;
        let party = transition
            .party(actor.caller)
            .ok_or_else(|| actor.denied(transition.operation()))?;

        let product = find_product(&*txn, product_id).await?;
        if product.stage != transition.from() {
            return Err(ServiceError::InvalidStage {
                product_id,
                stage: product.stage,
                operation: transition.operation(),
            });
        }

        let mut active = product.clone().into_active_model();
        match transition {
            Transition::StartManufacturing => {
                let usages = product_material_usage::Entity::find()
                    .filter(product_material_usage::Column::ProductId.eq(product_id))
                    .count(&*txn)
                    .await?;
                if usages == 0 {
                    return Err(ServiceError::NoMaterialsAssigned(product_id));
                }
                active.manufacturer_id = Set(party);
            }
            Transition::StartDistribution => active.distributor_id = Set(party),
            Transition::ReceiveAtRetail => active.retailer_id = Set(party),
            Transition::MarkAsSold => ensure_assigned_retailer(&actor, &product, party)?,
        }

        let now = Utc::now();
        active.stage = Set(transition.to());
        let updated = active.update(&*txn).await?;
        stamp_timeline(&*txn, product_id, transition.to(), now).await?;
        txn.commit().await?;

        info!(
            product_id,
            stage = %updated.stage,
            "Product advanced to {}",
            updated.stage.label()
        );
        self.ctx.publish([Event::StageAdvanced {
            product_id,
            from: transition.from(),
            to: transition.to(),
            at: now,
        }]);
        Ok(updated)
    }

    pub async fn get_product(&self, product_id: i32) -> Result<product::Model, ServiceError> {
        find_product(self.ctx.store().conn(), product_id).await
    }

    pub async fn list_products(&self) -> Result<Vec<product::Model>, ServiceError> {
        Ok(product::Entity::find()
            .order_by_asc(product::Column::Id)
            .all(self.ctx.store().conn())
            .await?)
    }

    pub async fn product_count(&self) -> Result<u64, ServiceError> {
        Ok(product::Entity::find()
            .count(self.ctx.store().conn())
            .await?)
    }

    /// Usage records of a product, in assignment order.
    pub async fn get_product_materials(
        &self,
        product_id: i32,
    ) -> Result<Vec<product_material_usage::Model>, ServiceError> {
        let conn = self.ctx.store().conn();
        find_product(conn, product_id).await?;
        Ok(product_material_usage::Entity::find()
            .filter(product_material_usage::Column::ProductId.eq(product_id))
            .order_by_asc(product_material_usage::Column::Id)
            .all(conn)
            .await?)
    }

    pub async fn get_product_materials_count(&self, product_id: i32) -> Result<u64, ServiceError> {
        let conn = self.ctx.store().conn();
        find_product(conn, product_id).await?;
        Ok(product_material_usage::Entity::find()
            .filter(product_material_usage::Column::ProductId.eq(product_id))
            .count(conn)
            .await?)
    }

    pub async fn get_product_timeline(
        &self,
        product_id: i32,
    ) -> Result<product_timeline::Model, ServiceError> {
        product_timeline::Entity::find_by_id(product_id)
            .one(self.ctx.store().conn())
            .await?
            .ok_or(ServiceError::ProductNotFound(product_id))
    }
}

async fn find_product<C: ConnectionTrait>(
    conn: &C,
    product_id: i32,
) -> Result<product::Model, ServiceError> {
    product::Entity::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or(ServiceError::ProductNotFound(product_id))
}

/// Records the first time `product_id` reached `stage`.
async fn stamp_timeline<C: ConnectionTrait>(
    conn: &C,
    product_id: i32,
    stage: Stage,
    at: DateTime<Utc>,
) -> Result<(), ServiceError> {
    let timeline = product_timeline::Entity::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or_else(|| {
            ServiceError::InternalError(format!("product {} has no timeline", product_id))
        })?;

    let mut active = timeline.clone().into_active_model();
    active.stamp(&timeline, stage, at);
    if active.is_changed() {
        active.update(conn).await?;
    }
    Ok(())
}

fn ensure_assigned_retailer(
    actor: &Actor,
    product: &product::Model,
    retailer_id: i32,
) -> Result<(), ServiceError> {
    if product.retailer_id == retailer_id {
        Ok(())
    } else {
        Err(ServiceError::Unauthorized(format!(
            "{} is not the retailer holding product {}",
            actor.identity, product.id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_follow_the_stage_order() {
        for transition in [
            Transition::StartManufacturing,
            Transition::StartDistribution,
            Transition::ReceiveAtRetail,
            Transition::MarkAsSold,
        ] {
            assert_eq!(transition.from().next(), Some(transition.to()));
        }
    }

    #[test]
    fn each_transition_has_one_role() {
        assert_eq!(
            Transition::StartManufacturing.party(Caller::Manufacturer(4)),
            Some(4)
        );
        assert_eq!(Transition::StartManufacturing.party(Caller::Owner), None);
        assert_eq!(Transition::StartDistribution.party(Caller::Retailer(1)), None);
        assert_eq!(Transition::MarkAsSold.party(Caller::Retailer(2)), Some(2));
        assert_eq!(Transition::ReceiveAtRetail.party(Caller::Unregistered), None);
    }
}
