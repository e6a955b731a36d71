use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, NotSet, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use super::LedgerContext;
use crate::entities::{
    material, product_material_usage,
    supply_history::{self, SupplyKind},
};
use crate::errors::ServiceError;

/// One material movement about to be appended to the history log.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub material_id: i32,
    pub vendor_id: i32,
    /// 0 when the movement is not tied to a product.
    pub product_id: i32,
    pub quantity: i64,
    pub price_per_unit: Decimal,
    pub actor: String,
    pub at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Entry for `quantity` units of `material`, priced at its current unit price.
    pub fn for_material(
        material: &material::Model,
        quantity: i64,
        actor: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            material_id: material.id,
            vendor_id: material.vendor_id,
            product_id: 0,
            quantity,
            price_per_unit: material.price_per_unit,
            actor: actor.into(),
            at,
        }
    }

    pub fn with_product(mut self, product_id: i32) -> Self {
        self.product_id = product_id;
        self
    }

    /// Price times quantity, or `None` when the product does not fit a decimal.
    pub fn total_amount(&self) -> Option<Decimal> {
        self.price_per_unit.checked_mul(Decimal::from(self.quantity))
    }
}

async fn append<C: ConnectionTrait>(
    conn: &C,
    kind: SupplyKind,
    entry: HistoryEntry,
) -> Result<supply_history::Model, ServiceError> {
    let total_amount = entry.total_amount().ok_or_else(|| {
        ServiceError::InvalidInput(format!(
            "value of {} units at {} per unit is out of range",
            entry.quantity, entry.price_per_unit
        ))
    })?;
    Ok(supply_history::ActiveModel {
        id: NotSet,
        material_id: Set(entry.material_id),
        vendor_id: Set(entry.vendor_id),
        product_id: Set(entry.product_id),
        quantity: Set(entry.quantity),
        price_per_unit: Set(entry.price_per_unit),
        total_amount: Set(total_amount),
        kind: Set(kind),
        actor: Set(entry.actor),
        supplied_at: Set(entry.at),
    }
    .insert(conn)
    .await?)
}

/// Appends a RECEIVED row (initial listing or restock).
pub async fn record_supply<C: ConnectionTrait>(
    conn: &C,
    entry: HistoryEntry,
) -> Result<supply_history::Model, ServiceError> {
    append(conn, SupplyKind::Received, entry).await
}

/// Appends a USED row; only ever written together with a usage record.
pub async fn record_usage<C: ConnectionTrait>(
    conn: &C,
    entry: HistoryEntry,
) -> Result<supply_history::Model, ServiceError> {
    append(conn, SupplyKind::Used, entry).await
}

/// Appends a RETURNED row.
pub async fn record_return<C: ConnectionTrait>(
    conn: &C,
    entry: HistoryEntry,
) -> Result<supply_history::Model, ServiceError> {
    append(conn, SupplyKind::Returned, entry).await
}

/// Optional filters for history queries; all set filters must match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryFilter {
    pub material_id: Option<i32>,
    pub vendor_id: Option<i32>,
    pub product_id: Option<i32>,
    pub kind: Option<SupplyKind>,
}

/// Material balance rebuilt from the history log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub total: i64,
    pub available: i64,
}

/// Folds history rows into per-material balances.
///
/// RECEIVED adds to total and available, USED takes from available, RETURNED
/// takes from both.
pub fn replay_balances<'a, I>(history: I) -> BTreeMap<i32, Balance>
where
    I: IntoIterator<Item = &'a supply_history::Model>,
{
    let mut balances: BTreeMap<i32, Balance> = BTreeMap::new();
    for row in history {
        let balance = balances.entry(row.material_id).or_default();
        match row.kind {
            SupplyKind::Received => {
                balance.total += row.quantity;
                balance.available += row.quantity;
            }
            SupplyKind::Used => balance.available -= row.quantity,
            SupplyKind::Returned => {
                balance.total -= row.quantity;
                balance.available -= row.quantity;
            }
        }
    }
    balances
}

/// Read side of the append-only history log.
#[derive(Debug, Clone)]
pub struct AuditService {
    ctx: LedgerContext,
}

impl AuditService {
    pub fn new(ctx: LedgerContext) -> Self {
        Self { ctx }
    }

    /// History rows matching `filter`, oldest first.
    #[instrument(skip(self))]
    pub async fn supply_history(
        &self,
        filter: HistoryFilter,
    ) -> Result<Vec<supply_history::Model>, ServiceError> {
        let mut query = supply_history::Entity::find();
        if let Some(material_id) = filter.material_id {
            query = query.filter(supply_history::Column::MaterialId.eq(material_id));
        }
        if let Some(vendor_id) = filter.vendor_id {
            query = query.filter(supply_history::Column::VendorId.eq(vendor_id));
        }
        if let Some(product_id) = filter.product_id {
            query = query.filter(supply_history::Column::ProductId.eq(product_id));
        }
        if let Some(kind) = filter.kind {
            query = query.filter(supply_history::Column::Kind.eq(kind));
        }

        Ok(query
            .order_by_asc(supply_history::Column::Id)
            .all(self.ctx.store().conn())
            .await?)
    }

    /// Ids of materials whose stored balances disagree with the log or with
    /// the usage table. Empty when the ledger is consistent.
    #[instrument(skip(self))]
    pub async fn verify_conservation(&self) -> Result<Vec<i32>, ServiceError> {
        let conn = self.ctx.store().conn();
        let materials = material::Entity::find()
            .order_by_asc(material::Column::Id)
            .all(conn)
            .await?;
        let history = supply_history::Entity::find()
            .order_by_asc(supply_history::Column::Id)
            .all(conn)
            .await?;
        let usages = product_material_usage::Entity::find().all(conn).await?;

        let replayed = replay_balances(&history);

        let mut used_by_usage: BTreeMap<i32, i64> = BTreeMap::new();
        for usage in &usages {
            *used_by_usage.entry(usage.material_id).or_default() += usage.quantity_used;
        }
        let mut used_by_history: BTreeMap<i32, i64> = BTreeMap::new();
        for row in history.iter().filter(|row| row.kind == SupplyKind::Used) {
            *used_by_history.entry(row.material_id).or_default() += row.quantity;
        }

        let mut violations = Vec::new();
        for m in &materials {
            let stored = Balance {
                total: m.total_quantity,
                available: m.available_quantity,
            };
            let from_log = replayed.get(&m.id).copied().unwrap_or_default();
            let used = used_by_usage.get(&m.id).copied().unwrap_or(0);
            let logged_use = used_by_history.get(&m.id).copied().unwrap_or(0);

            let consistent = stored == from_log
                && m.available_quantity >= 0
                && m.available_quantity <= m.total_quantity
                && used == logged_use
                && m.available_quantity + used == m.total_quantity;

            if !consistent {
                warn!(
                    material_id = m.id,
                    ?stored,
                    ?from_log,
                    used,
                    logged_use,
                    "Inventory conservation violated"
                );
                violations.push(m.id);
            }
        }

        Ok(violations)
    }
}
