pub mod audit;
pub mod inventory;
pub mod lifecycle;
pub mod registry;
pub mod vendor_performance;

use std::sync::Arc;

use metrics::counter;
use rust_decimal::Decimal;
use tracing::{error, info, warn};
use validator::{Validate, ValidationError};

use crate::auth::{resolve_caller, Actor, Identity};
use crate::db::{LedgerStore, WriteTxn};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

pub use audit::AuditService;
pub use inventory::InventoryService;
pub use lifecycle::LifecycleService;
pub use registry::RegistryService;
pub use vendor_performance::VendorPerformanceService;

/// State every ledger service shares: the store, the event channel and the
/// configured owner identity.
#[derive(Debug, Clone)]
pub struct LedgerContext {
    store: LedgerStore,
    event_sender: Arc<EventSender>,
    owner: Identity,
}

impl LedgerContext {
    pub fn new(store: LedgerStore, event_sender: Arc<EventSender>, owner: Identity) -> Self {
        Self {
            store,
            event_sender,
            owner,
        }
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    pub fn owner(&self) -> &Identity {
        &self.owner
    }

    /// Opens the write transaction for one command and resolves its caller
    /// inside it, so the role seen is the role at commit time.
    pub(crate) async fn begin(&self, caller: &Identity) -> Result<(WriteTxn, Actor), ServiceError> {
        let txn = self.store.begin_write().await?;
        let role = resolve_caller(&*txn, &self.owner, caller).await?;
        Ok((
            txn,
            Actor {
                identity: caller.clone(),
                caller: role,
            },
        ))
    }

    pub(crate) fn publish(&self, events: impl IntoIterator<Item = Event>) {
        for event in events {
            self.event_sender.send_or_log(event);
        }
    }
}

/// Counts the command outcome and logs rejections.
pub(crate) fn observe<T>(
    operation: &'static str,
    result: Result<T, ServiceError>,
) -> Result<T, ServiceError> {
    match &result {
        Ok(_) => {
            counter!("ledger_commands.committed", 1, "operation" => operation);
            info!(operation, "Command committed");
        }
        Err(err) => {
            counter!("ledger_commands.rejected", 1, "operation" => operation, "code" => err.code());
            if err.is_rejection() {
                warn!(operation, code = err.code(), "Command rejected: {}", err);
            } else {
                error!(operation, "Command failed: {}", err);
            }
        }
    }
    result
}

/// Runs validator rules, reporting failures as `InvalidInput`.
pub(crate) fn validated<T: Validate>(input: &T) -> Result<(), ServiceError> {
    input
        .validate()
        .map_err(|e| ServiceError::InvalidInput(e.to_string()))
}

pub(crate) fn require_positive(field: &str, quantity: i64) -> Result<(), ServiceError> {
    if quantity <= 0 {
        return Err(ServiceError::InvalidInput(format!(
            "{} must be positive, got {}",
            field, quantity
        )));
    }
    Ok(())
}

pub(crate) fn require_price(price: Decimal) -> Result<(), ServiceError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ServiceError::InvalidInput(format!(
            "price_per_unit must not be negative, got {}",
            price
        )));
    }
    Ok(())
}

pub(crate) fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

pub(crate) fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::new("negative"));
    }
    Ok(())
}

/// All ledger services over one shared context.
#[derive(Debug, Clone)]
pub struct LedgerServices {
    pub registry: RegistryService,
    pub inventory: InventoryService,
    pub lifecycle: LifecycleService,
    pub audit: AuditService,
    pub vendor_performance: VendorPerformanceService,
}

impl LedgerServices {
    pub fn new(store: LedgerStore, event_sender: Arc<EventSender>, owner: Identity) -> Self {
        let ctx = LedgerContext::new(store, event_sender, owner);
        Self {
            registry: RegistryService::new(ctx.clone()),
            inventory: InventoryService::new(ctx.clone()),
            lifecycle: LifecycleService::new(ctx.clone()),
            audit: AuditService::new(ctx.clone()),
            vendor_performance: VendorPerformanceService::new(ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn quantities_must_be_positive() {
        assert!(require_positive("quantity", 1).is_ok());
        assert!(require_positive("quantity", 0).is_err());
        assert!(require_positive("quantity", -5).is_err());
    }

    #[test]
    fn prices_may_be_zero_but_not_negative() {
        assert!(require_price(dec!(0)).is_ok());
        assert!(require_price(dec!(-0.00)).is_ok());
        assert!(require_price(dec!(5.25)).is_ok());
        assert!(require_price(dec!(-1)).is_err());
    }
}
