//! Order cancellation and stock restoration.

use std::collections::BTreeMap;

use common::{OrderId, ProductId};
use domain::{CommerceError, Identity, Order};
use store::{Store, UnitOfWork};

use crate::ledger::StockLedger;

/// Cancels orders and returns their stock.
///
/// The order row is locked for the whole unit of work, so a cancellation
/// racing another cancellation (or an administrative status change) sees the
/// committed status and fails with `InvalidState`. Stock is restored at
/// most once per order.
#[derive(Clone)]
pub struct CancellationService<S: Store> {
    store: S,
}

impl<S: Store> CancellationService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Cancels a `PENDING` or `CONFIRMED` order owned by the caller.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        identity: Identity,
        order_id: OrderId,
    ) -> Result<Order, CommerceError> {
        let mut uow = self.store.begin().await?;
        let mut order = uow
            .order_for_update(order_id)
            .await?
            .ok_or_else(|| CommerceError::order_not_found(order_id))?;

        if !identity.can_access(order.customer_id()) {
            return Err(CommerceError::Forbidden(format!(
                "order {order_id} belongs to another customer"
            )));
        }

        compensate(uow.as_mut(), &mut order).await?;
        uow.commit().await?;

        tracing::info!(%order_id, "order cancelled");
        Ok(order)
    }
}

/// Marks a locked order cancelled and puts its stock back.
///
/// Quantities are summed per product and restored in ascending product id
/// order, the same order placement locks products in. Products deleted from
/// the catalog are skipped with a warning. The caller commits.
pub(crate) async fn compensate(
    uow: &mut dyn UnitOfWork,
    order: &mut Order,
) -> Result<(), CommerceError> {
    order.cancel()?;

    for (product_id, quantity) in restock_plan(order) {
        let restored = StockLedger::increment(uow, &product_id, quantity).await?;
        if restored.is_none() {
            metrics::counter!("stock_restore_skipped_total").increment(1);
            tracing::warn!(
                order_id = %order.id(),
                %product_id,
                quantity,
                "product no longer exists, skipping stock restore"
            );
        }
    }

    uow.update_order(order).await?;
    metrics::counter!("orders_cancelled_total").increment(1);
    Ok(())
}

/// Units to hand back per product, keyed in lock order.
fn restock_plan(order: &Order) -> BTreeMap<ProductId, u32> {
    let mut plan: BTreeMap<ProductId, u32> = BTreeMap::new();
    for line in order.lines() {
        let total = plan.entry(line.product_id.clone()).or_default();
        *total = total.saturating_add(line.quantity);
    }
    plan
}
