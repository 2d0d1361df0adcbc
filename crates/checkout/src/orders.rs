//! Order reads and staff-only lifecycle changes.

use common::OrderId;
use domain::{CommerceError, Identity, Order, OrderStatus, PaymentStatus};
use store::Store;

use crate::cancellation::compensate;

/// Read access to orders.
#[derive(Clone)]
pub struct OrderQueries<S: Store> {
    store: S,
}

impl<S: Store> OrderQueries<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns an order visible to the caller.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(
        &self,
        identity: Identity,
        order_id: OrderId,
    ) -> Result<Order, CommerceError> {
        let mut uow = self.store.begin().await?;
        let order = uow
            .order(order_id)
            .await?
            .ok_or_else(|| CommerceError::order_not_found(order_id))?;

        if !identity.can_access(order.customer_id()) {
            return Err(CommerceError::Forbidden(format!(
                "order {order_id} belongs to another customer"
            )));
        }
        Ok(order)
    }

    /// Lists the caller's own orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, identity: Identity) -> Result<Vec<Order>, CommerceError> {
        let mut uow = self.store.begin().await?;
        Ok(uow.orders_for_customer(identity.customer_id).await?)
    }
}

/// Administrative order changes. Every operation requires elevated identity.
#[derive(Clone)]
pub struct OrderAdmin<S: Store> {
    store: S,
}

impl<S: Store> OrderAdmin<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Moves an order along its lifecycle.
    ///
    /// Cancelling restores stock exactly like a customer cancellation.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        identity: Identity,
        order_id: OrderId,
        target: OrderStatus,
    ) -> Result<Order, CommerceError> {
        require_elevated(&identity, "change order status")?;

        let mut uow = self.store.begin().await?;
        let mut order = uow
            .order_for_update(order_id)
            .await?
            .ok_or_else(|| CommerceError::order_not_found(order_id))?;
        let previous = order.status();

        if target == OrderStatus::Cancelled {
            compensate(uow.as_mut(), &mut order).await?;
        } else {
            order.transition_to(target)?;
            uow.update_order(&order).await?;
        }
        uow.commit().await?;

        tracing::info!(%order_id, from = %previous, to = %target, "order status changed");
        Ok(order)
    }

    /// Records the payment status reported by the payment provider.
    #[tracing::instrument(skip(self))]
    pub async fn update_payment_status(
        &self,
        identity: Identity,
        order_id: OrderId,
        status: PaymentStatus,
    ) -> Result<Order, CommerceError> {
        require_elevated(&identity, "change payment status")?;

        let mut uow = self.store.begin().await?;
        let mut order = uow
            .order_for_update(order_id)
            .await?
            .ok_or_else(|| CommerceError::order_not_found(order_id))?;

        order.set_payment_status(status);
        uow.update_order(&order).await?;
        uow.commit().await?;

        tracing::info!(%order_id, payment_status = %status, "payment status changed");
        Ok(order)
    }
}

pub(crate) fn require_elevated(identity: &Identity, action: &str) -> Result<(), CommerceError> {
    if !identity.elevated {
        return Err(CommerceError::Forbidden(format!(
            "elevated privilege required to {action}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::{AddItem, CartService};
    use crate::placement::{CheckoutService, PlaceOrder};
    use common::{CustomerId, ProductId};
    use domain::{Money, Product};
    use store::InMemoryStore;

    struct Fixture {
        store: InMemoryStore,
        queries: OrderQueries<InMemoryStore>,
        admin: OrderAdmin<InMemoryStore>,
        customer: CustomerId,
    }

    impl Fixture {
        async fn new() -> Self {
            let store = InMemoryStore::new();
            let mut uow = store.begin().await.unwrap();
            uow.upsert_product(&Product::new("SKU-001", "Widget", Money::from_cents(1000), 50))
                .await
                .unwrap();
            uow.commit().await.unwrap();

            Self {
                queries: OrderQueries::new(store.clone()),
                admin: OrderAdmin::new(store.clone()),
                store,
                customer: CustomerId::new(),
            }
        }

        async fn place(&self, quantity: u32) -> Order {
            CartService::new(self.store.clone())
                .add_item(AddItem::new(self.customer, "SKU-001", quantity))
                .await
                .unwrap();
            CheckoutService::new(self.store.clone())
                .place_order(PlaceOrder::new(self.customer, "1 Main St"))
                .await
                .unwrap()
        }

        async fn stock(&self) -> u32 {
            self.store
                .product(&ProductId::new("SKU-001"))
                .await
                .unwrap()
                .stock
        }
    }

    fn staff() -> Identity {
        Identity::elevated(CustomerId::new())
    }

    #[tokio::test]
    async fn get_order_checks_ownership() {
        let f = Fixture::new().await;
        let order = f.place(1).await;

        let fetched = f
            .queries
            .get_order(Identity::customer(f.customer), order.id())
            .await
            .unwrap();
        assert_eq!(fetched, order);

        let err = f
            .queries
            .get_order(Identity::customer(CustomerId::new()), order.id())
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::Forbidden(_)));

        let err = f
            .queries
            .get_order(staff(), OrderId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::NotFound { .. }));
    }

    #[tokio::test]
    async fn list_orders_returns_only_own_orders() {
        let f = Fixture::new().await;
        let first = f.place(1).await;
        let second = f.place(2).await;

        let listed = f
            .queries
            .list_orders(Identity::customer(f.customer))
            .await
            .unwrap();
        let ids: Vec<OrderId> = listed.iter().map(Order::id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&first.id()) && ids.contains(&second.id()));

        let others = f
            .queries
            .list_orders(Identity::customer(CustomerId::new()))
            .await
            .unwrap();
        assert!(others.is_empty());
    }

    #[tokio::test]
    async fn status_changes_require_elevation() {
        let f = Fixture::new().await;
        let order = f.place(1).await;

        let err = f
            .admin
            .update_status(
                Identity::customer(f.customer),
                order.id(),
                OrderStatus::Confirmed,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::Forbidden(_)));

        let err = f
            .admin
            .update_payment_status(
                Identity::customer(f.customer),
                order.id(),
                PaymentStatus::Paid,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn lifecycle_walks_forward_and_rejects_skips() {
        let f = Fixture::new().await;
        let order = f.place(1).await;

        let err = f
            .admin
            .update_status(staff(), order.id(), OrderStatus::Shipped)
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::InvalidState { .. }));

        for status in [
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ] {
            let updated = f
                .admin
                .update_status(staff(), order.id(), status)
                .await
                .unwrap();
            assert_eq!(updated.status(), status);
        }
    }

    #[tokio::test]
    async fn admin_cancel_restores_stock_and_refund_does_not() {
        let f = Fixture::new().await;
        let cancelled = f.place(4).await;
        let refunded = f.place(3).await;
        assert_eq!(f.stock().await, 43);

        f.admin
            .update_status(staff(), cancelled.id(), OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(f.stock().await, 47);

        let order = f
            .admin
            .update_status(staff(), refunded.id(), OrderStatus::Refunded)
            .await
            .unwrap();
        assert_eq!(order.status(), OrderStatus::Refunded);
        assert_eq!(order.payment_status(), PaymentStatus::Refunded);
        assert_eq!(f.stock().await, 47);

        let err = f
            .admin
            .update_status(staff(), refunded.id(), OrderStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::InvalidState { .. }));
        assert_eq!(f.stock().await, 47);
    }

    #[tokio::test]
    async fn payment_status_is_recorded() {
        let f = Fixture::new().await;
        let order = f.place(1).await;

        let updated = f
            .admin
            .update_payment_status(staff(), order.id(), PaymentStatus::Paid)
            .await
            .unwrap();
        assert_eq!(updated.payment_status(), PaymentStatus::Paid);
        assert_eq!(
            f.store.order(order.id()).await.unwrap().payment_status(),
            PaymentStatus::Paid
        );
    }
}
