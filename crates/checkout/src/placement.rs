//! Order placement: cart to `PENDING` order in one unit of work.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use common::{CustomerId, ProductId};
use domain::{CommerceError, Order, OrderLine, PaymentMethod, Product, ShippingAddress};
use store::{Store, UnitOfWork};

use crate::ledger::StockLedger;

/// Command to turn a customer's cart into an order.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub customer_id: CustomerId,
    pub shipping_address: String,
    /// Defaults to cash on delivery when omitted.
    pub payment_method: Option<PaymentMethod>,
    pub notes: Option<String>,
}

impl PlaceOrder {
    /// Creates a PlaceOrder command with no payment method or notes.
    pub fn new(customer_id: CustomerId, shipping_address: impl Into<String>) -> Self {
        Self {
            customer_id,
            shipping_address: shipping_address.into(),
            payment_method: None,
            notes: None,
        }
    }

    pub fn with_payment_method(mut self, payment_method: PaymentMethod) -> Self {
        self.payment_method = Some(payment_method);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Runs the placement transaction.
///
/// Placement either fully succeeds (order inserted, stock decremented, cart
/// emptied) or leaves the store exactly as it found it. Products are
/// re-read under row locks in ascending id order, so two placements sharing
/// products always lock them in the same sequence.
#[derive(Clone)]
pub struct CheckoutService<S: Store> {
    store: S,
}

impl<S: Store> CheckoutService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Places an order from the customer's current cart.
    #[tracing::instrument(skip(self, cmd), fields(customer_id = %cmd.customer_id))]
    pub async fn place_order(&self, cmd: PlaceOrder) -> Result<Order, CommerceError> {
        let started = Instant::now();
        let result = self.try_place(cmd).await;

        match &result {
            Ok(order) => {
                metrics::counter!("orders_placed_total").increment(1);
                tracing::info!(
                    order_id = %order.id(),
                    total = %order.total(),
                    lines = order.lines().len(),
                    "order placed"
                );
            }
            Err(err) => {
                metrics::counter!("orders_rejected_total", "reason" => err.code()).increment(1);
                tracing::warn!(reason = err.code(), error = %err, "order rejected");
            }
        }
        metrics::histogram!("order_placement_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        result
    }

    async fn try_place(&self, cmd: PlaceOrder) -> Result<Order, CommerceError> {
        let shipping_address = ShippingAddress::parse(&cmd.shipping_address)?;

        let mut uow = self.store.begin().await?;
        let cart = uow.cart_for_update(cmd.customer_id).await?;
        if cart.is_empty() {
            return Err(CommerceError::EmptyCart);
        }

        // product_ids() is sorted, which fixes the lock order.
        let products = lock_products(uow.as_mut(), &cart.product_ids()).await?;

        let mut demand: BTreeMap<ProductId, u32> = BTreeMap::new();
        for line in cart.lines() {
            let total = demand.entry(line.product_id.clone()).or_default();
            *total = total.saturating_add(line.quantity);
        }

        let mut lines = Vec::with_capacity(cart.lines().len());
        for line in cart.lines() {
            let product = match products.get(&line.product_id) {
                Some(product) if product.active => product,
                Some(product) => {
                    return Err(CommerceError::ProductUnavailable {
                        product_id: product.id.clone(),
                        name: product.name.clone(),
                    });
                }
                None => {
                    return Err(CommerceError::ProductUnavailable {
                        product_id: line.product_id.clone(),
                        name: line.product_id.to_string(),
                    });
                }
            };

            let requested = demand.get(&line.product_id).copied().unwrap_or(line.quantity);
            if requested > product.stock {
                return Err(CommerceError::InsufficientStock {
                    product_id: product.id.clone(),
                    requested,
                    available: product.stock,
                });
            }

            lines.push(OrderLine {
                product_id: product.id.clone(),
                product_name: product.name.clone(),
                unit_price: product.unit_price,
                quantity: line.quantity,
                customization: line.customization.clone(),
            });
        }

        let order = Order::place(
            cmd.customer_id,
            lines,
            shipping_address,
            cmd.payment_method.unwrap_or_default(),
            cmd.notes,
        )?;
        uow.insert_order(&order).await?;

        for (product_id, quantity) in &demand {
            StockLedger::decrement(uow.as_mut(), product_id, *quantity).await?;
        }

        uow.clear_cart(cmd.customer_id).await?;
        uow.commit().await?;

        Ok(order)
    }
}

async fn lock_products(
    uow: &mut dyn UnitOfWork,
    product_ids: &[ProductId],
) -> Result<HashMap<ProductId, Product>, CommerceError> {
    let mut products = HashMap::with_capacity(product_ids.len());
    for product_id in product_ids {
        if let Some(product) = uow.product_for_update(product_id).await? {
            products.insert(product_id.clone(), product);
        }
    }
    Ok(products)
}
