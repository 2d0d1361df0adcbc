use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use common::{CartLineId, CustomerId, OrderId, ProductId};
use domain::{Cart, CartChange, CartLine, Order, Product};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    Result, StoreError,
    store::{StockDecrement, Store, UnitOfWork},
};

#[derive(Debug, Clone, Default)]
struct StoreState {
    products: BTreeMap<ProductId, Product>,
    carts: HashMap<CustomerId, Cart>,
    orders: HashMap<OrderId, Order>,
}

/// In-memory store for tests and local development.
///
/// A unit of work holds the store-wide lock for its whole lifetime and
/// writes to a private copy of the state, which replaces the shared state on
/// commit. Units are therefore fully serialized, which is at least as strong
/// as the row locking the PostgreSQL store provides.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
    failing_commits: Arc<AtomicUsize>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` commits fail with [`StoreError::Contention`].
    pub fn fail_next_commits(&self, count: usize) {
        self.failing_commits.store(count, Ordering::SeqCst);
    }

    /// Returns a committed product.
    pub async fn product(&self, product_id: &ProductId) -> Option<Product> {
        self.state.lock().await.products.get(product_id).cloned()
    }

    /// Returns a committed cart, if the customer has one.
    pub async fn cart(&self, customer_id: CustomerId) -> Option<Cart> {
        self.state.lock().await.carts.get(&customer_id).cloned()
    }

    /// Returns a committed order.
    pub async fn order(&self, order_id: OrderId) -> Option<Order> {
        self.state.lock().await.orders.get(&order_id).cloned()
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    fn take_commit_failure(&self) -> bool {
        self.failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        let fail_commit = self.take_commit_failure();
        Ok(Box::new(InMemoryUnitOfWork {
            guard,
            working,
            fail_commit,
        }))
    }
}

/// Unit of work over [`InMemoryStore`].
pub struct InMemoryUnitOfWork {
    guard: OwnedMutexGuard<StoreState>,
    working: StoreState,
    fail_commit: bool,
}

impl InMemoryUnitOfWork {
    fn cart_mut(&mut self, customer_id: CustomerId) -> &mut Cart {
        self.working
            .carts
            .entry(customer_id)
            .or_insert_with(|| Cart::new(customer_id))
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn product_for_update(&mut self, product_id: &ProductId) -> Result<Option<Product>> {
        Ok(self.working.products.get(product_id).cloned())
    }

    async fn product(&mut self, product_id: &ProductId) -> Result<Option<Product>> {
        Ok(self.working.products.get(product_id).cloned())
    }

    async fn upsert_product(&mut self, product: &Product) -> Result<()> {
        self.working
            .products
            .insert(product.id.clone(), product.clone());
        Ok(())
    }

    async fn delete_product(&mut self, product_id: &ProductId) -> Result<bool> {
        let existed = self.working.products.remove(product_id).is_some();
        if existed {
            for cart in self.working.carts.values_mut() {
                cart.remove_product(product_id);
            }
        }
        Ok(existed)
    }

    async fn decrement_stock(
        &mut self,
        product_id: &ProductId,
        amount: u32,
    ) -> Result<StockDecrement> {
        let Some(product) = self.working.products.get_mut(product_id) else {
            return Ok(StockDecrement::Missing);
        };
        match product.stock.checked_sub(amount) {
            Some(remaining) => {
                product.stock = remaining;
                Ok(StockDecrement::Applied { remaining })
            }
            None => Ok(StockDecrement::Insufficient {
                available: product.stock,
            }),
        }
    }

    async fn increment_stock(
        &mut self,
        product_id: &ProductId,
        amount: u32,
    ) -> Result<Option<u32>> {
        let Some(product) = self.working.products.get_mut(product_id) else {
            return Ok(None);
        };
        product.stock = product
            .stock
            .checked_add(amount)
            .ok_or_else(|| StoreError::Constraint(format!("stock overflow for {product_id}")))?;
        Ok(Some(product.stock))
    }

    async fn cart_for_update(&mut self, customer_id: CustomerId) -> Result<Cart> {
        Ok(self.cart_mut(customer_id).clone())
    }

    async fn insert_cart_line(&mut self, customer_id: CustomerId, line: &CartLine) -> Result<()> {
        if !self.working.products.contains_key(&line.product_id) {
            return Err(StoreError::Constraint(format!(
                "cart line references unknown product {}",
                line.product_id
            )));
        }
        let cart = self.cart_mut(customer_id);
        if !line.is_customized() && cart.mergeable_line(&line.product_id).is_some() {
            return Err(StoreError::Constraint(format!(
                "cart already holds an uncustomized line for {}",
                line.product_id
            )));
        }
        cart.apply(CartChange::Append(line.clone()));
        Ok(())
    }

    async fn set_cart_line_quantity(
        &mut self,
        customer_id: CustomerId,
        line_id: CartLineId,
        quantity: u32,
    ) -> Result<bool> {
        if quantity == 0 {
            return Err(StoreError::Constraint(
                "cart line quantity must be positive".to_string(),
            ));
        }
        Ok(self.cart_mut(customer_id).set_quantity(line_id, quantity))
    }

    async fn delete_cart_line(
        &mut self,
        customer_id: CustomerId,
        line_id: CartLineId,
    ) -> Result<bool> {
        Ok(self.cart_mut(customer_id).remove_line(line_id))
    }

    async fn clear_cart(&mut self, customer_id: CustomerId) -> Result<u64> {
        Ok(self.cart_mut(customer_id).clear() as u64)
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        if self.working.orders.contains_key(&order.id()) {
            return Err(StoreError::Constraint(format!(
                "order {} already exists",
                order.id()
            )));
        }
        self.working.orders.insert(order.id(), order.clone());
        Ok(())
    }

    async fn order_for_update(&mut self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.working.orders.get(&order_id).cloned())
    }

    async fn order(&mut self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.working.orders.get(&order_id).cloned())
    }

    async fn orders_for_customer(&mut self, customer_id: CustomerId) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .working
            .orders
            .values()
            .filter(|o| o.customer_id() == customer_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(orders)
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        match self.working.orders.get_mut(&order.id()) {
            Some(stored) => {
                *stored = order.clone();
                Ok(())
            }
            None => Err(StoreError::Constraint(format!(
                "order {} does not exist",
                order.id()
            ))),
        }
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryUnitOfWork {
            mut guard,
            working,
            fail_commit,
        } = *self;

        if fail_commit {
            return Err(StoreError::Contention(
                "injected commit failure".to_string(),
            ));
        }

        *guard = working;
        Ok(())
    }
}
