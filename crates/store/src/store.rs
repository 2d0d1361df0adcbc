use async_trait::async_trait;
use common::{CartLineId, CustomerId, OrderId, ProductId};
use domain::{Cart, CartLine, Order, Product};

use crate::Result;

/// Outcome of a guarded stock decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockDecrement {
    /// The counter was lowered; `remaining` is the new value.
    Applied { remaining: u32 },
    /// Lowering would have gone below zero; nothing changed.
    Insufficient { available: u32 },
    /// The product does not exist.
    Missing,
}

/// Entry point to the durable store.
///
/// Implementations must be thread-safe (Send + Sync) and cheap to clone or
/// share, since every request begins its own unit of work.
#[async_trait]
pub trait Store: Send + Sync {
    /// Opens a new unit of work.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;
}

/// One atomic unit of work.
///
/// All writes become visible together on [`UnitOfWork::commit`]. Dropping the
/// unit without committing discards them. Rows read through `*_for_update`
/// stay locked against other units until this one ends.
#[async_trait]
pub trait UnitOfWork: Send {
    // -- Catalog --

    /// Reads a product and locks its row.
    async fn product_for_update(&mut self, product_id: &ProductId) -> Result<Option<Product>>;

    /// Reads a product without locking it.
    async fn product(&mut self, product_id: &ProductId) -> Result<Option<Product>>;

    /// Inserts or replaces a catalog product.
    async fn upsert_product(&mut self, product: &Product) -> Result<()>;

    /// Removes a product. Cart lines referencing it are removed too.
    /// Returns false if it did not exist.
    async fn delete_product(&mut self, product_id: &ProductId) -> Result<bool>;

    // -- Stock --

    /// Lowers stock by `amount` only if the result stays non-negative.
    ///
    /// The floor check and the write are a single step.
    async fn decrement_stock(
        &mut self,
        product_id: &ProductId,
        amount: u32,
    ) -> Result<StockDecrement>;

    /// Raises stock by `amount`. Returns the new value, or None if the
    /// product does not exist.
    async fn increment_stock(&mut self, product_id: &ProductId, amount: u32)
    -> Result<Option<u32>>;

    // -- Carts --

    /// Reads a customer's cart and locks it, creating an empty one if needed.
    async fn cart_for_update(&mut self, customer_id: CustomerId) -> Result<Cart>;

    /// Appends a line to a customer's cart.
    async fn insert_cart_line(&mut self, customer_id: CustomerId, line: &CartLine) -> Result<()>;

    /// Sets a line's quantity. Returns false if the line is not in the cart.
    async fn set_cart_line_quantity(
        &mut self,
        customer_id: CustomerId,
        line_id: CartLineId,
        quantity: u32,
    ) -> Result<bool>;

    /// Deletes a line. Returns false if the line is not in the cart.
    async fn delete_cart_line(&mut self, customer_id: CustomerId, line_id: CartLineId)
    -> Result<bool>;

    /// Deletes every line of a customer's cart, keeping the cart itself.
    async fn clear_cart(&mut self, customer_id: CustomerId) -> Result<u64>;

    // -- Orders --

    /// Persists a new order together with all of its lines.
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    /// Reads an order and locks it.
    async fn order_for_update(&mut self, order_id: OrderId) -> Result<Option<Order>>;

    /// Reads an order without locking it.
    async fn order(&mut self, order_id: OrderId) -> Result<Option<Order>>;

    /// Lists a customer's orders, newest first.
    async fn orders_for_customer(&mut self, customer_id: CustomerId) -> Result<Vec<Order>>;

    /// Writes an order's mutable fields (status, payment status, updated-at).
    async fn update_order(&mut self, order: &Order) -> Result<()>;

    /// Makes every write of this unit durable and visible.
    async fn commit(self: Box<Self>) -> Result<()>;
}
