//! Domain layer for the checkout system.
//!
//! This crate holds the pure model, free of I/O:
//! - `Money` with the currency rounding rule
//! - `Product` snapshots read from the catalog
//! - the `Cart` aggregate and its merge policy
//! - the `Order` aggregate with its lifecycle state machine
//! - the `CommerceError` taxonomy shared by every layer above

pub mod cart;
pub mod catalog;
pub mod error;
pub mod identity;
pub mod money;
pub mod order;

pub use cart::{Cart, CartChange, CartLine, CartLineView, CartView, Customization};
pub use catalog::Product;
pub use common::{CartLineId, CustomerId, OrderId, ProductId};
pub use error::CommerceError;
pub use identity::Identity;
pub use money::Money;
pub use order::{
    Order, OrderLine, OrderRecord, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress,
};
