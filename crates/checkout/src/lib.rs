//! Checkout application services.
//!
//! Every operation here opens one unit of work on a [`store::Store`], does
//! all of its reads and writes inside it, and commits once. A failure at any
//! step drops the unit of work, which rolls everything back.
//!
//! - [`CartService`]: add, update, remove, clear, and view cart lines
//! - [`CheckoutService`]: turns a cart into a `PENDING` order and reserves stock
//! - [`CancellationService`]: cancels an order and restores its stock
//! - [`OrderQueries`] / [`OrderAdmin`]: reads and staff-only status changes
//! - [`CatalogAdmin`]: product seeding for development and tests
//! - [`StockLedger`]: the only path through which stock counters move

pub mod cancellation;
pub mod cart;
pub mod catalog;
pub mod ledger;
pub mod orders;
pub mod placement;

pub use cancellation::CancellationService;
pub use cart::{AddItem, CartService};
pub use catalog::CatalogAdmin;
pub use ledger::StockLedger;
pub use orders::{OrderAdmin, OrderQueries};
pub use placement::{CheckoutService, PlaceOrder};
