//! Transactional store for the checkout system.
//!
//! Every operation runs inside a [`UnitOfWork`]. Reads taken with
//! `*_for_update` hold a row lock until the unit commits or is dropped, and
//! dropping a unit without committing rolls back everything it wrote.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::{StockDecrement, Store, UnitOfWork};
