//! Product snapshots read from the catalog.

use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// A product as seen by checkout.
///
/// Every field except `stock` is owned by the catalog. `stock` is mutated
/// only through the stock ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub stock: u32,
    pub active: bool,
}

impl Product {
    /// Creates an active product.
    pub fn new(
        id: impl Into<ProductId>,
        name: impl Into<String>,
        unit_price: Money,
        stock: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            unit_price,
            stock,
            active: true,
        }
    }

    /// Returns the same product marked inactive.
    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }
}
