//! Cart aggregate.
//!
//! A customer owns exactly one cart. Lines keep their insertion order. The
//! merge policy lives here so every store applies it the same way:
//! uncustomized lines for the same product are summed in place, and
//! customized lines are always kept separate.

use chrono::{DateTime, Utc};
use common::{CartLineId, CustomerId, ProductId};
use serde::{Deserialize, Serialize};

use crate::catalog::Product;
use crate::error::CommerceError;
use crate::money::Money;

/// Opaque customization payload attached to a cart line (engraving text,
/// size choices, ...). Checkout never interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Customization(serde_json::Value);

impl Customization {
    /// Wraps a JSON payload.
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Returns the raw payload.
    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }
}

/// One product entry in a cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: CartLineId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub customization: Option<Customization>,
    pub created_at: DateTime<Utc>,
}

impl CartLine {
    /// Creates a new line with a fresh id.
    pub fn new(
        product_id: impl Into<ProductId>,
        quantity: u32,
        customization: Option<Customization>,
    ) -> Self {
        Self {
            id: CartLineId::new(),
            product_id: product_id.into(),
            quantity,
            customization,
            created_at: Utc::now(),
        }
    }

    /// Returns true if the line carries a customization payload.
    pub fn is_customized(&self) -> bool {
        self.customization.is_some()
    }
}

/// The change an `add_item` request makes to a cart.
#[derive(Debug, Clone, PartialEq)]
pub enum CartChange {
    /// Raise the quantity of an existing uncustomized line.
    Merge {
        line_id: CartLineId,
        new_quantity: u32,
    },
    /// Append a brand new line.
    Append(CartLine),
}

/// A customer's cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    customer_id: CustomerId,
    lines: Vec<CartLine>,
}

impl Cart {
    /// Creates an empty cart for a customer.
    pub fn new(customer_id: CustomerId) -> Self {
        Self {
            customer_id,
            lines: Vec::new(),
        }
    }

    /// Rebuilds a cart from stored lines, already in insertion order.
    pub fn with_lines(customer_id: CustomerId, lines: Vec<CartLine>) -> Self {
        Self { customer_id, lines }
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Returns a line by id.
    pub fn line(&self, line_id: CartLineId) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.id == line_id)
    }

    /// Returns the uncustomized line for a product, if any.
    pub fn mergeable_line(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.lines
            .iter()
            .find(|l| &l.product_id == product_id && !l.is_customized())
    }

    /// Sum of quantities across all lines.
    pub fn total_quantity(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    /// Distinct product ids referenced by the cart, sorted.
    pub fn product_ids(&self) -> Vec<ProductId> {
        let mut ids: Vec<ProductId> = self.lines.iter().map(|l| l.product_id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Decides how adding `quantity` of `product` changes this cart.
    ///
    /// The stock check here is advisory; placement re-checks under lock.
    pub fn plan_add(
        &self,
        product: &Product,
        quantity: u32,
        customization: Option<Customization>,
    ) -> Result<CartChange, CommerceError> {
        validate_quantity(quantity)?;

        if !product.active {
            return Err(CommerceError::product_not_found(&product.id));
        }

        let existing = match customization {
            Some(_) => None,
            None => self.mergeable_line(&product.id),
        };

        let requested = existing
            .map(|l| l.quantity.saturating_add(quantity))
            .unwrap_or(quantity);

        if requested > product.stock {
            return Err(CommerceError::InsufficientStock {
                product_id: product.id.clone(),
                requested,
                available: product.stock,
            });
        }

        Ok(match existing {
            Some(line) => CartChange::Merge {
                line_id: line.id,
                new_quantity: requested,
            },
            None => CartChange::Append(CartLine::new(product.id.clone(), quantity, customization)),
        })
    }

    /// Applies a planned change.
    pub fn apply(&mut self, change: CartChange) {
        match change {
            CartChange::Merge {
                line_id,
                new_quantity,
            } => {
                self.set_quantity(line_id, new_quantity);
            }
            CartChange::Append(line) => self.lines.push(line),
        }
    }

    /// Sets a line's quantity. Returns false if the line is not in this cart.
    pub fn set_quantity(&mut self, line_id: CartLineId, quantity: u32) -> bool {
        match self.lines.iter_mut().find(|l| l.id == line_id) {
            Some(line) => {
                line.quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Removes a line. Returns false if the line is not in this cart.
    pub fn remove_line(&mut self, line_id: CartLineId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.id != line_id);
        self.lines.len() != before
    }

    /// Drops every line referencing a product.
    pub fn remove_product(&mut self, product_id: &ProductId) {
        self.lines.retain(|l| &l.product_id != product_id);
    }

    /// Removes all lines, returning how many were dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.lines.len();
        self.lines.clear();
        count
    }
}

/// Rejects non-positive quantities.
pub fn validate_quantity(quantity: u32) -> Result<(), CommerceError> {
    if quantity == 0 {
        return Err(CommerceError::InvalidArgument(
            "quantity must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// A cart line joined with current catalog data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartLineView {
    pub line_id: CartLineId,
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub customization: Option<Customization>,
    pub line_total: Money,
    pub available_stock: u32,
    pub active: bool,
}

/// Read model returned by `view`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartView {
    pub customer_id: CustomerId,
    pub lines: Vec<CartLineView>,
    pub subtotal: Money,
    pub item_count: u64,
}

impl CartView {
    /// Joins cart lines with their products. Lines whose product lookup
    /// returns `None` are left out.
    pub fn build<'a>(
        cart: &Cart,
        mut lookup: impl FnMut(&ProductId) -> Option<&'a Product>,
    ) -> Self {
        let lines: Vec<CartLineView> = cart
            .lines()
            .iter()
            .filter_map(|line| {
                let product = lookup(&line.product_id)?;
                Some(CartLineView {
                    line_id: line.id,
                    product_id: line.product_id.clone(),
                    product_name: product.name.clone(),
                    unit_price: product.unit_price,
                    quantity: line.quantity,
                    customization: line.customization.clone(),
                    line_total: product.unit_price.multiply(line.quantity),
                    available_stock: product.stock,
                    active: product.active,
                })
            })
            .collect();

        let subtotal = lines
            .iter()
            .map(|l| l.line_total)
            .sum::<Money>()
            .round_to_cents();
        let item_count = lines.iter().map(|l| u64::from(l.quantity)).sum();

        Self {
            customer_id: cart.customer_id(),
            lines,
            subtotal,
            item_count,
        }
    }
}
