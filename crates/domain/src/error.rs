//! Domain error types.

use common::{OrderId, ProductId};
use thiserror::Error;

use crate::order::OrderStatus;

/// Errors returned by cart and order operations.
///
/// Every variant carries enough detail for the caller to pick a corrective
/// action. Only [`CommerceError::Transient`] is worth retrying unchanged.
#[derive(Debug, Error)]
pub enum CommerceError {
    /// Malformed input, such as a blank shipping address or a zero quantity.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A cart line, order, or product does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A product referenced by the cart is inactive or gone from the catalog.
    #[error("Product unavailable: {name} ({product_id})")]
    ProductUnavailable { product_id: ProductId, name: String },

    /// Not enough stock to satisfy the requested quantity.
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// The customer's cart has no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// The caller is not allowed to perform the operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The order's lifecycle status does not allow the operation.
    #[error("Invalid state: cannot {action} order {order_id} in {current} status")]
    InvalidState {
        order_id: OrderId,
        current: OrderStatus,
        action: &'static str,
    },

    /// The store could not commit in time (deadlock, lock timeout, contention).
    #[error("Transient store failure: {0}")]
    Transient(String),

    /// An unexpected store or serialization failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CommerceError {
    /// Builds a `NotFound` error for a product.
    pub fn product_not_found(product_id: &ProductId) -> Self {
        CommerceError::NotFound {
            entity: "Product",
            id: product_id.to_string(),
        }
    }

    /// Builds a `NotFound` error for an order.
    pub fn order_not_found(order_id: OrderId) -> Self {
        CommerceError::NotFound {
            entity: "Order",
            id: order_id.to_string(),
        }
    }

    /// Builds a `NotFound` error for a cart line.
    pub fn line_not_found(line_id: impl std::fmt::Display) -> Self {
        CommerceError::NotFound {
            entity: "Cart line",
            id: line_id.to_string(),
        }
    }

    /// Returns true if the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CommerceError::Transient(_))
    }

    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            CommerceError::InvalidArgument(_) => "INVALID_ARGUMENT",
            CommerceError::NotFound { .. } => "NOT_FOUND",
            CommerceError::ProductUnavailable { .. } => "PRODUCT_UNAVAILABLE",
            CommerceError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            CommerceError::EmptyCart => "EMPTY_CART",
            CommerceError::Forbidden(_) => "FORBIDDEN",
            CommerceError::InvalidState { .. } => "INVALID_STATE",
            CommerceError::Transient(_) => "TRANSIENT",
            CommerceError::Internal(_) => "INTERNAL",
        }
    }
}
