//! Order lifecycle state machine.

use serde::{Deserialize, Serialize};

use crate::error::CommerceError;

/// The lifecycle status of an order.
///
/// State transitions:
/// ```text
/// Pending ──► Confirmed ──► Processing ──► Shipped ──► Delivered
///    │            │              │            │            │
///    ├────────────┴──► Cancelled │            │            │
///    └────────────┴──────────────┴────────────┴────────────┴──► Refunded
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order has been placed and stock decremented.
    #[default]
    Pending,

    /// Order has been confirmed by staff.
    Confirmed,

    /// Order is being prepared.
    Processing,

    /// Order has left the warehouse.
    Shipped,

    /// Order reached the customer (terminal success).
    Delivered,

    /// Order was cancelled and its stock restored (terminal).
    Cancelled,

    /// Order was refunded administratively (terminal, no stock effect).
    Refunded,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ];

    /// Returns true if the owning customer may cancel in this status.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Confirmed)
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Refunded)
    }

    /// Returns true if `target` is a legal successor of this status.
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, target) {
            (Pending, Confirmed) => true,
            (Confirmed, Processing) => true,
            (Processing, Shipped) => true,
            (Shipped, Delivered) => true,
            (from, Cancelled) => from.can_cancel(),
            (from, Refunded) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Returns the status name as stored and exposed over the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Refunded => "REFUNDED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = CommerceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CommerceError::InvalidArgument(format!("unknown order status: {s}")))
    }
}

/// Payment status of an order. Informational; checkout never captures funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = CommerceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            PaymentStatus::Pending,
            PaymentStatus::Paid,
            PaymentStatus::Failed,
            PaymentStatus::Refunded,
        ]
        .into_iter()
        .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
        .ok_or_else(|| CommerceError::InvalidArgument(format!("unknown payment status: {s}")))
    }
}
