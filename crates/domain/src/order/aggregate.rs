//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{CustomerId, OrderId};
use serde::{Deserialize, Serialize};

use crate::error::CommerceError;
use crate::money::Money;

use super::{OrderLine, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress};

/// Order aggregate root.
///
/// Lines, total, address, payment method, and notes are fixed at placement.
/// Only the lifecycle status and payment status change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    customer_id: CustomerId,
    lines: Vec<OrderLine>,
    total: Money,
    shipping_address: ShippingAddress,
    payment_method: PaymentMethod,
    notes: Option<String>,
    status: OrderStatus,
    payment_status: PaymentStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Flat form of an order used by stores to rebuild the aggregate.
#[derive(Debug, Clone)]
pub struct OrderRecord {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub lines: Vec<OrderLine>,
    pub total: Money,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrderRecord> for Order {
    fn from(r: OrderRecord) -> Self {
        Self {
            id: r.id,
            customer_id: r.customer_id,
            lines: r.lines,
            total: r.total,
            shipping_address: r.shipping_address,
            payment_method: r.payment_method,
            notes: r.notes,
            status: r.status,
            payment_status: r.payment_status,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    /// Sum of line totals, rounded half-up to two decimals.
    pub fn total(&self) -> Money {
        self.total
    }

    pub fn shipping_address(&self) -> &ShippingAddress {
        &self.shipping_address
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Total number of units across all lines.
    pub fn total_quantity(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }
}

// Command methods
impl Order {
    /// Creates a `PENDING` order from frozen lines.
    pub fn place(
        customer_id: CustomerId,
        lines: Vec<OrderLine>,
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
        notes: Option<String>,
    ) -> Result<Self, CommerceError> {
        if lines.is_empty() {
            return Err(CommerceError::EmptyCart);
        }

        let total = lines
            .iter()
            .map(OrderLine::line_total)
            .sum::<Money>()
            .round_to_cents();
        let notes = notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let now = Utc::now();

        Ok(Self {
            id: OrderId::new(),
            customer_id,
            lines,
            total,
            shipping_address,
            payment_method,
            notes,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    /// Marks the order cancelled. Stock restoration is the caller's job.
    pub fn cancel(&mut self) -> Result<(), CommerceError> {
        if !self.status.can_cancel() {
            return Err(CommerceError::InvalidState {
                order_id: self.id,
                current: self.status,
                action: "cancel",
            });
        }
        self.status = OrderStatus::Cancelled;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Moves the order to `target` if the lifecycle allows it.
    ///
    /// A refund also marks the payment refunded.
    pub fn transition_to(&mut self, target: OrderStatus) -> Result<(), CommerceError> {
        if target == OrderStatus::Cancelled {
            return self.cancel();
        }
        if !self.status.can_transition_to(target) {
            return Err(CommerceError::InvalidState {
                order_id: self.id,
                current: self.status,
                action: "transition",
            });
        }
        self.status = target;
        if target == OrderStatus::Refunded {
            self.payment_status = PaymentStatus::Refunded;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Records a new payment status.
    pub fn set_payment_status(&mut self, status: PaymentStatus) {
        self.payment_status = status;
        self.updated_at = Utc::now();
    }
}
