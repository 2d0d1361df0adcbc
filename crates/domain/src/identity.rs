//! Caller identity.

use common::CustomerId;
use serde::{Deserialize, Serialize};

/// The authenticated caller of an operation.
///
/// Authentication happens upstream; this type is trusted as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub customer_id: CustomerId,
    pub elevated: bool,
}

impl Identity {
    /// A regular customer.
    pub fn customer(customer_id: CustomerId) -> Self {
        Self {
            customer_id,
            elevated: false,
        }
    }

    /// A caller holding elevated (staff) privilege.
    pub fn elevated(customer_id: CustomerId) -> Self {
        Self {
            customer_id,
            elevated: true,
        }
    }

    /// Returns true if this caller may act on a resource owned by `owner`.
    pub fn can_access(&self, owner: CustomerId) -> bool {
        self.elevated || self.customer_id == owner
    }
}
