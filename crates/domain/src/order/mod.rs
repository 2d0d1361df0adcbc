//! Order aggregate and related types.

mod aggregate;
mod status;
mod value_objects;

pub use aggregate::{Order, OrderRecord};
pub use status::{OrderStatus, PaymentStatus};
pub use value_objects::{OrderLine, PaymentMethod, ShippingAddress};
