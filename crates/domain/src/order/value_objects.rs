//! Value objects for the order domain.

use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::cart::Customization;
use crate::error::CommerceError;
use crate::money::Money;

/// A non-blank shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShippingAddress(String);

impl ShippingAddress {
    /// Parses an address, rejecting blank input.
    pub fn parse(address: impl AsRef<str>) -> Result<Self, CommerceError> {
        let trimmed = address.as_ref().trim();
        if trimmed.is_empty() {
            return Err(CommerceError::InvalidArgument(
                "shipping address is required".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ShippingAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How the customer intends to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    #[default]
    CashOnDelivery,
    Card,
    BankTransfer,
    Wallet,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CashOnDelivery => "CASH_ON_DELIVERY",
            PaymentMethod::Card => "CARD",
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
            PaymentMethod::Wallet => "WALLET",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = CommerceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            PaymentMethod::CashOnDelivery,
            PaymentMethod::Card,
            PaymentMethod::BankTransfer,
            PaymentMethod::Wallet,
        ]
        .into_iter()
        .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
        .ok_or_else(|| CommerceError::InvalidArgument(format!("unknown payment method: {s}")))
    }
}

/// A frozen copy of a cart line, captured at placement.
///
/// The unit price is copied, so later catalog price changes never alter
/// historical orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub customization: Option<Customization>,
}

impl OrderLine {
    /// Unit price times quantity, unrounded.
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}
