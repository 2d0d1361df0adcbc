//! Stock ledger.

use common::ProductId;
use domain::CommerceError;
use store::{StockDecrement, UnitOfWork};

/// Guarded stock counter operations.
///
/// Both operations run inside the caller's unit of work, so they commit or
/// roll back together with everything else the caller wrote.
pub struct StockLedger;

impl StockLedger {
    /// Lowers stock by `amount` and returns what remains.
    ///
    /// Fails with `InsufficientStock` instead of going below zero, and with
    /// `NotFound` if the product does not exist.
    pub async fn decrement(
        uow: &mut dyn UnitOfWork,
        product_id: &ProductId,
        amount: u32,
    ) -> Result<u32, CommerceError> {
        validate_amount(amount)?;

        match uow.decrement_stock(product_id, amount).await? {
            StockDecrement::Applied { remaining } => {
                tracing::debug!(%product_id, amount, remaining, "stock decremented");
                Ok(remaining)
            }
            StockDecrement::Insufficient { available } => Err(CommerceError::InsufficientStock {
                product_id: product_id.clone(),
                requested: amount,
                available,
            }),
            StockDecrement::Missing => Err(CommerceError::product_not_found(product_id)),
        }
    }

    /// Raises stock by `amount`.
    ///
    /// Returns the new stock, or `None` if the product no longer exists.
    pub async fn increment(
        uow: &mut dyn UnitOfWork,
        product_id: &ProductId,
        amount: u32,
    ) -> Result<Option<u32>, CommerceError> {
        validate_amount(amount)?;

        let stock = uow.increment_stock(product_id, amount).await?;
        if let Some(stock) = stock {
            tracing::debug!(%product_id, amount, stock, "stock incremented");
        }
        Ok(stock)
    }
}

fn validate_amount(amount: u32) -> Result<(), CommerceError> {
    if amount == 0 {
        return Err(CommerceError::InvalidArgument(
            "stock adjustment must be at least 1".to_string(),
        ));
    }
    Ok(())
}
