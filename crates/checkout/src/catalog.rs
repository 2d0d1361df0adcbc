//! Product seeding.
//!
//! The catalog itself lives elsewhere; checkout only needs a way to put
//! products into the store for local runs and tests.

use common::ProductId;
use domain::{CommerceError, Identity, Product};
use store::Store;

use crate::orders::require_elevated;

#[derive(Clone)]
pub struct CatalogAdmin<S: Store> {
    store: S,
}

impl<S: Store> CatalogAdmin<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Inserts or replaces a product, including its stock counter.
    #[tracing::instrument(skip(self))]
    pub async fn upsert_product(
        &self,
        identity: Identity,
        product: Product,
    ) -> Result<Product, CommerceError> {
        require_elevated(&identity, "edit products")?;
        if product.unit_price.is_negative() {
            return Err(CommerceError::InvalidArgument(
                "unit price must not be negative".to_string(),
            ));
        }

        let mut uow = self.store.begin().await?;
        uow.upsert_product(&product).await?;
        uow.commit().await?;
        Ok(product)
    }

    pub async fn get_product(&self, product_id: &ProductId) -> Result<Product, CommerceError> {
        let mut uow = self.store.begin().await?;
        uow.product(product_id)
            .await?
            .ok_or_else(|| CommerceError::product_not_found(product_id))
    }
}
