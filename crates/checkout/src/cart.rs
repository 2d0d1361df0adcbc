//! Cart service.

use std::collections::HashMap;

use common::{CartLineId, CustomerId, ProductId};
use domain::cart::validate_quantity;
use domain::{CartChange, CartView, CommerceError, Customization};
use store::{Store, UnitOfWork};

/// Command to add a product to a customer's cart.
#[derive(Debug, Clone)]
pub struct AddItem {
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub customization: Option<Customization>,
}

impl AddItem {
    /// Creates an AddItem command for an uncustomized line.
    pub fn new(customer_id: CustomerId, product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            customer_id,
            product_id: product_id.into(),
            quantity,
            customization: None,
        }
    }

    /// Attaches a customization payload. Customized lines never merge.
    pub fn with_customization(mut self, customization: Customization) -> Self {
        self.customization = Some(customization);
        self
    }
}

/// Per-customer cart operations.
///
/// Stock checks made here are advisory: they reject requests that could not
/// be fulfilled right now, but stock is only reserved at placement.
/// Every mutation returns the refreshed [`CartView`].
#[derive(Clone)]
pub struct CartService<S: Store> {
    store: S,
}

impl<S: Store> CartService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Adds a product, merging into an existing uncustomized line when there
    /// is one.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(&self, cmd: AddItem) -> Result<CartView, CommerceError> {
        validate_quantity(cmd.quantity)?;

        let mut uow = self.store.begin().await?;
        let cart = uow.cart_for_update(cmd.customer_id).await?;
        let product = uow
            .product(&cmd.product_id)
            .await?
            .ok_or_else(|| CommerceError::product_not_found(&cmd.product_id))?;

        match cart.plan_add(&product, cmd.quantity, cmd.customization)? {
            CartChange::Merge {
                line_id,
                new_quantity,
            } => {
                uow.set_cart_line_quantity(cmd.customer_id, line_id, new_quantity)
                    .await?;
            }
            CartChange::Append(line) => {
                uow.insert_cart_line(cmd.customer_id, &line).await?;
            }
        }

        let view = load_view(uow.as_mut(), cmd.customer_id).await?;
        uow.commit().await?;
        record_mutation("add");
        Ok(view)
    }

    /// Sets the quantity of one line.
    #[tracing::instrument(skip(self))]
    pub async fn update_line(
        &self,
        customer_id: CustomerId,
        line_id: CartLineId,
        quantity: u32,
    ) -> Result<CartView, CommerceError> {
        validate_quantity(quantity)?;

        let mut uow = self.store.begin().await?;
        let cart = uow.cart_for_update(customer_id).await?;
        let line = cart
            .line(line_id)
            .ok_or_else(|| CommerceError::line_not_found(line_id))?;
        let product = uow
            .product(&line.product_id)
            .await?
            .ok_or_else(|| CommerceError::product_not_found(&line.product_id))?;

        if quantity > product.stock {
            return Err(CommerceError::InsufficientStock {
                product_id: product.id,
                requested: quantity,
                available: product.stock,
            });
        }

        uow.set_cart_line_quantity(customer_id, line_id, quantity)
            .await?;

        let view = load_view(uow.as_mut(), customer_id).await?;
        uow.commit().await?;
        record_mutation("update");
        Ok(view)
    }

    /// Removes one line.
    #[tracing::instrument(skip(self))]
    pub async fn remove_line(
        &self,
        customer_id: CustomerId,
        line_id: CartLineId,
    ) -> Result<CartView, CommerceError> {
        let mut uow = self.store.begin().await?;
        uow.cart_for_update(customer_id).await?;

        if !uow.delete_cart_line(customer_id, line_id).await? {
            return Err(CommerceError::line_not_found(line_id));
        }

        let view = load_view(uow.as_mut(), customer_id).await?;
        uow.commit().await?;
        record_mutation("remove");
        Ok(view)
    }

    /// Removes every line. Clearing an empty cart succeeds.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, customer_id: CustomerId) -> Result<CartView, CommerceError> {
        let mut uow = self.store.begin().await?;
        uow.cart_for_update(customer_id).await?;
        let removed = uow.clear_cart(customer_id).await?;

        let view = load_view(uow.as_mut(), customer_id).await?;
        uow.commit().await?;
        tracing::debug!(removed, "cart cleared");
        record_mutation("clear");
        Ok(view)
    }

    /// Returns the cart joined with current catalog data, creating an empty
    /// cart on first access.
    #[tracing::instrument(skip(self))]
    pub async fn view(&self, customer_id: CustomerId) -> Result<CartView, CommerceError> {
        let mut uow = self.store.begin().await?;
        let view = load_view(uow.as_mut(), customer_id).await?;
        uow.commit().await?;
        Ok(view)
    }
}

async fn load_view(
    uow: &mut dyn UnitOfWork,
    customer_id: CustomerId,
) -> Result<CartView, CommerceError> {
    let cart = uow.cart_for_update(customer_id).await?;

    let mut products = HashMap::new();
    for product_id in cart.product_ids() {
        if let Some(product) = uow.product(&product_id).await? {
            products.insert(product_id, product);
        }
    }

    Ok(CartView::build(&cart, |id| products.get(id)))
}

fn record_mutation(op: &'static str) {
    metrics::counter!("cart_mutations_total", "op" => op).increment(1);
}
