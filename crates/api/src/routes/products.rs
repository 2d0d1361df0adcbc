//! Product seeding endpoint (staff only).

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use domain::{Money, Product, ProductId};
use serde::Deserialize;
use store::Store;

use crate::AppState;
use crate::body::JsonBody;
use crate::error::ApiError;
use crate::identity::Caller;

#[derive(Debug, Deserialize)]
pub struct UpsertProductRequest {
    pub name: String,
    pub unit_price: Money,
    pub stock: u32,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// PUT /products/{id}: inserts or replaces a product and its stock.
#[tracing::instrument(skip(state, req))]
pub async fn upsert<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpsertProductRequest>,
) -> Result<Json<Product>, ApiError> {
    if id.trim().is_empty() {
        return Err(ApiError::BadRequest("product id must not be blank".to_string()));
    }

    let product = Product {
        id: ProductId::new(id),
        name: req.name,
        unit_price: req.unit_price,
        stock: req.stock,
        active: req.active,
    };
    Ok(Json(state.catalog.upsert_product(identity, product).await?))
}
