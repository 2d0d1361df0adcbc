//! Cart endpoints. Every route acts on the caller's own cart.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use checkout::AddItem;
use common::CartLineId;
use domain::{CartView, Customization};
use serde::Deserialize;
use store::Store;

use crate::AppState;
use crate::body::JsonBody;
use crate::error::ApiError;
use crate::identity::Caller;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
    pub quantity: u32,
    #[serde(default)]
    pub customization: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLineRequest {
    pub quantity: u32,
}

// -- Handlers --

/// GET /cart
#[tracing::instrument(skip(state))]
pub async fn view<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
) -> Result<Json<CartView>, ApiError> {
    Ok(Json(state.cart.view(identity.customer_id).await?))
}

/// DELETE /cart
#[tracing::instrument(skip(state))]
pub async fn clear<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
) -> Result<Json<CartView>, ApiError> {
    Ok(Json(state.cart.clear(identity.customer_id).await?))
}

/// POST /cart/items
#[tracing::instrument(skip(state, req))]
pub async fn add_item<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
    JsonBody(req): JsonBody<AddItemRequest>,
) -> Result<Json<CartView>, ApiError> {
    let mut cmd = AddItem::new(identity.customer_id, req.product_id, req.quantity);
    // JSON null means "no customization", same as omitting the field.
    if let Some(payload) = req.customization.filter(|v| !v.is_null()) {
        cmd = cmd.with_customization(Customization::new(payload));
    }

    Ok(Json(state.cart.add_item(cmd).await?))
}

/// PATCH /cart/items/{line_id}
#[tracing::instrument(skip(state, req))]
pub async fn update_line<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
    Path(line_id): Path<String>,
    JsonBody(req): JsonBody<UpdateLineRequest>,
) -> Result<Json<CartView>, ApiError> {
    let line_id = parse_line_id(&line_id)?;
    Ok(Json(
        state
            .cart
            .update_line(identity.customer_id, line_id, req.quantity)
            .await?,
    ))
}

/// DELETE /cart/items/{line_id}
#[tracing::instrument(skip(state))]
pub async fn remove_line<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
    Path(line_id): Path<String>,
) -> Result<Json<CartView>, ApiError> {
    let line_id = parse_line_id(&line_id)?;
    Ok(Json(
        state.cart.remove_line(identity.customer_id, line_id).await?,
    ))
}

fn parse_line_id(id: &str) -> Result<CartLineId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid line ID format: {e}")))
}
