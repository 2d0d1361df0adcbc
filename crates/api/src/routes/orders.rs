//! Order placement, query, cancellation, and administration endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use checkout::PlaceOrder;
use common::OrderId;
use domain::{
    Customization, Money, Order, OrderLine, OrderStatus, PaymentMethod, PaymentStatus,
};
use serde::{Deserialize, Serialize};
use store::Store;

use crate::AppState;
use crate::body::JsonBody;
use crate::error::ApiError;
use crate::identity::Caller;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub shipping_address: String,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePaymentStatusRequest {
    pub payment_status: String,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub customer_id: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub shipping_address: String,
    pub notes: Option<String>,
    pub lines: Vec<OrderLineResponse>,
    pub item_count: u64,
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct OrderLineResponse {
    pub product_id: String,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub customization: Option<Customization>,
    pub line_total: Money,
}

impl From<&OrderLine> for OrderLineResponse {
    fn from(line: &OrderLine) -> Self {
        Self {
            product_id: line.product_id.to_string(),
            product_name: line.product_name.clone(),
            unit_price: line.unit_price,
            quantity: line.quantity,
            customization: line.customization.clone(),
            line_total: line.line_total(),
        }
    }
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id(),
            customer_id: order.customer_id().to_string(),
            status: order.status(),
            payment_status: order.payment_status(),
            payment_method: order.payment_method(),
            shipping_address: order.shipping_address().as_str().to_string(),
            notes: order.notes().map(str::to_string),
            lines: order.lines().iter().map(OrderLineResponse::from).collect(),
            item_count: order.total_quantity(),
            total: order.total(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
        }
    }
}

// -- Handlers --

/// POST /orders: turns the caller's cart into an order.
#[tracing::instrument(skip(state, req))]
pub async fn place<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
    JsonBody(req): JsonBody<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let mut cmd = PlaceOrder::new(identity.customer_id, req.shipping_address);
    if let Some(method) = req.payment_method {
        cmd = cmd.with_payment_method(method.parse::<PaymentMethod>()?);
    }
    if let Some(notes) = req.notes {
        cmd = cmd.with_notes(notes);
    }

    let order = state.checkout.place_order(cmd).await?;
    Ok((StatusCode::CREATED, Json(OrderResponse::from(&order))))
}

/// GET /orders: the caller's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.queries.list_orders(identity).await?;
    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state.queries.get_order(identity, order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/{id}/cancel
#[tracing::instrument(skip(state))]
pub async fn cancel<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state.cancellation.cancel_order(identity, order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// PATCH /orders/{id}/status (staff only)
#[tracing::instrument(skip(state, req))]
pub async fn update_status<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let target: OrderStatus = req.status.parse()?;
    let order = state.admin.update_status(identity, order_id, target).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// PATCH /orders/{id}/payment-status (staff only)
#[tracing::instrument(skip(state, req))]
pub async fn update_payment_status<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Caller(identity): Caller,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<UpdatePaymentStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let status: PaymentStatus = req.payment_status.parse()?;
    let order = state
        .admin
        .update_payment_status(identity, order_id, status)
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid order ID format: {e}")))
}
