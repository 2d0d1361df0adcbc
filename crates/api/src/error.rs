//! API error types with HTTP response mapping.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use domain::CommerceError;
use serde_json::{Value, json};
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
///
/// Every error renders as `{ "error", "code", "retryable", "details" }`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request is malformed (bad path id, bad header value, unreadable body).
    #[error("{0}")]
    BadRequest(String),

    /// No caller identity was supplied.
    #[error("{0}")]
    Unauthenticated(String),

    /// A cart or order operation failed.
    #[error(transparent)]
    Commerce(#[from] CommerceError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Commerce(err) => match err {
                CommerceError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
                CommerceError::NotFound { .. } => StatusCode::NOT_FOUND,
                CommerceError::ProductUnavailable { .. }
                | CommerceError::InsufficientStock { .. }
                | CommerceError::EmptyCart
                | CommerceError::InvalidState { .. } => StatusCode::CONFLICT,
                CommerceError::Forbidden(_) => StatusCode::FORBIDDEN,
                CommerceError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
                CommerceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthenticated(_) => "UNAUTHENTICATED",
            ApiError::Commerce(err) => err.code(),
        }
    }

    fn details(&self) -> Value {
        let ApiError::Commerce(err) = self else {
            return Value::Null;
        };
        match err {
            CommerceError::NotFound { entity, id } => json!({ "entity": entity, "id": id }),
            CommerceError::ProductUnavailable { product_id, name } => {
                json!({ "product_id": product_id, "name": name })
            }
            CommerceError::InsufficientStock {
                product_id,
                requested,
                available,
            } => json!({
                "product_id": product_id,
                "requested": requested,
                "available": available,
            }),
            CommerceError::InvalidState {
                order_id,
                current,
                action,
            } => json!({
                "order_id": order_id,
                "current_status": current,
                "action": action,
            }),
            _ => Value::Null,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let retryable = matches!(&self, ApiError::Commerce(err) if err.is_retryable());

        let message = match &self {
            ApiError::Commerce(CommerceError::Internal(msg)) => {
                tracing::error!(error = %msg, "internal server error");
                "internal server error".to_string()
            }
            ApiError::Commerce(CommerceError::Transient(msg)) => {
                tracing::warn!(error = %msg, "transient store failure");
                self.to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "error": message,
            "code": self.code(),
            "retryable": retryable,
            "details": self.details(),
        });

        if retryable {
            (status, [(header::RETRY_AFTER, "1")], axum::Json(body)).into_response()
        } else {
            (status, axum::Json(body)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{OrderId, ProductId};
    use domain::OrderStatus;

    fn status_of(err: CommerceError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn commerce_errors_map_to_statuses() {
        assert_eq!(
            status_of(CommerceError::InvalidArgument("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(CommerceError::order_not_found(OrderId::new())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status_of(CommerceError::EmptyCart), StatusCode::CONFLICT);
        assert_eq!(
            status_of(CommerceError::Forbidden("x".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(CommerceError::Transient("x".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(CommerceError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn insufficient_stock_details() {
        let err = ApiError::from(CommerceError::InsufficientStock {
            product_id: ProductId::new("SKU-001"),
            requested: 6,
            available: 5,
        });
        assert_eq!(
            err.details(),
            json!({ "product_id": "SKU-001", "requested": 6, "available": 5 })
        );
    }

    #[test]
    fn invalid_state_details_carry_current_status() {
        let err = ApiError::from(CommerceError::InvalidState {
            order_id: OrderId::new(),
            current: OrderStatus::Shipped,
            action: "cancel",
        });
        assert_eq!(err.details()["current_status"], "SHIPPED");
    }

    #[test]
    fn transient_errors_ask_for_retry() {
        let response = ApiError::from(CommerceError::Transient("deadlock".into())).into_response();
        assert_eq!(response.headers()[header::RETRY_AFTER], "1");
    }
}
