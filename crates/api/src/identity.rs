//! Caller identity extraction.
//!
//! Authentication happens upstream. The gateway forwards the authenticated
//! customer in `x-customer-id` and staff privilege in `x-elevated`.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use common::CustomerId;
use domain::Identity;

use crate::error::ApiError;

pub const CUSTOMER_ID_HEADER: &str = "x-customer-id";
pub const ELEVATED_HEADER: &str = "x-elevated";

/// The identity of the caller, taken from trusted request headers.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Identity);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        identity_from_headers(&parts.headers).map(Caller)
    }
}

fn identity_from_headers(headers: &HeaderMap) -> Result<Identity, ApiError> {
    let raw = headers
        .get(CUSTOMER_ID_HEADER)
        .ok_or_else(|| ApiError::Unauthenticated(format!("missing {CUSTOMER_ID_HEADER} header")))?;

    let customer_id: CustomerId = raw
        .to_str()
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| ApiError::BadRequest(format!("invalid {CUSTOMER_ID_HEADER} header")))?;

    let elevated = headers
        .get(ELEVATED_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| {
            let v = v.trim();
            v == "1" || v.eq_ignore_ascii_case("true")
        });

    Ok(Identity {
        customer_id,
        elevated,
    })
}
