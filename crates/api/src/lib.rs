//! HTTP API server for the cart and checkout core.
//!
//! Provides REST endpoints for carts, order placement, cancellation, and
//! staff order administration, with structured logging (tracing) and
//! Prometheus metrics.

pub mod body;
pub mod config;
pub mod error;
pub mod identity;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post, put};
use checkout::{
    CancellationService, CartService, CatalogAdmin, CheckoutService, OrderAdmin, OrderQueries,
};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub cart: CartService<S>,
    pub checkout: CheckoutService<S>,
    pub cancellation: CancellationService<S>,
    pub queries: OrderQueries<S>,
    pub admin: OrderAdmin<S>,
    pub catalog: CatalogAdmin<S>,
}

/// Builds the application state, with every service sharing one store.
pub fn create_state<S: Store + Clone + 'static>(store: S) -> Arc<AppState<S>> {
    Arc::new(AppState {
        cart: CartService::new(store.clone()),
        checkout: CheckoutService::new(store.clone()),
        cancellation: CancellationService::new(store.clone()),
        queries: OrderQueries::new(store.clone()),
        admin: OrderAdmin::new(store.clone()),
        catalog: CatalogAdmin::new(store),
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/cart",
            get(routes::cart::view::<S>).delete(routes::cart::clear::<S>),
        )
        .route("/cart/items", post(routes::cart::add_item::<S>))
        .route(
            "/cart/items/{line_id}",
            patch(routes::cart::update_line::<S>).delete(routes::cart::remove_line::<S>),
        )
        .route(
            "/orders",
            post(routes::orders::place::<S>).get(routes::orders::list::<S>),
        )
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route(
            "/orders/{id}/status",
            patch(routes::orders::update_status::<S>),
        )
        .route(
            "/orders/{id}/payment-status",
            patch(routes::orders::update_payment_status::<S>),
        )
        .route("/products/{id}", put(routes::products::upsert::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
