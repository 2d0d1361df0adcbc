//! Integration tests for the API server.

use std::sync::OnceLock;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{CustomerId, OrderId, ProductId};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use store::InMemoryStore;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (Router, InMemoryStore) {
    let store = InMemoryStore::new();
    let app = api::create_app(api::create_state(store.clone()), get_metrics_handle());
    (app, store)
}

/// Who is calling.
#[derive(Clone, Copy)]
enum As {
    Anonymous,
    Customer(CustomerId),
    Staff,
}

async fn send(app: &Router, method: &str, uri: &str, who: As, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    match who {
        As::Anonymous => {}
        As::Customer(id) => builder = builder.header("x-customer-id", id.to_string()),
        As::Staff => {
            builder = builder
                .header("x-customer-id", CustomerId::new().to_string())
                .header("x-elevated", "true")
        }
    }

    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn seed_product(app: &Router, id: &str, price: &str, stock: u32) {
    let (status, _) = send(
        app,
        "PUT",
        &format!("/products/{id}"),
        As::Staff,
        Some(json!({ "name": "Widget", "unit_price": price, "stock": stock })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

async fn add_to_cart(app: &Router, customer: CustomerId, id: &str, quantity: u32) -> Value {
    let (status, body) = send(
        app,
        "POST",
        "/cart/items",
        As::Customer(customer),
        Some(json!({ "product_id": id, "quantity": quantity })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body
}

async fn place(app: &Router, customer: CustomerId) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/orders",
        As::Customer(customer),
        Some(json!({ "shipping_address": "1 Main St" })),
    )
    .await
}

async fn stock(store: &InMemoryStore, id: &str) -> u32 {
    store.product(&ProductId::new(id)).await.unwrap().stock
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();
    let (status, body) = send(&app, "GET", "/health", As::Anonymous, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "checkout");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = setup();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let (app, _) = setup();
    let (status, body) = send(&app, "GET", "/cart", As::Anonymous, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn test_malformed_identity_is_bad_request() {
    let (app, _) = setup();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/cart")
                .header("x-customer-id", "nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cart_lifecycle() {
    let (app, _) = setup();
    seed_product(&app, "SKU-001", "10.00", 10).await;
    let customer = CustomerId::new();

    let (status, body) = send(&app, "GET", "/cart", As::Customer(customer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lines"].as_array().unwrap().len(), 0);

    add_to_cart(&app, customer, "SKU-001", 2).await;
    let body = add_to_cart(&app, customer, "SKU-001", 1).await;
    assert_eq!(body["lines"].as_array().unwrap().len(), 1);
    assert_eq!(body["item_count"], 3);
    assert_eq!(body["subtotal"], "30.00");

    let (status, body) = send(
        &app,
        "POST",
        "/cart/items",
        As::Customer(customer),
        Some(json!({ "product_id": "SKU-001", "quantity": 1, "customization": { "engraving": "AB" } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lines"].as_array().unwrap().len(), 2);

    let line_id = body["lines"][0]["line_id"].as_str().unwrap().to_string();
    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/cart/items/{line_id}"),
        As::Customer(customer),
        Some(json!({ "quantity": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lines"][0]["quantity"], 5);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/cart/items/{line_id}"),
        As::Customer(customer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        "DELETE",
        &format!("/cart/items/{line_id}"),
        As::Customer(customer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, body) = send(&app, "DELETE", "/cart", As::Customer(customer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["item_count"], 0);
}

#[tokio::test]
async fn test_add_item_validation() {
    let (app, _) = setup();
    seed_product(&app, "SKU-001", "10.00", 2).await;
    let customer = CustomerId::new();

    let (status, body) = send(
        &app,
        "POST",
        "/cart/items",
        As::Customer(customer),
        Some(json!({ "product_id": "SKU-001", "quantity": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_ARGUMENT");

    let (status, _) = send(
        &app,
        "POST",
        "/cart/items",
        As::Customer(customer),
        Some(json!({ "product_id": "SKU-404", "quantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        "POST",
        "/cart/items",
        As::Customer(customer),
        Some(json!({ "product_id": "SKU-001", "quantity": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INSUFFICIENT_STOCK");
    assert_eq!(body["details"]["available"], 2);
}

#[tokio::test]
async fn test_place_order_happy_path() {
    let (app, store) = setup();
    seed_product(&app, "SKU-001", "19.99", 5).await;
    let customer = CustomerId::new();
    add_to_cart(&app, customer, "SKU-001", 5).await;

    let (status, order) = send(
        &app,
        "POST",
        "/orders",
        As::Customer(customer),
        Some(json!({
            "shipping_address": "1 Main St",
            "payment_method": "card",
            "notes": "leave at door"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    assert_eq!(order["status"], "PENDING");
    assert_eq!(order["payment_status"], "PENDING");
    assert_eq!(order["payment_method"], "CARD");
    assert_eq!(order["total"], "99.95");
    assert_eq!(order["item_count"], 5);
    assert_eq!(stock(&store, "SKU-001").await, 0);

    let (_, cart) = send(&app, "GET", "/cart", As::Customer(customer), None).await;
    assert_eq!(cart["item_count"], 0);

    let id = order["id"].as_str().unwrap();
    let (status, fetched) = send(
        &app,
        "GET",
        &format!("/orders/{id}"),
        As::Customer(customer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], order["id"]);

    let (status, listed) = send(&app, "GET", "/orders", As::Customer(customer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_place_order_rejections() {
    let (app, store) = setup();
    seed_product(&app, "SKU-001", "10.00", 6).await;
    let customer = CustomerId::new();

    let (status, body) = place(&app, customer).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "EMPTY_CART");

    add_to_cart(&app, customer, "SKU-001", 6).await;
    seed_product(&app, "SKU-001", "10.00", 5).await;

    let (status, body) = send(
        &app,
        "POST",
        "/orders",
        As::Customer(customer),
        Some(json!({ "shipping_address": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_ARGUMENT");

    let (status, body) = place(&app, customer).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INSUFFICIENT_STOCK");
    assert_eq!(body["retryable"], false);
    assert_eq!(body["details"]["product_id"], "SKU-001");
    assert_eq!(body["details"]["requested"], 6);
    assert_eq!(body["details"]["available"], 5);
    assert_eq!(stock(&store, "SKU-001").await, 5);
    assert_eq!(store.order_count().await, 0);

    let (status, body) = send(
        &app,
        "POST",
        "/orders",
        As::Customer(customer),
        Some(json!({ "shipping_address": "1 Main St", "payment_method": "barter" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_ARGUMENT");
}

#[tokio::test]
async fn test_transient_failure_is_retryable() {
    let (app, store) = setup();
    seed_product(&app, "SKU-001", "10.00", 5).await;
    let customer = CustomerId::new();
    add_to_cart(&app, customer, "SKU-001", 1).await;

    store.fail_next_commits(1);
    let (status, body) = place(&app, customer).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "TRANSIENT");
    assert_eq!(body["retryable"], true);
    assert_eq!(stock(&store, "SKU-001").await, 5);

    let (status, _) = place(&app, customer).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_cancel_order() {
    let (app, store) = setup();
    seed_product(&app, "SKU-001", "10.00", 5).await;
    let customer = CustomerId::new();
    add_to_cart(&app, customer, "SKU-001", 5).await;
    let (_, order) = place(&app, customer).await;
    let id = order["id"].as_str().unwrap();
    let uri = format!("/orders/{id}/cancel");

    let (status, body) = send(&app, "POST", &uri, As::Customer(CustomerId::new()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, body) = send(&app, "POST", &uri, As::Customer(customer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CANCELLED");
    assert_eq!(stock(&store, "SKU-001").await, 5);

    let (status, body) = send(&app, "POST", &uri, As::Customer(customer), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_STATE");
    assert_eq!(body["details"]["current_status"], "CANCELLED");
    assert_eq!(stock(&store, "SKU-001").await, 5);
}

#[tokio::test]
async fn test_order_access_control() {
    let (app, _) = setup();
    seed_product(&app, "SKU-001", "10.00", 5).await;
    let customer = CustomerId::new();
    add_to_cart(&app, customer, "SKU-001", 1).await;
    let (_, order) = place(&app, customer).await;
    let id = order["id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        "GET",
        &format!("/orders/{id}"),
        As::Customer(CustomerId::new()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "GET", &format!("/orders/{id}"), As::Staff, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "GET",
        "/orders/not-a-uuid",
        As::Customer(customer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "GET",
        &format!("/orders/{}", OrderId::new()),
        As::Customer(customer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_status_administration() {
    let (app, store) = setup();
    seed_product(&app, "SKU-001", "10.00", 5).await;
    let customer = CustomerId::new();
    add_to_cart(&app, customer, "SKU-001", 2).await;
    let (_, order) = place(&app, customer).await;
    let id = order["id"].as_str().unwrap();
    let uri = format!("/orders/{id}/status");

    let (status, _) = send(
        &app,
        "PATCH",
        &uri,
        As::Customer(customer),
        Some(json!({ "status": "CONFIRMED" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "PATCH",
        &uri,
        As::Staff,
        Some(json!({ "status": "teleported" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_ARGUMENT");

    let (status, body) = send(
        &app,
        "PATCH",
        &uri,
        As::Staff,
        Some(json!({ "status": "confirmed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CONFIRMED");

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/orders/{id}/payment-status"),
        As::Staff,
        Some(json!({ "payment_status": "PAID" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payment_status"], "PAID");

    let (status, body) = send(
        &app,
        "PATCH",
        &uri,
        As::Staff,
        Some(json!({ "status": "CANCELLED" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CANCELLED");
    assert_eq!(stock(&store, "SKU-001").await, 5);
}

#[tokio::test]
async fn test_product_seeding_requires_staff() {
    let (app, _) = setup();
    let (status, body) = send(
        &app,
        "PUT",
        "/products/SKU-001",
        As::Customer(CustomerId::new()),
        Some(json!({ "name": "Widget", "unit_price": "1.00", "stock": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_metrics_record_placements() {
    let (app, _) = setup();
    seed_product(&app, "SKU-001", "10.00", 5).await;
    let customer = CustomerId::new();
    add_to_cart(&app, customer, "SKU-001", 1).await;
    place(&app, customer).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("orders_placed_total"));
    assert!(text.contains("cart_mutations_total"));
}

#[tokio::test]
async fn test_malformed_bodies_use_the_error_envelope() {
    let (app, _) = setup();
    seed_product(&app, "SKU-001", "10.00", 5).await;
    let customer = CustomerId::new();

    let (status, body) = send(
        &app,
        "POST",
        "/cart/items",
        As::Customer(customer),
        Some(json!({ "product_id": "SKU-001", "quantity": -1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
    assert_eq!(body["retryable"], false);

    let (status, body) = send(
        &app,
        "POST",
        "/orders",
        As::Customer(customer),
        Some(json!({ "notes": "no address" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/cart/items")
                .header("x-customer-id", customer.to_string())
                .body(Body::from("{\"product_id\": \"SKU-001\", \"quantity\": 1}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
