//! End-to-end checkout scenarios on the in-memory store.

use std::sync::Arc;

use checkout::{AddItem, CancellationService, CartService, CheckoutService, OrderAdmin, PlaceOrder};
use common::{CustomerId, ProductId};
use domain::{CommerceError, Customization, Identity, Money, OrderStatus, Product};
use store::{InMemoryStore, Store};
use tokio::sync::Barrier;

struct TestHarness {
    store: InMemoryStore,
    cart: CartService<InMemoryStore>,
    checkout: CheckoutService<InMemoryStore>,
    cancellation: CancellationService<InMemoryStore>,
    admin: OrderAdmin<InMemoryStore>,
}

impl TestHarness {
    fn new() -> Self {
        let store = InMemoryStore::new();
        Self {
            cart: CartService::new(store.clone()),
            checkout: CheckoutService::new(store.clone()),
            cancellation: CancellationService::new(store.clone()),
            admin: OrderAdmin::new(store.clone()),
            store,
        }
    }

    async fn seed(&self, id: &str, price_cents: i64, stock: u32) {
        let mut uow = self.store.begin().await.unwrap();
        uow.upsert_product(&Product::new(id, "Widget", Money::from_cents(price_cents), stock))
            .await
            .unwrap();
        uow.commit().await.unwrap();
    }

    async fn stock(&self, id: &str) -> u32 {
        self.store.product(&ProductId::new(id)).await.unwrap().stock
    }

    async fn add(&self, customer: CustomerId, id: &str, quantity: u32) {
        self.cart
            .add_item(AddItem::new(customer, id, quantity))
            .await
            .unwrap();
    }

    async fn place(&self, customer: CustomerId) -> Result<domain::Order, CommerceError> {
        self.checkout
            .place_order(PlaceOrder::new(customer, "1 Main St"))
            .await
    }
}

#[tokio::test]
async fn ordering_the_whole_stock_succeeds() {
    let h = TestHarness::new();
    h.seed("SKU-001", 1999, 5).await;
    let customer = CustomerId::new();
    h.add(customer, "SKU-001", 5).await;

    let order = h.place(customer).await.unwrap();

    assert_eq!(h.stock("SKU-001").await, 0);
    assert!(h.store.cart(customer).await.unwrap().is_empty());
    assert_eq!(order.total(), Money::from_cents(1999 * 5));
    assert_eq!(order.status(), OrderStatus::Pending);
}

#[tokio::test]
async fn ordering_more_than_stock_changes_nothing() {
    let h = TestHarness::new();
    h.seed("SKU-001", 1000, 6).await;
    let customer = CustomerId::new();
    h.add(customer, "SKU-001", 6).await;
    // Stock drops after the line was added; the cart check is only advisory.
    h.seed("SKU-001", 1000, 5).await;

    let product_before = h.store.product(&ProductId::new("SKU-001")).await;
    let cart_before = h.store.cart(customer).await;

    let err = h.place(customer).await.unwrap_err();
    match err {
        CommerceError::InsufficientStock {
            product_id,
            requested,
            available,
        } => {
            assert_eq!(product_id, ProductId::new("SKU-001"));
            assert_eq!(requested, 6);
            assert_eq!(available, 5);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    assert_eq!(h.store.product(&ProductId::new("SKU-001")).await, product_before);
    assert_eq!(h.store.cart(customer).await, cart_before);
    assert_eq!(cart_before.unwrap().lines()[0].quantity, 6);
    assert_eq!(h.store.order_count().await, 0);
}

#[tokio::test]
async fn one_bad_line_rolls_back_every_line() {
    let h = TestHarness::new();
    h.seed("SKU-001", 1000, 10).await;
    h.seed("SKU-002", 500, 10).await;
    let customer = CustomerId::new();
    h.add(customer, "SKU-001", 2).await;
    h.add(customer, "SKU-002", 10).await;
    h.seed("SKU-002", 500, 9).await;

    let err = h.place(customer).await.unwrap_err();
    assert!(matches!(err, CommerceError::InsufficientStock { .. }));
    assert_eq!(h.stock("SKU-001").await, 10);
    assert_eq!(h.stock("SKU-002").await, 9);
    assert_eq!(h.store.cart(customer).await.unwrap().lines().len(), 2);
}

#[tokio::test]
async fn place_then_cancel_round_trips_stock() {
    let h = TestHarness::new();
    h.seed("SKU-001", 1000, 5).await;
    let customer = CustomerId::new();
    h.add(customer, "SKU-001", 5).await;

    let order = h.place(customer).await.unwrap();
    assert_eq!(h.stock("SKU-001").await, 0);

    let cancelled = h
        .cancellation
        .cancel_order(Identity::customer(customer), order.id())
        .await
        .unwrap();
    assert_eq!(cancelled.status(), OrderStatus::Cancelled);
    assert_eq!(h.stock("SKU-001").await, 5);

    let err = h
        .cancellation
        .cancel_order(Identity::customer(customer), order.id())
        .await
        .unwrap_err();
    assert!(matches!(err, CommerceError::InvalidState { .. }));
    assert_eq!(h.stock("SKU-001").await, 5);
}

#[tokio::test]
async fn cancelling_a_shipped_order_fails_and_keeps_stock() {
    let h = TestHarness::new();
    h.seed("SKU-001", 1000, 5).await;
    let customer = CustomerId::new();
    h.add(customer, "SKU-001", 2).await;
    let order = h.place(customer).await.unwrap();

    let staff = Identity::elevated(CustomerId::new());
    for status in [
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
    ] {
        h.admin
            .update_status(staff, order.id(), status)
            .await
            .unwrap();
    }

    let err = h
        .cancellation
        .cancel_order(Identity::customer(customer), order.id())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CommerceError::InvalidState {
            current: OrderStatus::Shipped,
            ..
        }
    ));
    assert_eq!(h.stock("SKU-001").await, 3);
}

#[tokio::test]
async fn uncustomized_lines_merge_and_customized_lines_do_not() {
    let h = TestHarness::new();
    h.seed("SKU-001", 1000, 10).await;
    let customer = CustomerId::new();

    h.add(customer, "SKU-001", 1).await;
    h.add(customer, "SKU-001", 2).await;
    let cart = h.store.cart(customer).await.unwrap();
    assert_eq!(cart.lines().len(), 1);
    assert_eq!(cart.lines()[0].quantity, 3);

    let view = h
        .cart
        .add_item(
            AddItem::new(customer, "SKU-001", 1)
                .with_customization(Customization::new(serde_json::json!({"gift_wrap": true}))),
        )
        .await
        .unwrap();
    assert_eq!(view.lines.len(), 2);
    assert_eq!(view.item_count, 4);
}

#[tokio::test]
async fn failed_commit_leaves_no_trace_and_is_retryable() {
    let h = TestHarness::new();
    h.seed("SKU-001", 1000, 5).await;
    let customer = CustomerId::new();
    h.add(customer, "SKU-001", 2).await;

    h.store.fail_next_commits(1);
    let err = h.place(customer).await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(h.stock("SKU-001").await, 5);
    assert_eq!(h.store.cart(customer).await.unwrap().lines().len(), 1);
    assert_eq!(h.store.order_count().await, 0);

    h.place(customer).await.unwrap();
    assert_eq!(h.stock("SKU-001").await, 3);
}

#[tokio::test]
async fn cancel_skips_products_deleted_from_the_catalog() {
    let h = TestHarness::new();
    h.seed("SKU-001", 1000, 5).await;
    h.seed("SKU-002", 1000, 5).await;
    let customer = CustomerId::new();
    h.add(customer, "SKU-001", 1).await;
    h.add(customer, "SKU-002", 1).await;
    let order = h.place(customer).await.unwrap();

    let mut uow = h.store.begin().await.unwrap();
    uow.delete_product(&ProductId::new("SKU-001")).await.unwrap();
    uow.commit().await.unwrap();

    h.cancellation
        .cancel_order(Identity::customer(customer), order.id())
        .await
        .unwrap();
    assert_eq!(h.stock("SKU-002").await, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_orders_for_the_last_unit_have_one_winner() {
    let h = Arc::new(TestHarness::new());
    h.seed("SKU-001", 1000, 1).await;

    let customers = [CustomerId::new(), CustomerId::new()];
    for customer in customers {
        h.add(customer, "SKU-001", 1).await;
    }

    let barrier = Arc::new(Barrier::new(customers.len()));
    let handles: Vec<_> = customers
        .into_iter()
        .map(|customer| {
            let h = Arc::clone(&h);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                h.place(customer).await
            })
        })
        .collect();

    let mut placed = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => placed += 1,
            Err(CommerceError::InsufficientStock { available: 0, .. }) => rejected += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(placed, 1);
    assert_eq!(rejected, 1);
    assert_eq!(h.stock("SKU-001").await, 0);
    assert_eq!(h.store.order_count().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cancellations_restore_stock_once() {
    let h = Arc::new(TestHarness::new());
    h.seed("SKU-001", 1000, 3).await;
    let customer = CustomerId::new();
    h.add(customer, "SKU-001", 3).await;
    let order = h.place(customer).await.unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let h = Arc::clone(&h);
            let order_id = order.id();
            tokio::spawn(async move {
                h.cancellation
                    .cancel_order(Identity::customer(customer), order_id)
                    .await
            })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            succeeded += 1;
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(h.stock("SKU-001").await, 3);
}
