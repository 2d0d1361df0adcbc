use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CartLineId, CustomerId, OrderId, ProductId};
use domain::{
    Cart, CartLine, Customization, Money, Order, OrderLine, OrderRecord, OrderStatus,
    PaymentMethod, PaymentStatus, Product, ShippingAddress,
};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{StockDecrement, Store, UnitOfWork},
};

/// Default per-transaction lock wait before Postgres gives up with 55P03.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// PostgreSQL-backed store.
///
/// Each unit of work is a database transaction. Product, cart, and order
/// reads taken `for_update` use `SELECT ... FOR UPDATE`, and stock decrements
/// are a single guarded `UPDATE`, so concurrent placements on the same
/// product serialize on its row.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Connects a new pool.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Sets how long a unit of work waits on a row lock before failing.
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let mut tx = self.pool.begin().await?;

        // SET cannot take bind parameters; the value is an integer we own.
        let timeout_ms = self.lock_timeout.as_millis();
        sqlx::query(&format!("SET LOCAL lock_timeout = {timeout_ms}"))
            .execute(&mut *tx)
            .await?;

        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

/// Unit of work over a PostgreSQL transaction.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl PgUnitOfWork {
    async fn fetch_order(&mut self, order_id: OrderId, lock: bool) -> Result<Option<Order>> {
        let lock_clause = if lock { " FOR UPDATE" } else { "" };
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1{lock_clause}"
        ))
        .bind(order_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let line_rows = sqlx::query(&format!(
            "SELECT {ORDER_LINE_COLUMNS} FROM order_lines WHERE order_id = $1 ORDER BY position ASC"
        ))
        .bind(order_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;

        let lines = line_rows
            .iter()
            .map(row_to_order_line)
            .collect::<Result<Vec<_>>>()?;
        row_to_order(&row, lines).map(Some)
    }
}

fn to_u32(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{column} out of range: {value}")))
}

fn row_to_product(row: PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::new(row.try_get::<String, _>("id")?),
        name: row.try_get("name")?,
        unit_price: Money::new(row.try_get::<Decimal, _>("unit_price")?),
        stock: to_u32(row.try_get("stock")?, "stock")?,
        active: row.try_get("active")?,
    })
}

fn row_to_cart_line(row: PgRow) -> Result<CartLine> {
    Ok(CartLine {
        id: CartLineId::from_uuid(row.try_get::<Uuid, _>("id")?),
        product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
        quantity: to_u32(row.try_get("quantity")?, "quantity")?,
        customization: row
            .try_get::<Option<serde_json::Value>, _>("customization")?
            .map(Customization::new),
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

fn row_to_order_line(row: &PgRow) -> Result<OrderLine> {
    Ok(OrderLine {
        product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
        product_name: row.try_get("product_name")?,
        unit_price: Money::new(row.try_get::<Decimal, _>("unit_price")?),
        quantity: to_u32(row.try_get("quantity")?, "quantity")?,
        customization: row
            .try_get::<Option<serde_json::Value>, _>("customization")?
            .map(Customization::new),
    })
}

fn row_to_order(row: &PgRow, lines: Vec<OrderLine>) -> Result<Order> {
    let corrupt = |e: domain::CommerceError| StoreError::Corrupt(e.to_string());

    Ok(Order::from(OrderRecord {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
        lines,
        total: Money::new(row.try_get::<Decimal, _>("total")?),
        shipping_address: ShippingAddress::parse(row.try_get::<String, _>("shipping_address")?)
            .map_err(corrupt)?,
        payment_method: row
            .try_get::<String, _>("payment_method")?
            .parse::<PaymentMethod>()
            .map_err(corrupt)?,
        notes: row.try_get("notes")?,
        status: row
            .try_get::<String, _>("status")?
            .parse::<OrderStatus>()
            .map_err(corrupt)?,
        payment_status: row
            .try_get::<String, _>("payment_status")?
            .parse::<PaymentStatus>()
            .map_err(corrupt)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    }))
}

const ORDER_COLUMNS: &str = "id, customer_id, total, shipping_address, payment_method, notes, \
     status, payment_status, created_at, updated_at";

const ORDER_LINE_COLUMNS: &str =
    "order_id, product_id, product_name, unit_price, quantity, customization";

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn product_for_update(&mut self, product_id: &ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(
            "SELECT id, name, unit_price, stock, active FROM products WHERE id = $1 FOR UPDATE",
        )
        .bind(product_id.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_product).transpose()
    }

    async fn product(&mut self, product_id: &ProductId) -> Result<Option<Product>> {
        let row = sqlx::query("SELECT id, name, unit_price, stock, active FROM products WHERE id = $1")
            .bind(product_id.as_str())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(row_to_product).transpose()
    }

    async fn upsert_product(&mut self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, unit_price, stock, active)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                unit_price = EXCLUDED.unit_price,
                stock = EXCLUDED.stock,
                active = EXCLUDED.active,
                updated_at = NOW()
            "#,
        )
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(product.unit_price.amount())
        .bind(i64::from(product.stock))
        .bind(product.active)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn delete_product(&mut self, product_id: &ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(product_id.as_str())
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn decrement_stock(
        &mut self,
        product_id: &ProductId,
        amount: u32,
    ) -> Result<StockDecrement> {
        let remaining: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock = stock - $2, updated_at = NOW()
            WHERE id = $1 AND stock >= $2
            RETURNING stock
            "#,
        )
        .bind(product_id.as_str())
        .bind(i64::from(amount))
        .fetch_optional(&mut *self.tx)
        .await?;

        if let Some(remaining) = remaining {
            return Ok(StockDecrement::Applied {
                remaining: to_u32(remaining, "stock")?,
            });
        }

        let available: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(product_id.as_str())
            .fetch_optional(&mut *self.tx)
            .await?;

        match available {
            Some(available) => Ok(StockDecrement::Insufficient {
                available: to_u32(available, "stock")?,
            }),
            None => Ok(StockDecrement::Missing),
        }
    }

    async fn increment_stock(
        &mut self,
        product_id: &ProductId,
        amount: u32,
    ) -> Result<Option<u32>> {
        let stock: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock = stock + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING stock
            "#,
        )
        .bind(product_id.as_str())
        .bind(i64::from(amount))
        .fetch_optional(&mut *self.tx)
        .await?;

        stock.map(|s| to_u32(s, "stock")).transpose()
    }

    async fn cart_for_update(&mut self, customer_id: CustomerId) -> Result<Cart> {
        sqlx::query("INSERT INTO carts (customer_id) VALUES ($1) ON CONFLICT (customer_id) DO NOTHING")
            .bind(customer_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;

        sqlx::query("SELECT customer_id FROM carts WHERE customer_id = $1 FOR UPDATE")
            .bind(customer_id.as_uuid())
            .fetch_one(&mut *self.tx)
            .await?;

        let rows = sqlx::query(
            r#"
            SELECT id, product_id, quantity, customization, created_at
            FROM cart_lines
            WHERE customer_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(customer_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;

        let lines = rows
            .into_iter()
            .map(row_to_cart_line)
            .collect::<Result<Vec<_>>>()?;
        Ok(Cart::with_lines(customer_id, lines))
    }

    async fn insert_cart_line(&mut self, customer_id: CustomerId, line: &CartLine) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cart_lines (id, customer_id, product_id, quantity, customization, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(line.id.as_uuid())
        .bind(customer_id.as_uuid())
        .bind(line.product_id.as_str())
        .bind(i64::from(line.quantity))
        .bind(line.customization.as_ref().map(|c| c.as_json().clone()))
        .bind(line.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn set_cart_line_quantity(
        &mut self,
        customer_id: CustomerId,
        line_id: CartLineId,
        quantity: u32,
    ) -> Result<bool> {
        let result =
            sqlx::query("UPDATE cart_lines SET quantity = $3 WHERE id = $1 AND customer_id = $2")
                .bind(line_id.as_uuid())
                .bind(customer_id.as_uuid())
                .bind(i64::from(quantity))
                .execute(&mut *self.tx)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_cart_line(
        &mut self,
        customer_id: CustomerId,
        line_id: CartLineId,
    ) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_lines WHERE id = $1 AND customer_id = $2")
            .bind(line_id.as_uuid())
            .bind(customer_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&mut self, customer_id: CustomerId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cart_lines WHERE customer_id = $1")
            .bind(customer_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, total, shipping_address, payment_method, notes,
                                status, payment_status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.customer_id().as_uuid())
        .bind(order.total().amount())
        .bind(order.shipping_address().as_str())
        .bind(order.payment_method().as_str())
        .bind(order.notes())
        .bind(order.status().as_str())
        .bind(order.payment_status().as_str())
        .bind(order.created_at())
        .bind(order.updated_at())
        .execute(&mut *self.tx)
        .await?;

        for (position, line) in order.lines().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_lines (order_id, position, product_id, product_name, unit_price,
                                         quantity, customization)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(order.id().as_uuid())
            .bind(position as i32)
            .bind(line.product_id.as_str())
            .bind(&line.product_name)
            .bind(line.unit_price.amount())
            .bind(i64::from(line.quantity))
            .bind(line.customization.as_ref().map(|c| c.as_json().clone()))
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn order_for_update(&mut self, order_id: OrderId) -> Result<Option<Order>> {
        self.fetch_order(order_id, true).await
    }

    async fn order(&mut self, order_id: OrderId) -> Result<Option<Order>> {
        self.fetch_order(order_id, false).await
    }

    async fn orders_for_customer(&mut self, customer_id: CustomerId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = $1 ORDER BY created_at DESC"
        ))
        .bind(customer_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids: Vec<Uuid> = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<std::result::Result<_, _>>()?;

        let line_rows = sqlx::query(&format!(
            "SELECT {ORDER_LINE_COLUMNS} FROM order_lines WHERE order_id = ANY($1) \
             ORDER BY order_id, position ASC"
        ))
        .bind(&order_ids)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut lines_by_order: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
        for row in &line_rows {
            let order_id: Uuid = row.try_get("order_id")?;
            lines_by_order
                .entry(order_id)
                .or_default()
                .push(row_to_order_line(row)?);
        }

        rows.iter()
            .zip(order_ids)
            .map(|(row, id)| row_to_order(row, lines_by_order.remove(&id).unwrap_or_default()))
            .collect()
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, payment_status = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.status().as_str())
        .bind(order.payment_status().as_str())
        .bind(order.updated_at())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Constraint(format!(
                "order {} does not exist",
                order.id()
            )));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let uow = *self;
        uow.tx.commit().await?;
        Ok(())
    }
}
