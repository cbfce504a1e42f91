//! Postgres-backed lot ledger.
//!
//! ## Schema
//!
//! | Table | Purpose |
//! |-------|---------|
//! | `product` | name + first-seen description |
//! | `product_stock` | one row per (product, price) lot, quantity always positive |
//! | `product_order` | order header with creation timestamp |
//! | `ordered_product` | requested quantity per product per order |
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | LedgerError |
//! |------------|----------------------|-------------|
//! | Database (unique violation) | `23505` | `Constraint` |
//! | Database (foreign key violation) | `23503` | `Constraint` |
//! | Database (check constraint violation) | `23514` | `Constraint` |
//! | Database (serialization failure) | `40001` | `Conflict` |
//! | Database (other) | Any other | `Query` |
//! | PoolClosed / Io / Tls | N/A | `Connection` |
//! | ColumnDecode / Decode | N/A | `Decode` |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{instrument, Span};

use stockroom_core::{LotId, OrderId, ProductName, Quantity, UnitPrice};
use stockroom_inventory::{BestSeller, OrderLine, StockLot};

use super::{LedgerError, LedgerTx, LotLedger};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS product (
        name        TEXT PRIMARY KEY,
        description TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS product_stock (
        stock_id   BIGSERIAL PRIMARY KEY,
        name       TEXT NOT NULL REFERENCES product (name),
        quantity   BIGINT NOT NULL CHECK (quantity > 0),
        price      BIGINT NOT NULL CHECK (price > 0),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (name, price)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS product_order (
        order_id   BIGSERIAL PRIMARY KEY,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ordered_product (
        order_id BIGINT NOT NULL REFERENCES product_order (order_id),
        name     TEXT NOT NULL,
        quantity BIGINT NOT NULL CHECK (quantity > 0),
        PRIMARY KEY (order_id, name)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS product_order_updated_at_idx ON product_order (updated_at)",
];

/// Postgres-backed lot ledger.
///
/// Uses the SQLx pool; every [`LedgerTx`] wraps one pooled connection with an
/// open `BEGIN`. Dropping the transaction without committing rolls it back.
#[derive(Debug, Clone)]
pub struct PostgresLotLedger {
    pool: PgPool,
}

impl PostgresLotLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` with a small pool.
    pub async fn connect(database_url: &str) -> Result<Self, LedgerError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the ledger tables if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), LedgerError> {
        for statement in SCHEMA.iter().copied() {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl LotLedger for PostgresLotLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, LedgerError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PostgresLedgerTx { tx }))
    }

    #[instrument(skip(self), fields(product = %product, lot_count = tracing::field::Empty), err)]
    async fn lots_for(&self, product: &ProductName) -> Result<Vec<StockLot>, LedgerError> {
        let rows = sqlx::query(SELECT_LOTS_BY_PRICE)
            .bind(product.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("lots_for", e))?;

        let lots = rows.iter().map(lot_from_row).collect::<Result<Vec<_>, _>>()?;
        Span::current().record("lot_count", lots.len());
        Ok(lots)
    }

    #[instrument(skip(self), err)]
    async fn best_sellers_since(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<BestSeller>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT op.name, SUM(op.quantity)::BIGINT AS quantity
            FROM product_order po
            JOIN ordered_product op ON po.order_id = op.order_id
            WHERE po.updated_at >= $1
            GROUP BY op.name
            ORDER BY quantity DESC, op.name ASC
            LIMIT $2
            "#,
        )
        .bind(since)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("best_sellers_since", e))?;

        rows.iter()
            .map(|row| {
                let name: String = row.try_get("name").map_err(|e| map_sqlx_error("best_sellers_since", e))?;
                let quantity: i64 = row
                    .try_get("quantity")
                    .map_err(|e| map_sqlx_error("best_sellers_since", e))?;
                Ok(BestSeller {
                    name: decode_name(name)?,
                    quantity,
                })
            })
            .collect()
    }
}

const SELECT_LOTS_BY_PRICE: &str = r#"
    SELECT stock_id, name, price, quantity, updated_at
    FROM product_stock
    WHERE name = $1
    ORDER BY price ASC, stock_id ASC
"#;

struct PostgresLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PostgresLedgerTx {
    async fn insert_product_if_absent(
        &mut self,
        product: &ProductName,
        description: Option<&str>,
    ) -> Result<(), LedgerError> {
        sqlx::query(
            "INSERT INTO product (name, description) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING",
        )
        .bind(product.as_str())
        .bind(description)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    async fn find_lot(
        &mut self,
        product: &ProductName,
        price: UnitPrice,
    ) -> Result<Option<StockLot>, LedgerError> {
        let row = sqlx::query(
            r#"
            SELECT stock_id, name, price, quantity, updated_at
            FROM product_stock
            WHERE name = $1 AND price = $2
            "#,
        )
        .bind(product.as_str())
        .bind(price)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_lot", e))?;

        row.as_ref().map(lot_from_row).transpose()
    }

    async fn insert_lot(
        &mut self,
        product: &ProductName,
        price: UnitPrice,
        quantity: Quantity,
        at: DateTime<Utc>,
    ) -> Result<LotId, LedgerError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO product_stock (name, quantity, price, updated_at)
            VALUES ($1, $2, $3, $4)
            RETURNING stock_id
            "#,
        )
        .bind(product.as_str())
        .bind(quantity)
        .bind(price)
        .bind(at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_lot", e))?;
        Ok(LotId::new(id))
    }

    async fn set_lot_quantity(
        &mut self,
        lot: LotId,
        quantity: Quantity,
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let result = sqlx::query(
            "UPDATE product_stock SET quantity = $1, updated_at = $2 WHERE stock_id = $3",
        )
        .bind(quantity)
        .bind(at)
        .bind(lot.get())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("set_lot_quantity", e))?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::LotNotFound(lot));
        }
        Ok(())
    }

    async fn delete_lot(&mut self, lot: LotId) -> Result<(), LedgerError> {
        let result = sqlx::query("DELETE FROM product_stock WHERE stock_id = $1")
            .bind(lot.get())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_lot", e))?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::LotNotFound(lot));
        }
        Ok(())
    }

    async fn delete_lots_for(&mut self, product: &ProductName) -> Result<u64, LedgerError> {
        let result = sqlx::query("DELETE FROM product_stock WHERE name = $1")
            .bind(product.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_lots_for", e))?;
        Ok(result.rows_affected())
    }

    async fn lots_by_price(&mut self, product: &ProductName) -> Result<Vec<StockLot>, LedgerError> {
        let rows = sqlx::query(SELECT_LOTS_BY_PRICE)
            .bind(product.as_str())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lots_by_price", e))?;
        rows.iter().map(lot_from_row).collect()
    }

    async fn create_order(
        &mut self,
        created_at: DateTime<Utc>,
        lines: &[OrderLine],
    ) -> Result<OrderId, LedgerError> {
        let order_id: i64 = sqlx::query_scalar(
            "INSERT INTO product_order (updated_at) VALUES ($1) RETURNING order_id",
        )
        .bind(created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("create_order", e))?;

        for line in lines {
            sqlx::query("INSERT INTO ordered_product (order_id, name, quantity) VALUES ($1, $2, $3)")
                .bind(order_id)
                .bind(line.product.as_str())
                .bind(line.quantity)
                .execute(&mut *self.tx)
                .await
                .map_err(|e| map_sqlx_error("insert_ordered_product", e))?;
        }

        Ok(OrderId::new(order_id))
    }

    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

fn lot_from_row(row: &sqlx::postgres::PgRow) -> Result<StockLot, LedgerError> {
    let decode = |e| map_sqlx_error("decode_lot", e);
    let id: i64 = row.try_get("stock_id").map_err(decode)?;
    let name: String = row.try_get("name").map_err(decode)?;
    let price: i64 = row.try_get("price").map_err(decode)?;
    let quantity: i64 = row.try_get("quantity").map_err(decode)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(decode)?;

    Ok(StockLot {
        id: LotId::new(id),
        product: decode_name(name)?,
        price,
        quantity,
        updated_at,
    })
}

fn decode_name(name: String) -> Result<ProductName, LedgerError> {
    ProductName::parse(name).map_err(|e| LedgerError::Decode(e.to_string()))
}

/// Map SQLx errors to `LedgerError`, tagging the failed operation.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> LedgerError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("23503") | Some("23514") => LedgerError::Constraint(msg),
                Some("40001") => LedgerError::Conflict(msg),
                _ => LedgerError::Query(msg),
            }
        }
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            LedgerError::Connection(format!("connection pool unavailable in {}", operation))
        }
        sqlx::Error::Io(e) => LedgerError::Connection(format!("io error in {}: {}", operation, e)),
        sqlx::Error::Tls(e) => LedgerError::Connection(format!("tls error in {}: {}", operation, e)),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            LedgerError::Decode(format!("{} in {}", err, operation))
        }
        _ => LedgerError::Query(format!("sqlx error in {}: {}", operation, err)),
    }
}
