//! Postgres implementation of TransactionRepository.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::transaction::STATUS_SUCCESS;
use crate::domain::{EnrichedTransaction, HistoryPage, IncomeRow, Transaction};
use crate::ports::{RepositoryError, RepositoryResult, TransactionRepository};

const TRANSACTION_COLUMNS: &str = "id, user_id, product_id, customer_id, product_price, \
    admin_fee, total_price, xendit_invoice_id, xendit_payment_url, xendit_status, \
    xendit_external_id, xendit_payment_method, xendit_payment_channel, status, version, \
    created_at, updated_at, deleted_at";

const ENRICHED_SELECT: &str = r#"
    SELECT t.id, u.email AS user_email, p.code AS product_code,
        p.description AS product_description, t.customer_id, t.product_price,
        t.admin_fee, t.total_price, t.xendit_payment_url, t.xendit_status,
        t.xendit_payment_method, t.xendit_payment_channel, t.status,
        t.created_at, t.updated_at
    FROM transactions t
    LEFT JOIN users u ON u.id = t.user_id
    LEFT JOIN products p ON p.id = t.product_id
"#;

/// Postgres-backed transaction repository.
#[derive(Clone)]
pub struct PostgresTransactionRepository {
    pool: PgPool,
}

impl PostgresTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionRepository for PostgresTransactionRepository {
    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let sql = format!(
            r#"
            INSERT INTO transactions ({cols})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING {cols}
            "#,
            cols = TRANSACTION_COLUMNS
        );
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(tx.id)
            .bind(tx.user_id)
            .bind(tx.product_id)
            .bind(&tx.customer_id)
            .bind(tx.product_price)
            .bind(tx.admin_fee)
            .bind(tx.total_price)
            .bind(&tx.xendit_invoice_id)
            .bind(&tx.xendit_payment_url)
            .bind(&tx.xendit_status)
            .bind(&tx.xendit_external_id)
            .bind(&tx.xendit_payment_method)
            .bind(&tx.xendit_payment_channel)
            .bind(&tx.status)
            .bind(tx.version)
            .bind(tx.created_at)
            .bind(tx.updated_at)
            .bind(tx.deleted_at)
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(row.into_domain())
    }

    async fn update(
        &self,
        tx: &Transaction,
        expected_version: Option<i64>,
    ) -> RepositoryResult<Transaction> {
        // Price, owner and product columns are never written here.
        let sql = format!(
            r#"
            UPDATE transactions SET
                xendit_invoice_id = $2,
                xendit_payment_url = $3,
                xendit_status = $4,
                xendit_external_id = $5,
                xendit_payment_method = $6,
                xendit_payment_channel = $7,
                status = $8,
                updated_at = $9,
                deleted_at = $10,
                version = version + 1
            WHERE id = $1 AND ($11::BIGINT IS NULL OR version = $11)
            RETURNING {cols}
            "#,
            cols = TRANSACTION_COLUMNS
        );
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(tx.id)
            .bind(&tx.xendit_invoice_id)
            .bind(&tx.xendit_payment_url)
            .bind(&tx.xendit_status)
            .bind(&tx.xendit_external_id)
            .bind(&tx.xendit_payment_method)
            .bind(&tx.xendit_payment_channel)
            .bind(&tx.status)
            .bind(tx.updated_at)
            .bind(tx.deleted_at)
            .bind(expected_version)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        match row {
            Some(row) => Ok(row.into_domain()),
            None => {
                let exists: Option<(i64,)> =
                    sqlx::query_as("SELECT version FROM transactions WHERE id = $1")
                        .bind(tx.id)
                        .fetch_optional(&self.pool)
                        .await
                        .map_err(RepositoryError::from)?;
                match exists {
                    Some((current,)) => Err(RepositoryError::Conflict(format!(
                        "transaction {} is at version {}, expected {}",
                        tx.id,
                        current,
                        expected_version.unwrap_or_default()
                    ))),
                    None => Err(RepositoryError::NotFound(tx.id.to_string())),
                }
            }
        }
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Transaction> {
        let sql = format!("SELECT {} FROM transactions WHERE id = $1", TRANSACTION_COLUMNS);
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.map(|r| r.into_domain())
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn get_by_invoice_id(&self, invoice_id: &str) -> RepositoryResult<Transaction> {
        let sql = format!(
            "SELECT {} FROM transactions WHERE xendit_invoice_id = $1",
            TRANSACTION_COLUMNS
        );
        let row = sqlx::query_as::<_, TransactionRow>(&sql)
            .bind(invoice_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.map(|r| r.into_domain())
            .ok_or_else(|| RepositoryError::NotFound(format!("invoice {}", invoice_id)))
    }

    async fn history_by_id(&self, id: Uuid) -> RepositoryResult<EnrichedTransaction> {
        let sql = format!("{} WHERE t.id = $1", ENRICHED_SELECT);
        let row = sqlx::query_as::<_, EnrichedRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.map(|r| r.into_domain())
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn history_by_user(&self, user_id: Uuid) -> RepositoryResult<Vec<EnrichedTransaction>> {
        let sql = format!(
            "{} WHERE t.user_id = $1 AND t.deleted_at IS NULL ORDER BY t.created_at ASC, t.id",
            ENRICHED_SELECT
        );
        let rows = sqlx::query_as::<_, EnrichedRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }

    async fn list_history(&self, page: &HistoryPage) -> RepositoryResult<Vec<EnrichedTransaction>> {
        let sql = format!(
            r#"{}
            WHERE ($1::TEXT IS NULL AND t.status <> 'DELETED' AND t.deleted_at IS NULL)
               OR t.status = $1
            ORDER BY t.created_at ASC, t.id
            OFFSET $2 LIMIT $3
            "#,
            ENRICHED_SELECT
        );
        let rows = sqlx::query_as::<_, EnrichedRow>(&sql)
            .bind(&page.status)
            .bind(page.skip)
            .bind(page.take)
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }

    async fn count(&self) -> RepositoryResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*)::BIGINT FROM transactions")
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(count)
    }

    async fn count_success_by_category(&self) -> RepositoryResult<HashMap<String, i64>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT p.category, COUNT(*)::BIGINT
            FROM transactions t
            JOIN products p ON p.id = t.product_id
            WHERE t.status = $1 AND t.deleted_at IS NULL
            GROUP BY p.category
            "#,
        )
        .bind(STATUS_SUCCESS)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().collect())
    }

    async fn income_by_day(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepositoryResult<Vec<IncomeRow>> {
        let rows = sqlx::query_as::<_, IncomeDbRow>(
            r#"
            SELECT (t.created_at AT TIME ZONE 'UTC')::DATE AS day,
                p.product_type,
                SUM(t.total_price)::BIGINT AS total
            FROM transactions t
            JOIN products p ON p.id = t.product_id
            WHERE t.status = $1 AND t.deleted_at IS NULL
                AND t.created_at >= $2 AND t.created_at < $3
            GROUP BY 1, 2
            ORDER BY 1, 2
            "#,
        )
        .bind(STATUS_SUCCESS)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows
            .into_iter()
            .map(|r| IncomeRow {
                day: r.day,
                product_type: r.product_type,
                total: r.total,
            })
            .collect())
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    user_id: Uuid,
    product_id: Uuid,
    customer_id: String,
    product_price: i64,
    admin_fee: i64,
    total_price: i64,
    xendit_invoice_id: Option<String>,
    xendit_payment_url: Option<String>,
    xendit_status: Option<String>,
    xendit_external_id: Option<String>,
    xendit_payment_method: Option<String>,
    xendit_payment_channel: Option<String>,
    status: String,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TransactionRow {
    fn into_domain(self) -> Transaction {
        Transaction {
            id: self.id,
            user_id: self.user_id,
            product_id: self.product_id,
            customer_id: self.customer_id,
            product_price: self.product_price,
            admin_fee: self.admin_fee,
            total_price: self.total_price,
            xendit_invoice_id: self.xendit_invoice_id,
            xendit_payment_url: self.xendit_payment_url,
            xendit_status: self.xendit_status,
            xendit_external_id: self.xendit_external_id,
            xendit_payment_method: self.xendit_payment_method,
            xendit_payment_channel: self.xendit_payment_channel,
            status: self.status,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EnrichedRow {
    id: Uuid,
    user_email: Option<String>,
    product_code: Option<String>,
    product_description: Option<String>,
    customer_id: String,
    product_price: i64,
    admin_fee: i64,
    total_price: i64,
    xendit_payment_url: Option<String>,
    xendit_status: Option<String>,
    xendit_payment_method: Option<String>,
    xendit_payment_channel: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EnrichedRow {
    fn into_domain(self) -> EnrichedTransaction {
        EnrichedTransaction {
            id: self.id,
            user_email: self.user_email,
            product_code: self.product_code,
            product_description: self.product_description,
            customer_id: self.customer_id,
            product_price: self.product_price,
            admin_fee: self.admin_fee,
            total_price: self.total_price,
            xendit_payment_url: self.xendit_payment_url,
            xendit_status: self.xendit_status,
            xendit_payment_method: self.xendit_payment_method,
            xendit_payment_channel: self.xendit_payment_channel,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct IncomeDbRow {
    day: NaiveDate,
    product_type: String,
    total: i64,
}
