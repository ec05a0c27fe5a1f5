use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::domain::Product;
use crate::ports::{ProductRepository, RepositoryError, RepositoryResult};

const PRODUCT_COLUMNS: &str = "id, code, description, nominal, details, price, product_type, \
    category, active_period, status, icon_url, created_at, updated_at, deleted_at";

#[derive(Clone)]
pub struct PostgresProductRepository {
    pool: PgPool,
}

impl PostgresProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn insert_row<'c, E>(executor: E, product: &Product) -> RepositoryResult<Product>
where
    E: Executor<'c, Database = Postgres>,
{
    let sql = format!(
        r#"
        INSERT INTO products ({cols})
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        RETURNING {cols}
        "#,
        cols = PRODUCT_COLUMNS
    );
    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(product.id)
        .bind(&product.code)
        .bind(&product.description)
        .bind(&product.nominal)
        .bind(&product.details)
        .bind(product.price)
        .bind(&product.product_type)
        .bind(&product.category)
        .bind(product.active_period)
        .bind(&product.status)
        .bind(&product.icon_url)
        .bind(product.created_at)
        .bind(product.updated_at)
        .bind(product.deleted_at)
        .fetch_one(executor)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Conflict(format!("product code {}", product.code))
            }
            other => RepositoryError::from(other),
        })?;

    Ok(row.into_domain())
}

#[async_trait]
impl ProductRepository for PostgresProductRepository {
    async fn insert(&self, product: &Product) -> RepositoryResult<Product> {
        insert_row(&self.pool, product).await
    }

    async fn replace(&self, retired: Uuid, replacement: &Product) -> RepositoryResult<Product> {
        let mut tx = self.pool.begin().await?;

        let retired_rows = sqlx::query(
            r#"
            UPDATE products SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(retired)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if retired_rows == 0 {
            tx.rollback().await?;
            return Err(RepositoryError::NotFound(format!("product {}", retired)));
        }

        // Dropping `tx` on an insert error rolls the retirement back.
        let saved = insert_row(&mut *tx, replacement).await?;
        tx.commit().await?;
        Ok(saved)
    }

    async fn soft_delete(&self, id: Uuid) -> RepositoryResult<Product> {
        let sql = format!(
            r#"
            UPDATE products SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.map(|r| r.into_domain())
            .ok_or_else(|| RepositoryError::NotFound(format!("product {}", id)))
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Product> {
        let sql = format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS);
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.map(|r| r.into_domain())
            .ok_or_else(|| RepositoryError::NotFound(format!("product {}", id)))
    }

    async fn get_active_by_code(&self, code: &str) -> RepositoryResult<Product> {
        let sql = format!(
            "SELECT {} FROM products WHERE code = $1 AND deleted_at IS NULL",
            PRODUCT_COLUMNS
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.map(|r| r.into_domain())
            .ok_or_else(|| RepositoryError::NotFound(format!("product {}", code)))
    }

    async fn list_active(&self) -> RepositoryResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE deleted_at IS NULL ORDER BY category, price, code",
            PRODUCT_COLUMNS
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }

    async fn list_by_category(&self, category: &str) -> RepositoryResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE deleted_at IS NULL AND category = $1 \
             ORDER BY price, code",
            PRODUCT_COLUMNS
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(category)
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }

    async fn list_by_type(&self, product_type: &str) -> RepositoryResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE deleted_at IS NULL AND product_type = $1 \
             ORDER BY category, price, code",
            PRODUCT_COLUMNS
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(product_type)
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }

    async fn categories(&self) -> RepositoryResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT category FROM products WHERE deleted_at IS NULL ORDER BY category",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(|(category,)| category).collect())
    }

    async fn categories_by_type(&self, product_type: &str) -> RepositoryResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT category FROM products
            WHERE deleted_at IS NULL AND product_type = $1
            ORDER BY category
            "#,
        )
        .bind(product_type)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(|(category,)| category).collect())
    }

    async fn count_active(&self) -> RepositoryResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*)::BIGINT FROM products WHERE deleted_at IS NULL")
                .fetch_one(&self.pool)
                .await
                .map_err(RepositoryError::from)?;

        Ok(count)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    code: String,
    description: String,
    nominal: String,
    details: String,
    price: i64,
    product_type: String,
    category: String,
    active_period: i32,
    status: String,
    icon_url: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl ProductRow {
    fn into_domain(self) -> Product {
        Product {
            id: self.id,
            code: self.code,
            description: self.description,
            nominal: self.nominal,
            details: self.details,
            price: self.price,
            product_type: self.product_type,
            category: self.category,
            active_period: self.active_period,
            status: self.status,
            icon_url: self.icon_url,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        }
    }
}
