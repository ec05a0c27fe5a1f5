use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Role, User, UserStatus};
use crate::ports::{RepositoryError, RepositoryResult, UserRepository};

const USER_COLUMNS: &str =
    "id, name, email, password_hash, role, status, created_at, updated_at, deleted_at";

#[derive(Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn insert(&self, user: &User) -> RepositoryResult<User> {
        let sql = format!(
            r#"
            INSERT INTO users ({cols})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {cols}
            "#,
            cols = USER_COLUMNS
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.status.as_str())
            .bind(user.created_at)
            .bind(user.updated_at)
            .bind(user.deleted_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    RepositoryError::Conflict(format!("email {}", user.email))
                }
                other => RepositoryError::from(other),
            })?;

        row.into_domain()
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<User> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        match row {
            Some(row) => row.into_domain(),
            None => Err(RepositoryError::NotFound(format!("user {}", id))),
        }
    }

    async fn get_by_email(&self, email: &str) -> RepositoryResult<User> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        match row {
            Some(row) => row.into_domain(),
            None => Err(RepositoryError::NotFound(format!("user {}", email))),
        }
    }

    async fn set_status(&self, id: Uuid, status: UserStatus) -> RepositoryResult<User> {
        let sql = format!(
            "UPDATE users SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        match row {
            Some(row) => row.into_domain(),
            None => Err(RepositoryError::NotFound(format!("user {}", id))),
        }
    }

    async fn update(&self, user: &User) -> RepositoryResult<User> {
        let sql = format!(
            r#"
            UPDATE users
            SET name = $2, email = $3, password_hash = $4, status = $5,
                updated_at = $6, deleted_at = $7
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.status.as_str())
            .bind(user.updated_at)
            .bind(user.deleted_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    RepositoryError::Conflict(format!("email {}", user.email))
                }
                other => RepositoryError::from(other),
            })?;

        match row {
            Some(row) => row.into_domain(),
            None => Err(RepositoryError::NotFound(format!("user {}", user.id))),
        }
    }

    async fn list(&self) -> RepositoryResult<Vec<User>> {
        let sql = format!(
            "SELECT {} FROM users ORDER BY created_at ASC, id",
            USER_COLUMNS
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        rows.into_iter().map(UserRow::into_domain).collect()
    }

    async fn count(&self) -> RepositoryResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*)::BIGINT FROM users WHERE deleted_at IS NULL")
                .fetch_one(&self.pool)
                .await
                .map_err(RepositoryError::from)?;

        Ok(count)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl UserRow {
    fn into_domain(self) -> RepositoryResult<User> {
        let role: Role = self
            .role
            .parse()
            .map_err(|e: String| RepositoryError::Database(sqlx::Error::Decode(e.into())))?;
        let status: UserStatus = self
            .status
            .parse()
            .map_err(|e: String| RepositoryError::Database(sqlx::Error::Decode(e.into())))?;

        Ok(User {
            id: self.id,
            name: self.name,
            email: self.email,
            password_hash: self.password_hash,
            role,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        })
    }
}
