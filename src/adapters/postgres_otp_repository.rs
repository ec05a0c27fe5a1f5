use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::otp::OtpStatus;
use crate::domain::{Otp, OtpScope};
use crate::ports::{OtpRepository, RepositoryError, RepositoryResult};

const OTP_COLUMNS: &str = "id, user_id, code, scope, status, expires_at, created_at, updated_at";

#[derive(Clone)]
pub struct PostgresOtpRepository {
    pool: PgPool,
}

impl PostgresOtpRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OtpRepository for PostgresOtpRepository {
    async fn insert(&self, otp: &Otp) -> RepositoryResult<Otp> {
        let sql = format!(
            "INSERT INTO otps ({cols}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {cols}",
            cols = OTP_COLUMNS
        );
        let row = sqlx::query_as::<_, OtpRow>(&sql)
            .bind(otp.id)
            .bind(otp.user_id)
            .bind(&otp.code)
            .bind(otp.scope.as_str())
            .bind(otp.status.as_str())
            .bind(otp.expires_at)
            .bind(otp.created_at)
            .bind(otp.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.into_domain()
    }

    async fn last_for_user(&self, user_id: Uuid) -> RepositoryResult<Option<Otp>> {
        let sql = format!(
            "SELECT {} FROM otps WHERE user_id = $1 ORDER BY created_at DESC LIMIT 1",
            OTP_COLUMNS
        );
        let row = sqlx::query_as::<_, OtpRow>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.map(OtpRow::into_domain).transpose()
    }

    async fn find_active(
        &self,
        user_id: Uuid,
        code: &str,
        scope: OtpScope,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<Otp>> {
        let sql = format!(
            r#"
            SELECT {} FROM otps
            WHERE user_id = $1 AND code = $2 AND scope = $3
              AND status = 'active' AND expires_at > $4
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            OTP_COLUMNS
        );
        let row = sqlx::query_as::<_, OtpRow>(&sql)
            .bind(user_id)
            .bind(code)
            .bind(scope.as_str())
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.map(OtpRow::into_domain).transpose()
    }

    async fn consume(&self, id: Uuid) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE otps SET status = 'consumed', updated_at = NOW() WHERE id = $1 AND status = 'active'",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("otp {}", id)));
        }
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OtpRow {
    id: Uuid,
    user_id: Uuid,
    code: String,
    scope: String,
    status: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OtpRow {
    fn into_domain(self) -> RepositoryResult<Otp> {
        let scope: OtpScope = self
            .scope
            .parse()
            .map_err(|e: String| RepositoryError::Database(sqlx::Error::Decode(e.into())))?;
        let status = match self.status.as_str() {
            "active" => OtpStatus::Active,
            "consumed" => OtpStatus::Consumed,
            other => {
                return Err(RepositoryError::Database(sqlx::Error::Decode(
                    format!("unknown otp status '{}'", other).into(),
                )))
            }
        };

        Ok(Otp {
            id: self.id,
            user_id: self.user_id,
            code: self.code,
            scope,
            status,
            expires_at: self.expires_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
