use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    EnrichedTransaction, HistoryPage, IncomeRow, Otp, OtpScope, Product, Transaction, User,
    UserStatus,
};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction>;

    /// Writes the mutable fields of `tx` and bumps its version. With
    /// `expected_version` set, the write only lands when the stored version
    /// still matches, otherwise `Conflict`.
    async fn update(
        &self,
        tx: &Transaction,
        expected_version: Option<i64>,
    ) -> RepositoryResult<Transaction>;

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Transaction>;

    async fn get_by_invoice_id(&self, invoice_id: &str) -> RepositoryResult<Transaction>;

    async fn history_by_id(&self, id: Uuid) -> RepositoryResult<EnrichedTransaction>;

    /// Excludes soft-deleted rows.
    async fn history_by_user(&self, user_id: Uuid) -> RepositoryResult<Vec<EnrichedTransaction>>;

    async fn list_history(&self, page: &HistoryPage) -> RepositoryResult<Vec<EnrichedTransaction>>;

    async fn count(&self) -> RepositoryResult<i64>;

    async fn count_success_by_category(&self) -> RepositoryResult<HashMap<String, i64>>;

    /// SUCCESS totals grouped by day of creation and product type, `from`
    /// inclusive and `to` exclusive.
    async fn income_by_day(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepositoryResult<Vec<IncomeRow>>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn insert(&self, product: &Product) -> RepositoryResult<Product>;

    async fn soft_delete(&self, id: Uuid) -> RepositoryResult<Product>;

    /// Retires `retired` and inserts `replacement` as one unit: either both
    /// land or neither does.
    async fn replace(&self, retired: Uuid, replacement: &Product) -> RepositoryResult<Product>;

    /// Addresses deleted rows too.
    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Product>;

    async fn get_active_by_code(&self, code: &str) -> RepositoryResult<Product>;

    async fn list_active(&self) -> RepositoryResult<Vec<Product>>;

    async fn list_by_category(&self, category: &str) -> RepositoryResult<Vec<Product>>;

    async fn list_by_type(&self, product_type: &str) -> RepositoryResult<Vec<Product>>;

    async fn categories(&self) -> RepositoryResult<Vec<String>>;

    async fn categories_by_type(&self, product_type: &str) -> RepositoryResult<Vec<String>>;

    async fn count_active(&self) -> RepositoryResult<i64>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert(&self, user: &User) -> RepositoryResult<User>;

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<User>;

    async fn get_by_email(&self, email: &str) -> RepositoryResult<User>;

    async fn set_status(&self, id: Uuid, status: UserStatus) -> RepositoryResult<User>;

    /// Writes name, email, password hash, status and the delete marker.
    async fn update(&self, user: &User) -> RepositoryResult<User>;

    /// Every account, deleted ones included, oldest first.
    async fn list(&self) -> RepositoryResult<Vec<User>>;

    /// Accounts that are not deleted.
    async fn count(&self) -> RepositoryResult<i64>;
}

#[async_trait]
pub trait OtpRepository: Send + Sync {
    async fn insert(&self, otp: &Otp) -> RepositoryResult<Otp>;

    async fn last_for_user(&self, user_id: Uuid) -> RepositoryResult<Option<Otp>>;

    async fn find_active(
        &self,
        user_id: Uuid,
        code: &str,
        scope: OtpScope,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Option<Otp>>;

    async fn consume(&self, id: Uuid) -> RepositoryResult<()>;
}

/// Every storage port, bundled for wiring.
#[derive(Clone)]
pub struct Repositories {
    pub transactions: Arc<dyn TransactionRepository>,
    pub products: Arc<dyn ProductRepository>,
    pub users: Arc<dyn UserRepository>,
    pub otps: Arc<dyn OtpRepository>,
}
