pub mod http_mailer;
pub mod log_mailer;
pub mod memory;
pub mod postgres_otp_repository;
pub mod postgres_product_repository;
pub mod postgres_transaction_repository;
pub mod postgres_user_repository;

pub use http_mailer::HttpMailer;
pub use log_mailer::LogMailer;
pub use memory::InMemoryStore;
pub use postgres_otp_repository::PostgresOtpRepository;
pub use postgres_product_repository::PostgresProductRepository;
pub use postgres_transaction_repository::PostgresTransactionRepository;
pub use postgres_user_repository::PostgresUserRepository;

use sqlx::PgPool;
use std::sync::Arc;

use crate::ports::Repositories;

pub fn postgres_repositories(pool: PgPool) -> Repositories {
    Repositories {
        transactions: Arc::new(PostgresTransactionRepository::new(pool.clone())),
        products: Arc::new(PostgresProductRepository::new(pool.clone())),
        users: Arc::new(PostgresUserRepository::new(pool.clone())),
        otps: Arc::new(PostgresOtpRepository::new(pool)),
    }
}
