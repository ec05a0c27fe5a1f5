pub mod mail_dispatcher;
pub mod otp;
pub mod password;
pub mod pricing;
pub mod product_catalog;
pub mod reconciliation;
pub mod transaction_service;
pub mod users;

pub use mail_dispatcher::MailDispatcher;
pub use otp::OtpService;
pub use pricing::BillPricer;
pub use product_catalog::ProductCatalog;
pub use reconciliation::{CallbackOutcome, CallbackReconciler};
pub use transaction_service::{PurchaseRequest, TransactionService};
pub use users::{AdminUserUpdate, UserDirectory};

use std::future::Future;
use std::time::Duration;

use crate::error::AppError;
use crate::ports::RepositoryResult;

/// Bounds a storage call. An elapsed deadline surfaces as `AppError::Timeout`
/// and is never retried.
pub(crate) async fn with_timeout<T, F>(limit: Duration, op: &str, fut: F) -> Result<T, AppError>
where
    F: Future<Output = RepositoryResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(AppError::from),
        Err(_) => {
            tracing::warn!(operation = op, timeout_ms = limit.as_millis() as u64, "Storage call timed out");
            Err(AppError::Timeout(format!("{} exceeded {:?}", op, limit)))
        }
    }
}
