use serde::Serialize;

use crate::domain::transaction::STATUS_SUCCESS;
use crate::domain::{PaymentInfo, Transaction};
use crate::error::AppError;
use crate::services::{ProductCatalog, TransactionService};

/// Result of applying one provider callback.
///
/// `failures` lists the steps that went wrong after the transaction was
/// found. They never turn the callback into an error; the provider is
/// acknowledged either way.
#[derive(Debug, Clone, Serialize)]
pub struct CallbackOutcome {
    pub transaction: Transaction,
    pub failures: Vec<String>,
    pub auto_completed: bool,
}

impl CallbackOutcome {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Clone)]
pub struct CallbackReconciler {
    transactions: TransactionService,
    catalog: ProductCatalog,
}

impl CallbackReconciler {
    pub fn new(transactions: TransactionService, catalog: ProductCatalog) -> Self {
        Self {
            transactions,
            catalog,
        }
    }

    /// Applies a callback for `invoice_id`. Only the initial lookup can fail
    /// the call.
    pub async fn reconcile(
        &self,
        invoice_id: &str,
        info: &PaymentInfo,
    ) -> Result<CallbackOutcome, AppError> {
        let found = self
            .transactions
            .get_by_invoice_id(invoice_id)
            .await
            .map_err(|e| {
                tracing::warn!(
                    target: "reconciliation",
                    invoice_id,
                    error = %e,
                    "Callback for unknown invoice"
                );
                e
            })?;

        let mut current = found.clone();
        let mut failures = Vec::new();

        match self.transactions.update_payment_info(found.id, info).await {
            Ok(updated) => current = updated,
            Err(e) => failures.push(format!("update payment info: {}", e)),
        }

        // Only a product positively identified as the special case holds
        // the transaction back.
        let hold = match self.catalog.get_by_id(found.product_id).await {
            Ok(product) => product.is_special_case(),
            Err(e) => {
                failures.push(format!("resolve product {}: {}", found.product_id, e));
                false
            }
        };

        let mut auto_completed = false;
        if found.is_deleted() {
            // A deleted row stays deleted.
            failures.push(format!("mark success: transaction {} is deleted", found.id));
        } else if !hold {
            match self.transactions.change_status(found.id, STATUS_SUCCESS).await {
                Ok(updated) => {
                    current = updated;
                    auto_completed = true;
                }
                Err(e) => failures.push(format!("mark success: {}", e)),
            }
        }

        let outcome = CallbackOutcome {
            transaction: current,
            failures,
            auto_completed,
        };

        if outcome.is_clean() {
            tracing::info!(
                target: "reconciliation",
                invoice_id,
                transaction_id = %found.id,
                provider_status = %info.status,
                status = %outcome.transaction.status,
                auto_completed,
                "Callback reconciled"
            );
        } else {
            tracing::warn!(
                target: "reconciliation",
                invoice_id,
                transaction_id = %found.id,
                provider_status = %info.status,
                failures = ?outcome.failures,
                "Callback acknowledged with reconciliation failures"
            );
        }

        Ok(outcome)
    }
}
