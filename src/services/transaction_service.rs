use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::ServiceSettings;
use crate::domain::{
    EnrichedTransaction, ExternalInvoice, HistoryPage, PaymentInfo, Product, PurchaseQuote,
    Transaction, User,
};
use crate::error::AppError;
use crate::ports::{
    InvoiceCustomer, InvoiceFee, InvoiceItem, InvoiceRequest, PaymentGateway,
    TransactionRepository,
};
use crate::services::pricing::BillPricer;
use crate::services::with_timeout;

pub const ADMIN_FEE: i64 = 0;
const ADMIN_FEE_TYPE: &str = "ADMIN";

/// Buyer-supplied part of a purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRequest {
    pub customer_id: String,
    pub success_redirect_url: String,
    pub failure_redirect_url: String,
}

/// Totals keyed by day, then by product type.
pub type IncomeReport = BTreeMap<NaiveDate, BTreeMap<String, i64>>;

/// Owns the transaction lifecycle: pricing, invoicing, persistence, status
/// changes and the read models over stored transactions.
#[derive(Clone)]
pub struct TransactionService {
    transactions: Arc<dyn TransactionRepository>,
    gateway: Arc<dyn PaymentGateway>,
    pricer: BillPricer,
    settings: ServiceSettings,
}

impl TransactionService {
    pub fn new(
        transactions: Arc<dyn TransactionRepository>,
        gateway: Arc<dyn PaymentGateway>,
        pricer: BillPricer,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            transactions,
            gateway,
            pricer,
            settings,
        }
    }

    /// Unpersisted PENDING draft priced for this customer.
    pub fn init_transaction(&self, product: &Product, user: &User, customer_id: &str) -> Transaction {
        let price = self.pricer.price_for(product, customer_id);
        Transaction::draft(
            user.id,
            product.id,
            customer_id.to_string(),
            price,
            ADMIN_FEE,
        )
    }

    pub fn review(&self, product: &Product, user: &User, customer_id: &str) -> PurchaseQuote {
        let draft = self.init_transaction(product, user, customer_id);
        PurchaseQuote {
            product_code: product.code.clone(),
            customer_id: draft.customer_id,
            product_description: product.description.clone(),
            product_price: draft.product_price,
            admin_fee: draft.admin_fee,
            total_price: draft.total_price,
        }
    }

    pub async fn create_invoice(
        &self,
        product: &Product,
        user: &User,
        transaction: &Transaction,
        success_redirect_url: &str,
        failure_redirect_url: &str,
    ) -> Result<ExternalInvoice, AppError> {
        let timestamp = Utc::now().timestamp();
        // The short id suffix keeps two purchases in the same second apart.
        let external_id = format!(
            "INV-{}-{}-{}",
            user.id,
            timestamp,
            hex::encode(&transaction.id.as_bytes()[..4])
        );

        let request = InvoiceRequest {
            external_id,
            amount: transaction.total_price,
            description: format!("Invoice {} {}-{}", self.settings.app_name, user.id, timestamp),
            invoice_duration: self.settings.invoice_duration_secs,
            customer: InvoiceCustomer {
                given_names: user.name.clone(),
                email: user.email.clone(),
            },
            success_redirect_url: success_redirect_url.to_string(),
            failure_redirect_url: failure_redirect_url.to_string(),
            currency: self.settings.currency.clone(),
            items: vec![InvoiceItem {
                name: product.description.clone(),
                quantity: 1,
                price: transaction.product_price,
                category: product.category.clone(),
            }],
            fees: vec![InvoiceFee {
                fee_type: ADMIN_FEE_TYPE.to_string(),
                value: transaction.admin_fee,
            }],
        };

        let invoice = self.gateway.create_invoice(&request).await?;
        Ok(invoice)
    }

    /// Prices, invoices and persists a purchase. Nothing is stored when the
    /// gateway call fails.
    pub async fn create_transaction(
        &self,
        product: &Product,
        user: &User,
        request: &PurchaseRequest,
    ) -> Result<Transaction, AppError> {
        let mut transaction = self.init_transaction(product, user, &request.customer_id);
        let invoice = self
            .create_invoice(
                product,
                user,
                &transaction,
                &request.success_redirect_url,
                &request.failure_redirect_url,
            )
            .await?;
        transaction.attach_invoice(&invoice);

        let saved = with_timeout(
            self.settings.storage_timeout,
            "insert transaction",
            self.transactions.insert(&transaction),
        )
        .await
        .map_err(|e| {
            tracing::error!(
                invoice_id = %invoice.id,
                external_id = %invoice.external_id,
                error = %e,
                "Invoice created but transaction could not be stored"
            );
            e
        })?;

        tracing::info!(
            transaction_id = %saved.id,
            user_id = %saved.user_id,
            product_code = %product.code,
            total_price = saved.total_price,
            "Transaction created"
        );
        Ok(saved)
    }

    pub async fn change_status(&self, id: Uuid, status: &str) -> Result<Transaction, AppError> {
        let mut transaction = self.get_by_id(id).await?;
        let loaded_version = transaction.version;
        let previous = std::mem::take(&mut transaction.status);
        transaction.set_status(status);

        let saved = self.save(&transaction, loaded_version).await?;
        tracing::info!(
            transaction_id = %id,
            from = %previous,
            to = %saved.status,
            "Transaction status changed"
        );
        Ok(saved)
    }

    pub async fn update_payment_info(
        &self,
        id: Uuid,
        info: &PaymentInfo,
    ) -> Result<Transaction, AppError> {
        let mut transaction = self.get_by_id(id).await?;
        let loaded_version = transaction.version;
        transaction.apply_payment_info(info);
        self.save(&transaction, loaded_version).await
    }

    pub async fn soft_delete(&self, id: Uuid) -> Result<Transaction, AppError> {
        let mut transaction = self.get_by_id(id).await?;
        if transaction.is_deleted() {
            return Ok(transaction);
        }
        let loaded_version = transaction.version;
        transaction.mark_deleted();
        let saved = self.save(&transaction, loaded_version).await?;
        tracing::info!(transaction_id = %id, "Transaction soft-deleted");
        Ok(saved)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Transaction, AppError> {
        with_timeout(
            self.settings.storage_timeout,
            "get transaction",
            self.transactions.get_by_id(id),
        )
        .await
    }

    pub async fn get_by_invoice_id(&self, invoice_id: &str) -> Result<Transaction, AppError> {
        with_timeout(
            self.settings.storage_timeout,
            "get transaction by invoice",
            self.transactions.get_by_invoice_id(invoice_id),
        )
        .await
    }

    /// Only the owner or an admin may read a transaction's history entry.
    pub async fn history_by_id(
        &self,
        id: Uuid,
        requester: &User,
    ) -> Result<EnrichedTransaction, AppError> {
        let transaction = self.get_by_id(id).await?;
        if !transaction.is_owned_by(requester.id) && !requester.is_admin() {
            return Err(AppError::Forbidden(
                "You are not allowed to view this transaction".to_string(),
            ));
        }

        with_timeout(
            self.settings.storage_timeout,
            "get transaction history",
            self.transactions.history_by_id(id),
        )
        .await
    }

    pub async fn history_by_user(&self, user_id: Uuid) -> Result<Vec<EnrichedTransaction>, AppError> {
        with_timeout(
            self.settings.storage_timeout,
            "list user history",
            self.transactions.history_by_user(user_id),
        )
        .await
    }

    /// `status` of `None` or `""` hides DELETED rows; anything else is an
    /// exact match.
    pub async fn all_paged(
        &self,
        page: i64,
        limit: i64,
        status: Option<&str>,
    ) -> Result<Vec<EnrichedTransaction>, AppError> {
        if page < 1 {
            return Err(AppError::Validation("page must be at least 1".to_string()));
        }
        if limit < 1 {
            return Err(AppError::Validation("limit must be at least 1".to_string()));
        }

        let window = HistoryPage {
            skip: (page - 1).saturating_mul(limit),
            take: limit,
            status: status
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        };

        with_timeout(
            self.settings.storage_timeout,
            "list history",
            self.transactions.list_history(&window),
        )
        .await
    }

    pub async fn count_all(&self) -> Result<i64, AppError> {
        with_timeout(
            self.settings.storage_timeout,
            "count transactions",
            self.transactions.count(),
        )
        .await
    }

    pub async fn top_products_by_category(&self) -> Result<HashMap<String, i64>, AppError> {
        with_timeout(
            self.settings.storage_timeout,
            "count by category",
            self.transactions.count_success_by_category(),
        )
        .await
    }

    /// SUCCESS income per UTC day and product type, both dates inclusive.
    pub async fn income_per_day(&self, from: NaiveDate, to: NaiveDate) -> Result<IncomeReport, AppError> {
        if from > to {
            return Err(AppError::Validation(
                "from must not be after to".to_string(),
            ));
        }

        let day_after = to
            .succ_opt()
            .ok_or_else(|| AppError::Validation("to is out of range".to_string()))?;
        let start = Utc.from_utc_datetime(&from.and_time(NaiveTime::MIN));
        let end = Utc.from_utc_datetime(&day_after.and_time(NaiveTime::MIN));

        let rows = with_timeout(
            self.settings.storage_timeout,
            "income per day",
            self.transactions.income_by_day(start, end),
        )
        .await?;

        let mut report = IncomeReport::new();
        for row in rows {
            *report
                .entry(row.day)
                .or_default()
                .entry(row.product_type)
                .or_insert(0) += row.total;
        }
        Ok(report)
    }

    async fn save(&self, transaction: &Transaction, loaded_version: i64) -> Result<Transaction, AppError> {
        let expected = self.settings.optimistic_locking.then_some(loaded_version);
        with_timeout(
            self.settings.storage_timeout,
            "update transaction",
            self.transactions.update(transaction, expected),
        )
        .await
    }
}
