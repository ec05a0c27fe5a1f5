//! Transaction domain entity.
//! Framework-agnostic representation of one purchase attempt.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub const STATUS_PENDING: &str = "PENDING";
pub const STATUS_SUCCESS: &str = "SUCCESS";
pub const STATUS_FAILED: &str = "FAILED";
/// Status excluded from unfiltered admin listings.
pub const STATUS_DELETED: &str = "DELETED";

/// Domain entity representing a transaction.
///
/// `user_id`, `product_id`, `customer_id` and the three price fields are fixed at
/// creation. Only the status, the provider fields and the soft-delete marker
/// change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub customer_id: String,
    pub product_price: i64,
    pub admin_fee: i64,
    pub total_price: i64,
    pub xendit_invoice_id: Option<String>,
    pub xendit_payment_url: Option<String>,
    pub xendit_status: Option<String>,
    pub xendit_external_id: Option<String>,
    pub xendit_payment_method: Option<String>,
    pub xendit_payment_channel: Option<String>,
    pub status: String,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Builds an unpersisted PENDING draft. The total is always
    /// `product_price + admin_fee`.
    pub fn draft(
        user_id: Uuid,
        product_id: Uuid,
        customer_id: String,
        product_price: i64,
        admin_fee: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            product_id,
            customer_id,
            product_price,
            admin_fee,
            total_price: product_price + admin_fee,
            xendit_invoice_id: None,
            xendit_payment_url: None,
            xendit_status: None,
            xendit_external_id: None,
            xendit_payment_method: None,
            xendit_payment_channel: None,
            status: STATUS_PENDING.to_string(),
            version: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    /// Copies the provider's invoice identity onto the draft.
    pub fn attach_invoice(&mut self, invoice: &ExternalInvoice) {
        self.xendit_invoice_id = Some(invoice.id.clone());
        self.xendit_payment_url = Some(invoice.invoice_url.clone());
        self.xendit_status = Some(invoice.status.clone());
        self.xendit_external_id = Some(invoice.external_id.clone());
    }

    pub fn set_status(&mut self, status: &str) {
        self.status = status.to_string();
        self.updated_at = Utc::now();
    }

    pub fn apply_payment_info(&mut self, info: &PaymentInfo) {
        self.xendit_status = Some(info.status.clone());
        self.xendit_payment_method = info.payment_method.clone();
        self.xendit_payment_channel = info.payment_channel.clone();
        self.updated_at = Utc::now();
    }

    pub fn mark_deleted(&mut self) {
        let now = Utc::now();
        self.status = STATUS_DELETED.to_string();
        self.deleted_at = Some(now);
        self.updated_at = now;
    }
}

/// Invoice as returned by the payment provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ExternalInvoice {
    pub id: String,
    pub external_id: String,
    pub status: String,
    pub invoice_url: String,
}

/// Provider-sourced payment fields carried by a callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentInfo {
    pub status: String,
    pub payment_method: Option<String>,
    pub payment_channel: Option<String>,
}

/// Priced preview returned by the review endpoint. Nothing is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PurchaseQuote {
    pub product_code: String,
    pub customer_id: String,
    pub product_description: String,
    pub product_price: i64,
    pub admin_fee: i64,
    pub total_price: i64,
}

/// Transaction joined with the owning user's email and the purchased
/// product's code and description at query time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EnrichedTransaction {
    pub id: Uuid,
    pub user_email: Option<String>,
    pub product_code: Option<String>,
    pub product_description: Option<String>,
    pub customer_id: String,
    pub product_price: i64,
    pub admin_fee: i64,
    pub total_price: i64,
    pub xendit_payment_url: Option<String>,
    pub xendit_status: Option<String>,
    pub xendit_payment_method: Option<String>,
    pub xendit_payment_channel: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filter and window for the admin listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryPage {
    pub skip: i64,
    pub take: i64,
    pub status: Option<String>,
}

/// One row of the income report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeRow {
    pub day: NaiveDate,
    pub product_type: String,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_total_is_price_plus_fee() {
        let tx = Transaction::draft(Uuid::new_v4(), Uuid::new_v4(), "0812".into(), 15_000, 2_500);
        assert_eq!(tx.total_price, 17_500);
        assert_eq!(tx.status, STATUS_PENDING);
        assert_eq!(tx.version, 0);
        assert!(!tx.is_deleted());
    }

    #[test]
    fn test_payment_info_leaves_status_and_price_alone() {
        let mut tx = Transaction::draft(Uuid::new_v4(), Uuid::new_v4(), "0812".into(), 10_000, 0);
        tx.apply_payment_info(&PaymentInfo {
            status: "PAID".into(),
            payment_method: Some("BANK_TRANSFER".into()),
            payment_channel: Some("BCA".into()),
        });
        assert_eq!(tx.status, STATUS_PENDING);
        assert_eq!(tx.total_price, 10_000);
        assert_eq!(tx.xendit_status.as_deref(), Some("PAID"));
        assert_eq!(tx.xendit_payment_channel.as_deref(), Some("BCA"));
    }

    #[test]
    fn test_mark_deleted_sets_marker_and_status() {
        let mut tx = Transaction::draft(Uuid::new_v4(), Uuid::new_v4(), "x".into(), 1, 0);
        tx.mark_deleted();
        assert!(tx.is_deleted());
        assert_eq!(tx.status, STATUS_DELETED);
    }
}
