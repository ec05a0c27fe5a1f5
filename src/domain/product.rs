use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Product type whose catalog price is only a placeholder.
pub const PRODUCT_TYPE_BILL: &str = "BILL";
/// Products with this code are reconciled by hand and never auto-complete.
pub const SPECIAL_CASE_CODE: &str = "SPECIALCASE";
pub const PRODUCT_STATUS_ACTIVE: &str = "active";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub code: String,
    pub description: String,
    pub nominal: String,
    pub details: String,
    pub price: i64,
    #[serde(rename = "type")]
    pub product_type: String,
    pub category: String,
    pub active_period: i32,
    pub status: String,
    pub icon_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Product {
    pub fn new(draft: ProductDraft) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            code: draft.code,
            description: draft.description,
            nominal: draft.nominal,
            details: draft.details,
            price: draft.price,
            product_type: draft.product_type,
            category: draft.category,
            active_period: draft.active_period,
            status: draft.status.unwrap_or_else(|| PRODUCT_STATUS_ACTIVE.to_string()),
            icon_url: draft.icon_url,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_bill(&self) -> bool {
        self.product_type == PRODUCT_TYPE_BILL
    }

    pub fn is_special_case(&self) -> bool {
        self.code == SPECIAL_CASE_CODE
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Client-supplied product fields for create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProductDraft {
    pub code: String,
    pub description: String,
    #[serde(default)]
    pub nominal: String,
    #[serde(default)]
    pub details: String,
    pub price: i64,
    #[serde(rename = "type")]
    pub product_type: String,
    pub category: String,
    #[serde(default)]
    pub active_period: i32,
    /// Defaults to "active".
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub icon_url: String,
}
