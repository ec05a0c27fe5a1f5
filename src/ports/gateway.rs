use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ExternalInvoice;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invoice rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid response from payment gateway: {0}")]
    InvalidResponse(String),

    #[error("Circuit breaker open: {0}")]
    CircuitOpen(String),
}

/// Payload of an invoice creation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRequest {
    pub external_id: String,
    pub amount: i64,
    pub description: String,
    pub invoice_duration: u64,
    pub customer: InvoiceCustomer,
    pub success_redirect_url: String,
    pub failure_redirect_url: String,
    pub currency: String,
    pub items: Vec<InvoiceItem>,
    pub fees: Vec<InvoiceFee>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceCustomer {
    pub given_names: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub name: String,
    pub quantity: u32,
    pub price: i64,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceFee {
    #[serde(rename = "type")]
    pub fee_type: String,
    pub value: i64,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_invoice(&self, request: &InvoiceRequest)
        -> Result<ExternalInvoice, GatewayError>;
}
