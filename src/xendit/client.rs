use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::domain::ExternalInvoice;
use crate::ports::{GatewayError, InvoiceRequest, PaymentGateway};

const INVOICES_PATH: &str = "/v2/invoices";

/// Subset of the invoice object Xendit returns on creation.
#[derive(Debug, Clone, Deserialize)]
struct InvoiceResponse {
    id: String,
    external_id: String,
    status: String,
    invoice_url: String,
}

/// HTTP client for the Xendit invoice API.
#[derive(Clone)]
pub struct XenditClient {
    client: Client,
    base_url: String,
    secret_key: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl XenditClient {
    pub fn new(base_url: String, secret_key: String, timeout: Duration) -> Self {
        Self::with_circuit_breaker(base_url, secret_key, timeout, 3, 60)
    }

    /// Creates a client with custom circuit breaker configuration
    pub fn with_circuit_breaker(
        base_url: String,
        secret_key: String,
        timeout: Duration,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        XenditClient {
            client,
            base_url,
            secret_key,
            circuit_breaker,
        }
    }

    pub fn circuit_state(&self) -> &'static str {
        if self.circuit_breaker.is_call_permitted() {
            "closed"
        } else {
            "open"
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl PaymentGateway for XenditClient {
    async fn create_invoice(
        &self,
        request: &InvoiceRequest,
    ) -> Result<ExternalInvoice, GatewayError> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), INVOICES_PATH);
        let client = self.client.clone();
        let secret_key = self.secret_key.clone();
        let payload = request.clone();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client
                    .post(&url)
                    .basic_auth(secret_key, None::<&str>)
                    .json(&payload)
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(GatewayError::Rejected {
                        status: status.as_u16(),
                        body,
                    });
                }

                let invoice = response
                    .json::<InvoiceResponse>()
                    .await
                    .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
                Ok::<_, GatewayError>(invoice)
            })
            .await;

        match result {
            Ok(invoice) => {
                tracing::info!(
                    invoice_id = %invoice.id,
                    external_id = %invoice.external_id,
                    status = %invoice.status,
                    "Invoice created"
                );
                Ok(ExternalInvoice {
                    id: invoice.id,
                    external_id: invoice.external_id,
                    status: invoice.status,
                    invoice_url: invoice.invoice_url,
                })
            }
            Err(FailsafeError::Rejected) => Err(GatewayError::CircuitOpen(
                "Xendit invoice API circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => {
                tracing::warn!(error = %e, "Invoice creation failed");
                Err(e)
            }
        }
    }
}
