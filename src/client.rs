//! HTTP client for the budgeting service API

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

use crate::traits::ReconcileService;
use crate::types::*;

/// Production API root
pub const DEFAULT_API_URL: &str = "https://api.ynab.com/v1";

/// Error id the service returns when a bulk update touches too many transactions
pub const BATCH_TOO_LARGE_ERROR_ID: &str = "403.4";

#[derive(Debug, Serialize)]
struct UpdateTransactionsRequest<'a> {
    transactions: Vec<TransactionUpdate<'a>>,
}

#[derive(Debug, Serialize)]
struct TransactionUpdate<'a> {
    id: &'a str,
    cleared: ClearedStatus,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    detail: String,
}

/// Client for the budgeting service
///
/// Cloning is cheap and shares the underlying connection pool.
#[derive(Clone)]
pub struct YnabClient {
    client: Client,
    base_url: String,
    token: Secret<String>,
}

impl YnabClient {
    /// Create a client against the production API
    pub fn new(token: Secret<String>) -> Self {
        Self::with_base_url(token, DEFAULT_API_URL)
    }

    /// Create a client against another API root (a proxy or a test server)
    pub fn with_base_url(token: Secret<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn transactions_url(&self, budget_id: &str) -> String {
        format!("{}/budgets/{}/transactions", self.base_url, budget_id)
    }
}

#[async_trait]
impl ReconcileService for YnabClient {
    async fn mark_reconciled(
        &self,
        budget_id: &str,
        transaction_ids: &[String],
    ) -> ReconcileResult<()> {
        let body = UpdateTransactionsRequest {
            transactions: transaction_ids
                .iter()
                .map(|id| TransactionUpdate {
                    id: id.as_str(),
                    cleared: ClearedStatus::Reconciled,
                })
                .collect(),
        };

        tracing::debug!(budget_id, count = transaction_ids.len(), "Sending reconcile request");

        let response = self
            .client
            .patch(self.transactions_url(budget_id))
            .bearer_auth(self.token.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        let envelope: ErrorEnvelope = serde_json::from_slice(&bytes).unwrap_or_default();

        // The rejection is signalled in the body, whatever the status code
        if let Some(error) = &envelope.error {
            if error.id == BATCH_TOO_LARGE_ERROR_ID {
                tracing::warn!(budget_id, count = transaction_ids.len(), "Batch too large");
                return Err(ReconcileError::RateLimited);
            }
        }

        if status.is_success() {
            return Ok(());
        }

        let error = envelope.error.unwrap_or_default();
        tracing::warn!(
            budget_id,
            status = status.as_u16(),
            error_id = %error.id,
            "Reconcile request failed"
        );
        Err(ReconcileError::Remote {
            status: status.as_u16(),
            id: if error.id.is_empty() {
                status.as_u16().to_string()
            } else {
                error.id
            },
            detail: if error.detail.is_empty() {
                error.name
            } else {
                error.detail
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_marks_every_id_reconciled() {
        let ids = ["a".to_string(), "b".to_string()];
        let body = UpdateTransactionsRequest {
            transactions: ids
                .iter()
                .map(|id| TransactionUpdate {
                    id: id.as_str(),
                    cleared: ClearedStatus::Reconciled,
                })
                .collect(),
        };

        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "transactions": [
                    {"id": "a", "cleared": "reconciled"},
                    {"id": "b", "cleared": "reconciled"}
                ]
            })
        );
    }

    #[test]
    fn base_url_trailing_slash_is_ignored() {
        let client = YnabClient::with_base_url(Secret::new("t".to_string()), "http://x/v1/");
        assert_eq!(client.transactions_url("b1"), "http://x/v1/budgets/b1/transactions");
    }
}
