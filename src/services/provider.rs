use crate::{
    error::ProviderError,
    models::{
        CreateUpstreamDeposit, UpstreamDeposit, UpstreamErrorBody, UpstreamStatus,
        UpstreamStatusBody,
    },
};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

/// Upstream QRIS issuer.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_deposit(&self, ref_id: &str, amount: i64) -> Result<UpstreamDeposit, ProviderError>;

    async fn check_status(&self, ref_id: &str) -> Result<UpstreamStatus, ProviderError>;
}

/// HTTP client for the Kobaru deposit API.
#[derive(Clone)]
pub struct KobaruClient {
    base_url: String,
    client: reqwest::Client,
}

impl KobaruClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn deposits_url(&self) -> String {
        format!("{}/deposits", self.base_url)
    }
}

#[async_trait]
impl PaymentProvider for KobaruClient {
    async fn create_deposit(&self, ref_id: &str, amount: i64) -> Result<UpstreamDeposit, ProviderError> {
        let response = self
            .client
            .post(self.deposits_url())
            .json(&CreateUpstreamDeposit { ref_id, amount })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<UpstreamErrorBody>()
                .await
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| "Failed to create deposit".to_string());

            tracing::warn!(ref_id, status = status.as_u16(), "Provider rejected deposit: {}", message);
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let issued: UpstreamDeposit = response.json().await?;
        tracing::debug!(ref_id = %issued.ref_id, amount = issued.amount, "Provider issued QRIS payment");
        Ok(issued)
    }

    async fn check_status(&self, ref_id: &str) -> Result<UpstreamStatus, ProviderError> {
        let response = self
            .client
            .get(self.deposits_url())
            .query(&[("ref_id", ref_id)])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::GONE {
            return Ok(UpstreamStatus::Gone);
        }
        if !status.is_success() {
            tracing::warn!(ref_id, status = status.as_u16(), "Provider status check failed");
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                message: format!("Status check failed with {}", status),
            });
        }

        let body: UpstreamStatusBody = response.json().await?;
        let observed = match body.status.as_deref() {
            Some("paid") => UpstreamStatus::Paid,
            Some("expired") => UpstreamStatus::Gone,
            _ => UpstreamStatus::Pending,
        };

        tracing::debug!(ref_id, ?observed, "Provider status checked");
        Ok(observed)
    }
}
