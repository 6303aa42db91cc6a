use anyhow::{bail, Context, Result};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::middleware::{API_ID_HEADER, API_KEY_HEADER};
use crate::models::{Credentials, Deposit, DepositStatus, ProfileView, ResponseStatus};

/// Envelope as seen from the outside: `data` on success, `message` on error.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: ResponseStatus,
    data: Option<T>,
    message: Option<String>,
}

#[derive(Serialize)]
struct CreateDepositBody {
    amount: i64,
}

/// Typed client for the gateway's credentialed endpoints.
pub struct DepositClient {
    base_url: String,
    api_id: String,
    api_key: String,
    client: Client,
}

impl DepositClient {
    pub fn new(base_url: &str, api_id: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_id: api_id.to_string(),
            api_key: api_key.to_string(),
            client: Client::new(),
        }
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header(API_ID_HEADER, &self.api_id)
            .header(API_KEY_HEADER, &self.api_key)
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = self.authed(builder).send().await.context("Gateway unreachable")?;
        let http_status = response.status();

        let envelope: Envelope<T> = response
            .json()
            .await
            .with_context(|| format!("Unreadable gateway response ({})", http_status))?;

        match (envelope.status, envelope.data) {
            (ResponseStatus::Success, Some(data)) => Ok(data),
            _ => bail!(
                "Gateway error ({}): {}",
                http_status,
                envelope.message.unwrap_or_else(|| "unknown error".to_string())
            ),
        }
    }

    pub async fn create_deposit(&self, amount: i64) -> Result<Deposit> {
        let url = format!("{}/api/v1/deposits", self.base_url);
        self.send(self.client.post(url).json(&CreateDepositBody { amount }))
            .await
    }

    pub async fn check_deposit(&self, ref_id: &str) -> Result<Deposit> {
        let url = format!("{}/api/v1/deposits", self.base_url);
        self.send(self.client.get(url).query(&[("ref_id", ref_id)]))
            .await
    }

    pub async fn list_deposits(
        &self,
        status: Option<DepositStatus>,
        limit: Option<usize>,
    ) -> Result<Vec<Deposit>> {
        let url = format!("{}/api/v1/deposits", self.base_url);
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(status) = status {
            params.push(("status", status.to_string()));
        }
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }
        self.send(self.client.get(url).query(&params)).await
    }

    pub async fn profile(&self) -> Result<ProfileView> {
        let url = format!("{}/api/v1/profile", self.base_url);
        self.send(self.client.get(url)).await
    }

    pub async fn rotate_credentials(&self) -> Result<Credentials> {
        let url = format!("{}/api/v1/profile/credentials", self.base_url);
        self.send(self.client.post(url)).await
    }
}
