use crate::{
    error::GatewayError,
    models::{Credentials, Profile},
    services::DepositStore,
};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Identity established from a valid `x-api-id` / `x-api-key` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    pub user_id: String,
    pub api_id: String,
}

#[derive(Clone)]
struct CachedCredential {
    api_key: String,
    user_id: String,
}

/// Checks API credentials against stored profiles.
pub struct CredentialValidator {
    store: Arc<dyn DepositStore>,
    cache: Cache<String, CachedCredential>,
}

impl CredentialValidator {
    pub fn new(store: Arc<dyn DepositStore>, cache_ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(cache_ttl)
            .build();

        Self { store, cache }
    }

    pub async fn validate(
        &self,
        api_id: Option<&str>,
        api_key: Option<&str>,
    ) -> Result<RequestContext, GatewayError> {
        let (Some(api_id), Some(api_key)) = (api_id, api_key) else {
            return Err(GatewayError::Unauthorized("API credentials required".to_string()));
        };
        if api_id.is_empty() || api_key.is_empty() {
            return Err(GatewayError::Unauthorized("API credentials required".to_string()));
        }

        let cached = match self.cache.get(api_id).await {
            Some(hit) => Some(hit),
            None => {
                let profile = self.store.find_profile_by_api_id(api_id).await.map_err(|e| {
                    tracing::error!("Profile lookup failed: {}", e);
                    GatewayError::PersistenceError("Failed to validate credentials".to_string())
                })?;
                match profile {
                    Some(profile) => {
                        let entry = CachedCredential {
                            api_key: profile.api_key,
                            user_id: profile.user_id,
                        };
                        self.cache.insert(api_id.to_string(), entry.clone()).await;
                        Some(entry)
                    }
                    None => None,
                }
            }
        };

        match cached {
            Some(entry) if entry.api_key == api_key => Ok(RequestContext {
                user_id: entry.user_id,
                api_id: api_id.to_string(),
            }),
            _ => {
                tracing::warn!(api_id, "Invalid API credentials");
                Err(GatewayError::Unauthorized("Invalid API credentials".to_string()))
            }
        }
    }

    pub async fn profile(&self, ctx: &RequestContext) -> Result<Profile, GatewayError> {
        self.store
            .get_profile(&ctx.user_id)
            .await
            .map_err(|e| {
                tracing::error!("Profile read failed: {}", e);
                GatewayError::PersistenceError("Failed to fetch profile".to_string())
            })?
            .ok_or_else(|| GatewayError::NotFound("Profile not found".to_string()))
    }

    /// Issues a new credential pair; the old one stops validating immediately.
    pub async fn rotate(&self, ctx: &RequestContext) -> Result<Credentials, GatewayError> {
        let fresh = Credentials::generate();

        let previous = self
            .store
            .rotate_credentials(&ctx.user_id, &fresh)
            .await
            .map_err(|e| {
                tracing::error!("Credential rotation failed: {}", e);
                GatewayError::PersistenceError("Failed to regenerate credentials".to_string())
            })?
            .ok_or_else(|| GatewayError::NotFound("Profile not found".to_string()))?;

        self.cache.invalidate(&previous).await;
        self.cache.invalidate(&ctx.api_id).await;

        tracing::info!(user_id = %ctx.user_id, "API credentials rotated");
        Ok(fresh)
    }
}
