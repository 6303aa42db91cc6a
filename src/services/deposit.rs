use crate::{
    error::GatewayError,
    models::{generate_ref_id, Deposit, DepositStatus, UpstreamStatus},
    services::{credentials::RequestContext, Analytics, DepositStore, PaymentProvider},
};
use chrono::Utc;
use std::sync::Arc;

pub const DEFAULT_LIST_LIMIT: usize = 50;
pub const MAX_LIST_LIMIT: usize = 500;

/// Create, poll and list QRIS deposits on behalf of an authenticated caller.
pub struct DepositService {
    store: Arc<dyn DepositStore>,
    provider: Arc<dyn PaymentProvider>,
    analytics: Arc<Analytics>,
}

impl DepositService {
    pub fn new(
        store: Arc<dyn DepositStore>,
        provider: Arc<dyn PaymentProvider>,
        analytics: Arc<Analytics>,
    ) -> Self {
        Self {
            store,
            provider,
            analytics,
        }
    }

    pub async fn create(&self, ctx: &RequestContext, amount: i64) -> Result<Deposit, GatewayError> {
        if amount <= 0 {
            return Err(GatewayError::BadRequest("Amount must be positive".to_string()));
        }

        let now = Utc::now();
        let ref_id = generate_ref_id(&ctx.user_id, now);

        let issued = self
            .provider
            .create_deposit(&ref_id, amount)
            .await
            .map_err(|e| {
                self.analytics.record_upstream_failure();
                GatewayError::from(e)
            })?;

        let deposit = Deposit::new_unpaid(&ctx.user_id, amount, issued, now);

        // The provider already holds this payment; a failed write leaves it
        // unreachable through this gateway.
        if let Err(e) = self.store.insert_deposit(&deposit).await {
            tracing::error!(
                ref_id = %deposit.ref_id,
                user_id = %ctx.user_id,
                "Failed to persist issued deposit: {}",
                e
            );
            return Err(GatewayError::PersistenceError("Failed to save deposit".to_string()));
        }

        self.analytics.record_created();
        tracing::info!(
            ref_id = %deposit.ref_id,
            user_id = %ctx.user_id,
            amount = deposit.amount,
            final_amount = deposit.final_amount,
            "Deposit created"
        );

        Ok(deposit)
    }

    pub async fn lookup(&self, ctx: &RequestContext, ref_id: &str) -> Result<Deposit, GatewayError> {
        let deposit = self
            .store
            .find_deposit(&ctx.user_id, ref_id)
            .await
            .map_err(|e| {
                tracing::error!(ref_id, "Deposit read failed: {}", e);
                GatewayError::PersistenceError("Failed to fetch deposit".to_string())
            })?
            .ok_or_else(|| GatewayError::NotFound("Deposit not found".to_string()))?;

        if deposit.status.is_terminal() {
            return Ok(deposit);
        }

        let observed = match self.provider.check_status(&deposit.ref_id).await {
            Ok(observed) => observed,
            Err(e) => {
                self.analytics.record_upstream_failure();
                tracing::warn!(ref_id, "Status check failed, leaving deposit unpaid: {}", e);
                return Ok(deposit);
            }
        };

        match observed {
            UpstreamStatus::Paid => self.settle_paid(ctx, deposit).await,
            UpstreamStatus::Gone => self.expire(ctx, deposit).await,
            UpstreamStatus::Pending => Ok(deposit),
        }
    }

    pub async fn list(
        &self,
        ctx: &RequestContext,
        status: Option<DepositStatus>,
        limit: usize,
    ) -> Result<Vec<Deposit>, GatewayError> {
        self.store
            .list_deposits(&ctx.user_id, status, limit.clamp(1, MAX_LIST_LIMIT))
            .await
            .map_err(|e| {
                tracing::error!(user_id = %ctx.user_id, "Deposit listing failed: {}", e);
                GatewayError::PersistenceError("Failed to fetch deposits".to_string())
            })
    }

    async fn settle_paid(&self, ctx: &RequestContext, deposit: Deposit) -> Result<Deposit, GatewayError> {
        let settled = self
            .store
            .settle_paid(&ctx.user_id, &deposit.ref_id, Utc::now())
            .await
            .map_err(|e| {
                tracing::error!(ref_id = %deposit.ref_id, "Failed to settle paid deposit: {}", e);
                GatewayError::PersistenceError("Failed to update deposit".to_string())
            })?;

        match settled {
            Some(settled) => {
                self.analytics.record_paid(settled.final_amount);
                tracing::info!(
                    ref_id = %settled.ref_id,
                    user_id = %ctx.user_id,
                    credited = settled.final_amount,
                    "Deposit paid, balance credited"
                );
                Ok(settled)
            }
            // A concurrent lookup settled it first.
            None => self.reload(ctx, deposit).await,
        }
    }

    async fn expire(&self, ctx: &RequestContext, deposit: Deposit) -> Result<Deposit, GatewayError> {
        let expired = self
            .store
            .mark_expired(&ctx.user_id, &deposit.ref_id)
            .await
            .map_err(|e| {
                tracing::error!(ref_id = %deposit.ref_id, "Failed to expire deposit: {}", e);
                GatewayError::PersistenceError("Failed to update deposit".to_string())
            })?;

        match expired {
            Some(expired) => {
                self.analytics.record_expired();
                tracing::info!(ref_id = %expired.ref_id, user_id = %ctx.user_id, "Deposit expired");
                Ok(expired)
            }
            None => self.reload(ctx, deposit).await,
        }
    }

    async fn reload(&self, ctx: &RequestContext, stale: Deposit) -> Result<Deposit, GatewayError> {
        let current = self
            .store
            .find_deposit(&ctx.user_id, &stale.ref_id)
            .await
            .map_err(|e| {
                tracing::error!(ref_id = %stale.ref_id, "Deposit read failed: {}", e);
                GatewayError::PersistenceError("Failed to fetch deposit".to_string())
            })?;
        Ok(current.unwrap_or(stale))
    }
}
