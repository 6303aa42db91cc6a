use crate::{
    error::StoreError,
    models::{Credentials, Deposit, DepositStatus, Profile},
    services::store::{DepositStore, StoreResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct MemoryState {
    profiles: HashMap<String, Profile>,
    // api_id -> user_id
    api_ids: HashMap<String, String>,
    // ref_id -> deposit
    deposits: HashMap<String, Deposit>,
}

/// Process-local store for development and tests.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DepositStore for MemoryStore {
    async fn find_profile_by_api_id(&self, api_id: &str) -> StoreResult<Option<Profile>> {
        let state = self.state.read().await;
        Ok(state
            .api_ids
            .get(api_id)
            .and_then(|user_id| state.profiles.get(user_id))
            .cloned())
    }

    async fn get_profile(&self, user_id: &str) -> StoreResult<Option<Profile>> {
        Ok(self.state.read().await.profiles.get(user_id).cloned())
    }

    async fn upsert_profile(&self, profile: &Profile) -> StoreResult<()> {
        let mut state = self.state.write().await;

        if let Some(owner) = state.api_ids.get(&profile.api_id) {
            if owner != &profile.user_id {
                return Err(StoreError::Conflict(format!(
                    "api_id {} belongs to another user",
                    profile.api_id
                )));
            }
        }

        if let Some(previous) = state.profiles.get(&profile.user_id).map(|p| p.api_id.clone()) {
            state.api_ids.remove(&previous);
        }
        state
            .api_ids
            .insert(profile.api_id.clone(), profile.user_id.clone());
        state
            .profiles
            .insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }

    async fn rotate_credentials(
        &self,
        user_id: &str,
        credentials: &Credentials,
    ) -> StoreResult<Option<String>> {
        let mut state = self.state.write().await;

        if state.api_ids.contains_key(&credentials.api_id) {
            return Err(StoreError::Conflict(format!(
                "api_id {} already issued",
                credentials.api_id
            )));
        }

        let Some(profile) = state.profiles.get_mut(user_id) else {
            return Ok(None);
        };
        let previous = std::mem::replace(&mut profile.api_id, credentials.api_id.clone());
        profile.api_key = credentials.api_key.clone();

        state.api_ids.remove(&previous);
        state
            .api_ids
            .insert(credentials.api_id.clone(), user_id.to_string());
        Ok(Some(previous))
    }

    async fn insert_deposit(&self, deposit: &Deposit) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.deposits.contains_key(&deposit.ref_id) {
            return Err(StoreError::Conflict(format!(
                "ref_id {} already exists",
                deposit.ref_id
            )));
        }
        state
            .deposits
            .insert(deposit.ref_id.clone(), deposit.clone());
        Ok(())
    }

    async fn find_deposit(&self, user_id: &str, ref_id: &str) -> StoreResult<Option<Deposit>> {
        Ok(self
            .state
            .read()
            .await
            .deposits
            .get(ref_id)
            .filter(|d| d.user_id == user_id)
            .cloned())
    }

    async fn list_deposits(
        &self,
        user_id: &str,
        status: Option<DepositStatus>,
        limit: usize,
    ) -> StoreResult<Vec<Deposit>> {
        let state = self.state.read().await;
        let mut deposits: Vec<Deposit> = state
            .deposits
            .values()
            .filter(|d| d.user_id == user_id)
            .filter(|d| status.map_or(true, |s| d.status == s))
            .cloned()
            .collect();

        deposits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        deposits.truncate(limit);
        Ok(deposits)
    }

    async fn settle_paid(
        &self,
        user_id: &str,
        ref_id: &str,
        paid_at: DateTime<Utc>,
    ) -> StoreResult<Option<Deposit>> {
        let mut state = self.state.write().await;

        let credit = match state.deposits.get(ref_id) {
            Some(d) if d.user_id == user_id && d.status == DepositStatus::Unpaid => d.final_amount,
            _ => return Ok(None),
        };

        // Work out the new balance before touching the deposit so a failed
        // credit leaves it unpaid.
        let balance = match state.profiles.get(user_id) {
            Some(profile) => profile.balance.checked_add(credit).ok_or_else(|| {
                StoreError::Ledger(format!("balance overflow crediting {} to {}", credit, user_id))
            })?,
            None => {
                return Err(StoreError::Ledger(format!("no profile for user {}", user_id)));
            }
        };

        let Some(deposit) = state.deposits.get_mut(ref_id) else {
            return Ok(None);
        };
        deposit.mark_paid(paid_at);
        let settled = deposit.clone();

        if let Some(profile) = state.profiles.get_mut(user_id) {
            profile.balance = balance;
        }
        Ok(Some(settled))
    }

    async fn mark_expired(&self, user_id: &str, ref_id: &str) -> StoreResult<Option<Deposit>> {
        let mut state = self.state.write().await;
        match state
            .deposits
            .get_mut(ref_id)
            .filter(|d| d.user_id == user_id)
        {
            Some(deposit) if deposit.status == DepositStatus::Unpaid => {
                deposit.mark_expired();
                Ok(Some(deposit.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn ping(&self) -> bool {
        true
    }
}
