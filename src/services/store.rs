use crate::{
    error::StoreError,
    models::{Credentials, Deposit, DepositStatus, Profile},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Profiles, the deposit table and the balance ledger.
///
/// Status transitions are guarded: `settle_paid` and `mark_expired` only act
/// on a record that is still unpaid, and `settle_paid` credits the balance in
/// the same atomic step. A `None` return means another caller got there first
/// (or the record does not exist).
#[async_trait]
pub trait DepositStore: Send + Sync {
    async fn find_profile_by_api_id(&self, api_id: &str) -> StoreResult<Option<Profile>>;

    async fn get_profile(&self, user_id: &str) -> StoreResult<Option<Profile>>;

    async fn upsert_profile(&self, profile: &Profile) -> StoreResult<()>;

    /// Replaces the user's credential pair. Returns the previous api_id.
    async fn rotate_credentials(
        &self,
        user_id: &str,
        credentials: &Credentials,
    ) -> StoreResult<Option<String>>;

    /// Fails with `StoreError::Conflict` if the ref_id is already taken.
    async fn insert_deposit(&self, deposit: &Deposit) -> StoreResult<()>;

    async fn find_deposit(&self, user_id: &str, ref_id: &str) -> StoreResult<Option<Deposit>>;

    /// Newest first.
    async fn list_deposits(
        &self,
        user_id: &str,
        status: Option<DepositStatus>,
        limit: usize,
    ) -> StoreResult<Vec<Deposit>>;

    async fn settle_paid(
        &self,
        user_id: &str,
        ref_id: &str,
        paid_at: DateTime<Utc>,
    ) -> StoreResult<Option<Deposit>>;

    async fn mark_expired(&self, user_id: &str, ref_id: &str) -> StoreResult<Option<Deposit>>;

    async fn ping(&self) -> bool;
}
