use crate::{
    error::StoreError,
    models::{Credentials, Deposit, DepositStatus, Profile},
    services::store::{DepositStore, StoreResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{aio::ConnectionManager, AsyncCommands, Script};
use std::collections::HashMap;

const KEY_PREFIX: &str = "qg";

// Insert a deposit only if its ref_id is new, and index it for listing.
const INSERT_DEPOSIT: &str = r#"
    if redis.call('SET', KEYS[1], ARGV[1], 'NX') then
        redis.call('ZADD', KEYS[2], ARGV[2], ARGV[3])
        return 1
    end
    return 0
"#;

// unpaid -> paid plus the balance credit, in one step. Lua scripts are not
// rolled back on error, so the credit runs first: if HINCRBY fails the
// deposit is still unpaid.
const SETTLE_PAID: &str = r#"
    local raw = redis.call('GET', KEYS[1])
    if not raw then
        return false
    end
    local deposit = cjson.decode(raw)
    if deposit.user_id ~= ARGV[1] or deposit.status ~= 'unpaid' then
        return false
    end
    if redis.call('EXISTS', KEYS[2]) == 0 then
        return redis.error_reply('no profile for user ' .. ARGV[1])
    end
    redis.call('HINCRBY', KEYS[2], 'balance', ARGV[3])
    deposit.status = 'paid'
    deposit.paid_at = ARGV[2]
    local encoded = cjson.encode(deposit)
    redis.call('SET', KEYS[1], encoded)
    return encoded
"#;

const MARK_EXPIRED: &str = r#"
    local raw = redis.call('GET', KEYS[1])
    if not raw then
        return false
    end
    local deposit = cjson.decode(raw)
    if deposit.user_id ~= ARGV[1] or deposit.status ~= 'unpaid' then
        return false
    end
    deposit.status = 'expired'
    local encoded = cjson.encode(deposit)
    redis.call('SET', KEYS[1], encoded)
    return encoded
"#;

// Swap the credential pair and its api_id index together.
const ROTATE_CREDENTIALS: &str = r#"
    if redis.call('EXISTS', KEYS[1]) == 0 then
        return false
    end
    if redis.call('EXISTS', KEYS[2]) == 1 then
        return redis.error_reply('api_id already issued')
    end
    local previous = redis.call('HGET', KEYS[1], 'api_id')
    if previous then
        redis.call('DEL', ARGV[4] .. previous)
    end
    redis.call('HSET', KEYS[1], 'api_id', ARGV[2], 'api_key', ARGV[3])
    redis.call('SET', KEYS[2], ARGV[1])
    return previous
"#;

/// Redis-backed store.
///
/// Layout:
/// - `qg:profile:{user_id}` hash with `api_id`, `api_key`, `balance`
/// - `qg:api_id:{api_id}` -> user_id
/// - `qg:deposit:{ref_id}` -> deposit JSON
/// - `qg:deposits:{user_id}` sorted set of ref_ids scored by creation millis
pub struct RedisStore {
    conn: ConnectionManager,
    insert_deposit: Script,
    settle_paid: Script,
    mark_expired: Script,
    rotate_credentials: Script,
}

impl RedisStore {
    pub async fn new(redis_url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        tracing::info!("Redis store connected");

        Ok(Self {
            conn,
            insert_deposit: Script::new(INSERT_DEPOSIT),
            settle_paid: Script::new(SETTLE_PAID),
            mark_expired: Script::new(MARK_EXPIRED),
            rotate_credentials: Script::new(ROTATE_CREDENTIALS),
        })
    }

    fn profile_key(user_id: &str) -> String {
        format!("{}:profile:{}", KEY_PREFIX, user_id)
    }

    fn api_id_prefix() -> String {
        format!("{}:api_id:", KEY_PREFIX)
    }

    fn api_id_key(api_id: &str) -> String {
        format!("{}{}", Self::api_id_prefix(), api_id)
    }

    fn deposit_key(ref_id: &str) -> String {
        format!("{}:deposit:{}", KEY_PREFIX, ref_id)
    }

    fn user_index_key(user_id: &str) -> String {
        format!("{}:deposits:{}", KEY_PREFIX, user_id)
    }

    fn decode_deposit(raw: Option<String>) -> StoreResult<Option<Deposit>> {
        raw.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(Into::into)
    }

    fn decode_profile(user_id: &str, fields: HashMap<String, String>) -> Option<Profile> {
        if fields.is_empty() {
            return None;
        }

        let balance = fields
            .get("balance")
            .and_then(|b| b.parse().ok())
            .unwrap_or_else(|| {
                tracing::warn!("Profile {} has no readable balance, treating as 0", user_id);
                0
            });

        Some(Profile {
            user_id: user_id.to_string(),
            api_id: fields.get("api_id").cloned().unwrap_or_default(),
            api_key: fields.get("api_key").cloned().unwrap_or_default(),
            balance,
        })
    }
}

#[async_trait]
impl DepositStore for RedisStore {
    async fn find_profile_by_api_id(&self, api_id: &str) -> StoreResult<Option<Profile>> {
        let mut conn = self.conn.clone();
        let user_id: Option<String> = conn.get(Self::api_id_key(api_id)).await?;

        match user_id {
            Some(user_id) => self.get_profile(&user_id).await,
            None => Ok(None),
        }
    }

    async fn get_profile(&self, user_id: &str) -> StoreResult<Option<Profile>> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(Self::profile_key(user_id)).await?;
        Ok(Self::decode_profile(user_id, fields))
    }

    async fn upsert_profile(&self, profile: &Profile) -> StoreResult<()> {
        let mut conn = self.conn.clone();

        let owner: Option<String> = conn.get(Self::api_id_key(&profile.api_id)).await?;
        if let Some(owner) = owner {
            if owner != profile.user_id {
                return Err(StoreError::Conflict(format!(
                    "api_id {} belongs to another user",
                    profile.api_id
                )));
            }
        }

        let profile_key = Self::profile_key(&profile.user_id);
        let previous: Option<String> = conn.hget(&profile_key, "api_id").await?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        if let Some(previous) = previous.filter(|p| p != &profile.api_id) {
            pipe.del(Self::api_id_key(&previous)).ignore();
        }
        pipe.hset_multiple(
            &profile_key,
            &[
                ("api_id", profile.api_id.clone()),
                ("api_key", profile.api_key.clone()),
                ("balance", profile.balance.to_string()),
            ],
        )
        .ignore()
        .set(Self::api_id_key(&profile.api_id), &profile.user_id)
        .ignore();

        pipe.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    async fn rotate_credentials(
        &self,
        user_id: &str,
        credentials: &Credentials,
    ) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        let previous: Option<String> = self
            .rotate_credentials
            .key(Self::profile_key(user_id))
            .key(Self::api_id_key(&credentials.api_id))
            .arg(user_id)
            .arg(&credentials.api_id)
            .arg(&credentials.api_key)
            .arg(Self::api_id_prefix())
            .invoke_async(&mut conn)
            .await?;
        Ok(previous)
    }

    async fn insert_deposit(&self, deposit: &Deposit) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let encoded = serde_json::to_string(deposit)?;

        let inserted: i64 = self
            .insert_deposit
            .key(Self::deposit_key(&deposit.ref_id))
            .key(Self::user_index_key(&deposit.user_id))
            .arg(encoded)
            .arg(deposit.created_at.timestamp_millis())
            .arg(&deposit.ref_id)
            .invoke_async(&mut conn)
            .await?;

        if inserted == 0 {
            return Err(StoreError::Conflict(format!(
                "ref_id {} already exists",
                deposit.ref_id
            )));
        }
        Ok(())
    }

    async fn find_deposit(&self, user_id: &str, ref_id: &str) -> StoreResult<Option<Deposit>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(Self::deposit_key(ref_id)).await?;
        Ok(Self::decode_deposit(raw)?.filter(|d| d.user_id == user_id))
    }

    async fn list_deposits(
        &self,
        user_id: &str,
        status: Option<DepositStatus>,
        limit: usize,
    ) -> StoreResult<Vec<Deposit>> {
        let mut conn = self.conn.clone();
        let ref_ids: Vec<String> = conn
            .zrevrange(Self::user_index_key(user_id), 0, -1)
            .await?;
        if ref_ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ref_ids.iter().map(|r| Self::deposit_key(r)).collect();
        let raws: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await?;

        let mut deposits = Vec::with_capacity(limit.min(raws.len()));
        for raw in raws {
            let Some(deposit) = Self::decode_deposit(raw)? else {
                continue;
            };
            if status.map_or(true, |s| deposit.status == s) {
                deposits.push(deposit);
                if deposits.len() == limit {
                    break;
                }
            }
        }
        Ok(deposits)
    }

    async fn settle_paid(
        &self,
        user_id: &str,
        ref_id: &str,
        paid_at: DateTime<Utc>,
    ) -> StoreResult<Option<Deposit>> {
        let mut conn = self.conn.clone();

        // The credit is passed in exactly rather than read back through
        // cjson's float handling.
        let Some(current) = self.find_deposit(user_id, ref_id).await? else {
            return Ok(None);
        };

        let raw: Option<String> = self
            .settle_paid
            .key(Self::deposit_key(ref_id))
            .key(Self::profile_key(user_id))
            .arg(user_id)
            .arg(paid_at.to_rfc3339())
            .arg(current.final_amount)
            .invoke_async(&mut conn)
            .await?;
        Self::decode_deposit(raw)
    }

    async fn mark_expired(&self, user_id: &str, ref_id: &str) -> StoreResult<Option<Deposit>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = self
            .mark_expired
            .key(Self::deposit_key(ref_id))
            .arg(user_id)
            .invoke_async(&mut conn)
            .await?;
        Self::decode_deposit(raw)
    }

    async fn ping(&self) -> bool {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .is_ok()
    }
}
