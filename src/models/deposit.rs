use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// How long a QRIS code stays payable after creation.
pub const DEPOSIT_EXPIRY_HOURS: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepositStatus {
    Unpaid,
    Paid,
    Expired,
}

impl DepositStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, DepositStatus::Unpaid)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DepositStatus::Unpaid => "unpaid",
            DepositStatus::Paid => "paid",
            DepositStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DepositStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unpaid" => Ok(DepositStatus::Unpaid),
            "paid" => Ok(DepositStatus::Paid),
            "expired" => Ok(DepositStatus::Expired),
            other => Err(format!("Unknown deposit status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deposit {
    pub id: Uuid,
    pub ref_id: String,
    pub user_id: String,
    /// Amount the caller asked for.
    pub amount: i64,
    /// Amount actually payable; the provider may nudge it to keep QR codes unique.
    pub final_amount: i64,
    pub qr_string: String,
    pub qr_image: String,
    pub status: DepositStatus,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

impl Deposit {
    /// Builds a fresh unpaid record from a successful provider response.
    pub fn new_unpaid(
        user_id: &str,
        requested_amount: i64,
        issued: crate::models::UpstreamDeposit,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            ref_id: issued.ref_id,
            user_id: user_id.to_string(),
            amount: requested_amount,
            final_amount: issued.amount,
            qr_string: issued.qr_string,
            qr_image: issued.qr_image,
            status: DepositStatus::Unpaid,
            created_at,
            paid_at: None,
            expires_at: created_at + Duration::hours(DEPOSIT_EXPIRY_HOURS),
        }
    }

    /// Applies unpaid -> paid. Returns false if the record was already terminal.
    pub fn mark_paid(&mut self, paid_at: DateTime<Utc>) -> bool {
        if self.status != DepositStatus::Unpaid {
            return false;
        }
        self.status = DepositStatus::Paid;
        self.paid_at = Some(paid_at);
        true
    }

    /// Applies unpaid -> expired. Returns false if the record was already terminal.
    pub fn mark_expired(&mut self) -> bool {
        if self.status != DepositStatus::Unpaid {
            return false;
        }
        self.status = DepositStatus::Expired;
        true
    }
}

/// Builds a merchant reference for a new deposit.
///
/// The millisecond timestamp keeps references roughly sortable; the random
/// suffix keeps two requests in the same millisecond apart.
pub fn generate_ref_id(user_id: &str, now: DateTime<Utc>) -> String {
    let prefix: String = user_id.chars().take(8).collect();
    let suffix = Uuid::new_v4().simple().to_string();
    format!("USR_{}_{}_{}", prefix, now.timestamp_millis(), &suffix[..8])
}
