use serde::{Deserialize, Serialize};

/// Body sent to the provider when opening a QRIS payment.
#[derive(Debug, Clone, Serialize)]
pub struct CreateUpstreamDeposit<'a> {
    pub ref_id: &'a str,
    pub amount: i64,
}

/// Provider response for a newly issued QRIS payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamDeposit {
    pub ref_id: String,
    pub amount: i64,
    pub qr_string: String,
    pub qr_image: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamStatusBody {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

/// What a status check tells us about an unpaid deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamStatus {
    Paid,
    /// The provider no longer knows the payment, or reports it expired.
    Gone,
    Pending,
}
