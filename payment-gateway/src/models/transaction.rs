use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Supported e-wallet providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Gopay,
    ShopeePay,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gopay => "GOPAY",
            Self::ShopeePay => "SHOPEE_PAY",
        }
    }

    /// Routing prefix separating each provider's wallet-id namespace from
    /// raw phone numbers.
    pub fn wallet_prefix(&self) -> &'static str {
        match self {
            Self::Gopay => "898",
            Self::ShopeePay => "897",
        }
    }

    /// Provider wallet id for a phone number.
    pub fn wallet_id(&self, phone_number: &str) -> String {
        format!("{}{}", self.wallet_prefix(), phone_number)
    }

    /// Correlation id sent to the provider and used as the event key.
    ///
    /// Shaped `TRX-<epoch millis>-<nonce>-GPX|SPX`. The provider treats it as
    /// an idempotency key, so two top-ups in the same millisecond must still
    /// differ; the nonce is the first eight hex digits of a v4 uuid.
    pub fn reference_id(&self, at: DateTime<Utc>) -> String {
        let nonce = Uuid::new_v4().simple().to_string();
        self.reference_id_with(at, &nonce[..8])
    }

    fn reference_id_with(&self, at: DateTime<Utc>, nonce: &str) -> String {
        let suffix = match self {
            Self::Gopay => "GPX",
            Self::ShopeePay => "SPX",
        };
        format!(
            "TRX-{}-{}-{}",
            at.timestamp_millis(),
            nonce.to_ascii_uppercase(),
            suffix
        )
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid payment method: {0}")]
pub struct UnknownPaymentMethod(pub String);

impl FromStr for PaymentMethod {
    type Err = UnknownPaymentMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GOPAY" => Ok(Self::Gopay),
            "SHOPEE_PAY" => Ok(Self::ShopeePay),
            other => Err(UnknownPaymentMethod(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Topup,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Topup => "TOPUP",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

impl TransactionStatus {
    /// Normalize a provider-reported status string.
    ///
    /// Unknown values on an accepted top-up are recorded as `Pending` so they
    /// surface in reconciliation instead of being reported as settled.
    pub fn from_provider(status: &str) -> Self {
        match status.to_ascii_uppercase().as_str() {
            "SUCCESS" | "COMPLETED" | "SETTLED" => Self::Success,
            "FAILED" | "REJECTED" | "CANCELLED" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// Immutable record of a completed top-up.
///
/// Created exactly once per successful top-up, returned to the caller as a
/// [`TransactionResponse`](super::TransactionResponse) and published as the
/// transaction event payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: i64,
    pub account_id: String,
    /// Provider-facing correlation id, also the event key.
    pub transaction_id: String,
    pub transaction_type: TransactionType,
    pub transaction_status: TransactionStatus,
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub currency: String,
    pub description: Option<String>,
    /// Provider-side transaction id.
    pub external_reference: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub metadata: Option<serde_json::Value>,
    pub is_accessible_from_external: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
