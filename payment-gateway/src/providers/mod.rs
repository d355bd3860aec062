//! External e-wallet providers.
//!
//! Both providers sit behind [`WalletProvider`]. Each client owns a
//! [`ProviderHttpClient`] wired to that provider's [`TokenManager`].

pub mod error;
pub mod gopay;
pub mod http;
pub mod shopee_pay;
pub mod token;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::models::{PaymentMethod, TransactionStatus};

pub use error::ProviderError;
pub use gopay::GopayClient;
pub use http::{build_http_client, default_provider_retry, ProviderHttpClient, ProviderResponse};
pub use shopee_pay::ShopeePayClient;
pub use token::{ProviderCredentials, TokenManager};

/// Wallet balance as reported by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderBalance {
    pub wallet_id: String,
    pub balance: Decimal,
    pub currency: String,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Provider-neutral top-up instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderTopUpRequest {
    pub wallet_id: String,
    pub amount: Decimal,
    /// Idempotency/correlation id, also sent as `x-request-id`.
    pub reference_id: String,
    /// Ledger account funding the top-up.
    pub account_id: String,
}

/// Accepted top-up as reported by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderTopUpResult {
    pub provider_transaction_id: String,
    pub status: TransactionStatus,
    pub provider_status: String,
    pub amount: Decimal,
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    fn payment_method(&self) -> PaymentMethod;

    async fn get_balance(
        &self,
        wallet_id: &str,
        request_id: &str,
    ) -> Result<ProviderBalance, ProviderError>;

    /// `Ok(None)` means the provider rejected the top-up as a business
    /// outcome (4xx or an explicit failed status).
    async fn top_up(
        &self,
        request: &ProviderTopUpRequest,
    ) -> Result<Option<ProviderTopUpResult>, ProviderError>;
}

pub(crate) fn decimal_from_f64(
    provider: PaymentMethod,
    value: f64,
) -> Result<Decimal, ProviderError> {
    Decimal::try_from(value).map_err(|e| ProviderError::InvalidResponse {
        provider,
        reason: format!("invalid amount {}: {}", value, e),
    })
}

pub(crate) fn decimal_to_f64(provider: PaymentMethod, value: Decimal) -> Result<f64, ProviderError> {
    value.to_f64().ok_or_else(|| ProviderError::InvalidRequest {
        provider,
        reason: format!("amount {} is not representable", value),
    })
}
