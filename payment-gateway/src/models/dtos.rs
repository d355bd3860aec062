//! Request and response shapes of the HTTP surface.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{Account, AccountStatus, PaymentMethod, Transaction, TransactionStatus, TransactionType};

fn validate_positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_positive() && !amount.is_zero() {
        Ok(())
    } else {
        Err(ValidationError::new("amount_must_be_positive"))
    }
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new("must_not_be_blank"))
    } else {
        Ok(())
    }
}

/// E-wallet top-up request.
///
/// `payment_method` stays a raw string here; membership is checked by the
/// top-up flow after the account checks.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct TopUpRequest {
    #[validate(custom(function = "validate_positive_amount"))]
    pub amount: Decimal,
    #[validate(custom(function = "validate_not_blank"))]
    pub payment_method: String,
    #[validate(
        custom(function = "validate_not_blank"),
        length(max = 20, message = "phone number is too long")
    )]
    pub phone_number: String,
    #[validate(length(max = 255))]
    pub description: Option<String>,
}

/// Query string of `GET /api/payment/wallet`.
#[derive(Debug, Deserialize)]
pub struct WalletQuery {
    pub ewallet: String,
}

/// Caller-facing projection of a [`Transaction`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub id: Uuid,
    pub transaction_id: String,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub currency: String,
    pub transaction_status: TransactionStatus,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub payment_method: Option<PaymentMethod>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Transaction> for TransactionResponse {
    fn from(trx: &Transaction) -> Self {
        Self {
            id: trx.id,
            transaction_id: trx.transaction_id.clone(),
            transaction_type: trx.transaction_type,
            amount: trx.amount,
            currency: trx.currency.clone(),
            transaction_status: trx.transaction_status,
            balance_before: trx.balance_before,
            balance_after: trx.balance_after,
            payment_method: trx.payment_method,
            description: trx.description.clone(),
            created_at: trx.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountResponse {
    pub id: String,
    pub user_id: i64,
    pub balance: Decimal,
    pub currency: String,
    pub account_status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            user_id: account.user_id,
            balance: account.balance,
            currency: account.currency,
            account_status: account.account_status,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub balance: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EWalletBalanceResponse {
    pub provider: PaymentMethod,
    pub balance: Decimal,
    pub currency: String,
    pub account_number: String,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaResponse {
    pub code: String,
    pub message: String,
}

/// Envelope of every successful API response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebResponse<T> {
    pub meta: MetaResponse,
    pub data: T,
}

impl<T> WebResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            meta: MetaResponse {
                code: "200".to_string(),
                message: message.into(),
            },
            data,
        }
    }
}
