//! E-wallet top-up orchestration.
//!
//! A top-up runs strictly in order: validate, call the provider, debit the
//! ledger, re-read the account, build the transaction record, then hand the
//! record to the side-effect coordinator on a detached task. Nothing is
//! written before the provider accepts the top-up.

use chrono::Utc;
use metrics::counter;
use serde_json::json;
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use super::repository::{AccountRepository, UserRepository};
use super::side_effects::SideEffectCoordinator;
use crate::models::{
    EWalletBalanceResponse, PaymentMethod, TopUpRequest, Transaction, TransactionResponse,
    TransactionType, User,
};
use crate::providers::{ProviderTopUpRequest, WalletProvider};

/// Currency of every ledger account and provider wallet.
pub const DEFAULT_CURRENCY: &str = "IDR";

pub struct TopUpService {
    users: Arc<dyn UserRepository>,
    accounts: Arc<dyn AccountRepository>,
    providers: HashMap<PaymentMethod, Arc<dyn WalletProvider>>,
    side_effects: Arc<SideEffectCoordinator>,
}

impl TopUpService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        accounts: Arc<dyn AccountRepository>,
        providers: Vec<Arc<dyn WalletProvider>>,
        side_effects: Arc<SideEffectCoordinator>,
    ) -> Self {
        let providers = providers
            .into_iter()
            .map(|provider| (provider.payment_method(), provider))
            .collect();

        Self {
            users,
            accounts,
            providers,
            side_effects,
        }
    }

    fn provider(&self, raw: &str) -> Result<(PaymentMethod, &Arc<dyn WalletProvider>), AppError> {
        let method: PaymentMethod = raw.parse().map_err(AppError::bad_request)?;
        let provider = self
            .providers
            .get(&method)
            .ok_or_else(|| AppError::bad_request(format!("payment method not available: {}", method)))?;
        Ok((method, provider))
    }

    async fn user(&self, username: &str) -> Result<User, AppError> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::not_found(format!("user not found: {}", username)))
    }

    /// Top up the wallet behind `request.phone_number` from the user's
    /// ledger account.
    #[instrument(
        skip(self, request),
        fields(payment_method = %request.payment_method, amount = %request.amount)
    )]
    pub async fn top_up(
        &self,
        username: &str,
        request: &TopUpRequest,
    ) -> Result<TransactionResponse, AppError> {
        let result = self.execute_top_up(username, request).await;

        let provider = request
            .payment_method
            .parse::<PaymentMethod>()
            .map(|m| m.as_str())
            .unwrap_or("UNKNOWN");
        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => match e {
                AppError::NotFound(_) => "not_found",
                AppError::Forbidden(_) => "forbidden",
                AppError::BadRequest(_) | AppError::ValidationError(_) => "invalid",
                AppError::ProviderAuth(_) => "provider_auth",
                AppError::BadGateway(_) => "provider_error",
                _ => "error",
            },
        };
        counter!("topup_requests_total", "provider" => provider, "outcome" => outcome).increment(1);

        result
    }

    async fn execute_top_up(
        &self,
        username: &str,
        request: &TopUpRequest,
    ) -> Result<TransactionResponse, AppError> {
        request.validate()?;

        let user = self.user(username).await?;
        let account = self
            .accounts
            .get_account_by_user_id(user.id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("account not found for user: {}", username))
            })?;

        if !account.is_active() {
            return Err(AppError::forbidden(format!(
                "account is {}",
                account.account_status
            )));
        }
        if account.balance < request.amount {
            return Err(AppError::bad_request("insufficient balance for top up"));
        }

        let (method, provider) = self.provider(&request.payment_method)?;

        let started_at = Utc::now();
        let reference_id = method.reference_id(started_at);
        let wallet_id = method.wallet_id(&request.phone_number);

        let accepted = provider
            .top_up(&ProviderTopUpRequest {
                wallet_id: wallet_id.clone(),
                amount: request.amount,
                reference_id: reference_id.clone(),
                account_id: account.id.clone(),
            })
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("top up failed for walletId: {}", wallet_id))
            })?;

        // From here the provider has moved funds; a ledger failure is surfaced
        // as-is and left to reconciliation.
        let balance_before = account.balance;
        let debited = account.debited(request.amount, Utc::now());
        let rows = self.accounts.update_account_balance(&debited).await?;
        if rows == 0 {
            warn!(
                account_id = %account.id,
                reference_id = %reference_id,
                "Ledger debit affected no rows after provider accepted top-up"
            );
        }

        let current = self
            .accounts
            .get_account_by_user_id(user.id)
            .await?
            .ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!(
                    "account {} disappeared after debit",
                    account.id
                ))
            })?;

        let now = Utc::now();
        let trx = Transaction {
            id: Uuid::new_v4(),
            user_id: user.id,
            account_id: current.id.clone(),
            transaction_id: reference_id,
            transaction_type: TransactionType::Topup,
            transaction_status: accepted.status,
            amount: request.amount,
            balance_before,
            balance_after: current.balance,
            currency: current.currency.clone(),
            description: request.description.clone(),
            external_reference: Some(accepted.provider_transaction_id.clone()),
            payment_method: Some(method),
            metadata: Some(json!({
                "wallet_id": wallet_id,
                "provider_status": accepted.provider_status,
            })),
            is_accessible_from_external: false,
            created_at: now,
            updated_at: now,
        };

        info!(
            transaction_id = %trx.transaction_id,
            provider_transaction_id = %accepted.provider_transaction_id,
            balance_before = %trx.balance_before,
            balance_after = %trx.balance_after,
            status = ?trx.transaction_status,
            "Top-up completed"
        );

        let response = TransactionResponse::from(&trx);
        self.side_effects.dispatch(username.to_string(), trx);

        Ok(response)
    }

    /// Balance of the user's wallet at `wallet_type`.
    #[instrument(skip(self))]
    pub async fn get_ewallet_balance(
        &self,
        username: &str,
        wallet_type: &str,
    ) -> Result<EWalletBalanceResponse, AppError> {
        let user = self.user(username).await?;
        let (method, provider) = self.provider(wallet_type)?;
        let wallet_id = method.wallet_id(&user.phone_number);
        let request_id = Uuid::new_v4().to_string();

        let balance = provider.get_balance(&wallet_id, &request_id).await?;

        let account = self
            .accounts
            .get_account_by_user_id(user.id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("account not found for user: {}", username))
            })?;

        Ok(EWalletBalanceResponse {
            provider: method,
            balance: balance.balance,
            currency: DEFAULT_CURRENCY.to_string(),
            account_number: account.id,
            last_updated: balance.last_updated.unwrap_or_else(Utc::now),
        })
    }
}
