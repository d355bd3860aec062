//! Cached account and balance lookups.

use futures::future::join_all;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{instrument, warn};

use super::cache::{cache_keys, get_json, set_json, CacheStore};
use super::repository::{AccountRepository, UserRepository};
use crate::models::{Account, AccountResponse, BalanceResponse, User};

pub const ACCOUNT_CACHE_TTL_MINUTES: u64 = 15;
pub const BALANCE_CACHE_TTL_MINUTES: u64 = 10;

/// Outcome of dropping one user's cached entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheInvalidation {
    pub removed: u64,
    pub failed: usize,
}

pub struct AccountService {
    users: Arc<dyn UserRepository>,
    accounts: Arc<dyn AccountRepository>,
    cache: Arc<dyn CacheStore>,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        accounts: Arc<dyn AccountRepository>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            users,
            accounts,
            cache,
        }
    }

    async fn user(&self, username: &str) -> Result<User, AppError> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::not_found(format!("user not found: {}", username)))
    }

    async fn account_for(&self, user: &User) -> Result<Account, AppError> {
        self.accounts
            .get_account_by_user_id(user.id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("account not found for user: {}", user.username))
            })
    }

    #[instrument(skip(self))]
    pub async fn get_account_by_username(&self, username: &str) -> Result<AccountResponse, AppError> {
        let key = cache_keys::account(username);
        match get_json::<AccountResponse>(self.cache.as_ref(), &key).await {
            Ok(Some(cached)) => return Ok(cached),
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Account cache read failed"),
        }

        let user = self.user(username).await?;
        let response = AccountResponse::from(self.account_for(&user).await?);

        if let Err(e) =
            set_json(self.cache.as_ref(), &key, &response, ACCOUNT_CACHE_TTL_MINUTES).await
        {
            warn!(key = %key, error = %e, "Account cache write failed");
        }

        Ok(response)
    }

    #[instrument(skip(self))]
    pub async fn get_balance_by_username(&self, username: &str) -> Result<BalanceResponse, AppError> {
        let key = cache_keys::balance(username);
        match get_json::<BalanceResponse>(self.cache.as_ref(), &key).await {
            Ok(Some(cached)) => return Ok(cached),
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Balance cache read failed"),
        }

        let user = self.user(username).await?;
        let account = self.account_for(&user).await?;
        let response = BalanceResponse {
            balance: account.balance,
            currency: account.currency,
        };

        if let Err(e) =
            set_json(self.cache.as_ref(), &key, &response, BALANCE_CACHE_TTL_MINUTES).await
        {
            warn!(key = %key, error = %e, "Balance cache write failed");
        }

        Ok(response)
    }

    /// Drop the cached account and balance of `username`.
    ///
    /// Both deletions are attempted; failures are logged and counted.
    pub async fn invalidate_user_cache(&self, username: &str) -> CacheInvalidation {
        let keys = [cache_keys::account(username), cache_keys::balance(username)];
        let results = join_all(keys.iter().map(|key| self.cache.delete(key))).await;

        let mut outcome = CacheInvalidation::default();
        for (key, result) in keys.iter().zip(results) {
            match result {
                Ok(removed) => outcome.removed += u64::from(removed),
                Err(e) => {
                    warn!(key = %key, error = %e, "Cache invalidation failed");
                    outcome.failed += 1;
                }
            }
        }
        outcome
    }
}
