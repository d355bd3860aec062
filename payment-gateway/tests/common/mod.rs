#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use payment_gateway::models::{Account, AccountStatus, PaymentMethod, User};
use payment_gateway::providers::{
    ProviderBalance, ProviderError, ProviderTopUpRequest, ProviderTopUpResult, WalletProvider,
};
use payment_gateway::services::{
    AccountRepository, CacheStore, DeliveryMetadata, EventTransport, UserRepository,
};
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const TEST_USERNAME: &str = "johndoe";
pub const TEST_PHONE: &str = "+628123456789";
pub const TEST_ACCOUNT_ID: &str = "ACC-0001";

pub fn dec(value: &str) -> Decimal {
    value.parse().expect("valid decimal literal")
}

pub fn test_user() -> User {
    let now = Utc::now();
    User {
        id: 1,
        username: TEST_USERNAME.to_string(),
        phone_number: TEST_PHONE.to_string(),
        email: Some("john@example.com".to_string()),
        full_name: Some("John Doe".to_string()),
        created_at: now,
        updated_at: now,
    }
}

pub fn test_account(balance: &str, status: AccountStatus) -> Account {
    let now = Utc::now();
    Account {
        id: TEST_ACCOUNT_ID.to_string(),
        user_id: 1,
        balance: dec(balance),
        currency: "IDR".to_string(),
        account_status: status,
        created_at: now,
        updated_at: now,
    }
}

/// Poll `check` until it holds or a second has passed.
pub async fn wait_for<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[derive(Default)]
pub struct InMemoryUsers {
    users: Mutex<HashMap<String, User>>,
}

impl InMemoryUsers {
    pub fn with(users: Vec<User>) -> Self {
        Self {
            users: Mutex::new(users.into_iter().map(|u| (u.username.clone(), u)).collect()),
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryUsers {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.lock().unwrap().get(username).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryAccounts {
    accounts: Mutex<HashMap<i64, Account>>,
    pub updates: AtomicUsize,
    fail_updates: AtomicBool,
    concurrent_debit: Mutex<Option<Decimal>>,
}

impl InMemoryAccounts {
    pub fn with(accounts: Vec<Account>) -> Self {
        Self {
            accounts: Mutex::new(accounts.into_iter().map(|a| (a.user_id, a)).collect()),
            ..Default::default()
        }
    }

    /// Every balance update fails as if the database were down.
    pub fn failing_updates(self) -> Self {
        self.fail_updates.store(true, Ordering::SeqCst);
        self
    }

    /// Another writer debits `amount` right after the next balance update
    /// lands, before anyone re-reads the account.
    pub fn with_concurrent_debit(self, amount: Decimal) -> Self {
        *self.concurrent_debit.lock().unwrap() = Some(amount);
        self
    }

    pub fn balance_of(&self, user_id: i64) -> Option<Decimal> {
        self.accounts.lock().unwrap().get(&user_id).map(|a| a.balance)
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccounts {
    async fn get_account_by_user_id(&self, user_id: i64) -> Result<Option<Account>, AppError> {
        Ok(self.accounts.lock().unwrap().get(&user_id).cloned())
    }

    async fn update_account_balance(&self, account: &Account) -> Result<u64, AppError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError(anyhow::anyhow!("connection reset")));
        }

        let mut accounts = self.accounts.lock().unwrap();
        match accounts.values_mut().find(|a| a.id == account.id) {
            Some(stored) => {
                stored.balance = account.balance;
                stored.updated_at = account.updated_at;
                if let Some(amount) = self.concurrent_debit.lock().unwrap().take() {
                    stored.balance -= amount;
                }
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

/// Glob matching for the `*` patterns used by cache invalidation.
fn matches(pattern: &str, key: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => pattern == key,
    }
}

#[derive(Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, String>>,
    pub fail: AtomicBool,
}

impl InMemoryCache {
    pub fn failing() -> Self {
        let cache = Self::default();
        cache.fail.store(true, Ordering::SeqCst);
        cache
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }

    fn check(&self) -> Result<(), anyhow::Error> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("cache unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error> {
        self.check()?;
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str, _ttl_minutes: u64) -> Result<(), anyhow::Error> {
        self.check()?;
        self.insert(key, value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, anyhow::Error> {
        self.check()?;
        Ok(self.entries.lock().unwrap().remove(key).is_some())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, anyhow::Error> {
        self.check()?;
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|key, _| !matches(pattern, key));
        Ok((before - entries.len()) as u64)
    }
}

#[derive(Debug, Clone)]
pub struct SentEvent {
    pub topic: String,
    pub key: String,
    pub payload: String,
    pub headers: Vec<(String, String)>,
}

/// Transport that fails a configured number of times before accepting.
#[derive(Default)]
pub struct RecordingTransport {
    failures_remaining: AtomicU32,
    pub attempts: AtomicU32,
    sent: Mutex<Vec<SentEvent>>,
}

impl RecordingTransport {
    pub fn failing_times(failures: u32) -> Self {
        Self {
            failures_remaining: AtomicU32::new(failures),
            ..Default::default()
        }
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<SentEvent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventTransport for RecordingTransport {
    async fn send(
        &self,
        topic: &str,
        key: &str,
        payload: &str,
        headers: &[(String, String)],
    ) -> Result<DeliveryMetadata, anyhow::Error> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            anyhow::bail!("broker unavailable");
        }

        let mut sent = self.sent.lock().unwrap();
        sent.push(SentEvent {
            topic: topic.to_string(),
            key: key.to_string(),
            payload: payload.to_string(),
            headers: headers.to_vec(),
        });

        Ok(DeliveryMetadata {
            topic: topic.to_string(),
            partition: None,
            offset: format!("{}-0", sent.len()),
        })
    }
}

/// Provider double returning a fixed top-up outcome.
pub struct FakeProvider {
    method: PaymentMethod,
    accept: bool,
    pub calls: Mutex<Vec<ProviderTopUpRequest>>,
}

impl FakeProvider {
    pub fn accepting(method: PaymentMethod) -> Self {
        Self {
            method,
            accept: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting(method: PaymentMethod) -> Self {
        Self {
            method,
            accept: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl WalletProvider for FakeProvider {
    fn payment_method(&self) -> PaymentMethod {
        self.method
    }

    async fn get_balance(
        &self,
        wallet_id: &str,
        _request_id: &str,
    ) -> Result<ProviderBalance, ProviderError> {
        Ok(ProviderBalance {
            wallet_id: wallet_id.to_string(),
            balance: dec("75000.00"),
            currency: "IDR".to_string(),
            last_updated: None,
        })
    }

    async fn top_up(
        &self,
        request: &ProviderTopUpRequest,
    ) -> Result<Option<ProviderTopUpResult>, ProviderError> {
        self.calls.lock().unwrap().push(request.clone());
        if !self.accept {
            return Ok(None);
        }
        Ok(Some(ProviderTopUpResult {
            provider_transaction_id: format!("PRV-{}", request.reference_id),
            status: payment_gateway::models::TransactionStatus::Success,
            provider_status: "SUCCESS".to_string(),
            amount: request.amount,
        }))
    }
}

/// Provider retry budget with short delays for wiremock tests.
pub fn fast_retry() -> service_core::retry::RetryConfig {
    service_core::retry::RetryConfig {
        max_retries: 2,
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(50),
        backoff_multiplier: 2.0,
        add_jitter: false,
    }
}

pub fn gopay_credentials() -> payment_gateway::providers::ProviderCredentials {
    payment_gateway::providers::ProviderCredentials::Gopay {
        client_id: "gopay-client".to_string(),
        client_secret: secrecy::Secret::new("gopay-secret".to_string()),
        signature: secrecy::Secret::new("gopay-signature".to_string()),
    }
}

pub fn shopee_pay_credentials() -> payment_gateway::providers::ProviderCredentials {
    payment_gateway::providers::ProviderCredentials::ShopeePay {
        merchant_id: "merchant-7".to_string(),
        api_key: secrecy::Secret::new("shopee-key".to_string()),
        signature: secrecy::Secret::new("shopee-signature".to_string()),
    }
}
