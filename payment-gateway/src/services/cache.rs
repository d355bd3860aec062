//! Read-through cache shared with the rest of the payment platform.
//!
//! Key names are consumed by other components for invalidation, so the
//! builders in [`cache_keys`] must not change.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};
use serde::{de::DeserializeOwned, Serialize};

pub mod cache_keys {
    pub const TRANSACTION_PATTERN: &str = "trx:*";
    pub const TRANSACTION_LIST_PATTERN: &str = "trx_list:*";
    pub const TRANSACTION_COUNT: &str = "trx_count";

    pub fn account(username: &str) -> String {
        format!("account:{}", username)
    }

    pub fn balance(username: &str) -> String {
        format!("balance:{}", username)
    }

    pub fn transaction(id: &str) -> String {
        format!("trx:{}", id)
    }

    pub fn transaction_list(page: u32, size: u32) -> String {
        format!("trx_list:{}:{}", page, size)
    }
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error>;
    async fn set(&self, key: &str, value: &str, ttl_minutes: u64) -> Result<(), anyhow::Error>;
    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool, anyhow::Error>;
    /// Delete every key matching a glob pattern, returning how many were removed.
    async fn delete_pattern(&self, pattern: &str) -> Result<u64, anyhow::Error>;
}

/// Read and deserialize a cached JSON value.
pub async fn get_json<T: DeserializeOwned>(
    cache: &dyn CacheStore,
    key: &str,
) -> Result<Option<T>, anyhow::Error> {
    match cache.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Serialize and cache a value as JSON.
pub async fn set_json<T: Serialize + Sync>(
    cache: &dyn CacheStore,
    key: &str,
    value: &T,
    ttl_minutes: u64,
) -> Result<(), anyhow::Error> {
    let raw = serde_json::to_string(value)?;
    cache.set(key, &raw, ttl_minutes).await
}

const SCAN_BATCH: usize = 200;

#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self, anyhow::Error> {
        let client = Client::open(url)?;

        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self { manager })
    }

    /// Connection shared with the event stream transport.
    pub fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get cache: {}", e))
    }

    async fn set(&self, key: &str, value: &str, ttl_minutes: u64) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_minutes * 60)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to set cache: {}", e))
    }

    async fn delete(&self, key: &str) -> Result<bool, anyhow::Error> {
        let mut conn = self.manager.clone();
        let removed: u64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to delete cache key {}: {}", key, e))?;
        Ok(removed > 0)
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, anyhow::Error> {
        let mut conn = self.manager.clone();
        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to scan {}: {}", pattern, e))?;

            if !keys.is_empty() {
                let deleted: u64 = redis::cmd("DEL")
                    .arg(&keys)
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| anyhow::anyhow!("Failed to delete keys for {}: {}", pattern, e))?;
                removed += deleted;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(removed)
    }
}
