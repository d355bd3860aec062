//! Post-commit cache invalidation and event publication.
//!
//! Runs after a top-up has been committed. Every task is attempted, failures
//! are logged per task, and nothing is reported back to the caller.

use futures::future::join_all;
use metrics::counter;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn, Instrument};

use super::account::AccountService;
use super::cache::{cache_keys, CacheStore};
use super::publisher::TransactionPublisher;
use crate::models::Transaction;

/// Summary of one coordinator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SideEffectReport {
    pub keys_removed: u64,
    pub failed_cache_tasks: usize,
    pub event_published: bool,
}

enum CacheTask {
    Pattern(&'static str),
    Key(String),
}

pub struct SideEffectCoordinator {
    accounts: Arc<AccountService>,
    cache: Arc<dyn CacheStore>,
    publisher: Arc<TransactionPublisher>,
}

impl SideEffectCoordinator {
    pub fn new(
        accounts: Arc<AccountService>,
        cache: Arc<dyn CacheStore>,
        publisher: Arc<TransactionPublisher>,
    ) -> Self {
        Self {
            accounts,
            cache,
            publisher,
        }
    }

    async fn run_cache_task(&self, task: &CacheTask) -> Result<u64, anyhow::Error> {
        match task {
            CacheTask::Pattern(pattern) => self.cache.delete_pattern(pattern).await,
            CacheTask::Key(key) => self.cache.delete(key).await.map(u64::from),
        }
    }

    /// Invalidate the caches touched by `trx` and publish its event.
    ///
    /// All tasks run concurrently and are awaited; none of their failures
    /// propagate. The user's own account and balance entries are dropped
    /// through [`AccountService::invalidate_user_cache`].
    pub async fn invalidate_and_publish(&self, username: &str, trx: &Transaction) -> SideEffectReport {
        let tasks = [
            CacheTask::Pattern(cache_keys::TRANSACTION_LIST_PATTERN),
            CacheTask::Pattern(cache_keys::TRANSACTION_PATTERN),
            CacheTask::Key(cache_keys::TRANSACTION_COUNT.to_string()),
        ];

        let cache_work = join_all(tasks.iter().map(|task| async move {
            let label = match task {
                CacheTask::Pattern(pattern) => (*pattern).to_string(),
                CacheTask::Key(key) => key.clone(),
            };
            match self.run_cache_task(task).await {
                Ok(removed) => Some(removed),
                Err(e) => {
                    warn!(target_key = %label, error = %e, "Cache invalidation failed");
                    None
                }
            }
        }));

        let publish_work = async {
            match self.publisher.publish_with_retry(trx).await {
                Ok(metadata) => {
                    info!(
                        topic = %metadata.topic,
                        offset = %metadata.offset,
                        "Transaction event published"
                    );
                    true
                }
                Err(e) => {
                    warn!(error = %e, "Transaction event could not be published");
                    false
                }
            }
        };

        let (cache_results, user_entries, event_published) = tokio::join!(
            cache_work,
            self.accounts.invalidate_user_cache(username),
            publish_work
        );

        let mut report = SideEffectReport {
            keys_removed: user_entries.removed,
            failed_cache_tasks: user_entries.failed,
            event_published,
        };
        for result in cache_results {
            match result {
                Some(removed) => report.keys_removed += removed,
                None => report.failed_cache_tasks += 1,
            }
        }

        counter!("cache_keys_invalidated_total").increment(report.keys_removed);
        info!(
            username = %username,
            keys_removed = report.keys_removed,
            failed_cache_tasks = report.failed_cache_tasks,
            event_published = report.event_published,
            "Post-commit side effects completed"
        );

        report
    }

    /// Run [`invalidate_and_publish`](Self::invalidate_and_publish) on a
    /// detached task. The caller never waits for it; the handle is only
    /// useful to tests.
    pub fn dispatch(self: &Arc<Self>, username: String, trx: Transaction) -> JoinHandle<SideEffectReport> {
        let coordinator = Arc::clone(self);
        let span = tracing::info_span!("side_effects", transaction_id = %trx.transaction_id);
        tokio::spawn(
            async move { coordinator.invalidate_and_publish(&username, &trx).await }
                .instrument(span),
        )
    }
}
