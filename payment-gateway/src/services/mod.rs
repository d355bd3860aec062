pub mod account;
pub mod cache;
pub mod events;
pub mod metrics;
pub mod publisher;
pub mod repository;
pub mod side_effects;
pub mod topup;

pub use account::{AccountService, CacheInvalidation};
pub use cache::{cache_keys, CacheStore, RedisCache};
pub use events::{DeliveryMetadata, EventTransport, RedisStreamTransport};
pub use metrics::{get_metrics, init_metrics};
pub use publisher::TransactionPublisher;
pub use repository::{
    AccountRepository, Database, PgAccountRepository, PgUserRepository, UserRepository,
};
pub use side_effects::{SideEffectCoordinator, SideEffectReport};
pub use topup::TopUpService;
