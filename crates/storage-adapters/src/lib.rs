//! Driven adapters: persistence, account caching and admission control.

pub mod cache;
pub mod rate_limit;
#[cfg(feature = "db-sqlite")]
pub mod sqlite;

pub use cache::MemoryAccountCache;
#[cfg(feature = "redis")]
pub use cache::RedisAccountCache;
pub use rate_limit::{FixedWindowLimiter, RateLimitConfig};
#[cfg(feature = "db-sqlite")]
pub use sqlite::SqliteStore;
