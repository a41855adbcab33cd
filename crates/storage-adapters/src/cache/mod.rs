//! Account cache backends.
//!
//! Entries are keyed `user-{id}` and expire after a fixed TTL. A cached
//! account never carries its password hash; the hash is skipped on
//! serialization and only the credential store hands it out.

use domains::AccountId;

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use memory::MemoryAccountCache;
#[cfg(feature = "redis")]
pub use redis::RedisAccountCache;

pub fn cache_key(id: AccountId) -> String {
    format!("user-{id}")
}
