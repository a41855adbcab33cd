use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis::{cmd, RedisError};
use deadpool_redis::{Config, Connection, Pool, PoolConfig, Runtime, Timeouts};
use domains::{Account, AccountCache, AccountId, CacheError};
use tracing::{info, warn};

use super::cache_key;

pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_millis(500);

/// Shared cache for multi-node deployments. Values are JSON snapshots
/// written with `SET .. EX`.
///
/// Every call, including checking a connection out of the pool, is bounded
/// by the operation timeout and reports expiry as [`CacheError::Backend`].
#[derive(Clone)]
pub struct RedisAccountCache {
    pool: Pool,
    ttl: Duration,
    operation_timeout: Duration,
}

fn backend(err: impl std::fmt::Display) -> CacheError {
    CacheError::Backend(err.to_string())
}

fn encode(account: &Account) -> Result<String, CacheError> {
    serde_json::to_string(account).map_err(|e| CacheError::Corrupt(e.to_string()))
}

fn decode(raw: &str) -> Result<Account, CacheError> {
    serde_json::from_str(raw).map_err(|e| CacheError::Corrupt(e.to_string()))
}

impl RedisAccountCache {
    /// Builds the pool. No connection is opened until the first call.
    pub fn connect(url: &str, ttl: Duration, operation_timeout: Duration) -> Result<Self, CacheError> {
        let mut timeouts = Timeouts::default();
        timeouts.wait = Some(operation_timeout);
        timeouts.create = Some(operation_timeout);
        timeouts.recycle = Some(operation_timeout);
        let mut pool_config = PoolConfig::default();
        pool_config.timeouts = timeouts;

        let mut config = Config::from_url(url);
        config.pool = Some(pool_config);
        let pool = config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(backend)?;

        info!(
            ttl_secs = ttl.as_secs(),
            timeout_ms = operation_timeout.as_millis() as u64,
            "redis account cache configured"
        );
        Ok(Self {
            pool,
            ttl,
            operation_timeout,
        })
    }

    async fn conn(&self) -> Result<Connection, CacheError> {
        self.pool.get().await.map_err(backend)
    }

    async fn timed<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, CacheError>>,
    ) -> Result<T, CacheError> {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    operation,
                    timeout_ms = self.operation_timeout.as_millis() as u64,
                    "cache operation timed out"
                );
                Err(CacheError::Backend(format!("{operation} timed out")))
            }
        }
    }
}

#[async_trait]
impl AccountCache for RedisAccountCache {
    async fn get(&self, id: AccountId) -> Result<Option<Account>, CacheError> {
        let raw: Option<String> = self
            .timed("cache_get", async {
                let mut conn = self.conn().await?;
                cmd("GET")
                    .arg(cache_key(id))
                    .query_async(&mut conn)
                    .await
                    .map_err(|e: RedisError| backend(e))
            })
            .await?;

        raw.as_deref().map(decode).transpose()
    }

    async fn set(&self, account: &Account) -> Result<(), CacheError> {
        if account.id <= 0 {
            return Err(CacheError::Unkeyable);
        }
        let json = encode(account)?;
        self.timed("cache_set", async {
            let mut conn = self.conn().await?;
            cmd("SET")
                .arg(cache_key(account.id))
                .arg(json)
                .arg("EX")
                .arg(self.ttl.as_secs().max(1))
                .query_async::<()>(&mut conn)
                .await
                .map_err(backend)
        })
        .await
    }

    async fn invalidate(&self, id: AccountId) -> Result<(), CacheError> {
        self.timed("cache_invalidate", async {
            let mut conn = self.conn().await?;
            cmd("DEL")
                .arg(cache_key(id))
                .query_async::<()>(&mut conn)
                .await
                .map_err(backend)
        })
        .await
    }
}
