use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use domains::{Account, AccountCache, AccountId, CacheError};

/// In-process cache for single-node deployments and tests.
///
/// Expired entries are dropped lazily on read.
pub struct MemoryAccountCache {
    entries: DashMap<AccountId, (Account, Instant)>,
    ttl: Duration,
}

impl MemoryAccountCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl AccountCache for MemoryAccountCache {
    async fn get(&self, id: AccountId) -> Result<Option<Account>, CacheError> {
        if let Some(entry) = self.entries.get(&id) {
            let (account, deadline) = entry.value();
            if *deadline > Instant::now() {
                return Ok(Some(account.clone()));
            }
        }
        self.entries
            .remove_if(&id, |_, (_, deadline)| *deadline <= Instant::now());
        Ok(None)
    }

    async fn set(&self, account: &Account) -> Result<(), CacheError> {
        if account.id <= 0 {
            return Err(CacheError::Unkeyable);
        }
        let mut stored = account.clone();
        stored.password_hash.clear();
        self.entries
            .insert(account.id, (stored, Instant::now() + self.ttl));
        Ok(())
    }

    async fn invalidate(&self, id: AccountId) -> Result<(), CacheError> {
        self.entries.remove(&id);
        Ok(())
    }
}
