//! Remote queue/counter store collaborator.
//!
//! Outbound commands are pushed by the operator into one list per remark;
//! the set of known remarks and the allowed room topics live in sets.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::{RelayError, RelayResult};

#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Non-blocking pop from the head of list `key`; `None` when empty.
    async fn pop_front(&self, key: &str) -> RelayResult<Option<String>>;

    async fn members(&self, set_key: &str) -> RelayResult<Vec<String>>;

    async fn increment(&self, counter_key: &str) -> RelayResult<i64>;
}

#[derive(Clone)]
pub struct RedisQueueStore {
    manager: ConnectionManager,
}

impl RedisQueueStore {
    pub async fn connect(redis_url: &str) -> RelayResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| RelayError::Store(format!("failed to open redis client for {}: {}", redis_url, e)))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| RelayError::Store(format!("failed to connect to redis: {}", e)))?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl QueueStore for RedisQueueStore {
    async fn pop_front(&self, key: &str) -> RelayResult<Option<String>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.lpop(key, None).await?;
        Ok(value)
    }

    async fn members(&self, set_key: &str) -> RelayResult<Vec<String>> {
        let mut conn = self.manager.clone();
        let members: Vec<String> = conn.smembers(set_key).await?;
        Ok(members)
    }

    async fn increment(&self, counter_key: &str) -> RelayResult<i64> {
        let mut conn = self.manager.clone();
        let value: i64 = conn.incr(counter_key, 1).await?;
        Ok(value)
    }
}

/// Process-local store with the same semantics, for tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryQueueStore {
    lists: Mutex<HashMap<String, VecDeque<String>>>,
    sets: Mutex<HashMap<String, BTreeSet<String>>>,
    counters: Mutex<HashMap<String, i64>>,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&self, key: &str, value: impl Into<String>) {
        let mut lists = self.lists.lock().unwrap_or_else(|e| e.into_inner());
        lists
            .entry(key.to_string())
            .or_default()
            .push_back(value.into());
    }

    pub fn add_member(&self, set_key: &str, member: impl Into<String>) {
        let mut sets = self.sets.lock().unwrap_or_else(|e| e.into_inner());
        sets.entry(set_key.to_string())
            .or_default()
            .insert(member.into());
    }

    pub fn counter(&self, counter_key: &str) -> i64 {
        let counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters.get(counter_key).copied().unwrap_or(0)
    }

    pub fn pending(&self, key: &str) -> usize {
        let lists = self.lists.lock().unwrap_or_else(|e| e.into_inner());
        lists.get(key).map(|l| l.len()).unwrap_or(0)
    }
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn pop_front(&self, key: &str) -> RelayResult<Option<String>> {
        let mut lists = self.lists.lock().unwrap_or_else(|e| e.into_inner());
        Ok(lists.get_mut(key).and_then(|l| l.pop_front()))
    }

    async fn members(&self, set_key: &str) -> RelayResult<Vec<String>> {
        let sets = self.sets.lock().unwrap_or_else(|e| e.into_inner());
        Ok(sets
            .get(set_key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn increment(&self, counter_key: &str) -> RelayResult<i64> {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        let value = counters.entry(counter_key.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }
}
