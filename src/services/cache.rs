//! Read-through cache for backend queries.
//!
//! Entries are scoped to the caller's token, so a read cached for one caller
//! is never served to another: the backend authorizes each caller on their
//! first read. Mutations invalidate keys in a fixed order (driver, documents,
//! drivers list) for every caller and schedule a refetch for the mutating
//! caller after `refetch_delay`, giving the backend time to settle. Two
//! sessions editing the same driver are not reconciled.

use crate::domain::models::{Document, Driver};
use crate::services::backend::{token_digest, BackendApi, BackendError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Driver(String),
    Documents(String),
    DriversList(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ScopedKey {
    caller: String, // token digest
    key: QueryKey,
}

#[derive(Debug, Clone)]
enum CachedValue {
    Driver(Driver),
    Documents(Vec<Document>),
    Drivers(Vec<Driver>),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedValue,
    fetched_at: Instant,
}

#[derive(Clone)]
pub struct QueryCache {
    entries: Arc<RwLock<HashMap<ScopedKey, CacheEntry>>>,
    refetch_delay: Duration,
}

impl QueryCache {
    pub fn new(refetch_delay: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            refetch_delay,
        }
    }

    pub async fn driver(
        &self,
        backend: &dyn BackendApi,
        token: &str,
        driver_id: &str,
    ) -> Result<Driver, BackendError> {
        let key = scoped(token, QueryKey::Driver(driver_id.to_string()));
        if let Some(CachedValue::Driver(driver)) = self.lookup(&key).await {
            return Ok(driver);
        }
        let driver = backend.driver(token, driver_id).await?;
        self.store(key, CachedValue::Driver(driver.clone())).await;
        Ok(driver)
    }

    pub async fn documents(
        &self,
        backend: &dyn BackendApi,
        token: &str,
        driver_id: &str,
    ) -> Result<Vec<Document>, BackendError> {
        let key = scoped(token, QueryKey::Documents(driver_id.to_string()));
        if let Some(CachedValue::Documents(docs)) = self.lookup(&key).await {
            return Ok(docs);
        }
        let docs = backend.driver_documents(token, driver_id).await?;
        self.store(key, CachedValue::Documents(docs.clone())).await;
        Ok(docs)
    }

    pub async fn drivers(
        &self,
        backend: &dyn BackendApi,
        token: &str,
        company_id: &str,
    ) -> Result<Vec<Driver>, BackendError> {
        let key = scoped(token, QueryKey::DriversList(company_id.to_string()));
        if let Some(CachedValue::Drivers(drivers)) = self.lookup(&key).await {
            return Ok(drivers);
        }
        let drivers = backend.drivers(token, company_id).await?;
        self.store(key, CachedValue::Drivers(drivers.clone())).await;
        Ok(drivers)
    }

    /// Drops everything cached about a driver, for all callers. Returns the
    /// keys in invalidation order.
    pub async fn invalidate_driver(&self, driver_id: &str, company_id: &str) -> Vec<QueryKey> {
        let keys = vec![
            QueryKey::Driver(driver_id.to_string()),
            QueryKey::Documents(driver_id.to_string()),
            QueryKey::DriversList(company_id.to_string()),
        ];
        let mut entries = self.entries.write().await;
        for key in &keys {
            entries.retain(|scoped, _| &scoped.key != key);
        }
        keys
    }

    /// Invalidates a driver and refetches its queries with `token` in the
    /// background once `refetch_delay` has passed.
    pub async fn refresh_driver(
        &self,
        backend: Arc<dyn BackendApi>,
        token: String,
        driver_id: &str,
        company_id: &str,
    ) -> JoinHandle<()> {
        let keys = self.invalidate_driver(driver_id, company_id).await;
        let cache = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(cache.refetch_delay).await;
            for key in keys {
                if let Err(e) = cache.refetch(backend.as_ref(), &token, &key).await {
                    tracing::warn!("Refetch of {:?} failed: {}", key, e);
                }
            }
        })
    }

    pub async fn refetch(
        &self,
        backend: &dyn BackendApi,
        token: &str,
        key: &QueryKey,
    ) -> Result<(), BackendError> {
        self.entries
            .write()
            .await
            .remove(&scoped(token, key.clone()));
        match key {
            QueryKey::Driver(id) => self.driver(backend, token, id).await.map(|_| ()),
            QueryKey::Documents(id) => self.documents(backend, token, id).await.map(|_| ()),
            QueryKey::DriversList(company) => self.drivers(backend, token, company).await.map(|_| ()),
        }
    }

    #[cfg(test)]
    pub async fn contains(&self, token: &str, key: &QueryKey) -> bool {
        self.entries
            .read()
            .await
            .contains_key(&scoped(token, key.clone()))
    }

    /// Drops entries older than `max_age` (call periodically)
    pub async fn cleanup(&self, max_age: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| now.duration_since(entry.fetched_at) < max_age);
        tracing::debug!("Query cache cleanup: {} entries kept", entries.len());
    }

    async fn lookup(&self, key: &ScopedKey) -> Option<CachedValue> {
        self.entries.read().await.get(key).map(|e| e.value.clone())
    }

    async fn store(&self, key: ScopedKey, value: CachedValue) {
        self.entries.write().await.insert(
            key,
            CacheEntry {
                value,
                fetched_at: Instant::now(),
            },
        );
    }
}

fn scoped(token: &str, key: QueryKey) -> ScopedKey {
    ScopedKey {
        caller: token_digest(token),
        key,
    }
}
