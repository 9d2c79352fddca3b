use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::backend::ObjectStoreBackend;
use crate::error::{BackendError, StoreError};

/// Default number of in-flight requests an accessor allows.
pub const DEFAULT_CAPACITY: usize = 10;

/// Default wait for a free token before failing with `StoreError::Busy`.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(20);

/// A rate-limited wrapper around an `ObjectStoreBackend`: at most `capacity`
/// requests in flight at a time, FIFO ordering courtesy of
/// `tokio::sync::Semaphore`'s waiter queue, no retries (the polling cadence
/// of the caller is the retry policy).
pub struct StoreAccessor {
    backend: Arc<dyn ObjectStoreBackend>,
    tokens: Arc<Semaphore>,
    acquire_timeout: Duration,
}

impl StoreAccessor {
    pub fn new(backend: Arc<dyn ObjectStoreBackend>) -> Self {
        Self::with_limits(backend, DEFAULT_CAPACITY, DEFAULT_ACQUIRE_TIMEOUT)
    }

    pub fn with_limits(
        backend: Arc<dyn ObjectStoreBackend>,
        capacity: usize,
        acquire_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            tokens: Arc::new(Semaphore::new(capacity.max(1))),
            acquire_timeout,
        }
    }

    async fn acquire(&self) -> Result<tokio::sync::SemaphorePermit<'_>, StoreError> {
        match tokio::time::timeout(self.acquire_timeout, self.tokens.acquire()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_closed)) => unreachable!("StoreAccessor never closes its semaphore"),
            Err(_elapsed) => {
                tracing::warn!(timeout = ?self.acquire_timeout, "token acquisition timed out");
                Err(StoreError::Busy(self.acquire_timeout))
            }
        }
    }

    /// Probe for object existence. Missing objects fold into `Ok(false)`.
    pub async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let _permit = self.acquire().await?;
        self.backend.head(key).await.map_err(StoreError::Backend)
    }

    /// Fetch an object's contents as UTF-8 text.
    pub async fn get(&self, key: &str) -> Result<String, StoreError> {
        let _permit = self.acquire().await?;
        match self.backend.get(key).await {
            Ok(text) => Ok(text),
            Err(BackendError::NotFound) => Err(StoreError::NotFound(key.to_string())),
            Err(other) => Err(StoreError::Backend(other)),
        }
    }
}
