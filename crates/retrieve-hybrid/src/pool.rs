use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::debug;

use retrieve_core::config::StoreSettings;
use retrieve_core::{Error, Result};

/// Bounded access to the backing stores, shared by read and write paths.
///
/// A permit is held only while a store future runs; embedding calls happen
/// outside of [`StorePool::run`]. Acquisition and the query itself carry
/// separate timeouts.
#[derive(Debug, Clone)]
pub struct StorePool {
    permits: Arc<Semaphore>,
    size: usize,
    acquire_timeout: Duration,
    query_timeout: Duration,
}

impl StorePool {
    pub fn new(size: usize, acquire_timeout: Duration, query_timeout: Duration) -> Self {
        let size = size.max(1);
        Self { permits: Arc::new(Semaphore::new(size)), size, acquire_timeout, query_timeout }
    }

    pub fn from_settings(settings: &StoreSettings) -> Self {
        Self::new(
            settings.pool_size,
            Duration::from_millis(settings.acquire_timeout_ms),
            Duration::from_millis(settings.query_timeout_ms),
        )
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run one store operation under a pool permit.
    ///
    /// Exhaustion, timeouts and store errors all surface as `StoreUnavailable`.
    pub async fn run<T, F>(&self, op: &str, fut: F) -> Result<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        let _permit = tokio::time::timeout(self.acquire_timeout, self.permits.acquire())
            .await
            .map_err(|_| Error::StoreUnavailable(format!("{op}: pool exhausted after {:?}", self.acquire_timeout)))?
            .map_err(|_| Error::StoreUnavailable(format!("{op}: pool closed")))?;
        debug!(op, available = self.available(), "store permit acquired");
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(Error::StoreUnavailable(format!("{op}: {e:#}"))),
            Err(_) => Err(Error::StoreUnavailable(format!("{op}: timed out after {:?}", self.query_timeout))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn pool(size: usize) -> StorePool {
        StorePool::new(size, Duration::from_millis(20), Duration::from_millis(50))
    }

    #[tokio::test]
    async fn permit_is_released_after_each_run() {
        let p = pool(1);
        assert_eq!(p.run("a", async { Ok(1) }).await.unwrap(), 1);
        assert_eq!(p.run("b", async { Ok(2) }).await.unwrap(), 2);
        assert_eq!(p.available(), 1);
    }

    #[tokio::test]
    async fn store_error_becomes_store_unavailable() {
        let err = pool(1).run::<(), _>("q", async { Err(anyhow!("disk gone")) }).await.unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(ref m) if m.contains("disk gone")));
    }

    #[tokio::test]
    async fn slow_query_times_out() {
        let err = pool(1)
            .run("q", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(ref m) if m.contains("timed out")));
    }

    #[tokio::test]
    async fn exhausted_pool_fails_fast() {
        let p = pool(1);
        let held = p.permits.clone().acquire_owned().await.unwrap();
        let err = p.run("q", async { Ok(()) }).await.unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(ref m) if m.contains("exhausted")));
        drop(held);
        assert!(p.run("q", async { Ok(()) }).await.is_ok());
    }
}
