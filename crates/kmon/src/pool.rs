//! Bounded worker pool for blocking I/O.
//!
//! Management connections and push-gateway calls block their thread. They run
//! through this pool so the async scheduler never stalls, and the permit count
//! caps how many of them are in flight at once. Excess work waits for a permit.

use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::error::PoolError;

#[derive(Clone, Debug)]
pub struct BlockingPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl BlockingPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `job` on a blocking thread once a permit is available.
    pub async fn run<F, T>(&self, job: F) -> Result<T, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| PoolError::Panicked(e.to_string()))
    }

    /// Stop handing out permits; queued and future jobs fail with `Closed`.
    pub fn close(&self) {
        self.permits.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_bounds_concurrent_jobs() {
        let pool = BlockingPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let jobs = (0..6).map(|_| {
            let pool = pool.clone();
            let running = running.clone();
            let peak = peak.clone();
            async move {
                pool.run(move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(30));
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .await
            }
        });

        let results = futures::future::join_all(jobs).await;
        assert!(results.iter().all(|r| r.is_ok()));
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_panic_is_reported() {
        let pool = BlockingPool::new(1);
        let result: Result<(), _> = pool.run(|| panic!("boom")).await;
        assert!(matches!(result, Err(PoolError::Panicked(_))));

        // The permit is released even when the job panics.
        assert_eq!(pool.run(|| 7).await, Ok(7));
    }

    #[tokio::test]
    async fn test_closed_pool_rejects_jobs() {
        let pool = BlockingPool::new(1);
        pool.close();
        assert_eq!(pool.run(|| ()).await, Err(PoolError::Closed));
    }
}
