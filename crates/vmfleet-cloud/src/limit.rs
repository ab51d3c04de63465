//! Optional bound on in-flight provider calls

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Shared by every task of one operation. Unbounded unless a maximum is set.
#[derive(Debug, Clone, Default)]
pub struct Limiter {
    semaphore: Option<Arc<Semaphore>>,
}

impl Limiter {
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// `None` or `Some(0)` leave the limiter unbounded.
    pub fn new(max_concurrency: Option<usize>) -> Self {
        Self {
            semaphore: max_concurrency
                .filter(|n| *n > 0)
                .map(|n| Arc::new(Semaphore::new(n))),
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.semaphore.is_some()
    }

    /// Wait for a slot. The permit is released when dropped.
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        match &self.semaphore {
            Some(semaphore) => Arc::clone(semaphore).acquire_owned().await.ok(),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_zero_is_unbounded() {
        assert!(!Limiter::new(Some(0)).is_bounded());
        assert!(!Limiter::new(None).is_bounded());
        assert!(Limiter::new(Some(2)).is_bounded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounds_in_flight_tasks() {
        let limiter = Limiter::new(Some(2));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..6 {
            let limiter = limiter.clone();
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            tasks.spawn(async move {
                let _permit = limiter.acquire().await;
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(1)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            });
        }
        while tasks.join_next().await.is_some() {}

        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }
}
