//! A supervised periodic background job, generalized from the corpus's
//! `Collector` trait (which ticked against an external feed and persisted
//! its progress to a database) into a payload-agnostic shape with no
//! storage of its own: the three recurring jobs this system needs —
//! position-TTL sweep, surge recomputation, subscription heartbeat —
//! own no state worth persisting between process restarts, so `tick`
//! takes `&mut self` and returns only pass/fail.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy)]
pub enum SupervisionStrategy {
    /// Keep ticking on the same schedule.
    Resume,
    /// Stop this worker's loop entirely.
    Stop,
}

#[async_trait]
pub trait Worker: Send + 'static {
    type Error: std::fmt::Debug + Send;

    /// Human-readable name, used only in log lines.
    fn name(&self) -> &'static str;

    /// Performs one unit of work.
    async fn tick(&mut self) -> Result<(), Self::Error>;

    /// How long to wait between ticks.
    fn interval(&self) -> Duration;

    /// Called when `tick` returns an error. Errors are logged either way;
    /// the default keeps the worker running, since a single failed sweep
    /// or recompute should not take the whole background job down.
    #[allow(unused_variables)]
    fn on_error(&self, error: &Self::Error) -> SupervisionStrategy {
        SupervisionStrategy::Resume
    }

    /// Called when `tick` panics. Default resumes for the same reason as
    /// `on_error` — a poisoned single iteration shouldn't end the job.
    #[allow(unused_variables)]
    fn on_panic(&self, error: Box<dyn Any + Send>) -> SupervisionStrategy {
        SupervisionStrategy::Resume
    }
}

/// Runs `worker` on its own interval until `shutdown` is cancelled or the
/// worker's own supervision strategy says to stop.
pub fn spawn<W: Worker>(mut worker: W, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(worker.interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!(worker = worker.name(), "worker stopping on shutdown signal");
                    break;
                }
                _ = interval.tick() => {
                    let result = AssertUnwindSafe(worker.tick()).catch_unwind().await;
                    let strategy = match result {
                        Ok(Ok(())) => continue,
                        Ok(Err(error)) => {
                            tracing::warn!(worker = worker.name(), ?error, "worker tick failed");
                            worker.on_error(&error)
                        }
                        Err(panic) => {
                            tracing::error!(worker = worker.name(), ?panic, "worker tick panicked");
                            worker.on_panic(panic)
                        }
                    };
                    if matches!(strategy, SupervisionStrategy::Stop) {
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct CountingWorker {
        count: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Worker for CountingWorker {
        type Error = ();

        fn name(&self) -> &'static str {
            "counting"
        }

        async fn tick(&mut self) -> Result<(), ()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn interval(&self) -> Duration {
            Duration::from_millis(5)
        }
    }

    #[tokio::test]
    async fn ticks_until_shutdown() {
        let count = Arc::new(AtomicU32::new(0));
        let shutdown = CancellationToken::new();
        let handle = spawn(CountingWorker { count: count.clone() }, shutdown.clone());

        tokio::time::sleep(Duration::from_millis(40)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert!(count.load(Ordering::SeqCst) >= 2);
    }
}
