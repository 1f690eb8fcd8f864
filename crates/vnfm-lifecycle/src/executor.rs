//! Bounded executor for detached lifecycle continuations.
//!
//! Continuations are the wait and post-processing phases of a lifecycle
//! operation. They run as tokio tasks, so every `.await` inside one (a backend
//! poll, a boot-wait sleep) yields to the other continuations. A semaphore
//! bounds how many run at once; submissions beyond the bound queue on the
//! semaphore instead of failing.
//!
//! [`BackgroundExecutor::submit`] returns `()`: a continuation persists its
//! own failures through the status tracker. Whatever it returns or panics with
//! is logged here and never reaches the submitter.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Notify, Semaphore};
use tracing::Instrument;

use vnfm_core::VnfId;

use crate::error::Result;
use crate::metrics::LifecycleMetrics;

/// Runs detached continuations on a bounded pool.
///
/// Cloning is cheap; clones share the pool.
#[derive(Debug, Clone)]
pub struct BackgroundExecutor {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    permits: Arc<Semaphore>,
    pool_size: usize,
    in_flight: AtomicUsize,
    idle: Notify,
    metrics: LifecycleMetrics,
}

impl Inner {
    fn finish(&self) {
        let remaining = self.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
        self.metrics.set_in_flight(remaining);
        if remaining == 0 {
            self.idle.notify_waiters();
        }
    }
}

impl BackgroundExecutor {
    /// Creates an executor running at most `pool_size` continuations at once.
    #[must_use]
    pub fn new(pool_size: usize, metrics: LifecycleMetrics) -> Self {
        let pool_size = pool_size.max(1);
        Self {
            inner: Arc::new(Inner {
                permits: Arc::new(Semaphore::new(pool_size)),
                pool_size,
                in_flight: AtomicUsize::new(0),
                idle: Notify::new(),
                metrics,
            }),
        }
    }

    /// Returns the pool bound.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.inner.pool_size
    }

    /// Returns the number of continuations queued or running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Submits a continuation for `vnf_id`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit<F>(&self, operation: &'static str, vnf_id: VnfId, continuation: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let queued = inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        inner.metrics.set_in_flight(queued);
        let span = vnfm_core::lifecycle_span(operation, &vnf_id.to_string());
        tracing::debug!(%vnf_id, operation, queued, "continuation submitted");

        tokio::spawn(async move {
            let outcome = match Arc::clone(&inner.permits).acquire_owned().await {
                Ok(_permit) => match tokio::spawn(continuation.instrument(span)).await {
                    Ok(Ok(())) => "success",
                    Ok(Err(e)) => {
                        tracing::error!(%vnf_id, operation, error = %e, "continuation failed");
                        "failure"
                    }
                    Err(join_err) => {
                        tracing::error!(%vnf_id, operation, error = %join_err, "continuation panicked");
                        "panic"
                    }
                },
                Err(_) => {
                    tracing::error!(%vnf_id, operation, "executor closed, continuation dropped");
                    "rejected"
                }
            };
            inner.metrics.record_continuation(operation, outcome);
            inner.finish();
        });
    }

    /// Resolves once no continuation is queued or running.
    pub async fn drain(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}
