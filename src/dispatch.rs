//! Asynchronous operation dispatch.
//!
//! Every store call runs as its own tokio task. The caller gets a [`StoreChannel`] back right away and decides when
//! to wait for it. A channel is fulfilled exactly once and consumed exactly once: all the receiving methods take
//! `self` by value.
//!
//! ```ignore
//! let product = store.product().get(&id);
//! let orders = store.order().list(Cursor::page(0, 60));
//! // Both are in flight now.
//! let product = product.recv().await?;
//! let orders = orders.recv().await?;
//! ```

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::error;

use crate::error::StoreError;
use crate::error::StoreResult;

/// How long [`must()`] waits before panicking so that the error can reach the logs.
pub const PANIC_FLUSH_DELAY: Duration = Duration::from_secs(1);

/// Single-slot completion handle of a dispatched store operation.
#[must_use = "a store channel does nothing unless received"]
pub struct StoreChannel<T> {
    op: &'static str,
    rx: oneshot::Receiver<StoreResult<T>>,
}

/// Start `work` immediately on the current tokio runtime.
///
/// Must be called from within a runtime context.
pub fn dispatch<T, F>(op: &'static str, work: F) -> StoreChannel<T>
where
    T: Send + 'static,
    F: Future<Output = StoreResult<T>> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        // The receiver may be gone if the caller stopped waiting; the result is discarded then.
        let _ = tx.send(work.await);
    });
    StoreChannel { op, rx }
}

impl<T> StoreChannel<T> {
    /// A channel that is already fulfilled with `result`.
    pub fn ready(op: &'static str, result: StoreResult<T>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { op, rx }
    }

    /// Name of the operation this channel belongs to.
    pub fn op(&self) -> &'static str {
        self.op
    }

    pub async fn recv(self) -> StoreResult<T> {
        self.rx.await.unwrap_or_else(|_| Err(StoreError::internal("store.worker_lost")))
    }

    /// Wait for the result unless `cancel` completes first. Cancelling does not stop the dispatched work.
    pub async fn recv_until<C>(self, cancel: C) -> StoreResult<T>
    where
        C: Future<Output = ()>,
    {
        let op = self.op;
        tokio::select! {
            biased;
            result = self.recv() => result,
            _ = cancel => {
                tracing::debug!("[{op}] caller stopped waiting");
                Err(StoreError::internal("store.canceled"))
            }
        }
    }

    pub async fn recv_timeout(self, timeout: Duration) -> StoreResult<T> {
        let op = self.op;
        match tokio::time::timeout(timeout, self.recv()).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!("[{op}] timed out after {timeout:?}");
                Err(StoreError::internal("store.timeout"))
            }
        }
    }

    /// Blocking receive for callers outside of the async runtime. Panics if called from within an async context.
    pub fn blocking_recv(self) -> StoreResult<T> {
        self.rx
            .blocking_recv()
            .unwrap_or_else(|_| Err(StoreError::internal("store.worker_lost")))
    }
}

impl<T> Debug for StoreChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreChannel").field("op", &self.op).finish()
    }
}

/// Await a channel and abort the process on error.
///
/// Only for startup seeding and tests. Request-serving code must use [`StoreChannel::recv()`].
pub async fn must<T>(channel: StoreChannel<T>) -> T {
    let op = channel.op;
    match channel.recv().await {
        Ok(value) => value,
        Err(err) => {
            error!("[{op}] fatal store error: {err} ({})", err.code());
            tokio::time::sleep(PANIC_FLUSH_DELAY).await;
            panic!("[{op}] fatal store error: {err}");
        }
    }
}
