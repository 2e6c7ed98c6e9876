//! Background tasks and timers for whichever event loop hosts the client.
//!
//! SYSTEM CONTEXT
//! ==============
//! The refresh timer, the background logout call, the request timeout and the
//! social SDK waits all need to spawn or sleep. Native builds (the CLI, tests)
//! run on tokio. Under `hydrate` the page has no tokio reactor, so tasks go to
//! `wasm_bindgen_futures::spawn_local` and timers to `gloo_timers`.
//!
//! TRADE-OFFS
//! ==========
//! Outside a tokio runtime the native [`timeout`] cannot arm a timer and runs
//! the future unbounded rather than panicking.

#[cfg(test)]
#[path = "runtime_test.rs"]
mod tests;

use std::future::Future;
use std::time::Duration;

/// The bound passed to [`timeout`] ran out first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed;

// =============================================================================
// NATIVE (tokio)
// =============================================================================

#[cfg(not(feature = "hydrate"))]
mod imp {
    use super::{Duration, Elapsed, Future};

    /// Handle to a spawned background task.
    pub struct Task {
        handle: tokio::task::JoinHandle<()>,
    }

    impl Task {
        pub fn abort(&self) {
            self.handle.abort();
        }

        /// Wait for the task to finish or be aborted.
        pub async fn join(self) {
            if let Err(e) = self.handle.await {
                if e.is_panic() {
                    tracing::warn!("background task panicked");
                }
            }
        }
    }

    pub fn spawn<F>(future: F) -> Option<Task>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current().ok()?;
        Some(Task { handle: runtime.spawn(future) })
    }

    pub async fn sleep(duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    pub async fn timeout<F: Future>(duration: Duration, future: F) -> Result<F::Output, Elapsed> {
        if tokio::runtime::Handle::try_current().is_err() {
            tracing::debug!("no tokio runtime; running without a timeout");
            return Ok(future.await);
        }
        tokio::time::timeout(duration, future).await.map_err(|_| Elapsed)
    }
}

// =============================================================================
// BROWSER (hydrate)
// =============================================================================

#[cfg(feature = "hydrate")]
mod imp {
    use futures::channel::oneshot;
    use futures::future::{AbortHandle, Either, abortable, select};

    use super::{Duration, Elapsed, Future};

    /// Handle to a task running on the page's event loop.
    pub struct Task {
        abort: AbortHandle,
        done: oneshot::Receiver<()>,
    }

    impl Task {
        pub fn abort(&self) {
            self.abort.abort();
        }

        /// Wait for the task to finish or be aborted.
        pub async fn join(self) {
            let _ = self.done.await;
        }
    }

    #[allow(clippy::unnecessary_wraps)]
    pub fn spawn<F>(future: F) -> Option<Task>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (future, abort) = abortable(future);
        let (tx, done) = oneshot::channel();
        wasm_bindgen_futures::spawn_local(async move {
            let _ = future.await;
            let _ = tx.send(());
        });
        Some(Task { abort, done })
    }

    pub async fn sleep(duration: Duration) {
        gloo_timers::future::sleep(duration).await;
    }

    pub async fn timeout<F: Future>(duration: Duration, future: F) -> Result<F::Output, Elapsed> {
        let future = std::pin::pin!(future);
        let timer = std::pin::pin!(gloo_timers::future::sleep(duration));
        match select(future, timer).await {
            Either::Left((output, _)) => Ok(output),
            Either::Right(((), _)) => Err(Elapsed),
        }
    }
}

pub use imp::Task;

/// Run `future` in the background. `None` when there is no event loop to run
/// it on.
pub fn spawn<F>(future: F) -> Option<Task>
where
    F: Future<Output = ()> + Send + 'static,
{
    imp::spawn(future)
}

pub async fn sleep(duration: Duration) {
    imp::sleep(duration).await;
}

/// Await `future`, giving up after `duration`.
///
/// # Errors
///
/// [`Elapsed`] when the bound ran out first.
pub async fn timeout<F: Future>(duration: Duration, future: F) -> Result<F::Output, Elapsed> {
    imp::timeout(duration, future).await
}
