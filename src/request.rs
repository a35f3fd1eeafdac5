//! Async request wrapper: idle/pending/success/error around one operation.
//!
//! DESIGN
//! ======
//! A `Request` owns one fallible async operation and publishes its lifecycle
//! as a [`RequestState`] through a `tokio::sync::watch` channel. Views hold a
//! receiver and re-render on change; callers of [`Request::execute`] also get
//! the operation's result back directly.
//!
//! INVARIANTS
//! ==========
//! - Last issued wins: every `execute` takes a generation number, and a
//!   settlement only reaches the shared state if no newer `execute` or
//!   `reset` has happened since. Older results still return to their caller.
//! - Entering pending clears the error but keeps previous data.
//! - On error, previous data is kept and `status()` reports `Error`.
//! - The wrapper never cancels an operation it started. A caller that drops
//!   an `execute` future before it settles takes the operation with it; if
//!   that call was still the latest, `loading` is cleared and the rest of
//!   the state is left as it was.

#[cfg(test)]
#[path = "request_test.rs"]
mod request_test;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::watch;

use crate::error::ErrorCode;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError<E> {
    /// The wrapped operation returned an error.
    #[error("{0}")]
    Failed(E),

    #[error("operation timed out after {0:?}")]
    TimedOut(Duration),
}

impl<E: ErrorCode> ErrorCode for RequestError<E> {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Failed(e) => e.error_code(),
            Self::TimedOut(_) => "E_TIMEOUT",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Failed(e) => e.retryable(),
            Self::TimedOut(_) => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Idle,
    Pending,
    Success,
    Error,
}

/// Observable `{data, loading, error}` triple.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestState<T, E> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<RequestError<E>>,
}

impl<T, E> Default for RequestState<T, E> {
    fn default() -> Self {
        Self { data: None, loading: false, error: None }
    }
}

impl<T, E> RequestState<T, E> {
    #[must_use]
    pub fn status(&self) -> RequestStatus {
        if self.loading {
            RequestStatus::Pending
        } else if self.error.is_some() {
            RequestStatus::Error
        } else if self.data.is_some() {
            RequestStatus::Success
        } else {
            RequestStatus::Idle
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Run once with `A::default()` as soon as the wrapper is created.
    pub immediate: bool,
    pub timeout: Option<Duration>,
}

type Operation<A, T, E> = Arc<dyn Fn(A) -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

// =============================================================================
// REQUEST
// =============================================================================

pub struct Request<A, T, E> {
    inner: Arc<Inner<A, T, E>>,
}

impl<A, T, E> Clone for Request<A, T, E> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

struct Inner<A, T, E> {
    op: Operation<A, T, E>,
    state: watch::Sender<RequestState<T, E>>,
    generation: AtomicU64,
    timeout: Option<Duration>,
}

impl<A, T, E> Inner<A, T, E> {
    /// Leave pending for a call that will never settle.
    fn abandon(&self, generation: u64) {
        let cleared = self.state.send_if_modified(|s| {
            if self.generation.load(Ordering::SeqCst) != generation || !s.loading {
                return false;
            }
            s.loading = false;
            true
        });
        if cleared {
            tracing::debug!(generation, "request dropped before settling");
        }
    }
}

/// Clears pending on drop unless the call settled first.
struct PendingGuard<'a, A, T, E> {
    inner: &'a Inner<A, T, E>,
    generation: u64,
    settled: bool,
}

impl<A, T, E> Drop for PendingGuard<'_, A, T, E> {
    fn drop(&mut self) {
        if !self.settled {
            self.inner.abandon(self.generation);
        }
    }
}

impl<A, T, E> Inner<A, T, E>
where
    A: Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Claim a new generation and enter pending.
    fn begin(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });
        generation
    }

    fn run(&self, args: A) -> BoxFuture<'static, Result<T, RequestError<E>>> {
        let fut = (self.op)(args);
        match self.timeout {
            Some(limit) => async move {
                match tokio::time::timeout(limit, fut).await {
                    Ok(result) => result.map_err(RequestError::Failed),
                    Err(_) => Err(RequestError::TimedOut(limit)),
                }
            }
            .boxed(),
            None => async move { fut.await.map_err(RequestError::Failed) }.boxed(),
        }
    }

    /// Publish an outcome unless a newer generation has been issued.
    fn settle(&self, generation: u64, outcome: &Result<T, RequestError<E>>) {
        let applied = self.state.send_if_modified(|s| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            s.loading = false;
            match outcome {
                Ok(data) => {
                    s.data = Some(data.clone());
                    s.error = None;
                }
                Err(e) => s.error = Some(e.clone()),
            }
            true
        });
        if !applied {
            tracing::debug!(generation, "discarding superseded request result");
        }
    }
}

impl<A, T, E> Request<A, T, E>
where
    A: Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new<F, Fut>(op: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::with_timeout(op, None)
    }

    #[must_use]
    pub fn with_timeout<F, Fut>(op: F, timeout: Option<Duration>) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let op: Operation<A, T, E> = Arc::new(move |args| op(args).boxed());
        let (state, _) = watch::channel(RequestState::default());
        Self { inner: Arc::new(Inner { op, state, generation: AtomicU64::new(0), timeout }) }
    }

    /// Run the operation, publishing pending and then its outcome.
    ///
    /// # Errors
    ///
    /// `Failed` with the operation's error, or `TimedOut` when a timeout is
    /// configured and elapses first.
    pub async fn execute(&self, args: A) -> Result<T, RequestError<E>> {
        let generation = self.inner.begin();
        let mut pending = PendingGuard { inner: &*self.inner, generation, settled: false };
        let outcome = self.inner.run(args).await;
        self.inner.settle(generation, &outcome);
        pending.settled = true;
        outcome
    }

    /// Back to idle. An in-flight call still finishes but cannot repopulate
    /// the state.
    pub fn reset(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.state.send_replace(RequestState::default());
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RequestState<T, E>> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> RequestState<T, E> {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn status(&self) -> RequestStatus {
        self.inner.state.borrow().status()
    }

    #[must_use]
    pub fn data(&self) -> Option<T> {
        self.inner.state.borrow().data.clone()
    }

    #[must_use]
    pub fn loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    #[must_use]
    pub fn error(&self) -> Option<RequestError<E>> {
        self.inner.state.borrow().error.clone()
    }
}

impl<A, T, E> Request<A, T, E>
where
    A: Default + Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Build a wrapper and, if `options.immediate`, start one run with
    /// default arguments on the current tokio runtime.
    #[must_use]
    pub fn with_options<F, Fut>(op: F, options: RequestOptions) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let request = Self::with_timeout(op, options.timeout);
        if options.immediate {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(run_detached(Arc::downgrade(&request.inner)));
                }
                Err(_) => tracing::warn!("immediate request skipped: no tokio runtime"),
            }
        }
        request
    }
}

/// Wrapper whose operation is handed over with each call rather than fixed
/// at construction.
pub type AdHocRequest<T, E> = Request<BoxFuture<'static, Result<T, E>>, T, E>;

impl<T, E> Request<BoxFuture<'static, Result<T, E>>, T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Pass the operation to [`Request::execute`] as a boxed future, e.g.
    /// `req.execute(async { .. }.boxed())`.
    #[must_use]
    pub fn adhoc() -> Self {
        Self::new(|operation: BoxFuture<'static, Result<T, E>>| operation)
    }
}

/// Immediate run that does not keep the wrapper alive while awaiting.
async fn run_detached<A, T, E>(inner: Weak<Inner<A, T, E>>)
where
    A: Default + Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let (generation, fut) = {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        (inner.begin(), inner.run(A::default()))
    };
    let outcome = fut.await;
    match inner.upgrade() {
        Some(inner) => inner.settle(generation, &outcome),
        None => tracing::debug!("request dropped before its immediate run settled"),
    }
}
