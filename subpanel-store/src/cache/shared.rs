//! Shared, replayable fetch computations.

use futures_util::future::{self, BoxFuture, FutureExt, Shared};
use std::fmt;
use std::future::Future;
use subpanel_core::{StoreError, SubpanelResult};
use tokio::runtime::Handle;

/// Handle of the runtime the caller is on.
///
/// Stores check this before touching any state, so a load made outside a
/// runtime leaves both the state and the cache as they were.
pub fn current_runtime() -> SubpanelResult<Handle> {
    Handle::try_current().map_err(|_| StoreError::NoRuntime.into())
}

/// One fetch shared by every subscriber.
///
/// The underlying computation runs exactly once. Subscribers joining while it
/// is pending wait for the same completion; subscribers joining afterwards get
/// the terminal value or error replayed without re-running it.
pub struct SharedFetch<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Shared<BoxFuture<'static, SubpanelResult<T>>>,
}

impl<T> SharedFetch<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Start `fetch` on `handle`.
    ///
    /// The fetch runs to completion even if every subscriber is dropped.
    pub fn spawn<F>(handle: &Handle, fetch: F) -> Self
    where
        F: Future<Output = SubpanelResult<T>> + Send + 'static,
    {
        let task = handle.spawn(fetch);
        let joined = async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(StoreError::TaskFailed {
                    reason: e.to_string(),
                }
                .into()),
            }
        };

        Self {
            inner: joined.boxed().shared(),
        }
    }

    /// A computation that has already resolved to `value`.
    pub fn ready(value: T) -> Self {
        Self {
            inner: future::ready(Ok(value)).boxed().shared(),
        }
    }

    /// Join the computation.
    pub fn join(&self) -> Shared<BoxFuture<'static, SubpanelResult<T>>> {
        self.inner.clone()
    }

    /// The terminal result, if the computation has resolved and been observed.
    pub fn peek(&self) -> Option<&SubpanelResult<T>> {
        self.inner.peek()
    }
}

impl<T> Clone for SharedFetch<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for SharedFetch<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self.peek() {
            None => "pending",
            Some(Ok(_)) => "resolved",
            Some(Err(_)) => "failed",
        };
        f.debug_struct("SharedFetch").field("status", &status).finish()
    }
}
