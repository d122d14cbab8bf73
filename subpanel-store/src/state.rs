//! Push-based state cells.
//!
//! Each store owns one [`StateCell`]: a current value plus any number of
//! subscribers. Publications are ordered per cell. Closing the cell drops the
//! sender, which ends every subscriber stream; the last value stays readable.

use futures_util::future;
use futures_util::stream::{BoxStream, StreamExt};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::trace;

/// Teardown contract shared by every store.
pub trait StateStore {
    /// Release all state streams and caches.
    fn clear(&self);

    /// Release what depends on the authenticated identity.
    fn clear_auth_based(&self);
}

/// A current-value holder with publish/subscribe.
#[derive(Debug)]
pub struct StateCell<S> {
    tx: RwLock<Option<watch::Sender<S>>>,
    rx: watch::Receiver<S>,
}

impl<S> StateCell<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new(initial: S) -> Self {
        let (tx, rx) = watch::channel(initial);
        Self {
            tx: RwLock::new(Some(tx)),
            rx,
        }
    }

    // The guarded value is a plain Option<Sender>; a panic elsewhere cannot
    // leave it half-written, so a poisoned lock is still usable.
    fn read_tx(&self) -> RwLockReadGuard<'_, Option<watch::Sender<S>>> {
        match self.tx.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_tx(&self) -> RwLockWriteGuard<'_, Option<watch::Sender<S>>> {
        match self.tx.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Modify the state and notify subscribers.
    ///
    /// Returns `false` once the cell is closed; the state is left untouched.
    pub fn publish<F>(&self, modify: F) -> bool
    where
        F: FnOnce(&mut S),
    {
        match self.read_tx().as_ref() {
            Some(tx) => {
                tx.send_modify(modify);
                true
            }
            None => {
                trace!("Publish on closed state cell ignored");
                false
            }
        }
    }

    /// Snapshot of the current state.
    pub fn get(&self) -> S {
        self.rx.borrow().clone()
    }

    /// Read a projection of the current state without cloning all of it.
    pub fn with<R>(&self, read: impl FnOnce(&S) -> R) -> R {
        read(&self.rx.borrow())
    }

    /// A receiver observing every future publication.
    ///
    /// The current value counts as seen; `changed()` waits for the next one.
    pub fn subscribe(&self) -> watch::Receiver<S> {
        let mut rx = self.rx.clone();
        rx.borrow_and_update();
        rx
    }

    /// Stream of a projection of the state, skipping consecutive duplicates.
    ///
    /// Yields the current projection first. Ends when the cell is closed.
    pub fn select<T, F>(&self, project: F) -> BoxStream<'static, T>
    where
        T: PartialEq + Clone + Send + 'static,
        F: Fn(&S) -> T + Send + 'static,
    {
        let mut last: Option<T> = None;
        WatchStream::new(self.rx.clone())
            .filter_map(move |state| {
                let value = project(&state);
                let changed = last.as_ref() != Some(&value);
                if changed {
                    last = Some(value.clone());
                }
                future::ready(changed.then_some(value))
            })
            .boxed()
    }

    /// Drop the sender. Subscribers see the end of their streams.
    pub fn close(&self) {
        self.write_tx().take();
    }

    pub fn is_closed(&self) -> bool {
        self.read_tx().is_none()
    }
}
