//! Subscription handles returned by `Subscribe` dispatches.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use blaze_api::ValueStream;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use crate::gateway::{ErrorCallback, ValueCallback};

/// A live change listener on one path.
///
/// Acquired by dispatching a `Subscribe` request; released only by calling
/// [`unsubscribe`](Self::unsubscribe). Dropping the handle does NOT release
/// the listener: the caller must unsubscribe before tearing down whatever
/// owns the callbacks, or the listener keeps running.
///
/// Clones share the same listener.
#[derive(Clone)]
pub struct SubscriptionHandle {
    inner: Arc<SubscriptionInner>,
}

struct SubscriptionInner {
    path: String,
    active: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SubscriptionHandle {
    /// Start delivering `stream` to the callbacks on a background task.
    ///
    /// Store errors go to `on_error`, or to the log when there is none;
    /// delivery continues until the store ends the stream.
    pub(crate) fn spawn(
        path: String,
        mut stream: ValueStream,
        on_change: ValueCallback,
        on_error: Option<ErrorCallback>,
    ) -> Self {
        let inner = Arc::new(SubscriptionInner {
            path,
            active: AtomicBool::new(true),
            task: Mutex::new(None),
        });

        let listener = Arc::clone(&inner);
        let task = tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                if !listener.active.load(Ordering::SeqCst) {
                    break;
                }
                match item {
                    Ok(value) => on_change(value),
                    Err(err) => match &on_error {
                        Some(handler) => handler(err),
                        None => warn!(
                            "Subscription at '{}' reported an error with no error handler: {}",
                            listener.path, err
                        ),
                    },
                }
            }
            debug!("Subscription at '{}' ended", listener.path);
            listener.active.store(false, Ordering::SeqCst);
        });

        if let Ok(mut slot) = inner.task.lock() {
            *slot = Some(task);
        }

        Self { inner }
    }

    /// Stop delivery and release the store listener.
    ///
    /// Safe to call any number of times; calls after the first do nothing.
    /// A callback that is already running may finish, but no new one starts.
    pub fn unsubscribe(&self) {
        let was_active = self.inner.active.swap(false, Ordering::SeqCst);
        let task = self.inner.task.lock().ok().and_then(|mut slot| slot.take());
        if let Some(task) = task {
            task.abort();
        }
        if was_active {
            debug!("Unsubscribed from '{}'", self.inner.path);
        }
    }

    /// Whether callbacks may still be delivered.
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    pub fn path(&self) -> &str {
        &self.inner.path
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("path", &self.inner.path)
            .field("active", &self.is_active())
            .finish()
    }
}
