//! Long-lived subscriptions delivering new items to a callback.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;

use crate::store::Subscription;

/// Registration of a live callback.
///
/// Cancelling, or dropping the handle, stops further invocations at once.
pub struct ListenerHandle {
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub fn cancel(self) {
        // Drop does the work.
    }

    pub fn is_active(&self) -> bool {
        !self.cancelled.load(Ordering::SeqCst) && !self.task.is_finished()
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.task.abort();
    }
}

/// Decodes each message on `subscription` as JSON and hands it to `callback`, in arrival order.
pub(crate) fn spawn_listener<T, F>(label: String, mut subscription: Subscription, mut callback: F) -> ListenerHandle
where
    T: DeserializeOwned + Send + 'static,
    F: FnMut(T) + Send + 'static,
{
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancelled);
    let task = tokio::spawn(async move {
        while let Some(payload) = subscription.next().await {
            if flag.load(Ordering::SeqCst) {
                break;
            }
            match serde_json::from_str::<T>(&payload) {
                Ok(item) => callback(item),
                Err(err) => log::warn!("{label}: skipping undecodable event: {err}"),
            }
        }
        log::debug!("{label}: listener stopped");
    });

    ListenerHandle { cancelled, task }
}
