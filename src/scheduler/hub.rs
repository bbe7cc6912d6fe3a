use crate::feed::DisplayItem;
use crate::fetch::FetchError;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

pub type ItemsReceivedFn = Arc<dyn Fn(&FeedView) + Send + Sync>;
pub type FetchFailedFn = Arc<dyn Fn(&FeedView, &FetchError) + Send + Sync>;

/// Read-only snapshot of a source handed to subscribers.
#[derive(Debug, Clone)]
pub struct FeedView {
    url: Arc<str>,
    items: Arc<[DisplayItem]>,
    reload_interval: Duration,
}

impl FeedView {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn items(&self) -> &[DisplayItem] {
        &self.items
    }

    pub fn reload_interval(&self) -> Duration {
        self.reload_interval
    }
}

/// Holds the item cache and the two single-slot notification handlers.
///
/// Registering a handler replaces the previous one. Handlers start as
/// no-ops, so notifying before any registration is safe. Handlers are
/// cloned out of their slot before being called, so a handler may read
/// the cache or re-register without deadlocking.
pub struct SubscriptionHub {
    url: Arc<str>,
    items: RwLock<Arc<[DisplayItem]>>,
    on_items: RwLock<ItemsReceivedFn>,
    on_failed: RwLock<FetchFailedFn>,
}

impl SubscriptionHub {
    pub fn new(url: &str) -> Self {
        Self {
            url: Arc::from(url),
            items: RwLock::new(Arc::from(Vec::new())),
            on_items: RwLock::new(Arc::new(|_: &FeedView| {}) as ItemsReceivedFn),
            on_failed: RwLock::new(Arc::new(|_: &FeedView, _: &FetchError| {}) as FetchFailedFn),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn on_items_received<F>(&self, callback: F)
    where
        F: Fn(&FeedView) + Send + Sync + 'static,
    {
        let callback: ItemsReceivedFn = Arc::new(callback);
        *write(&self.on_items) = callback;
    }

    pub fn on_fetch_failed<F>(&self, callback: F)
    where
        F: Fn(&FeedView, &FetchError) + Send + Sync + 'static,
    {
        let callback: FetchFailedFn = Arc::new(callback);
        *write(&self.on_failed) = callback;
    }

    /// Current cache snapshot.
    pub fn items(&self) -> Arc<[DisplayItem]> {
        read(&self.items).clone()
    }

    /// Swaps in a whole new item list; the previous one is discarded.
    pub(crate) fn replace_items(&self, items: Vec<DisplayItem>) {
        *write(&self.items) = Arc::from(items);
    }

    pub fn view(&self, reload_interval: Duration) -> FeedView {
        FeedView {
            url: Arc::clone(&self.url),
            items: self.items(),
            reload_interval,
        }
    }

    /// Invokes the items-received handler iff the cache is non-empty.
    /// Returns whether the handler ran.
    pub fn broadcast(&self, reload_interval: Duration) -> bool {
        let view = self.view(reload_interval);
        if view.items.is_empty() {
            tracing::debug!(url = %self.url, "No items to broadcast yet");
            return false;
        }
        tracing::debug!(url = %self.url, items = view.items.len(), "Broadcasting items");
        let callback = read(&self.on_items).clone();
        callback(&view);
        true
    }

    pub(crate) fn notify_failed(&self, reload_interval: Duration, error: &FetchError) {
        let view = self.view(reload_interval);
        let callback = read(&self.on_failed).clone();
        callback(&view, error);
    }
}

impl std::fmt::Debug for SubscriptionHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHub")
            .field("url", &self.url)
            .field("items", &read(&self.items).len())
            .finish_non_exhaustive()
    }
}

// A panicking subscriber must not wedge the poller, so poisoned locks are
// recovered rather than propagated.
fn read<T: ?Sized>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T: ?Sized>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
