use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Generic listener registry: the change-notification capability embedded in
/// [`QueryObserver`](crate::QueryObserver) (composition, not a base class).
///
/// Listeners are kept in subscription order and each one fires exactly once
/// per notification, synchronously, on the notifying thread.
pub struct Subscribable<L: ?Sized> {
  listeners: Mutex<Vec<(u64, Arc<L>)>>,
  next_id: AtomicU64,
}

impl<L: ?Sized> Subscribable<L> {
  pub fn new() -> Self {
    Subscribable {
      listeners: Mutex::new(Vec::new()),
      next_id: AtomicU64::new(0),
    }
  }

  /// Appends a listener, returning the id that unsubscribes it.
  pub fn subscribe(&self, listener: Arc<L>) -> u64 {
    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    self.listeners.lock().push((id, listener));
    id
  }

  /// Removes a listener. Returns `false` if the id was already gone.
  pub fn unsubscribe(&self, id: u64) -> bool {
    let mut listeners = self.listeners.lock();
    let before = listeners.len();
    listeners.retain(|(listener_id, _)| *listener_id != id);
    listeners.len() != before
  }

  pub fn has_listeners(&self) -> bool {
    !self.listeners.lock().is_empty()
  }

  /// The current listeners in subscription order. A snapshot, so callers
  /// invoke listeners without holding the registry lock and a listener may
  /// re-enter `subscribe`/`unsubscribe` while being notified.
  pub fn snapshot(&self) -> Vec<Arc<L>> {
    self.listeners.lock().iter().map(|(_, l)| l.clone()).collect()
  }
}

impl<L: ?Sized> Default for Subscribable<L> {
  fn default() -> Self {
    Self::new()
  }
}

impl<L: ?Sized> fmt::Debug for Subscribable<L> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Subscribable")
      .field("listeners", &self.listeners.lock().len())
      .finish()
  }
}

/// Undoes one `subscribe` call on a [`QueryObserver`](crate::QueryObserver).
///
/// Unsubscribing the last listener destroys the observer, which detaches it
/// from its query and may start the query's eviction countdown.
#[must_use = "dropping a Subscription without calling unsubscribe leaves the listener attached"]
pub struct Subscription {
  action: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
  pub(crate) fn new(action: impl FnOnce() + Send + 'static) -> Self {
    Subscription {
      action: Some(Box::new(action)),
    }
  }

  /// Removes the listener this subscription was returned for.
  pub fn unsubscribe(mut self) {
    if let Some(action) = self.action.take() {
      action();
    }
  }
}

impl fmt::Debug for Subscription {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Subscription")
      .field("armed", &self.action.is_some())
      .finish()
  }
}
