use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

/// Delayed-eviction capability embedded in a query (composition, not a base
/// class). At most one firing is armed at a time; rescheduling replaces any
/// previously armed timer wholesale.
pub(crate) struct GcTimer {
  delay: Duration,
  handle: Mutex<Option<JoinHandle<()>>>,
}

impl GcTimer {
  pub fn new(delay: Duration) -> Self {
    GcTimer {
      delay,
      handle: Mutex::new(None),
    }
  }

  /// Arms the timer: `evict` runs on the runtime once the configured delay
  /// elapses without the timer being disarmed or rearmed.
  pub fn schedule(&self, evict: impl FnOnce() + Send + 'static) {
    let delay = self.delay;
    let task = tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      evict();
    });
    if let Some(previous) = self.handle.lock().replace(task) {
      previous.abort();
    }
  }

  /// Disarms without rescheduling. Called when an observer attaches.
  pub fn unschedule(&self) {
    if let Some(task) = self.handle.lock().take() {
      task.abort();
    }
  }
}

impl Drop for GcTimer {
  fn drop(&mut self) {
    if let Some(task) = self.handle.get_mut().take() {
      task.abort();
    }
  }
}

impl fmt::Debug for GcTimer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("GcTimer")
      .field("delay", &self.delay)
      .field("armed", &self.handle.lock().is_some())
      .finish()
  }
}
