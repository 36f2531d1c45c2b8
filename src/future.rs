use std::fmt;
use std::sync::Arc;
use std::task::{Poll, Waker};

use parking_lot::Mutex;

use crate::error::QueryError;

/// Outcome of a settled fetch attempt sequence.
pub type FetchResult<T> = Result<Arc<T>, QueryError>;

enum FetchState<T> {
  Pending,
  Settled(FetchResult<T>),
}

struct Inner<T> {
  state: FetchState<T>,
  waiters: Vec<Waker>,
}

/// Single-fire result channel for one fetch attempt sequence.
///
/// Settles exactly once — the first outcome wins. Any number of tasks may
/// `wait()` simultaneously; late waiters observe the settled outcome
/// immediately.
pub struct FetchFuture<T> {
  inner: Mutex<Inner<T>>,
}

impl<T> FetchFuture<T> {
  pub(crate) fn new() -> Self {
    FetchFuture {
      inner: Mutex::new(Inner {
        state: FetchState::Pending,
        waiters: Vec::new(),
      }),
    }
  }

  /// Settles the channel and wakes all waiters. Returns `false` if it was
  /// already settled, in which case the outcome is dropped.
  pub(crate) fn settle(&self, result: FetchResult<T>) -> bool {
    let waiters = {
      let mut inner = self.inner.lock();
      if matches!(inner.state, FetchState::Settled(_)) {
        return false;
      }
      inner.state = FetchState::Settled(result);
      std::mem::take(&mut inner.waiters)
    };
    for waker in waiters {
      waker.wake();
    }
    true
  }

  /// Non-blocking probe of the outcome.
  pub fn try_result(&self) -> Option<FetchResult<T>> {
    match &self.inner.lock().state {
      FetchState::Settled(result) => Some(result.clone()),
      FetchState::Pending => None,
    }
  }

  /// Waits until the channel settles. A sequence whose operation ignores
  /// cancellation and never returns leaves this pending indefinitely.
  pub async fn wait(&self) -> FetchResult<T> {
    std::future::poll_fn(|cx| {
      let mut inner = self.inner.lock();
      match &inner.state {
        FetchState::Settled(result) => Poll::Ready(result.clone()),
        FetchState::Pending => {
          inner.waiters.push(cx.waker().clone());
          Poll::Pending
        }
      }
    })
    .await
  }
}

impl<T> fmt::Debug for FetchFuture<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let settled = matches!(self.inner.lock().state, FetchState::Settled(_));
    f.debug_struct("FetchFuture").field("settled", &settled).finish()
  }
}
