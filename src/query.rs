use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::cache::QueryCache;
use crate::error::QueryError;
use crate::future::FetchFuture;
use crate::gc::GcTimer;
use crate::key::{QueryHash, QueryKey};
use crate::observer::QueryObserver;
use crate::options::{FetchContext, QueryOptions};
use crate::retry::{Retryer, RetryerConfig};
use crate::state::{reduce, Action, QueryState};

/// One cached unit of asynchronous state, identified by its canonical key
/// hash. Built by [`QueryCache::build`]; equivalent keys always resolve to
/// the same instance for the key's lifetime.
///
/// The state machine is `Pending → Success | Error`, with later fetches
/// moving freely between `Success` and `Error`. There is no distinct
/// "refetching while holding prior data" status.
pub struct Query<T> {
  key: QueryKey,
  hash: QueryHash,
  options: QueryOptions<T>,
  cache: Weak<QueryCache<T>>,
  gc: GcTimer,
  weak_self: Weak<Query<T>>,
  inner: Mutex<QueryInner<T>>,
}

struct QueryInner<T> {
  state: QueryState<T>,
  /// Attachment-ordered, non-owning. Dead entries are pruned as encountered.
  observers: Vec<Weak<QueryObserver<T>>>,
  /// Only the newest attempt sequence is tracked for cancellation.
  retryer: Option<Arc<Retryer<T>>>,
}

impl<T: Send + Sync + 'static> Query<T> {
  pub(crate) fn new(
    cache: Weak<QueryCache<T>>,
    hash: QueryHash,
    options: QueryOptions<T>,
  ) -> Arc<Self> {
    Arc::new_cyclic(|weak_self| Query {
      key: options.query_key.clone(),
      hash,
      gc: GcTimer::new(options.gc_time),
      cache,
      weak_self: weak_self.clone(),
      options,
      inner: Mutex::new(QueryInner {
        state: QueryState::Pending,
        observers: Vec::new(),
        retryer: None,
      }),
    })
  }

  /// The structured key this query was built for.
  pub fn key(&self) -> &QueryKey {
    &self.key
  }

  /// The canonical hash the cache registers this query under.
  pub fn hash(&self) -> &QueryHash {
    &self.hash
  }

  /// The options this query was built with, frozen at build time.
  pub fn options(&self) -> &QueryOptions<T> {
    &self.options
  }

  /// Snapshot of the current state.
  pub fn state(&self) -> QueryState<T> {
    self.inner.lock().state.clone()
  }

  /// Starts a fresh attempt sequence wrapping the configured query function
  /// with a new cancellation token, and returns its single-fire result
  /// handle.
  ///
  /// Safe to call while a previous sequence is outstanding: the older
  /// outcome is still dispatched when it arrives, but only the newest
  /// sequence is tracked for [`cancel`](Self::cancel).
  pub fn fetch(&self) -> Arc<FetchFuture<T>> {
    let token = CancellationToken::new();

    let query_fn = self.options.query_fn.clone();
    let fetch_token = token.clone();
    let fetch = Box::new(move || {
      query_fn(FetchContext {
        signal: fetch_token.clone(),
      })
    });

    let abort_token = token.clone();
    let abort = Box::new(move || abort_token.cancel());

    let on_success = {
      let query = self.weak_self.clone();
      Box::new(move |data: Arc<T>| {
        if let Some(query) = query.upgrade() {
          query.set_data_arc(data);
          query.schedule_gc();
        }
      }) as Box<dyn Fn(Arc<T>) + Send + Sync>
    };
    let on_error = {
      let query = self.weak_self.clone();
      Box::new(move |error: QueryError| {
        if let Some(query) = query.upgrade() {
          query.dispatch(Action::Error(error));
        }
      }) as Box<dyn Fn(QueryError) + Send + Sync>
    };

    tracing::debug!(query = %self.hash, "starting fetch");
    let retryer = Retryer::spawn(RetryerConfig {
      fetch,
      abort,
      token,
      on_success,
      on_error,
      retry: self.options.retry,
      retry_delay: self.options.retry_delay.clone(),
    });

    let result = retryer.result();
    self.inner.lock().retryer = Some(retryer);
    result
  }

  /// Forwards to the newest attempt sequence's abort path, if any.
  /// Cooperative: the query function must observe its token for the
  /// sequence to actually settle.
  pub fn cancel(&self) {
    let retryer = self.inner.lock().retryer.clone();
    if let Some(retryer) = retryer {
      retryer.cancel();
    }
  }

  /// Synchronous direct transition to `Success`: observers are notified
  /// before this returns. Also the internal success path of `fetch`.
  pub fn set_data(&self, data: T) -> Arc<T> {
    let data = Arc::new(data);
    self.set_data_arc(data.clone());
    data
  }

  pub(crate) fn set_data_arc(&self, data: Arc<T>) {
    self.dispatch(Action::Success(data));
  }

  /// Idempotent, attachment-ordered; stores only a non-owning back
  /// reference, never extending the observer's lifetime. Attaching disarms
  /// any pending eviction.
  pub(crate) fn add_observer(&self, observer: Weak<QueryObserver<T>>) {
    {
      let mut inner = self.inner.lock();
      inner.observers.retain(|o| o.strong_count() > 0);
      if !inner.observers.iter().any(|o| o.ptr_eq(&observer)) {
        inner.observers.push(observer);
      }
    }
    self.gc.unschedule();
  }

  /// Detach path: once the set empties, eviction is scheduled after the
  /// configured grace period rather than immediately, tolerating rapid
  /// attach/detach churn.
  pub(crate) fn remove_observer(&self, observer: &Weak<QueryObserver<T>>) {
    let orphaned = {
      let mut inner = self.inner.lock();
      inner
        .observers
        .retain(|o| o.strong_count() > 0 && !o.ptr_eq(observer));
      inner.observers.is_empty()
    };
    if orphaned {
      self.schedule_gc();
    }
  }

  pub(crate) fn has_observers(&self) -> bool {
    let mut inner = self.inner.lock();
    inner.observers.retain(|o| o.strong_count() > 0);
    !inner.observers.is_empty()
  }

  /// Applies the pure reducer, then invokes `update_result` on every
  /// attached observer synchronously, in attachment order. The lock is
  /// released before notification, so listeners may re-enter the public
  /// API.
  fn dispatch(&self, action: Action<T>) {
    let observers = {
      let mut inner = self.inner.lock();
      inner.state = reduce(&inner.state, action);
      tracing::trace!(query = %self.hash, status = %inner.state.status(), "state transition");
      inner.observers.clone()
    };
    for observer in observers {
      if let Some(observer) = observer.upgrade() {
        observer.update_result();
      }
    }
  }

  /// Arms the eviction timer. Firing evicts only if the query is still
  /// orphaned once the grace period elapses.
  pub(crate) fn schedule_gc(&self) {
    let query = self.weak_self.clone();
    self.gc.schedule(move || {
      if let Some(query) = query.upgrade() {
        query.evict_if_orphaned();
      }
    });
  }

  fn evict_if_orphaned(&self) {
    if self.has_observers() {
      return;
    }
    if let (Some(cache), Some(query)) = (self.cache.upgrade(), self.weak_self.upgrade()) {
      tracing::debug!(query = %self.hash, "evicting orphaned query");
      cache.remove(&query);
    }
  }
}

impl<T> fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Query")
      .field("hash", &self.hash)
      .field("state", &self.inner.lock().state.status())
      .finish_non_exhaustive()
  }
}
