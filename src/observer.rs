use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::client::QueryClient;
use crate::error::QueryError;
use crate::options::QueryOptions;
use crate::query::Query;
use crate::state::{QueryState, QueryStatus};
use crate::subscribable::{Subscribable, Subscription};

type Listener = dyn Fn() + Send + Sync;

/// Derived view of a query's state: the status tag plus the data or error
/// that tag allows. Exactly one of `is_pending`/`is_success`/`is_error` is
/// true.
pub struct QueryResult<T> {
  status: QueryStatus,
  data: Option<Arc<T>>,
  error: Option<QueryError>,
}

impl<T> QueryResult<T> {
  fn from_state(state: &QueryState<T>) -> Self {
    QueryResult {
      status: state.status(),
      data: state.data().cloned(),
      error: state.error().cloned(),
    }
  }

  pub fn status(&self) -> QueryStatus {
    self.status
  }

  pub fn data(&self) -> Option<&Arc<T>> {
    self.data.as_ref()
  }

  pub fn error(&self) -> Option<&QueryError> {
    self.error.as_ref()
  }

  pub fn is_pending(&self) -> bool {
    self.status == QueryStatus::Pending
  }

  pub fn is_success(&self) -> bool {
    self.status == QueryStatus::Success
  }

  pub fn is_error(&self) -> bool {
    self.status == QueryStatus::Error
  }

  /// Shallow equality over the view's fields: same status tag, pointer-
  /// identical data, pointer-identical error payload. The basis for change
  /// suppression.
  fn shallow_eq(&self, other: &Self) -> bool {
    if self.status != other.status {
      return false;
    }
    let data_eq = match (&self.data, &other.data) {
      (Some(a), Some(b)) => Arc::ptr_eq(a, b),
      (None, None) => true,
      _ => false,
    };
    let error_eq = match (&self.error, &other.error) {
      (Some(a), Some(b)) => a.same_as(b),
      (None, None) => true,
      _ => false,
    };
    data_eq && error_eq
  }
}

// Manual impl: snapshots share the data `Arc`, no `T: Clone` required.
impl<T> Clone for QueryResult<T> {
  fn clone(&self) -> Self {
    QueryResult {
      status: self.status,
      data: self.data.clone(),
      error: self.error.clone(),
    }
  }
}

impl<T> fmt::Debug for QueryResult<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("QueryResult")
      .field("status", &self.status)
      .field("has_data", &self.data.is_some())
      .field("error", &self.error)
      .finish()
  }
}

/// Derives a computed view from one query, diffs it for change suppression,
/// and re-exposes change notification to its own listeners.
///
/// Observers are `Arc`-built so the bound query can hold a non-owning back
/// reference for its synchronous notification pass.
pub struct QueryObserver<T> {
  client: QueryClient<T>,
  listeners: Subscribable<Listener>,
  weak_self: Weak<QueryObserver<T>>,
  inner: Mutex<ObserverInner<T>>,
}

struct ObserverInner<T> {
  options: QueryOptions<T>,
  query: Option<Arc<Query<T>>>,
  result: Option<QueryResult<T>>,
}

impl<T: Send + Sync + 'static> QueryObserver<T> {
  /// Creates an unbound observer. Nothing touches the cache until
  /// [`set_options`](Self::set_options) binds and fetches.
  pub fn new(client: &QueryClient<T>, options: QueryOptions<T>) -> Arc<Self> {
    Arc::new_cyclic(|weak_self| QueryObserver {
      client: client.clone(),
      listeners: Subscribable::new(),
      weak_self: weak_self.clone(),
      inner: Mutex::new(ObserverInner {
        options,
        query: None,
        result: None,
      }),
    })
  }

  /// Rebinds to the query matching the (possibly changed) key — detaching
  /// from any previous query, attaching to the new one, refreshing the
  /// derived view — then triggers a fetch on the bound query.
  pub fn set_options(&self, options: QueryOptions<T>) {
    let query = self.client.query_cache().build(&options);
    let previous = {
      let mut inner = self.inner.lock();
      inner.options = options;
      let same = inner.query.as_ref().is_some_and(|q| Arc::ptr_eq(q, &query));
      if same {
        None
      } else {
        inner.query.replace(query.clone())
      }
    };
    if let Some(previous) = previous {
      previous.remove_observer(&self.weak_self);
    }
    query.add_observer(self.weak_self.clone());
    self.update_result();
    let _ = query.fetch();
  }

  /// Obtains (or creates) the matching query via the cache without
  /// triggering a fetch, and synchronously computes the derived view — a
  /// render-safe snapshot that needs no notification round-trip. The view
  /// is not stored.
  pub fn get_optimistic_result(&self, options: &QueryOptions<T>) -> QueryResult<T> {
    let query = self.client.query_cache().build(options);
    QueryResult::from_state(&query.state())
  }

  /// The options most recently passed to `set_options`, or the ones the
  /// observer was constructed with.
  pub fn options(&self) -> QueryOptions<T> {
    self.inner.lock().options.clone()
  }

  /// The last computed view, cached rather than recomputed. `None` until
  /// the observer first binds.
  pub fn get_current_result(&self) -> Option<QueryResult<T>> {
    self.inner.lock().result.clone()
  }

  /// Recomputes the view from the bound query's current state. A view
  /// shallow-equal to the stored one suppresses notification; otherwise it
  /// is stored and every subscribed listener runs synchronously, in
  /// subscription order.
  pub fn update_result(&self) {
    let changed = {
      let mut inner = self.inner.lock();
      let Some(query) = inner.query.clone() else {
        return;
      };
      let next = QueryResult::from_state(&query.state());
      let changed = inner
        .result
        .as_ref()
        .map_or(true, |prev| !next.shallow_eq(prev));
      if changed {
        inner.result = Some(next);
      }
      changed
    };
    if changed {
      for listener in self.listeners.snapshot() {
        listener();
      }
    }
  }

  /// Adds a listener, returning its [`Subscription`]. Unsubscribing the
  /// last listener destroys the observer.
  pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> Subscription {
    let id = self.listeners.subscribe(Arc::new(listener));
    let observer = self.weak_self.clone();
    Subscription::new(move || {
      if let Some(observer) = observer.upgrade() {
        observer.listeners.unsubscribe(id);
        if !observer.listeners.has_listeners() {
          observer.destroy();
        }
      }
    })
  }

  /// Detaches from the bound query — scheduling its eviction if this was
  /// the last observer — and drops the binding.
  pub fn destroy(&self) {
    let query = self.inner.lock().query.take();
    if let Some(query) = query {
      query.remove_observer(&self.weak_self);
    }
  }
}

impl<T> fmt::Debug for QueryObserver<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let inner = self.inner.lock();
    f.debug_struct("QueryObserver")
      .field("bound", &inner.query.is_some())
      .field("listeners", &self.listeners)
      .finish_non_exhaustive()
  }
}
