use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::error::QueryError;
use crate::key::QueryKey;

/// Default retry budget: one initial attempt plus three retries.
pub const DEFAULT_RETRY: u32 = 3;

/// Default grace period before an orphaned query is evicted.
pub const DEFAULT_GC_TIME: Duration = Duration::from_secs(5 * 60);

/// Per-attempt context handed to the query function.
///
/// `signal` is a cooperative cancellation token: a query function that wants
/// to be cancellable watches it (`signal.cancelled().await` or
/// `signal.is_cancelled()`) and bails out with [`QueryError::Cancelled`].
/// Nothing preempts an operation that ignores the signal.
#[derive(Debug, Clone)]
pub struct FetchContext {
  pub signal: CancellationToken,
}

/// Type-erased query function; called once per fetch attempt.
pub type QueryFn<T> =
  Arc<dyn Fn(FetchContext) -> BoxFuture<'static, Result<T, QueryError>> + Send + Sync>;

/// Delay policy between failed attempts.
#[derive(Clone)]
pub enum RetryDelay {
  /// `min(1000 * 2^failure_count, 30000)` milliseconds.
  Exponential,
  /// The same fixed delay before every retry.
  Fixed(Duration),
  /// Caller-supplied delay as a function of the failure count.
  Custom(Arc<dyn Fn(u32) -> Duration + Send + Sync>),
}

impl RetryDelay {
  /// Delay before the next attempt, given the failure count as it stood
  /// *before* the triggering failure was counted.
  pub fn for_failure(&self, failure_count: u32) -> Duration {
    match self {
      RetryDelay::Exponential => {
        // 2^5 already exceeds the cap, so clamping the shift keeps the
        // arithmetic exact without overflow.
        let ms = (1000u64 << failure_count.min(5)).min(30_000);
        Duration::from_millis(ms)
      }
      RetryDelay::Fixed(delay) => *delay,
      RetryDelay::Custom(f) => f(failure_count),
    }
  }
}

impl Default for RetryDelay {
  fn default() -> Self {
    RetryDelay::Exponential
  }
}

impl fmt::Debug for RetryDelay {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RetryDelay::Exponential => f.write_str("Exponential"),
      RetryDelay::Fixed(delay) => f.debug_tuple("Fixed").field(delay).finish(),
      RetryDelay::Custom(_) => f.write_str("Custom(..)"),
    }
  }
}

/// Configuration for one query: the key it is cached under, the fetch
/// function, and the retry and eviction policies. Frozen into the query the
/// first time the key is built.
pub struct QueryOptions<T> {
  pub(crate) query_key: QueryKey,
  pub(crate) query_fn: QueryFn<T>,
  pub(crate) retry: u32,
  pub(crate) retry_delay: RetryDelay,
  pub(crate) gc_time: Duration,
}

impl<T> QueryOptions<T> {
  /// Creates options for `query_key` with the default retry and eviction
  /// policies.
  pub fn new<F, Fut>(query_key: QueryKey, query_fn: F) -> Self
  where
    F: Fn(FetchContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, QueryError>> + Send + 'static,
  {
    QueryOptions {
      query_key,
      query_fn: Arc::new(move |cx| Box::pin(query_fn(cx))),
      retry: DEFAULT_RETRY,
      retry_delay: RetryDelay::Exponential,
      gc_time: DEFAULT_GC_TIME,
    }
  }

  /// Sets the number of retries after the initial attempt.
  pub fn retry(mut self, retry: u32) -> Self {
    self.retry = retry;
    self
  }

  /// Sets the delay policy between failed attempts.
  pub fn retry_delay(mut self, retry_delay: RetryDelay) -> Self {
    self.retry_delay = retry_delay;
    self
  }

  /// Sets the grace period before an orphaned query is evicted.
  pub fn gc_time(mut self, gc_time: Duration) -> Self {
    self.gc_time = gc_time;
    self
  }

  pub fn query_key(&self) -> &QueryKey {
    &self.query_key
  }
}

// Manual impl: the query function is shared, not duplicated.
impl<T> Clone for QueryOptions<T> {
  fn clone(&self) -> Self {
    QueryOptions {
      query_key: self.query_key.clone(),
      query_fn: self.query_fn.clone(),
      retry: self.retry,
      retry_delay: self.retry_delay.clone(),
      gc_time: self.gc_time,
    }
  }
}

impl<T> fmt::Debug for QueryOptions<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("QueryOptions")
      .field("query_key", &self.query_key)
      .field("retry", &self.retry)
      .field("retry_delay", &self.retry_delay)
      .field("gc_time", &self.gc_time)
      .finish_non_exhaustive()
  }
}
