use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::error::QueryError;
use crate::future::FetchFuture;
use crate::options::RetryDelay;

/// Everything one attempt sequence needs, mirrored from the query that
/// starts it.
pub(crate) struct RetryerConfig<T> {
  /// Produces one fetch attempt per call.
  pub fetch: Box<dyn FnMut() -> BoxFuture<'static, Result<T, QueryError>> + Send>,
  /// Abort hook, run by the first `cancel()` call only.
  pub abort: Box<dyn Fn() + Send + Sync>,
  /// Token the abort hook trips. Once it is cancelled, a failed attempt is
  /// terminal: the sequence never sleeps into another retry.
  pub token: CancellationToken,
  pub on_success: Box<dyn Fn(Arc<T>) + Send + Sync>,
  pub on_error: Box<dyn Fn(QueryError) + Send + Sync>,
  pub retry: u32,
  pub retry_delay: RetryDelay,
}

/// Drives one bounded-backoff attempt sequence: transient failures are
/// absorbed and counted here, and only the terminal outcome escapes through
/// the result channel. Never reused — every fetch constructs a fresh one.
pub(crate) struct Retryer<T> {
  result: Arc<FetchFuture<T>>,
  abort: Box<dyn Fn() + Send + Sync>,
  aborted: AtomicBool,
}

impl<T: Send + Sync + 'static> Retryer<T> {
  /// Spawns the attempt loop onto the current tokio runtime. The loop owns
  /// the config; the returned handle owns the abort path and the channel.
  pub fn spawn(config: RetryerConfig<T>) -> Arc<Self> {
    let RetryerConfig {
      mut fetch,
      abort,
      token,
      on_success,
      on_error,
      retry,
      retry_delay,
    } = config;

    let result = Arc::new(FetchFuture::new());
    let channel = result.clone();

    tokio::spawn(async move {
      let mut failure_count: u32 = 0;
      loop {
        match fetch().await {
          Ok(data) => {
            let data = Arc::new(data);
            on_success(data.clone());
            channel.settle(Ok(data));
            return;
          }
          Err(error) => {
            if failure_count >= retry || token.is_cancelled() {
              tracing::debug!(failures = failure_count + 1, error = %error, "fetch failed terminally");
              on_error(error.clone());
              channel.settle(Err(error));
              return;
            }
            // The delay uses the failure count as it stood before this
            // failure; the count increments before the next attempt runs.
            let delay = retry_delay.for_failure(failure_count);
            failure_count += 1;
            tracing::debug!(
              failures = failure_count,
              delay_ms = delay.as_millis() as u64,
              "retrying fetch"
            );
            tokio::time::sleep(delay).await;
          }
        }
      }
    });

    Arc::new(Retryer {
      result,
      abort,
      aborted: AtomicBool::new(false),
    })
  }

  /// Runs the abort hook on the first call only; later calls are no-ops.
  /// Advisory: settling the channel is still up to the wrapped operation.
  pub fn cancel(&self) {
    if !self.aborted.swap(true, Ordering::SeqCst) {
      (self.abort)();
    }
  }

  pub fn result(&self) -> Arc<FetchFuture<T>> {
    self.result.clone()
  }
}
