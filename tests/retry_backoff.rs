mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::failing_options;
use parking_lot::Mutex;
use requery::{query_key, QueryClient, QueryError, QueryKey, QueryOptions, RetryDelay};
use tokio::time::Instant;

/// Always fails, recording the instant of every attempt.
fn recording_options(key: QueryKey, attempts: Arc<Mutex<Vec<Instant>>>) -> QueryOptions<u32> {
  QueryOptions::new(key, move |_cx| {
    let attempts = attempts.clone();
    async move {
      attempts.lock().push(Instant::now());
      Err::<u32, _>(QueryError::message("boom"))
    }
  })
}

fn delays(attempts: &[Instant]) -> Vec<Duration> {
  attempts.windows(2).map(|pair| pair[1] - pair[0]).collect()
}

#[tokio::test(start_paused = true)]
async fn test_default_budget_is_four_attempts_with_doubling_delays() {
  let client = QueryClient::<u32>::new();
  let attempts = Arc::new(Mutex::new(Vec::new()));
  let options = recording_options(query_key!["always-fails"], attempts.clone());

  let query = client.query_cache().build(&options);
  let result = query.fetch().wait().await;
  assert!(result.is_err());

  let state = query.state();
  assert!(state.is_error(), "terminal state must be error, got {state:?}");
  let error = state.error().expect("error state carries the error");
  assert!(error.to_string().contains("boom"), "last error is retained: {error}");

  let attempts = attempts.lock();
  assert_eq!(attempts.len(), 4, "one initial attempt plus three retries");
  assert_eq!(
    delays(&attempts),
    vec![
      Duration::from_millis(1000),
      Duration::from_millis(2000),
      Duration::from_millis(4000),
    ]
  );
}

#[tokio::test(start_paused = true)]
async fn test_backoff_caps_at_thirty_seconds() {
  let client = QueryClient::<u32>::new();
  let attempts = Arc::new(Mutex::new(Vec::new()));
  let options = recording_options(query_key!["always-fails"], attempts.clone()).retry(6);

  let query = client.query_cache().build(&options);
  let result = query.fetch().wait().await;
  assert!(result.is_err());

  let attempts = attempts.lock();
  assert_eq!(attempts.len(), 7);
  assert_eq!(
    delays(&attempts),
    vec![
      Duration::from_millis(1000),
      Duration::from_millis(2000),
      Duration::from_millis(4000),
      Duration::from_millis(8000),
      Duration::from_millis(16000),
      Duration::from_millis(30000),
    ]
  );
}

#[tokio::test(start_paused = true)]
async fn test_success_after_transient_failures() {
  let client = QueryClient::<u32>::new();
  let attempts = Arc::new(AtomicUsize::new(0));
  let options = {
    let attempts = attempts.clone();
    QueryOptions::new(query_key!["flaky"], move |_cx| {
      let attempts = attempts.clone();
      async move {
        let n = attempts.fetch_add(1, Ordering::SeqCst);
        if n < 2 {
          Err(QueryError::message("transient"))
        } else {
          Ok(42u32)
        }
      }
    })
  };

  let query = client.query_cache().build(&options);
  let result = query.fetch().wait().await.expect("third attempt succeeds");
  assert_eq!(*result, 42);

  let state = query.state();
  assert!(state.is_success());
  assert_eq!(**state.data().expect("success carries data"), 42);
  assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_retry_zero_means_a_single_attempt() {
  let client = QueryClient::<u32>::new();
  let attempts = Arc::new(AtomicUsize::new(0));
  let options = failing_options(query_key!["one-shot"], attempts.clone()).retry(0);

  let query = client.query_cache().build(&options);
  let result = query.fetch().wait().await;
  assert!(result.is_err());
  assert_eq!(attempts.load(Ordering::SeqCst), 1);
  assert!(query.state().is_error());
}

#[tokio::test(start_paused = true)]
async fn test_fixed_retry_delay() {
  let client = QueryClient::<u32>::new();
  let attempts = Arc::new(Mutex::new(Vec::new()));
  let options = recording_options(query_key!["fixed"], attempts.clone())
    .retry(2)
    .retry_delay(RetryDelay::Fixed(Duration::from_millis(50)));

  let query = client.query_cache().build(&options);
  let result = query.fetch().wait().await;
  assert!(result.is_err());

  let attempts = attempts.lock();
  assert_eq!(attempts.len(), 3);
  assert_eq!(
    delays(&attempts),
    vec![Duration::from_millis(50), Duration::from_millis(50)]
  );
}

#[tokio::test(start_paused = true)]
async fn test_custom_retry_delay_sees_the_failure_count() {
  let client = QueryClient::<u32>::new();
  let attempts = Arc::new(Mutex::new(Vec::new()));
  let options = recording_options(query_key!["custom"], attempts.clone())
    .retry(2)
    .retry_delay(RetryDelay::Custom(Arc::new(|n| {
      Duration::from_millis(10 * (n as u64 + 1))
    })));

  let query = client.query_cache().build(&options);
  let result = query.fetch().wait().await;
  assert!(result.is_err());

  let attempts = attempts.lock();
  assert_eq!(
    delays(&attempts),
    vec![Duration::from_millis(10), Duration::from_millis(20)],
    "delay function receives the pre-increment failure count"
  );
}
