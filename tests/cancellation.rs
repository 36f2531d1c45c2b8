mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::failing_options;
use requery::{query_key, QueryClient, QueryError, QueryOptions};

#[tokio::test(start_paused = true)]
async fn test_cancel_aborts_the_in_flight_fetch_exactly_once() {
  let client = QueryClient::<u32>::new();
  let observed = Arc::new(AtomicUsize::new(0));
  let options = {
    let observed = observed.clone();
    QueryOptions::new(query_key!["slow"], move |cx| {
      let observed = observed.clone();
      async move {
        cx.signal.cancelled().await;
        observed.fetch_add(1, Ordering::SeqCst);
        Err::<u32, _>(QueryError::Cancelled)
      }
    })
  };

  let query = client.query_cache().build(&options);
  let handle = query.fetch();

  // Let the attempt start and park on the token.
  tokio::time::sleep(Duration::from_millis(1)).await;
  query.cancel();
  query.cancel();
  query.cancel();

  let result = handle.wait().await;
  assert!(matches!(result, Err(QueryError::Cancelled)));
  assert!(query.state().is_error(), "cancellation flows through the error path");
  assert_eq!(
    observed.load(Ordering::SeqCst),
    1,
    "the abort must be observed exactly once"
  );
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_mid_backoff_is_terminal() {
  let client = QueryClient::<u32>::new();
  let attempts = Arc::new(AtomicUsize::new(0));
  let options = failing_options(query_key!["doomed"], attempts.clone());

  let query = client.query_cache().build(&options);
  let handle = query.fetch();

  // First attempt fails, the retry timer is armed; cancel during backoff.
  tokio::time::sleep(Duration::from_millis(1)).await;
  assert_eq!(attempts.load(Ordering::SeqCst), 1);
  query.cancel();

  let result = handle.wait().await;
  assert!(result.is_err());
  assert_eq!(
    attempts.load(Ordering::SeqCst),
    2,
    "the failure after cancellation must be terminal, not retried"
  );
  assert!(query.state().is_error());
}

#[tokio::test(start_paused = true)]
async fn test_uncooperative_fetch_leaves_the_channel_pending() {
  let client = QueryClient::<u32>::new();
  let options = QueryOptions::new(query_key!["stubborn"], |_cx| async {
    std::future::pending::<Result<u32, QueryError>>().await
  });

  let query = client.query_cache().build(&options);
  let handle = query.fetch();

  tokio::time::sleep(Duration::from_millis(1)).await;
  query.cancel();

  let waited = tokio::time::timeout(Duration::from_secs(60), handle.wait()).await;
  assert!(
    waited.is_err(),
    "cancellation alone must not settle the channel"
  );
  assert!(query.state().is_pending());
}
