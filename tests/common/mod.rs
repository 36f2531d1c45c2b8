#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use requery::{QueryError, QueryKey, QueryOptions};

/// Options whose fetch resolves immediately with `value`.
pub fn value_options(key: QueryKey, value: u32) -> QueryOptions<u32> {
  QueryOptions::new(key, move |_cx| async move { Ok::<_, QueryError>(value) })
}

/// Options whose fetch always fails, counting attempts in `attempts`.
pub fn failing_options(key: QueryKey, attempts: Arc<AtomicUsize>) -> QueryOptions<u32> {
  QueryOptions::new(key, move |_cx| {
    let attempts = attempts.clone();
    async move {
      attempts.fetch_add(1, Ordering::SeqCst);
      Err::<u32, _>(QueryError::message("fetch failed"))
    }
  })
}

/// Lets spawned fetch tasks run to completion under a paused clock. The
/// 1 ms sleep only elapses once every runnable task has parked, so any
/// immediately-resolving fetch has settled by the time this returns.
pub async fn settle() {
  tokio::time::sleep(Duration::from_millis(1)).await;
}
