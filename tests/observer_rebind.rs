mod common;

use std::time::Duration;

use common::{settle, value_options};
use requery::{query_key, QueryClient, QueryObserver};

#[tokio::test(start_paused = true)]
async fn test_set_options_rebinds_to_the_new_key() {
  let client = QueryClient::<u32>::new();
  let key_a = query_key!["item", 1];
  let key_b = query_key!["item", 2];
  let gc = Duration::from_millis(200);

  let observer = QueryObserver::new(&client, value_options(key_a.clone(), 1).gc_time(gc));
  observer.set_options(value_options(key_a.clone(), 1).gc_time(gc));
  settle().await;
  let current = observer.get_current_result().expect("bound");
  assert_eq!(**current.data().expect("first key fetched"), 1);

  observer.set_options(value_options(key_b.clone(), 2).gc_time(gc));
  settle().await;
  let current = observer.get_current_result().expect("rebound");
  assert_eq!(**current.data().expect("second key fetched"), 2);

  let cache = client.query_cache();
  assert!(cache.has(&key_a), "old query lingers through its grace period");
  assert!(cache.has(&key_b));

  // The old query is orphaned by the rebind; the watched one stays.
  tokio::time::sleep(Duration::from_millis(250)).await;
  assert!(!cache.has(&key_a), "orphaned query evicted after gc_time");
  assert!(cache.has(&key_b));
}

#[tokio::test(start_paused = true)]
async fn test_rebinding_to_an_equivalent_key_keeps_the_binding() {
  let client = QueryClient::<u32>::new();
  let gc = Duration::from_millis(200);

  let observer = QueryObserver::new(
    &client,
    value_options(query_key![{"a": 1, "b": 2}], 1).gc_time(gc),
  );
  observer.set_options(value_options(query_key![{"a": 1, "b": 2}], 1).gc_time(gc));
  settle().await;

  // Same key up to property order: no detach happens, so no eviction is
  // ever scheduled for the still-watched query.
  observer.set_options(value_options(query_key![{"b": 2, "a": 1}], 1).gc_time(gc));
  settle().await;

  let cache = client.query_cache();
  assert_eq!(cache.len(), 1);
  tokio::time::sleep(Duration::from_millis(1000)).await;
  assert_eq!(cache.len(), 1, "watched query must survive");
}
