use std::fmt;
use std::sync::Arc;

use crate::cache::QueryCache;
use crate::key::QueryKey;

/// Thin facade owning one [`QueryCache`]. Cheap to clone; clones share the
/// same cache.
pub struct QueryClient<T> {
  cache: Arc<QueryCache<T>>,
}

impl<T: Send + Sync + 'static> QueryClient<T> {
  pub fn new() -> Self {
    QueryClient {
      cache: QueryCache::new(),
    }
  }

  /// The cache every observer bound to this client resolves queries in.
  pub fn query_cache(&self) -> &Arc<QueryCache<T>> {
    &self.cache
  }

  /// Direct cache write: transitions the query registered under `key` to
  /// `Success` with `data`, notifying its observers synchronously. A no-op
  /// returning `None` when nothing is registered for the key.
  pub fn set_query_data(&self, key: &QueryKey, data: T) -> Option<Arc<T>> {
    let query = self.cache.get(&key.hash())?;
    Some(query.set_data(data))
  }
}

impl<T: Send + Sync + 'static> Default for QueryClient<T> {
  fn default() -> Self {
    Self::new()
  }
}

// Manual impl: a clone is another handle to the same cache.
impl<T> Clone for QueryClient<T> {
  fn clone(&self) -> Self {
    QueryClient {
      cache: self.cache.clone(),
    }
  }
}

impl<T> fmt::Debug for QueryClient<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("QueryClient")
      .field("cache", &self.cache)
      .finish()
  }
}
