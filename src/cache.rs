use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::key::{QueryHash, QueryKey};
use crate::options::QueryOptions;
use crate::query::Query;

/// Exclusive owner of the hash → query registry. All lookups and creations
/// funnel through here, so equivalent keys always resolve to the same
/// [`Query`] instance for the key's lifetime.
pub struct QueryCache<T> {
  queries: Mutex<HashMap<QueryHash, Arc<Query<T>>, ahash::RandomState>>,
}

impl<T: Send + Sync + 'static> QueryCache<T> {
  pub(crate) fn new() -> Arc<Self> {
    Arc::new(QueryCache {
      queries: Mutex::new(HashMap::default()),
    })
  }

  /// Canonical hash for `key`: the form every registry lookup uses.
  pub fn hash_key(&self, key: &QueryKey) -> QueryHash {
    key.hash()
  }

  /// Looks up the query for `options.query_key`, creating and registering
  /// it on a miss. Lookup-or-create is one critical section, so concurrent
  /// builds of the same hash cannot produce two instances.
  pub fn build(self: &Arc<Self>, options: &QueryOptions<T>) -> Arc<Query<T>> {
    let hash = self.hash_key(&options.query_key);
    let mut queries = self.queries.lock();
    if let Some(query) = queries.get(&hash) {
      return query.clone();
    }
    tracing::debug!(query = %hash, "registering new query");
    let query = Query::new(Arc::downgrade(self), hash.clone(), options.clone());
    queries.insert(hash, query.clone());
    query
  }

  /// The registered query for a canonical hash, if any.
  pub fn get(&self, hash: &QueryHash) -> Option<Arc<Query<T>>> {
    self.queries.lock().get(hash).cloned()
  }

  /// Existence check by the canonical hash of `key`.
  pub fn has(&self, key: &QueryKey) -> bool {
    self.queries.lock().contains_key(&self.hash_key(key))
  }

  /// Unregisters `query` only if it is the instance currently stored under
  /// its hash — a stale eviction must not delete a newer registration.
  pub fn remove(&self, query: &Arc<Query<T>>) {
    let mut queries = self.queries.lock();
    if let Some(current) = queries.get(query.hash()) {
      if Arc::ptr_eq(current, query) {
        queries.remove(query.hash());
        tracing::debug!(query = %query.hash(), "removed query");
      }
    }
  }

  pub fn len(&self) -> usize {
    self.queries.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.queries.lock().is_empty()
  }
}

impl<T> fmt::Debug for QueryCache<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("QueryCache")
      .field("queries", &self.queries.lock().len())
      .finish()
  }
}
