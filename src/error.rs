use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// A type-erased, shareable fetch failure. The `Arc` keeps the error
/// cloneable into the query state, the result channel, and every observer
/// view without requiring the underlying type to be `Clone`.
pub type FetchError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Terminal errors surfaced by a query's fetch attempt sequence.
#[derive(Debug, Clone, Error)]
pub enum QueryError {
  /// The query function failed. While the retry budget lasts this is
  /// absorbed by the retry driver; once exhausted, the last failure is
  /// stored in the query's `Error` state and rejects the fetch result.
  #[error("query function failed: {0}")]
  Fetch(FetchError),

  /// The conventional error a query function returns when it observes the
  /// cancellation token. Not a distinct query status: it flows through the
  /// ordinary error path, but a failure after cancellation was requested is
  /// never retried.
  #[error("query cancelled")]
  Cancelled,
}

impl QueryError {
  /// Wraps an arbitrary error as a fetch failure.
  pub fn fetch<E>(err: E) -> Self
  where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
  {
    QueryError::Fetch(Arc::from(err.into()))
  }

  /// Builds a fetch failure from a plain message.
  pub fn message(msg: impl Into<String>) -> Self {
    QueryError::Fetch(Arc::new(MessageError(msg.into())))
  }

  /// Identity comparison used for change suppression: two `Fetch` errors
  /// are the same only when they share one payload allocation.
  pub(crate) fn same_as(&self, other: &Self) -> bool {
    match (self, other) {
      (QueryError::Fetch(a), QueryError::Fetch(b)) => Arc::ptr_eq(a, b),
      (QueryError::Cancelled, QueryError::Cancelled) => true,
      _ => false,
    }
  }
}

#[derive(Debug)]
struct MessageError(String);

impl fmt::Display for MessageError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl std::error::Error for MessageError {}
