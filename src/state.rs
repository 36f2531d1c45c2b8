use std::fmt;
use std::sync::Arc;

use crate::error::QueryError;

/// Status tag of a [`QueryState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
  Pending,
  Success,
  Error,
}

impl fmt::Display for QueryStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      QueryStatus::Pending => f.write_str("pending"),
      QueryStatus::Success => f.write_str("success"),
      QueryStatus::Error => f.write_str("error"),
    }
  }
}

/// State of one cached query. Exactly one variant holds at a time:
/// `Success` always carries data, `Error` always carries the terminal
/// error, neither carries both.
///
/// Data is held in an `Arc` so snapshots clone without a `T: Clone` bound.
pub enum QueryState<T> {
  /// No fetch has settled yet.
  Pending,
  /// The most recent settled fetch succeeded.
  Success { data: Arc<T> },
  /// The most recent settled fetch exhausted its retry budget.
  Error { error: QueryError },
}

impl<T> QueryState<T> {
  pub fn status(&self) -> QueryStatus {
    match self {
      QueryState::Pending => QueryStatus::Pending,
      QueryState::Success { .. } => QueryStatus::Success,
      QueryState::Error { .. } => QueryStatus::Error,
    }
  }

  pub fn is_pending(&self) -> bool {
    matches!(self, QueryState::Pending)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success { .. })
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error { .. })
  }

  pub fn data(&self) -> Option<&Arc<T>> {
    match self {
      QueryState::Success { data } => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&QueryError> {
    match self {
      QueryState::Error { error } => Some(error),
      _ => None,
    }
  }
}

// Manual impl: cloning shares the data `Arc`, no `T: Clone` required.
impl<T> Clone for QueryState<T> {
  fn clone(&self) -> Self {
    match self {
      QueryState::Pending => QueryState::Pending,
      QueryState::Success { data } => QueryState::Success { data: data.clone() },
      QueryState::Error { error } => QueryState::Error { error: error.clone() },
    }
  }
}

impl<T> fmt::Debug for QueryState<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      QueryState::Pending => f.write_str("Pending"),
      QueryState::Success { .. } => f.write_str("Success { .. }"),
      QueryState::Error { error } => write!(f, "Error {{ {error} }}"),
    }
  }
}

/// A state transition request, produced by the fetch path or a direct write.
pub(crate) enum Action<T> {
  Success(Arc<T>),
  Error(QueryError),
}

/// Pure reducer for the query state machine. An error transition drops any
/// previously held data, keeping data+error combinations unrepresentable.
pub(crate) fn reduce<T>(_state: &QueryState<T>, action: Action<T>) -> QueryState<T> {
  match action {
    Action::Success(data) => QueryState::Success { data },
    Action::Error(error) => QueryState::Error { error },
  }
}
