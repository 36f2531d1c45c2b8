//! An asynchronous query cache: hand it a structured key and a fetch
//! function, and it guarantees one cached unit of state per canonical key,
//! retries transient failures with bounded exponential backoff, and notifies
//! attached observers whenever the cached state changes.
//!
//! # Features
//! - **One instance per key**: all lookups funnel through a single registry,
//!   so keys that are equal up to object property order always resolve to
//!   the same [`Query`].
//! - **Bounded retries**: transient fetch failures are retried with capped
//!   exponential backoff; only the terminal outcome escapes.
//! - **Cooperative cancellation**: every fetch attempt receives a
//!   cancellation token; aborting is advisory, never preemptive.
//! - **Change notification**: observers derive a view per state transition
//!   and suppress notifications for shallow-equal views.
//! - **Delayed eviction**: a query orphaned by its last observer lingers for
//!   a grace period before leaving the cache, tolerating rapid attach/detach
//!   churn such as component remounts.

// Public modules that form the API
pub mod cache;
pub mod client;
pub mod error;
pub mod future;
pub mod key;
pub mod observer;
pub mod options;
pub mod query;
pub mod state;
pub mod subscribable;

// Internal, crate-only modules
mod gc;
mod retry;

// Re-export the primary user-facing types for convenience
pub use cache::QueryCache;
pub use client::QueryClient;
pub use error::{FetchError, QueryError};
pub use future::{FetchFuture, FetchResult};
pub use key::{QueryHash, QueryKey};
pub use observer::{QueryObserver, QueryResult};
pub use options::{FetchContext, QueryFn, QueryOptions, RetryDelay, DEFAULT_GC_TIME, DEFAULT_RETRY};
pub use query::Query;
pub use state::{QueryState, QueryStatus};
pub use subscribable::{Subscribable, Subscription};
