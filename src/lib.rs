//! Stamped single-slot caches with at-most-once recomputation.
//!
//! A stamped cache holds one value together with the stamp (any totally ordered token,
//! typically a generation counter) it was computed for. Callers ask for the value at a
//! given stamp and supply the computation:
//!
//! - If the stored stamp is at least as new, the stored value is returned and the
//!   computation never runs.
//! - Otherwise the computation runs under mutual exclusion and its result is published
//!   together with the new stamp.
//!
//! Two flavors share one algorithm and differ only in how callers wait:
//!
//! - [`StampedCache<S, T>`]: for callers on their own threads. Waiting threads are parked
//!   using `parking_lot`'s futex-based synchronization.
//! - [`AsyncStampedCache<S, T>`]: for async tasks. Waiting tasks are suspended, and a
//!   computation may `.await` without giving up its exclusive access.
//!
//! # Guarantees
//!
//! - **Lock-free reads**: [`get_value`](StampedCache::get_value) loads one atomically
//!   published entry, so a value is never seen with a stamp it was not published with.
//! - **Monotonic stamps**: the stored stamp never decreases.
//! - **No concurrent computations**: at most one computation runs per cache instance.
//! - **Convergence**: once all calls have returned, the cache holds the value computed
//!   for the largest stamp ever submitted.
//! - **Failure isolation**: a failing, panicking or cancelled computation leaves the
//!   stored entry untouched and is only reported to its own caller.
//!
//! # Features
//!
//! - `async-tokio` (default): enables [`AsyncStampedCache`] and re-exports tokio-util's
//!   [`CancellationToken`] for its cancellable operations.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use std::thread;
//!
//! use stamp_cell::StampedCache;
//!
//! // One cache per session, shared by every thread that needs the model.
//! let models = Arc::new(StampedCache::new());
//!
//! let threads: Vec<_> = (1..=4u64)
//!    .map(|generation| {
//!       let models = Arc::clone(&models);
//!       thread::spawn(move || {
//!          models.get_or_create_value(generation, || format!("model for generation {generation}"));
//!       })
//!    })
//!    .collect();
//! for t in threads {
//!    t.join().unwrap();
//! }
//!
//! assert_eq!(models.stamp(), Some(4));
//! assert_eq!(*models.get_value().unwrap(), "model for generation 4");
//! ```

/// Committed `(stamp, value)` pairs and shared handles to them.
mod entry;

/// The atomically published entry.
mod slot;

/// Blocking section lock.
mod state;

/// Shared check, compute, commit algorithm.
mod section;

/// Thread-parallel cache.
mod stamped;

/// Cooperative cache.
#[cfg(feature = "async-tokio")]
mod async_stamped;

/// Errors of the cancellable operations.
mod error;

#[cfg(feature = "async-tokio")]
pub use async_stamped::AsyncStampedCache;
pub use entry::{Entry, Ref};
pub use error::CacheError;
pub use stamped::StampedCache;
#[cfg(feature = "async-tokio")]
pub use tokio_util::sync::CancellationToken;
