//! Stamped cache for cooperatively scheduled tasks.
//!
//! This module provides [`AsyncStampedCache<S, T>`], the task-friendly counterpart of
//! [`StampedCache`](crate::StampedCache). Exclusive access comes from a
//! `tokio::sync::Mutex`, so a task waiting for the critical section is suspended rather
//! than parking its worker thread, and a computation may `.await` without giving up the
//! section.
//!
//! Cancellation is plain future dropping. A call dropped while waiting for the section
//! never runs its computation. A call dropped while its computation is running abandons
//! that computation and publishes nothing. The `*_cancellable` methods express the same
//! thing through a [`CancellationToken`] and report it as [`CacheError::Cancelled`].

use core::convert::Infallible;
use core::fmt;
use core::future::Future;
use core::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::entry::Ref;
use crate::error::CacheError;
use crate::section::{Exclusive, Section, Step};

/// A single-slot cache whose value is recomputed at most once per newer stamp, for async tasks.
///
/// Semantics match [`StampedCache`](crate::StampedCache): a stamp that is not newer than
/// the stored one returns the stored value without creating the future, and a newer
/// stamp awaits the computation while holding the section. Waiting tasks are queued in
/// FIFO order.
///
/// A computation must not await a call on the same cache that needs the section; that
/// call waits on its own caller forever.
///
/// # Examples
///
/// ```rust
/// use stamp_cell::AsyncStampedCache;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let cache = AsyncStampedCache::new();
///
/// let model = cache.get_or_create_value(7u64, || async { "model@7" }).await;
/// assert_eq!(*model, "model@7");
///
/// let model = cache.get_or_create_value(3, || async { "never computed" }).await;
/// assert_eq!(*model, "model@7");
/// # }
/// ```
pub struct AsyncStampedCache<S, T> {
   section: Section<S, T>,
   lock: Mutex<()>,
   busy: AtomicBool,
}

/// Exclusive access held by one task. Clears the busy flag before the mutex is released.
struct TaskGuard<'a> {
   _guard: MutexGuard<'a, ()>,
   busy: &'a AtomicBool,
}

impl Exclusive for TaskGuard<'_> {}

impl Drop for TaskGuard<'_> {
   #[inline]
   fn drop(&mut self) {
      self.busy.store(false, Ordering::Release);
   }
}

impl<S, T> AsyncStampedCache<S, T> {
   /// Creates a new, empty cache.
   #[inline]
   #[must_use]
   pub fn new() -> Self {
      Self {
         section: Section::new(),
         lock: Mutex::new(()),
         busy: AtomicBool::new(false),
      }
   }

   /// Creates a cache that already holds `value` computed for `stamp`.
   #[inline]
   #[must_use]
   pub fn with_entry(stamp: S, value: T) -> Self {
      Self {
         section: Section::with_entry(stamp, value),
         lock: Mutex::new(()),
         busy: AtomicBool::new(false),
      }
   }

   /// Returns the published value, if any.
   ///
   /// This method never suspends and never computes.
   #[inline]
   pub fn get_value(&self) -> Option<Ref<S, T>> {
      self.section.peek()
   }

   /// Returns the stamp of the published value, if any.
   #[inline]
   pub fn stamp(&self) -> Option<S>
   where
      S: Clone,
   {
      self.section.peek().map(|entry| entry.stamp().clone())
   }

   /// Returns `true` if no value has been published yet.
   #[inline]
   pub fn is_empty(&self) -> bool {
      self.section.is_empty()
   }

   /// Returns `true` while some task is inside the critical section.
   ///
   /// Only reads a flag; it never touches the section's mutex.
   #[inline]
   pub fn is_busy(&self) -> bool {
      self.busy.load(Ordering::Acquire)
   }

   /// Suspends until the section is free, then marks it busy.
   #[inline]
   async fn acquire(&self) -> TaskGuard<'_> {
      let guard = self.lock.lock().await;
      self.busy.store(true, Ordering::Release);
      TaskGuard {
         _guard: guard,
         busy: &self.busy,
      }
   }

   /// Consumes the cache, returning the published entry.
   #[inline]
   pub fn into_entry(self) -> Option<Ref<S, T>> {
      self.section.into_entry()
   }
}

impl<S: Ord, T> AsyncStampedCache<S, T> {
   /// Gets the value for `stamp`, awaiting `f()` if the stored one is older.
   ///
   /// - If the stored stamp is greater than or equal to `stamp`, returns the stored value.
   /// - Otherwise awaits `f()` while holding the section, publishes the result and returns it.
   pub async fn get_or_create_value<F, Fut>(&self, stamp: S, f: F) -> Ref<S, T>
   where
      F: FnOnce() -> Fut,
      Fut: Future<Output = T>,
   {
      let result = self
         .get_or_try_create_value(stamp, move || async move { Ok::<T, Infallible>(f().await) })
         .await;
      match result {
         Ok(value) => value,
         Err(never) => match never {},
      }
   }

   /// Gets the value for `stamp`, awaiting fallible `f()` if the stored one is older.
   ///
   /// - If the stored stamp is greater than or equal to `stamp`, returns `Ok(stored)`.
   /// - Otherwise awaits `f()` while holding the section:
   ///     - On `Ok(value)`, publishes it under `stamp` and returns it.
   ///     - On `Err(e)`, returns `Err(e)` and leaves the stored entry as it was.
   pub async fn get_or_try_create_value<F, Fut, E>(&self, stamp: S, f: F) -> Result<Ref<S, T>, E>
   where
      F: FnOnce() -> Fut,
      Fut: Future<Output = Result<T, E>>,
   {
      if let Some(current) = self.section.current(&stamp) {
         return Ok(current);
      }

      let guard = self.acquire().await;
      match self.section.enter(guard, stamp) {
         Step::Current(current) => Ok(current),
         Step::Compute(pending) => match f().await {
            Ok(value) => Ok(pending.commit(value)),
            Err(err) => {
               drop(pending);
               tracing::trace!("stamped cache: computation failed, entry left unchanged");
               Err(err)
            }
         },
      }
   }

   /// Like [`get_or_create_value`](Self::get_or_create_value), but gives up once `token`
   /// is cancelled.
   ///
   /// Returns [`CacheError::Cancelled`] if the token fires before a value is published,
   /// whether the call was still waiting for the section or already computing.
   pub async fn get_or_create_value_cancellable<F, Fut>(
      &self,
      stamp: S,
      token: &CancellationToken,
      f: F,
   ) -> Result<Ref<S, T>, CacheError>
   where
      F: FnOnce() -> Fut,
      Fut: Future<Output = T>,
   {
      let result = self
         .get_or_try_create_value_cancellable(stamp, token, move || async move {
            Ok::<T, Infallible>(f().await)
         })
         .await;
      result.map_err(|err| match err {
         CacheError::Compute(never) => match never {},
         CacheError::Cancelled => CacheError::Cancelled,
      })
   }

   /// Fallible and cancellable form of [`get_or_create_value`](Self::get_or_create_value).
   ///
   /// - A token that is already cancelled returns [`CacheError::Cancelled`] immediately.
   /// - If the stored stamp is greater than or equal to `stamp`, returns `Ok(stored)`.
   /// - If the token fires while waiting for the section, returns `Cancelled` without
   ///   ever calling `f`.
   /// - If the token fires while `f()` is pending, the computation is dropped and
   ///   `Cancelled` is returned.
   /// - If `f()` fails with `e`, returns [`CacheError::Compute(e)`](CacheError::Compute).
   ///
   /// In every error case the stored entry is left as it was.
   pub async fn get_or_try_create_value_cancellable<F, Fut, E>(
      &self,
      stamp: S,
      token: &CancellationToken,
      f: F,
   ) -> Result<Ref<S, T>, CacheError<E>>
   where
      F: FnOnce() -> Fut,
      Fut: Future<Output = Result<T, E>>,
   {
      if token.is_cancelled() {
         return Err(CacheError::Cancelled);
      }
      if let Some(current) = self.section.current(&stamp) {
         return Ok(current);
      }

      let guard = tokio::select! {
         biased;
         _ = token.cancelled() => {
            tracing::trace!("stamped cache: cancelled while waiting for the section");
            return Err(CacheError::Cancelled);
         }
         guard = self.acquire() => guard,
      };

      let pending = match self.section.enter(guard, stamp) {
         Step::Current(current) => return Ok(current),
         Step::Compute(pending) => pending,
      };
      if token.is_cancelled() {
         drop(pending);
         tracing::trace!("stamped cache: cancelled on entering the section");
         return Err(CacheError::Cancelled);
      }

      let computation = f();
      tokio::select! {
         biased;
         _ = token.cancelled() => {
            drop(pending);
            tracing::trace!("stamped cache: cancelled during computation, entry left unchanged");
            Err(CacheError::Cancelled)
         }
         result = computation => match result {
            Ok(value) => Ok(pending.commit(value)),
            Err(err) => {
               drop(pending);
               tracing::trace!("stamped cache: computation failed, entry left unchanged");
               Err(CacheError::Compute(err))
            }
         },
      }
   }
}

impl<S, T> Default for AsyncStampedCache<S, T> {
   /// Creates a new, empty cache.
   #[inline]
   fn default() -> Self {
      Self::new()
   }
}

impl<S, T> From<(S, T)> for AsyncStampedCache<S, T> {
   /// Creates a cache holding `value` computed for `stamp`.
   #[inline]
   fn from((stamp, value): (S, T)) -> Self {
      Self::with_entry(stamp, value)
   }
}

impl<S: fmt::Debug, T: fmt::Debug> fmt::Debug for AsyncStampedCache<S, T> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      let mut d = f.debug_tuple("AsyncStampedCache");
      match self.get_value() {
         Some(entry) => d.field(entry.entry()),
         None => d.field(&format_args!("<empty>")),
      };
      d.finish()
   }
}
