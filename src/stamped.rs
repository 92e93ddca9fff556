//! Stamped cache for callers running on their own threads.
//!
//! This module provides [`StampedCache<S, T>`]. Readers never block. Writers that find
//! the cache stale are serialized by a futex-based lock; a thread that cannot enter
//! the critical section immediately is parked until it can.

use core::convert::Infallible;
use core::fmt;

use crate::entry::Ref;
use crate::section::{Section, Step};
use crate::state::SectionLock;

/// A single-slot cache whose value is recomputed at most once per newer stamp.
///
/// Every value is stored together with the stamp it was computed for. A call to
/// [`get_or_create_value`](Self::get_or_create_value) with a stamp that is not newer
/// than the stored one returns the stored value without running the closure. A newer
/// stamp runs the closure on the calling thread while holding the cache's lock, then
/// publishes the result. The stored stamp therefore never decreases, and once all
/// calls have returned the cache holds the value computed for the largest stamp.
///
/// The lock is not re-entrant: a closure must not call a blocking method on the same
/// cache, or it deadlocks. A closure that never returns blocks every other writer.
///
/// # Examples
///
/// ```rust
/// use stamp_cell::StampedCache;
///
/// let cache = StampedCache::new();
/// assert!(cache.get_value().is_none());
///
/// let value = cache.get_or_create_value(2, || "B");
/// assert_eq!(*value, "B");
///
/// // An older stamp returns what is stored without computing anything.
/// let value = cache.get_or_create_value(1, || unreachable!());
/// assert_eq!(*value, "B");
/// assert_eq!(cache.stamp(), Some(2));
/// ```
pub struct StampedCache<S, T> {
   section: Section<S, T>,
   lock: SectionLock,
}

impl<S, T> StampedCache<S, T> {
   /// Creates a new, empty cache.
   #[inline]
   #[must_use]
   pub fn new() -> Self {
      Self {
         section: Section::new(),
         lock: SectionLock::new(),
      }
   }

   /// Creates a cache that already holds `value` computed for `stamp`.
   #[inline]
   #[must_use]
   pub fn with_entry(stamp: S, value: T) -> Self {
      Self {
         section: Section::with_entry(stamp, value),
         lock: SectionLock::new(),
      }
   }

   /// Returns the published value, if any.
   ///
   /// This method never blocks and never computes. While another thread is computing
   /// a newer value, it returns the one about to be replaced.
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

   /// Returns `true` while some thread is inside the critical section.
   #[inline]
   pub fn is_busy(&self) -> bool {
      self.lock.is_locked()
   }

   /// Consumes the cache, returning the published entry.
   #[inline]
   pub fn into_entry(self) -> Option<Ref<S, T>> {
      self.section.into_entry()
   }
}

impl<S: Ord, T> StampedCache<S, T> {
   /// Gets the value for `stamp`, computing it with `f()` if the stored one is older.
   ///
   /// - If the stored stamp is greater than or equal to `stamp`, returns the stored value.
   /// - Otherwise calls `f()` under the lock, publishes the result and returns it.
   ///
   /// May block while another thread is computing. If `f` panics, the lock is released
   /// and the stored entry is left untouched.
   #[inline]
   pub fn get_or_create_value<F>(&self, stamp: S, f: F) -> Ref<S, T>
   where
      F: FnOnce() -> T,
   {
      match self.get_or_try_create_value(stamp, || Ok::<T, Infallible>(f())) {
         Ok(value) => value,
         Err(never) => match never {},
      }
   }

   /// Gets the value for `stamp`, computing it with fallible `f()` if the stored one is older.
   ///
   /// - If the stored stamp is greater than or equal to `stamp`, returns `Ok(stored)`.
   /// - Otherwise calls `f()` under the lock:
   ///     - On `Ok(value)`, publishes it under `stamp` and returns it.
   ///     - On `Err(e)`, returns `Err(e)` and leaves the stored entry as it was.
   pub fn get_or_try_create_value<F, E>(&self, stamp: S, f: F) -> Result<Ref<S, T>, E>
   where
      F: FnOnce() -> Result<T, E>,
   {
      if let Some(current) = self.section.current(&stamp) {
         return Ok(current);
      }
      // Cold path: needs the lock
      self.create_value(stamp, f)
   }

   /// Like [`get_or_create_value`](Self::get_or_create_value), but never blocks.
   ///
   /// Returns `None` if the stored value is stale and another thread holds the lock,
   /// including when called from inside this cache's own closure.
   pub fn try_get_or_create_value<F>(&self, stamp: S, f: F) -> Option<Ref<S, T>>
   where
      F: FnOnce() -> T,
   {
      if let Some(current) = self.section.current(&stamp) {
         return Some(current);
      }
      let guard = self.lock.try_lock()?;
      Some(match self.section.enter(guard, stamp) {
         Step::Current(current) => current,
         Step::Compute(pending) => pending.commit(f()),
      })
   }

   /// Cold path for `get_or_try_create_value`. Acquires the lock and runs the closure.
   #[cold]
   fn create_value<F, E>(&self, stamp: S, f: F) -> Result<Ref<S, T>, E>
   where
      F: FnOnce() -> Result<T, E>,
   {
      let guard = self.lock.lock();
      match self.section.enter(guard, stamp) {
         Step::Current(current) => Ok(current),
         Step::Compute(pending) => match f() {
            Ok(value) => Ok(pending.commit(value)),
            Err(err) => {
               // Dropping `pending` releases the lock without publishing.
               drop(pending);
               tracing::trace!("stamped cache: computation failed, entry left unchanged");
               Err(err)
            }
         },
      }
   }
}

impl<S, T> Default for StampedCache<S, T> {
   /// Creates a new, empty cache.
   #[inline]
   fn default() -> Self {
      Self::new()
   }
}

impl<S, T> From<(S, T)> for StampedCache<S, T> {
   /// Creates a cache holding `value` computed for `stamp`.
   #[inline]
   fn from((stamp, value): (S, T)) -> Self {
      Self::with_entry(stamp, value)
   }
}

impl<S: fmt::Debug, T: fmt::Debug> fmt::Debug for StampedCache<S, T> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      let mut d = f.debug_tuple("StampedCache");
      match self.get_value() {
         Some(entry) => d.field(entry.entry()),
         None => d.field(&format_args!("<empty>")),
      };
      d.finish()
   }
}
