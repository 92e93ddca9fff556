//! Committed cache state and the handle callers receive.

use core::fmt;
use core::ops::Deref;
use std::sync::Arc;

/// An immutable `(stamp, value)` pair, published as a unit.
pub struct Entry<S, T> {
   stamp: S,
   value: T,
}

impl<S, T> Entry<S, T> {
   #[inline]
   pub(crate) const fn new(stamp: S, value: T) -> Self {
      Self { stamp, value }
   }

   /// The stamp this value was computed for.
   #[inline]
   pub fn stamp(&self) -> &S {
      &self.stamp
   }

   /// The computed value.
   #[inline]
   pub fn value(&self) -> &T {
      &self.value
   }

   /// Splits the entry into its stamp and value.
   #[inline]
   pub fn into_parts(self) -> (S, T) {
      (self.stamp, self.value)
   }
}

impl<S: fmt::Debug, T: fmt::Debug> fmt::Debug for Entry<S, T> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("Entry")
         .field("stamp", &self.stamp)
         .field("value", &self.value)
         .finish()
   }
}

/// A shared handle to a published [`Entry`].
///
/// Dereferences to the cached value. The handle stays valid after a newer entry
/// supersedes it; it simply keeps the old pair alive until dropped.
pub struct Ref<S, T>(Arc<Entry<S, T>>);

impl<S, T> Ref<S, T> {
   #[inline]
   pub(crate) fn from_arc(entry: Arc<Entry<S, T>>) -> Self {
      Self(entry)
   }

   #[inline]
   pub(crate) fn as_arc(&self) -> &Arc<Entry<S, T>> {
      &self.0
   }

   /// The stamp the referenced value was computed for.
   #[inline]
   pub fn stamp(&self) -> &S {
      &self.0.stamp
   }

   /// The referenced value.
   #[inline]
   pub fn value(&self) -> &T {
      &self.0.value
   }

   /// The referenced entry.
   #[inline]
   pub fn entry(&self) -> &Entry<S, T> {
      &self.0
   }

   /// Returns `true` if both handles point at the same published entry.
   #[inline]
   pub fn ptr_eq(this: &Self, other: &Self) -> bool {
      Arc::ptr_eq(&this.0, &other.0)
   }

   /// Unwraps the entry if this is the last handle to it, otherwise returns the handle.
   pub fn try_unwrap(this: Self) -> Result<Entry<S, T>, Self> {
      Arc::try_unwrap(this.0).map_err(Self)
   }
}

impl<S, T> Clone for Ref<S, T> {
   #[inline]
   fn clone(&self) -> Self {
      Self(Arc::clone(&self.0))
   }
}

impl<S, T> Deref for Ref<S, T> {
   type Target = T;

   #[inline]
   fn deref(&self) -> &T {
      &self.0.value
   }
}

impl<S, T> AsRef<T> for Ref<S, T> {
   #[inline]
   fn as_ref(&self) -> &T {
      &self.0.value
   }
}

impl<S: fmt::Debug, T: fmt::Debug> fmt::Debug for Ref<S, T> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      fmt::Debug::fmt(&*self.0, f)
   }
}

impl<S, T: fmt::Display> fmt::Display for Ref<S, T> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      fmt::Display::fmt(&self.0.value, f)
   }
}
