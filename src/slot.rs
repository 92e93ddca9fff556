//! The single atomically published entry of a cache instance.
//!
//! Readers load one `Arc` out of an [`ArcSwapOption`], so a stamp is never observed
//! without the value it was published with. Writers go through [`Slot::publish`], which
//! the critical section only calls while holding exclusive access.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::entry::{Entry, Ref};

pub(crate) struct Slot<S, T> {
   current: ArcSwapOption<Entry<S, T>>,
}

impl<S, T> Slot<S, T> {
   #[inline]
   pub(crate) fn empty() -> Self {
      Self {
         current: ArcSwapOption::empty(),
      }
   }

   #[inline]
   pub(crate) fn with_entry(entry: Entry<S, T>) -> Self {
      Self {
         current: ArcSwapOption::from_pointee(entry),
      }
   }

   /// Returns the currently published entry, if any. Never blocks.
   #[inline]
   pub(crate) fn peek(&self) -> Option<Ref<S, T>> {
      self.current.load_full().map(Ref::from_arc)
   }

   #[inline]
   pub(crate) fn is_empty(&self) -> bool {
      self.current.load().is_none()
   }

   /// Replaces the published entry.
   #[inline]
   pub(crate) fn publish(&self, entry: &Ref<S, T>) {
      self.current.store(Some(Arc::clone(entry.as_arc())));
   }

   #[inline]
   pub(crate) fn into_entry(self) -> Option<Ref<S, T>> {
      self.current.into_inner().map(Ref::from_arc)
   }
}
