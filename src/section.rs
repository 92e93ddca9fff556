//! The check, compute, commit sequence shared by both cache flavors.
//!
//! Neither flavor re-implements the algorithm. Each one only decides *how* exclusive
//! access is obtained (parking a thread or suspending a task) and *how* the value is
//! produced (a closure or a future), then hands its guard to [`Section::enter`]:
//!
//! 1. `enter` re-reads the published entry while the guard is held.
//! 2. If the stored stamp is already at least the candidate, the stored value is
//!    returned and the guard is released ([`Step::Current`]).
//! 3. Otherwise a [`Pending`] keeps the guard alive while the caller computes.
//!    [`Pending::commit`] publishes the new entry and only then releases the guard.
//!    Dropping a `Pending` instead (error, panic, cancellation) releases the guard and
//!    publishes nothing.
//!
//! Because the guard outlives the comparison, no other caller can publish between the
//! check and the commit, which keeps the stored stamp monotonic.

use std::sync::Arc;

use crate::entry::{Entry, Ref};
use crate::slot::Slot;
use crate::state::SectionGuard;

/// Proof of exclusive access to a cache instance's critical section.
///
/// Releasing access is tied to dropping the guard.
pub(crate) trait Exclusive {}

impl Exclusive for SectionGuard<'_> {}

/// Outcome of entering the critical section.
pub(crate) enum Step<'a, S, T, G: Exclusive> {
   /// The published entry already satisfies the candidate stamp.
   Current(Ref<S, T>),
   /// The candidate stamp is newer; the caller must compute a value.
   Compute(Pending<'a, S, T, G>),
}

/// A computation slot reserved for one caller.
#[must_use = "dropping a pending computation releases the section without publishing"]
pub(crate) struct Pending<'a, S, T, G: Exclusive> {
   slot: &'a Slot<S, T>,
   stamp: S,
   guard: G,
}

impl<S, T, G: Exclusive> Pending<'_, S, T, G> {
   /// Publishes `value` under the reserved stamp, then releases exclusive access.
   #[inline]
   pub(crate) fn commit(self, value: T) -> Ref<S, T> {
      let Self { slot, stamp, guard } = self;
      let entry = Ref::from_arc(Arc::new(Entry::new(stamp, value)));
      slot.publish(&entry);
      drop(guard);
      tracing::trace!("stamped cache: published new entry");
      entry
   }
}

pub(crate) struct Section<S, T> {
   slot: Slot<S, T>,
}

impl<S, T> Section<S, T> {
   #[inline]
   pub(crate) fn new() -> Self {
      Self { slot: Slot::empty() }
   }

   #[inline]
   pub(crate) fn with_entry(stamp: S, value: T) -> Self {
      Self {
         slot: Slot::with_entry(Entry::new(stamp, value)),
      }
   }

   #[inline]
   pub(crate) fn peek(&self) -> Option<Ref<S, T>> {
      self.slot.peek()
   }

   #[inline]
   pub(crate) fn is_empty(&self) -> bool {
      self.slot.is_empty()
   }

   #[inline]
   pub(crate) fn into_entry(self) -> Option<Ref<S, T>> {
      self.slot.into_entry()
   }
}

impl<S: Ord, T> Section<S, T> {
   /// Lock-free staleness check.
   ///
   /// Returns the published entry if it already satisfies `stamp`. A `None` here is
   /// only a hint; the answer is re-established inside the section.
   #[inline]
   pub(crate) fn current(&self, stamp: &S) -> Option<Ref<S, T>> {
      let entry = self.slot.peek()?;
      if entry.stamp() >= stamp {
         tracing::trace!("stamped cache: entry is current, skipping the section");
         Some(entry)
      } else {
         None
      }
   }

   /// Runs the check half of the algorithm while `guard` proves exclusive access.
   #[inline]
   pub(crate) fn enter<G: Exclusive>(&self, guard: G, stamp: S) -> Step<'_, S, T, G> {
      match self.slot.peek() {
         Some(entry) if *entry.stamp() >= stamp => {
            drop(guard);
            tracing::trace!("stamped cache: entry became current while waiting");
            Step::Current(entry)
         }
         _ => {
            tracing::trace!("stamped cache: computing value for newer stamp");
            Step::Compute(Pending {
               slot: &self.slot,
               stamp,
               guard,
            })
         }
      }
   }
}
