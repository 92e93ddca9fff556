//! Blocking mutual exclusion for the thread-parallel cache.
//!
//! This module provides the low-level lock used by [`StampedCache`](crate::StampedCache)
//! to serialize its critical section. It implements a small state machine using atomic
//! operations and futex-based waiting via `parking_lot_core`.
//!
//! The state is packed into a single `AtomicU8` with the following layout:
//! - Bit 0: LOCKED - A caller is inside the critical section
//! - Bit 1: PARKED - At least one thread is parked waiting for the lock
//!
//! The lock is not re-entrant and is never poisoned: a guard dropped during unwinding
//! releases it like any other.

use core::sync::atomic::{AtomicU8, Ordering};

use parking_lot_core::{UnparkResult, DEFAULT_PARK_TOKEN, DEFAULT_UNPARK_TOKEN};

/// Atomic state of the section lock.
#[repr(transparent)]
pub struct SectionLock(AtomicU8);

impl SectionLock {
   /// Bit flag: The lock is held.
   const LOCKED: u8 = 1;
   /// Bit flag: At least one thread is parked on this lock.
   const PARKED: u8 = 2;

   /// Creates a new, unlocked state.
   #[inline]
   pub(crate) const fn new() -> Self {
      Self(AtomicU8::new(0))
   }

   /// Parking key shared by `park` and `unpark_one`.
   #[inline(always)]
   fn key(&self) -> usize {
      self.0.as_ptr() as usize
   }

   /// Returns `true` if some caller currently holds the lock.
   #[inline]
   pub(crate) fn is_locked(&self) -> bool {
      self.0.load(Ordering::Relaxed) & Self::LOCKED != 0
   }

   /// Attempts to acquire the lock without blocking.
   #[inline]
   pub(crate) fn try_lock(&self) -> Option<SectionGuard<'_>> {
      let mut state = self.0.load(Ordering::Relaxed);
      loop {
         if state & Self::LOCKED != 0 {
            return None;
         }
         match self.0.compare_exchange_weak(
            state,
            state | Self::LOCKED,
            Ordering::Acquire,
            Ordering::Relaxed,
         ) {
            Ok(_) => return Some(SectionGuard::new(self)),
            Err(current) => state = current,
         }
      }
   }

   /// Acquires the lock, parking the calling thread until it becomes available.
   #[inline]
   pub(crate) fn lock(&self) -> SectionGuard<'_> {
      if self
         .0
         .compare_exchange(0, Self::LOCKED, Ordering::Acquire, Ordering::Relaxed)
         .is_ok()
      {
         return SectionGuard::new(self);
      }
      self.lock_slow()
   }

   #[cold]
   fn lock_slow(&self) -> SectionGuard<'_> {
      let mut spins = 0u32;
      let mut state = self.0.load(Ordering::Relaxed);
      loop {
         // Free (possibly with parked threads): try to take it.
         if state & Self::LOCKED == 0 {
            match self.0.compare_exchange_weak(
               state,
               state | Self::LOCKED,
               Ordering::Acquire,
               Ordering::Relaxed,
            ) {
               Ok(_) => return SectionGuard::new(self),
               Err(current) => state = current,
            }
            continue;
         }

         // Short spin while nobody is parked yet; critical sections are often brief.
         if state & Self::PARKED == 0 && spins < 16 {
            spins += 1;
            core::hint::spin_loop();
            state = self.0.load(Ordering::Relaxed);
            continue;
         }

         // Announce that we are about to park.
         if state & Self::PARKED == 0 {
            if let Err(current) = self.0.compare_exchange_weak(
               state,
               state | Self::PARKED,
               Ordering::Relaxed,
               Ordering::Relaxed,
            ) {
               state = current;
               continue;
            }
         }

         // SAFETY: The key is the address of our atomic, used consistently for both
         // `park` and `unpark_one`. The callbacks neither panic nor call back into
         // `parking_lot_core`.
         unsafe {
            // park() checks the condition closure *before* sleeping.
            let _ = parking_lot_core::park(
               self.key(),
               || self.0.load(Ordering::Relaxed) == Self::LOCKED | Self::PARKED,
               || {},
               |_, _| {},
               DEFAULT_PARK_TOKEN,
               None,
            );
         }
         // Woken up (or validation failed): start over.
         spins = 0;
         state = self.0.load(Ordering::Relaxed);
      }
   }

   /// Releases the lock, waking a single parked thread if there is one.
   #[inline]
   fn unlock(&self) {
      if self
         .0
         .compare_exchange(Self::LOCKED, 0, Ordering::Release, Ordering::Relaxed)
         .is_ok()
      {
         return;
      }
      self.unlock_slow();
   }

   #[cold]
   fn unlock_slow(&self) {
      // SAFETY: See `lock_slow`. The callback runs while the parking queue is locked,
      // so no thread can park between the state store and the queue update.
      unsafe {
         parking_lot_core::unpark_one(self.key(), |result: UnparkResult| {
            // Leave PARKED set if someone is still queued so the next unlock wakes them.
            let next = if result.have_more_threads { Self::PARKED } else { 0 };
            self.0.store(next, Ordering::Release);
            DEFAULT_UNPARK_TOKEN
         });
      }
   }
}

/// RAII guard returned by `lock` and `try_lock`. Releases the lock on drop.
pub struct SectionGuard<'a> {
   state: &'a SectionLock,
}

impl<'a> SectionGuard<'a> {
   /// Creates a new guard. Assumes the `LOCKED` flag is already set on `state`.
   #[inline(always)]
   const fn new(state: &'a SectionLock) -> Self {
      Self { state }
   }
}

impl Drop for SectionGuard<'_> {
   #[inline(always)]
   fn drop(&mut self) {
      self.state.unlock();
   }
}
