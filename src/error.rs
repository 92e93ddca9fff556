//! Errors reported by the cancellable cache operations.

use core::convert::Infallible;

use thiserror::Error;

/// Why a cancellable `get_or_*` call did not produce a value.
///
/// In both cases the published entry is exactly what it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError<E = Infallible> {
   /// The caller's computation failed. Only this caller sees the error.
   #[error("computation failed: {0}")]
   Compute(E),
   /// The call was cancelled, either while waiting for the section or while its
   /// computation was running.
   #[error("cancelled before a value was published")]
   Cancelled,
}

impl<E> CacheError<E> {
   /// Returns `true` for [`CacheError::Cancelled`].
   #[inline]
   pub fn is_cancelled(&self) -> bool {
      matches!(self, Self::Cancelled)
   }

   /// Returns the computation error, if that is what this is.
   #[inline]
   pub fn into_compute(self) -> Option<E> {
      match self {
         Self::Compute(err) => Some(err),
         Self::Cancelled => None,
      }
   }
}
