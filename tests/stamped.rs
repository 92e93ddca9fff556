use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use stamp_cell::{Ref, StampedCache};

#[test]
fn test_new_is_empty() {
   let cache: StampedCache<u64, &str> = StampedCache::new();
   assert!(cache.is_empty());
   assert!(cache.get_value().is_none());
   assert_eq!(cache.stamp(), None);
   assert!(!cache.is_busy());
}

#[test]
fn test_with_entry() {
   let cache = StampedCache::with_entry(3u64, "three");
   assert!(!cache.is_empty());
   assert_eq!(cache.stamp(), Some(3));
   assert_eq!(cache.get_value().map(|v| *v), Some("three"));

   let from_pair: StampedCache<u64, &str> = (3, "three").into();
   assert_eq!(from_pair.stamp(), Some(3));
}

#[test]
fn test_single_caller() {
   let cache = StampedCache::new();
   let counter = AtomicUsize::new(0);
   let value = cache.get_or_create_value(1u64, || {
      counter.fetch_add(1, Ordering::SeqCst);
      "A"
   });
   assert_eq!(*value, "A");
   assert_eq!(*value.stamp(), 1);
   assert_eq!(counter.load(Ordering::SeqCst), 1);
   assert_eq!(cache.get_value().map(|v| *v), Some("A"));

   // Same stamp again should not execute the closure
   let value = cache.get_or_create_value(1, || {
      counter.fetch_add(1, Ordering::SeqCst);
      panic!("Should not be called")
   });
   assert_eq!(*value, "A");
   assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_stale_stamp_is_noop() {
   let cache = StampedCache::new();
   cache.get_or_create_value(2u64, || "B");

   let called = AtomicBool::new(false);
   let value = cache.get_or_create_value(0, || {
      called.store(true, Ordering::SeqCst);
      "C"
   });
   assert_eq!(*value, "B");
   assert!(!called.load(Ordering::SeqCst));
   assert_eq!(cache.get_value().map(|v| *v), Some("B"));
   assert_eq!(cache.stamp(), Some(2));
}

#[test]
fn test_newer_stamp_replaces() {
   let cache = StampedCache::new();
   let first = cache.get_or_create_value(1u64, || String::from("first"));
   let second = cache.get_or_create_value(5, || String::from("second"));
   assert_eq!(*second, "second");
   assert_eq!(cache.stamp(), Some(5));

   // Superseded handles stay valid
   assert_eq!(*first, "first");
   assert_eq!(*first.stamp(), 1);
   assert!(!Ref::ptr_eq(&first, &second));
   assert!(Ref::ptr_eq(&second, &cache.get_value().unwrap()));
}

#[test]
fn test_get_or_try_create_value() {
   let cache = StampedCache::new();
   cache.get_or_create_value(1u64, || 10);

   // Failure with a newer stamp leaves the entry unchanged
   let result = cache.get_or_try_create_value(2, || Err::<i32, _>("compute error"));
   assert_eq!(result.map(|v| *v), Err("compute error"));
   assert_eq!(cache.stamp(), Some(1));
   assert_eq!(cache.get_value().map(|v| *v), Some(10));
   assert!(!cache.is_busy());

   // The same stamp can be retried
   let result = cache.get_or_try_create_value(2, || Ok::<_, &str>(20));
   assert_eq!(result.map(|v| *v), Ok(20));
   assert_eq!(cache.stamp(), Some(2));

   // A stale stamp never calls the closure, even a failing one
   let result = cache.get_or_try_create_value(2, || Err::<i32, _>("unused"));
   assert_eq!(result.map(|v| *v), Ok(20));
}

#[test]
fn test_panic_leaves_entry_unchanged() {
   let cache = StampedCache::new();
   cache.get_or_create_value(1u64, || "before");

   let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
      cache.get_or_create_value(2, || panic!("compute panicked"));
   }));
   assert!(result.is_err());
   assert!(!cache.is_busy());
   assert_eq!(cache.stamp(), Some(1));
   assert_eq!(cache.get_value().map(|v| *v), Some("before"));

   let value = cache.get_or_create_value(2, || "after");
   assert_eq!(*value, "after");
}

#[test]
fn test_try_get_or_create_value_recursive() {
   // The lock is held by the outer call, so the inner non-blocking call must give up
   let cache: StampedCache<u64, i32> = StampedCache::new();
   let value = cache.get_or_create_value(1, || {
      assert!(cache.is_busy());
      let inner = cache.try_get_or_create_value(2, || 99);
      assert!(inner.is_none(), "Expected try_get_or_create_value to fail while locked");
      42
   });
   assert_eq!(*value, 42);
   assert_eq!(cache.stamp(), Some(1));

   // Once released it computes normally, and a current entry needs no lock
   assert_eq!(cache.try_get_or_create_value(2, || 99).map(|v| *v), Some(99));
   assert_eq!(cache.try_get_or_create_value(1, || 0).map(|v| *v), Some(99));
}

#[test]
fn test_stamp_never_rolls_back_and_into_entry() {
   let cache = StampedCache::new();
   cache.get_or_create_value(4u64, || String::from("four"));

   // A lower stamp later in the instance's life never replaces the stored entry
   let value = cache.get_or_create_value(0, || String::from("zero"));
   assert_eq!(value.as_str(), "four");
   assert_eq!(cache.stamp(), Some(4));
   drop(value);

   let entry = cache.into_entry().expect("entry must be present");
   let (stamp, value) = Ref::try_unwrap(entry).expect("last handle").into_parts();
   assert_eq!((stamp, value.as_str()), (4, "four"));

   let empty: StampedCache<u64, String> = StampedCache::new();
   assert!(empty.into_entry().is_none());
}

#[test]
fn test_debug() {
   let cache: StampedCache<u64, &str> = StampedCache::new();
   assert_eq!(format!("{cache:?}"), "StampedCache(<empty>)");
   cache.get_or_create_value(1, || "one");
   assert_eq!(
      format!("{cache:?}"),
      r#"StampedCache(Entry { stamp: 1, value: "one" })"#
   );
}

#[test]
fn test_contended_first_write_computes_once() {
   const CALLERS: usize = 1000;
   let cache = Arc::new(StampedCache::new());
   let counter = Arc::new(AtomicUsize::new(0));
   let barrier = Arc::new(Barrier::new(CALLERS));

   let threads: Vec<_> = (0..CALLERS)
      .map(|_| {
         let cache = Arc::clone(&cache);
         let counter = Arc::clone(&counter);
         let barrier = Arc::clone(&barrier);
         thread::spawn(move || {
            barrier.wait();
            *cache.get_or_create_value(7u64, || {
               counter.fetch_add(1, Ordering::SeqCst);
               thread::sleep(Duration::from_millis(20));
               "V"
            })
         })
      })
      .collect();

   for handle in threads {
      assert_eq!(handle.join().unwrap(), "V");
   }
   assert_eq!(counter.load(Ordering::SeqCst), 1);
   assert_eq!(cache.get_value().map(|v| *v), Some("V"));
}

#[test]
fn test_distinct_stamps_converge_to_maximum() {
   const CALLERS: u64 = 256;
   let cache = Arc::new(StampedCache::new());
   let barrier = Arc::new(Barrier::new(CALLERS as usize));

   // Spawn order is a permutation of the stamps so submission order is scrambled
   let threads: Vec<_> = (0..CALLERS)
      .map(|i| {
         let stamp = (i * 97) % CALLERS + 1;
         let cache = Arc::clone(&cache);
         let barrier = Arc::clone(&barrier);
         thread::spawn(move || {
            barrier.wait();
            let value = cache.get_or_create_value(stamp, || stamp * 10);
            // Whatever came back was computed for at least our stamp
            assert!(*value.stamp() >= stamp);
            assert_eq!(*value, *value.stamp() * 10);
         })
      })
      .collect();
   for handle in threads {
      handle.join().unwrap();
   }

   assert_eq!(cache.stamp(), Some(CALLERS));
   assert_eq!(cache.get_value().map(|v| *v), Some(CALLERS * 10));
}

#[test]
fn test_computations_never_overlap() {
   let cache = Arc::new(StampedCache::new());
   let inside = Arc::new(AtomicUsize::new(0));
   let computed = Arc::new(AtomicUsize::new(0));

   let threads: Vec<_> = (1..=32u64)
      .map(|stamp| {
         let cache = Arc::clone(&cache);
         let inside = Arc::clone(&inside);
         let computed = Arc::clone(&computed);
         thread::spawn(move || {
            cache.get_or_create_value(stamp, || {
               assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
               computed.fetch_add(1, Ordering::SeqCst);
               thread::sleep(Duration::from_millis(1));
               inside.fetch_sub(1, Ordering::SeqCst);
               stamp
            });
         })
      })
      .collect();
   for handle in threads {
      handle.join().unwrap();
   }

   // Every accepted transition raised the stamp, so at most one computation per stamp
   let computed = computed.load(Ordering::SeqCst);
   assert!((1..=32).contains(&computed));
   assert_eq!(cache.get_value().map(|v| *v), Some(32));
}

#[test]
fn test_readers_never_see_torn_entries() {
   const WRITERS: u64 = 8;
   const ROUNDS: u64 = 500;
   let cache = Arc::new(StampedCache::<u64, (u64, u64)>::new());
   let done = Arc::new(AtomicBool::new(false));

   let readers: Vec<_> = (0..4)
      .map(|_| {
         let cache = Arc::clone(&cache);
         let done = Arc::clone(&done);
         thread::spawn(move || {
            let mut last_seen = 0u64;
            while !done.load(Ordering::Relaxed) {
               if let Some(entry) = cache.get_value() {
                  let (stamp, value): (u64, &(u64, u64)) = (*entry.stamp(), entry.value());
                  assert_eq!(*value, (stamp, stamp * 3));
                  assert!(stamp >= last_seen, "stamp went backwards");
                  last_seen = stamp;
               }
            }
         })
      })
      .collect();

   let writers: Vec<_> = (0..WRITERS)
      .map(|w| {
         let cache = Arc::clone(&cache);
         thread::spawn(move || {
            for round in 0..ROUNDS {
               let stamp = round * WRITERS + w + 1;
               cache.get_or_create_value(stamp, || (stamp, stamp * 3));
            }
         })
      })
      .collect();
   for handle in writers {
      handle.join().unwrap();
   }
   done.store(true, Ordering::Relaxed);
   for handle in readers {
      handle.join().unwrap();
   }

   assert_eq!(cache.stamp(), Some(ROUNDS * WRITERS));
}

#[test]
fn test_failure_isolated_from_other_callers() {
   let cache = Arc::new(StampedCache::new());
   cache.get_or_create_value(1u64, || 1u64);

   let failing = {
      let cache = Arc::clone(&cache);
      thread::spawn(move || {
         cache.get_or_try_create_value(100, || {
            thread::sleep(Duration::from_millis(20));
            Err::<u64, _>("boom")
         })
      })
   };
   // Give the failing call a head start so others queue behind it
   thread::sleep(Duration::from_millis(5));
   let others: Vec<_> = (2..=10u64)
      .map(|stamp| {
         let cache = Arc::clone(&cache);
         thread::spawn(move || cache.get_or_try_create_value(stamp, || Ok::<_, &str>(stamp)))
      })
      .collect();

   assert_eq!(failing.join().unwrap().map(|v| *v), Err("boom"));
   for handle in others {
      assert!(handle.join().unwrap().is_ok());
   }
   assert_eq!(cache.stamp(), Some(10));
   assert_eq!(cache.get_value().map(|v| *v), Some(10));
}
