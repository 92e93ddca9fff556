use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use stamp_cell::{AsyncStampedCache, CancellationToken};
use tokio::time::{sleep, Duration};

static COMPUTATIONS: AtomicUsize = AtomicUsize::new(0);

async fn index_snapshot(generation: u64) -> Vec<String> {
   COMPUTATIONS.fetch_add(1, Ordering::Relaxed);
   println!("Indexing generation {generation}...");
   sleep(Duration::from_millis(50)).await;
   (0..generation).map(|i| format!("symbol{i}")).collect()
}

#[tokio::main]
async fn main() {
   let session = Arc::new(AsyncStampedCache::new());

   let tasks: Vec<_> = (1..=5u64)
      .map(|generation| {
         let session = Arc::clone(&session);
         tokio::spawn(async move {
            let snapshot = session
               .get_or_create_value(generation, || index_snapshot(generation))
               .await;
            println!("Task {generation} sees generation {}", snapshot.stamp());
         })
      })
      .collect();

   for t in tasks {
      t.await.unwrap();
   }
   assert_eq!(session.stamp(), Some(5));
   println!("Computed {} snapshots", COMPUTATIONS.load(Ordering::Relaxed));

   // A request that gives up stops waiting and leaves the snapshot alone.
   let token = CancellationToken::new();
   token.cancel();
   let result = session
      .get_or_create_value_cancellable(6, &token, || index_snapshot(6))
      .await;
   println!("Cancelled request: {:?}", result.map(|s| s.len()));
   assert_eq!(session.stamp(), Some(5));
}
