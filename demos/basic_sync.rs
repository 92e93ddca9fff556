use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use stamp_cell::StampedCache;

static COMPUTATIONS: AtomicUsize = AtomicUsize::new(0);

/// Builds the completion model for a document generation. Expensive.
fn build_model(generation: u64) -> String {
   COMPUTATIONS.fetch_add(1, Ordering::Relaxed);
   println!("Building model for generation {generation}...");
   std::thread::sleep(std::time::Duration::from_millis(50));
   format!("model@{generation}")
}

fn main() {
   let models = Arc::new(StampedCache::new());

   // Five threads see the same document generation; only one builds the model.
   let threads: Vec<_> = (0..5)
      .map(|_| {
         let models = Arc::clone(&models);
         std::thread::spawn(move || {
            let model = models.get_or_create_value(1u64, || build_model(1));
            println!("Thread access: {}", *model);
         })
      })
      .collect();

   for t in threads {
      t.join().unwrap();
   }
   assert_eq!(COMPUTATIONS.load(Ordering::Relaxed), 1);

   // The document changed: the next request rebuilds, an older request does not.
   models.get_or_create_value(2, || build_model(2));
   let model = models.get_or_create_value(1, || build_model(1));
   assert_eq!(*model, "model@2");
   assert_eq!(COMPUTATIONS.load(Ordering::Relaxed), 2);
   println!("Final model: {model}");
}
