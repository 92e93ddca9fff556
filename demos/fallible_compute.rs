use stamp_cell::StampedCache;

fn parse_config(generation: u64, text: &str) -> Result<u32, String> {
   println!("Parsing generation {generation}...");
   text.trim().parse().map_err(|err| format!("generation {generation}: {err}"))
}

fn main() {
   let config = StampedCache::new();

   let value = config.get_or_try_create_value(1u64, || parse_config(1, "8080"));
   assert_eq!(value.map(|v| *v), Ok(8080));

   // A broken edit fails for its caller only; the last good value stays published.
   match config.get_or_try_create_value(2, || parse_config(2, "80a0")) {
      Ok(_) => panic!("Should have failed"),
      Err(e) => println!("Caught error: {e}"),
   }
   assert_eq!(config.stamp(), Some(1));
   assert_eq!(config.get_value().map(|v| *v), Some(8080));

   // Fixing it under the same generation succeeds.
   let value = config.get_or_try_create_value(2, || parse_config(2, "8000"));
   assert_eq!(value.map(|v| *v), Ok(8000));
   println!("Final config: {:?}", config);
}
