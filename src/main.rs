use dynpool::{Config, DynamicPool};
use std::time::Instant;

fn main() {
    let cpus = num_cpus::get();
    let pool = DynamicPool::new(
        Config {
            initial_workers: cpus,
            max_workers: cpus * 2,
            lifetime: 100_000,
        },
        |n: u64| n.wrapping_mul(n),
    )
    .unwrap();

    let now = Instant::now();
    let handles: Vec<_> = (0..1_000_000u64)
        .map(|i| pool.submit(i).unwrap())
        .collect();

    let mut checksum = 0u64;
    for handle in handles {
        checksum ^= handle.wait().unwrap_or(0);
    }

    let status = pool.status();
    println!(
        "executed {} items in {:?} (failed: {}, checksum: {checksum:x})",
        status.executed(),
        now.elapsed(),
        status.failed,
    );
    pool.shutdown();
}
