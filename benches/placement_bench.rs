use log::LevelFilter;
use rand::rngs::StdRng;
use rand::SeedableRng;
use replica_placement::rp_interface::parse_timestamp;
use replica_placement::{
    AssignmentTree, Dataset, Frequency, Member, Network, NetworkConfig, TimeRange, TreePolicy,
};
use simple_logger::SimpleLogger;
use std::time::Instant;

/// Benchmark tree rebuilds and full distributions per policy and network size
fn main() {
    if let Err(e) = SimpleLogger::new().with_level(LevelFilter::Error).init() {
        eprintln!("logger already initialised: {}", e);
    }

    println!("\n=== Assignment Tree Build Benchmark ===\n");
    println!("{:<20} {:>10} {:>14} {:>8}", "Policy", "Members", "Build (us)", "Depth");
    println!("{}", "-".repeat(56));

    let mut rng = StdRng::from_seed([0x42u8; 32]);
    for policy in TreePolicy::ALL {
        for size in [16usize, 256, 4096] {
            let names: Vec<String> = (0..size).map(|i| format!("node-{}", i)).collect();

            // Warm-up
            let _ = AssignmentTree::build(policy, &names, &mut rng);

            let samples = 20;
            let mut total_time = 0.0;
            let mut depth = 0;
            for _ in 0..samples {
                let start = Instant::now();
                let tree = AssignmentTree::build(policy, &names, &mut rng);
                total_time += start.elapsed().as_secs_f64();
                depth = tree.depth();
            }

            let avg_us = total_time / samples as f64 * 1_000_000.0;
            println!("{:<20} {:>10} {:>14.1} {:>8}", policy.to_string(), size, avg_us, depth);
        }
    }

    println!("\n=== Distribution Benchmark (one week hourly) ===\n");
    println!("{:<10} {:>16}", "Members", "Distribute (ms)");
    println!("{}", "-".repeat(28));

    let start = match parse_timestamp("2000-01-01") {
        Ok(start) => start,
        Err(e) => {
            eprintln!("Error: {}", e);
            return;
        }
    };
    let frequency = Frequency::hours(1);
    let end = start + frequency.as_duration() * (7 * 24);

    for size in [4usize, 64, 512] {
        let mut network = Network::new(NetworkConfig {
            start_time: end,
            frequency,
            policy: TreePolicy::BalancedLtoR,
            seed: Some([0x42u8; 32]),
        });

        let data = Dataset::observed(frequency, TimeRange::closed(start, end), &["x"]);
        let members = std::iter::once(Member::with_data("owner", data))
            .chain((1..size).map(|i| Member::new(format!("node-{}", i))));
        if let Err(e) = network.add_members(members) {
            eprintln!("Error: {}", e);
            return;
        }

        let begin = Instant::now();
        if let Err(e) = network.distribute("x") {
            eprintln!("Error: {}", e);
            return;
        }
        let elapsed_ms = begin.elapsed().as_secs_f64() * 1000.0;
        println!("{:<10} {:>16.3}", size, elapsed_ms);
    }

    println!();
}
