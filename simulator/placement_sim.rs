// Placement simulation example
//
// Seven members with a week of hourly history; one member joins every hour
// and the first dataset is redistributed after every tick. Runs the same
// schedule once per tree policy so the occupancy pictures can be compared.
//
// Usage:
//   cargo run --example placement_sim

mod placement;

use log::LevelFilter;
use placement::{PlacementConfig, PlacementEvent, PlacementRunner, ScheduledEvent};
use replica_placement::TreePolicy;
use simple_logger::SimpleLogger;

fn main() {
    if let Err(e) = SimpleLogger::new().with_level(LevelFilter::Warn).init() {
        eprintln!("logger already initialised: {}", e);
    }

    let rounds = 30;
    let joins: Vec<ScheduledEvent> = (0..rounds)
        .map(|round| ScheduledEvent {
            round,
            event: PlacementEvent::MemberJoin {
                count: 1,
                columns_per_member: 1,
            },
        })
        .chain(std::iter::once(ScheduledEvent {
            round: rounds / 2,
            event: PlacementEvent::ReportStats,
        }))
        .collect();

    for policy in TreePolicy::ALL {
        println!("\nSimulating with tree policy {}", policy);

        let mut config = PlacementConfig {
            rounds,
            seed: Some([42u8; 32]),
            ..PlacementConfig::default()
        };
        config.network.policy = policy;
        config.initial_state.span_periods = Some(7 * 24);
        config.events.events = joins.clone();
        config.output.show_bars = false;

        let result = PlacementRunner::new(config).and_then(PlacementRunner::run);
        match result {
            Ok(result) => result.print_summary(),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}
