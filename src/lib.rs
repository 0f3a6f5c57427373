//! # replica-placement - Progressive dataset replication over a peer network
//!
//! A deterministic, single-process model of how a dataset that originates at
//! one member of a growing/shrinking network gets replicated to the others,
//! and how much of it each member holds over time.
//!
//! ## Core Components
//!
//! - **Dataset**: named counter columns over a regular time grid, with an
//!   additive zero-filling merge
//! - **AssignmentTree**: binary tree over member names yielding the canonical
//!   `left_to_right` member order
//! - **Member**: own (originated) data plus accumulated received data
//! - **Network**: registry, dataset ownership, interval partitioning and
//!   distribution, replication statistics
//!
//! ## Usage
//!
//! The library does not drive time by itself. A driver advances the clock,
//! changes membership and distributes datasets at its own cadence:
//!
//! ```no_run
//! use replica_placement::{Dataset, Frequency, Member, Network, NetworkConfig, TimeRange};
//! use replica_placement::rp_interface::parse_timestamp;
//!
//! let start = parse_timestamp("2000-01-01").unwrap();
//! let end = parse_timestamp("2000-01-01 09:00").unwrap();
//!
//! let mut network = Network::new(NetworkConfig {
//!     start_time: end,
//!     ..NetworkConfig::default()
//! });
//!
//! let data = Dataset::observed(Frequency::hours(1), TimeRange::closed(start, end), &["x"]);
//! network.add_member(Member::with_data("alpha", data))?;
//! network.add_member(Member::new("beta"))?;
//!
//! network.distribute("x")?;
//! network.tick();
//!
//! for (at, copies) in network.dataset_copies("x") {
//!     println!("{at}: {copies}");
//! }
//! # Ok::<(), replica_placement::NetworkError>(())
//! ```
//!
//! ## Simulation
//!
//! The YAML-driven simulator in `simulator/` builds members from a config,
//! runs join/leave/distribute schedules and prints coverage reports.

pub mod rp_interface;
pub mod rp_dataset;
pub mod rp_tree;
pub mod rp_member;
pub mod rp_naming;
pub mod rp_network;

// Re-export commonly used types
pub use rp_dataset::{Dataset, DatasetError};
pub use rp_interface::{
    ColumnName, Count, Frequency, MemberName, ParseError, TimeRange, Timestamp, TreePolicy,
};
pub use rp_member::Member;
pub use rp_naming::{derive_name, NameGenerator, SequentialNames, WordNames};
pub use rp_network::{CoverageStats, Network, NetworkConfig, NetworkError};
pub use rp_tree::{AssignmentTree, Direction};
