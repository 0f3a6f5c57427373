// Placement Simulator Statistics and Reports

use replica_placement::{CoverageStats, MemberName, Network, TimeRange, Timestamp, TreePolicy};

const OWN_INTERVAL: char = '█';
const RECEIVED: char = '▒';
const MISSING: char = '-';

// ============================================================================
// Per-round metrics
// ============================================================================

/// Snapshot taken after each round
#[derive(Debug, Clone)]
pub struct RoundMetrics {
    pub round: usize,
    pub time: Timestamp,
    pub members: usize,

    /// (min, avg, max) coverage in percent of the followed dataset
    pub coverage: Option<(f64, f64, f64)>,

    /// (min, max) copies over the replicated range
    pub copies: Option<(usize, usize)>,
}

impl RoundMetrics {
    pub fn collect(network: &Network, dataset: Option<&str>, round: usize) -> Self {
        let coverage = dataset
            .and_then(|column| network.coverage_stats(column))
            .map(|stats| (stats.min_percent, stats.avg_percent, stats.max_percent));

        let copies = dataset.and_then(|column| {
            let copies = network.dataset_copies(column);
            let min = copies.values().min().copied()?;
            let max = copies.values().max().copied()?;
            Some((min, max))
        });

        Self {
            round,
            time: network.current_time(),
            members: network.len(),
            coverage,
            copies,
        }
    }
}

// ============================================================================
// Distribution report
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct IntervalRow {
    pub member: MemberName,
    pub range: TimeRange,
    /// Grid points of the dataset inside the interval
    pub periods: usize,
}

/// One character per grid point of the dataset: own interval, received
/// elsewhere, or missing
#[derive(Debug, Clone, PartialEq)]
pub struct OccupancyBar {
    pub member: MemberName,
    pub bar: String,
}

#[derive(Debug, Clone)]
pub struct DistributionReport {
    pub dataset: String,
    pub earliest: Timestamp,
    pub latest: Timestamp,
    pub intervals: Vec<IntervalRow>,
    pub occupancy: Vec<OccupancyBar>,
    /// `(depth, bar)` from the highest copy count down to 1
    pub depth_bars: Vec<(usize, String)>,
    pub coverage: Option<CoverageStats>,
}

impl DistributionReport {
    /// `None` when nobody owns `dataset` or it has no grid points
    pub fn collect(network: &Network, dataset: &str) -> Option<Self> {
        let data = network.get_dataset(dataset)?;
        let earliest = data.earliest()?;
        let latest = data.latest()?;
        let timestamps: Vec<Timestamp> = data.timestamps().collect();
        let intervals = network.get_intervals();

        let interval_rows = intervals
            .iter()
            .map(|(member, range)| IntervalRow {
                member: member.clone(),
                range: *range,
                periods: timestamps.iter().filter(|&&t| range.contains(t)).count(),
            })
            .collect();

        let occupancy = network
            .members()
            .filter_map(|member| {
                let received = member.received_data()?;
                let own = intervals.get(member.name());
                let bar = timestamps
                    .iter()
                    .map(|&t| {
                        if own.is_some_and(|range| range.contains(t)) {
                            OWN_INTERVAL
                        } else if received.value_at(dataset, t) > 0 {
                            RECEIVED
                        } else {
                            MISSING
                        }
                    })
                    .collect();
                Some(OccupancyBar {
                    member: member.name().to_string(),
                    bar,
                })
            })
            .collect();

        let copies = network.dataset_copies(dataset);
        let max_depth = copies.values().max().copied().unwrap_or(0);
        let depth_bars = (1..=max_depth)
            .rev()
            .map(|depth| {
                let bar = copies
                    .values()
                    .map(|&count| if count >= depth { OWN_INTERVAL } else { ' ' })
                    .collect();
                (depth, bar)
            })
            .collect();

        Some(Self {
            dataset: dataset.to_string(),
            earliest,
            latest,
            intervals: interval_rows,
            occupancy,
            depth_bars,
            coverage: network.coverage_stats(dataset),
        })
    }

    pub fn print(&self, show_bars: bool) {
        println!("Intervals of dataset {}:", self.dataset);
        for row in &self.intervals {
            println!("  {:<16} {} ({} periods)", row.member, row.range, row.periods);
        }
        println!();

        if show_bars {
            println!("Occupancy of dataset {}:", self.dataset);
            for row in &self.occupancy {
                println!("  [{}]{}[{}] -> {}", self.earliest, row.bar, self.latest, row.member);
            }
            println!();

            println!("Distribution of dataset {}:", self.dataset);
            for (depth, bar) in &self.depth_bars {
                println!("  {}| {} copies", bar, depth);
            }
            println!();
        }

        if let Some(ref coverage) = self.coverage {
            println!("Coverage of dataset {}:", self.dataset);
            println!(
                "  min={:.1}%, avg={:.1}%, max={:.1}%",
                coverage.min_percent, coverage.avg_percent, coverage.max_percent
            );
            println!();
        }
    }
}

// ============================================================================
// Simulation result
// ============================================================================

#[derive(Debug)]
pub struct SimulationResult {
    /// Seed used for the simulation
    pub seed_used: [u8; 32],

    pub rounds_completed: usize,
    pub policy: TreePolicy,

    /// Dataset followed by the metrics, if any member owned one
    pub dataset: Option<String>,

    pub final_members: usize,
    pub members_joined: usize,
    pub members_left: usize,

    /// Slices delivered over the whole run
    pub deliveries: usize,

    pub round_metrics: Vec<RoundMetrics>,
    pub final_report: Option<DistributionReport>,

    /// Rendered assignment tree at the end of the run
    pub tree: Option<String>,

    pub show_bars: bool,
}

impl SimulationResult {
    /// Print a summary of the simulation results
    pub fn print_summary(&self) {
        println!("\n╔════════════════════════════════════════════════════════╗");
        println!("║        Replica Placement Simulation Results            ║");
        println!("╚════════════════════════════════════════════════════════╝\n");

        println!("Configuration:");
        println!("  Seed: {:?}", self.seed_used);
        println!("  Rounds: {}", self.rounds_completed);
        println!("  Policy: {}", self.policy);
        if let Some(ref dataset) = self.dataset {
            println!("  Dataset: {}", dataset);
        }
        println!();

        println!("Membership:");
        println!("  Final members: {}", self.final_members);
        println!("  Joined: {}, left: {}", self.members_joined, self.members_left);
        println!("  Slices delivered: {}", self.deliveries);
        println!();

        let coverage: Vec<f64> = self
            .round_metrics
            .iter()
            .filter_map(|m| m.coverage.map(|(_, avg, _)| avg))
            .collect();
        if let (Some(first), Some(last)) = (coverage.first(), coverage.last()) {
            let peak = coverage.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            println!("Average coverage over time:");
            println!("  first={:.1}%, last={:.1}%, peak={:.1}%", first, last, peak);
            println!();
        }

        if let Some(ref report) = self.final_report {
            report.print(self.show_bars);
        }

        if let Some(ref tree) = self.tree {
            println!("Assignment tree:");
            println!("{}", tree);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replica_placement::rp_interface::parse_timestamp;
    use replica_placement::{Dataset, Frequency, Member, NetworkConfig};

    fn two_member_network() -> Network {
        let start = parse_timestamp("2000-01-01 00:00").unwrap();
        let end = parse_timestamp("2000-01-01 09:00").unwrap();
        let mut network = Network::new(NetworkConfig {
            start_time: end,
            frequency: Frequency::hours(1),
            policy: TreePolicy::BalancedLtoR,
            seed: Some([1u8; 32]),
        });

        let data = Dataset::observed(Frequency::hours(1), TimeRange::closed(start, end), &["x"]);
        network.add_member(Member::with_data("alpha", data)).unwrap();
        network.add_member(Member::new("beta")).unwrap();
        network
    }

    #[test]
    fn test_report_after_distribution() {
        let mut network = two_member_network();
        network.distribute("x").unwrap();

        let report = DistributionReport::collect(&network, "x").unwrap();
        let periods: Vec<(&str, usize)> = report
            .intervals
            .iter()
            .map(|row| (row.member.as_str(), row.periods))
            .collect();
        assert_eq!(periods, vec![("beta", 5), ("alpha", 5)]);

        let bars: Vec<(&str, &str)> = report
            .occupancy
            .iter()
            .map(|row| (row.member.as_str(), row.bar.as_str()))
            .collect();
        assert_eq!(bars, vec![("alpha", "-----█████"), ("beta", "█████-----")]);

        assert_eq!(report.depth_bars, vec![(1, "██████████".to_string())]);
        assert_eq!(report.coverage.unwrap().avg_percent, 50.0);
    }

    #[test]
    fn test_second_distribution_marks_received() {
        let mut network = two_member_network();
        network.distribute("x").unwrap();
        network.distribute("x").unwrap();

        // slices land on the same cells, so the picture is unchanged but every cell holds 2
        let report = DistributionReport::collect(&network, "x").unwrap();
        assert_eq!(report.occupancy[0].bar, "-----█████");
        assert_eq!(report.depth_bars.len(), 1);
        let received = network.member("beta").unwrap().received_data().unwrap();
        assert_eq!(received.column("x").unwrap(), &[2, 2, 2, 2, 2]);
    }

    #[test]
    fn test_round_metrics() {
        let mut network = two_member_network();

        let before = RoundMetrics::collect(&network, Some("x"), 0);
        assert_eq!(before.members, 2);
        assert_eq!(before.copies, None);
        assert_eq!(before.coverage, Some((0.0, 0.0, 0.0)));

        network.distribute("x").unwrap();
        let after = RoundMetrics::collect(&network, Some("x"), 1);
        assert_eq!(after.copies, Some((1, 1)));
        assert_eq!(after.coverage, Some((50.0, 50.0, 50.0)));

        let untracked = RoundMetrics::collect(&network, None, 2);
        assert!(untracked.coverage.is_none());
    }

    #[test]
    fn test_report_for_unknown_dataset() {
        let network = two_member_network();
        assert!(DistributionReport::collect(&network, "y").is_none());
    }
}
