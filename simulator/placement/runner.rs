// Placement Simulation Runner

use super::config::{ConfigError, MemberSelection, PlacementConfig, PlacementEvent};
use super::factory::{create_members, name_generator};
use super::stats::{DistributionReport, RoundMetrics, SimulationResult};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use replica_placement::{
    MemberName, NameGenerator, Network, NetworkConfig, NetworkError, Timestamp,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Network(#[from] NetworkError),
}

/// Drives a `Network` through ticks, membership events and distributions
pub struct PlacementRunner {
    config: PlacementConfig,
    seed: [u8; 32],
    rng: StdRng,
    network: Network,
    names: Box<dyn NameGenerator>,

    /// First grid point of every generated dataset
    data_start: Timestamp,

    /// Followed dataset
    dataset: Option<String>,

    // Metrics
    members_joined: usize,
    members_left: usize,
    deliveries: usize,
    round_metrics: Vec<RoundMetrics>,
}

impl PlacementRunner {
    pub fn new(config: PlacementConfig) -> Result<Self, SimulationError> {
        let seed = config.resolve_seed();
        let mut rng = StdRng::from_seed(seed);

        let mut network_seed = [0u8; 32];
        rng.fill(&mut network_seed);
        let mut names_seed = [0u8; 32];
        rng.fill(&mut names_seed);

        let data_start = config.network.start_time()?;
        let frequency = config.network.frequency;
        let span = config.initial_state.span() as i32;
        let now = data_start + frequency.as_duration() * span;

        let mut network = Network::new(NetworkConfig {
            start_time: now,
            frequency,
            policy: config.network.policy,
            seed: Some(network_seed),
        });

        let mut names = name_generator(&config.initial_state.naming, names_seed);
        let initial = create_members(
            names.as_mut(),
            config.initial_state.num_members,
            config.initial_state.columns_per_member,
            data_start,
            now,
            frequency,
        );
        network.add_members(initial)?;

        let dataset = match config.distribution.dataset {
            Some(ref column) => Some(column.clone()),
            None => network.dataset_names().first().map(|name| name.to_string()),
        };
        if let Some(ref column) = dataset {
            if network.owner_of(column).is_none() {
                warn!("followed dataset {} has no owner yet", column);
            }
        }

        Ok(Self {
            config,
            seed,
            rng,
            network,
            names,
            data_start,
            dataset,
            members_joined: 0,
            members_left: 0,
            deliveries: 0,
            round_metrics: Vec::new(),
        })
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Main simulation loop
    pub fn run(mut self) -> Result<SimulationResult, SimulationError> {
        info!(
            "starting placement simulation: {} members, {} rounds, policy {}",
            self.network.len(),
            self.config.rounds,
            self.network.policy()
        );

        if self.config.distribution.at_start {
            self.distribute_followed()?;
        }

        for round in 0..self.config.rounds {
            let events: Vec<PlacementEvent> = self.config.events.due(round).cloned().collect();
            for event in events {
                self.apply_event(event)?;
            }

            self.network.tick();

            let every = self.config.distribution.every;
            if every > 0 && (round + 1) % every == 0 {
                self.distribute_followed()?;
            }

            let metrics = RoundMetrics::collect(&self.network, self.dataset.as_deref(), round);
            if self.config.output.verbose {
                print_progress(&metrics, self.config.rounds);
            }
            self.round_metrics.push(metrics);
        }

        let final_report = self
            .dataset
            .as_deref()
            .and_then(|column| DistributionReport::collect(&self.network, column));
        let tree = (self.config.output.show_tree && !self.network.is_empty())
            .then(|| self.network.tree().to_string());

        Ok(SimulationResult {
            seed_used: self.seed,
            rounds_completed: self.config.rounds,
            policy: self.network.policy(),
            dataset: self.dataset,
            final_members: self.network.len(),
            members_joined: self.members_joined,
            members_left: self.members_left,
            deliveries: self.deliveries,
            round_metrics: self.round_metrics,
            final_report,
            tree,
            show_bars: self.config.output.show_bars,
        })
    }

    fn distribute_followed(&mut self) -> Result<(), SimulationError> {
        if let Some(ref column) = self.dataset {
            self.deliveries += self.network.distribute(column)?.unwrap_or(0);
        }
        Ok(())
    }

    fn apply_event(&mut self, event: PlacementEvent) -> Result<(), SimulationError> {
        match event {
            PlacementEvent::MemberJoin {
                count,
                columns_per_member,
            } => {
                let joining = create_members(
                    self.names.as_mut(),
                    count,
                    columns_per_member,
                    self.data_start,
                    self.network.current_time(),
                    self.network.frequency(),
                );
                self.network.add_members(joining)?;
                self.members_joined += count;
            }

            PlacementEvent::MemberLeave { selection } => {
                for name in self.select_members(selection) {
                    match self.network.remove_member(&name) {
                        Ok(_) => self.members_left += 1,
                        Err(e) => warn!("skipping leave: {}", e),
                    }
                }
            }

            PlacementEvent::SetPolicy { policy } => {
                self.network.set_policy(policy);
            }

            PlacementEvent::Distribute { dataset } => {
                self.deliveries += match dataset {
                    Some(column) => self.network.distribute(&column)?.unwrap_or(0),
                    None => self.network.distribute_all()?,
                };
            }

            PlacementEvent::ReportStats => {
                println!(
                    "--- Report at {} ({} members) ---",
                    self.network.current_time(),
                    self.network.len()
                );
                match self.dataset.as_deref() {
                    Some(column) => match DistributionReport::collect(&self.network, column) {
                        Some(report) => report.print(self.config.output.show_bars),
                        None => println!("Dataset {} has no data yet.\n", column),
                    },
                    None => println!("No dataset to report on.\n"),
                }
            }
        }
        Ok(())
    }

    fn select_members(&mut self, selection: MemberSelection) -> Vec<MemberName> {
        match selection {
            MemberSelection::Specific { names } => names,
            MemberSelection::Random { count } => {
                let protected = self
                    .dataset
                    .as_deref()
                    .and_then(|column| self.network.owner_of(column))
                    .map(|owner| owner.name().to_string());

                let candidates: Vec<MemberName> = self
                    .network
                    .member_names()
                    .into_iter()
                    .filter(|name| Some(*name) != protected.as_deref())
                    .map(str::to_string)
                    .collect();
                let chosen: Vec<MemberName> = candidates
                    .choose_multiple(&mut self.rng, count)
                    .cloned()
                    .collect();
                debug!("random leave selected {:?}", chosen);
                chosen
            }
        }
    }
}

fn print_progress(metrics: &RoundMetrics, rounds: usize) {
    let coverage = metrics
        .coverage
        .map(|(_, avg, _)| format!("{:.1}%", avg))
        .unwrap_or_else(|| "-".to_string());
    let copies = metrics
        .copies
        .map(|(min, max)| format!("{}..{}", min, max))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "Round {}/{} at {}: {} members, avg coverage {}, copies {}",
        metrics.round + 1,
        rounds,
        metrics.time,
        metrics.members,
        coverage,
        copies
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::config::{EventSchedule, ScheduledEvent};
    use replica_placement::TreePolicy;

    fn config(rounds: usize, events: Vec<ScheduledEvent>) -> PlacementConfig {
        let mut config = PlacementConfig {
            rounds,
            seed: Some([5u8; 32]),
            events: EventSchedule { events },
            ..PlacementConfig::default()
        };
        config.initial_state.num_members = 3;
        config.output.show_tree = false;
        config
    }

    #[test]
    fn test_initial_network() {
        let runner = PlacementRunner::new(config(0, Vec::new())).unwrap();
        let network = runner.network();

        assert_eq!(network.member_names(), vec!["node-1", "node-2", "node-3"]);
        assert_eq!(network.dataset_names(), vec!["node-1-1", "node-2-1", "node-3-1"]);
        // three periods of history, clock sits on the last one
        let own = network.owner_of("node-1-1").and_then(|m| m.own_data()).unwrap();
        assert_eq!(own.len(), 4);
        assert_eq!(own.latest(), Some(network.current_time()));
    }

    #[test]
    fn test_run_with_joins_and_leaves() {
        let events = vec![
            ScheduledEvent {
                round: 1,
                event: PlacementEvent::MemberJoin {
                    count: 2,
                    columns_per_member: 0,
                },
            },
            ScheduledEvent {
                round: 3,
                event: PlacementEvent::MemberLeave {
                    selection: MemberSelection::Random { count: 1 },
                },
            },
            ScheduledEvent {
                round: 4,
                event: PlacementEvent::MemberLeave {
                    selection: MemberSelection::Specific {
                        names: vec!["missing".to_string()],
                    },
                },
            },
        ];
        let result = PlacementRunner::new(config(6, events)).unwrap().run().unwrap();

        assert_eq!(result.rounds_completed, 6);
        assert_eq!(result.dataset.as_deref(), Some("node-1-1"));
        assert_eq!(result.members_joined, 2);
        assert_eq!(result.members_left, 1);
        assert_eq!(result.final_members, 4);
        assert_eq!(result.round_metrics.len(), 6);
        assert_eq!(result.round_metrics[0].members, 3);
        assert_eq!(result.round_metrics[1].members, 5);

        // distributing after every tick leaves no period of the dataset uncovered
        let last = result.round_metrics.last().unwrap();
        assert!(last.copies.is_some_and(|(min, _)| min >= 1));

        let report = result.final_report.unwrap();
        assert_eq!(report.intervals.len(), 4);
        assert!(report.intervals.iter().all(|row| row.member != "missing"));
    }

    #[test]
    fn test_same_seed_same_result() {
        let events = vec![ScheduledEvent {
            round: 2,
            event: PlacementEvent::MemberLeave {
                selection: MemberSelection::Random { count: 2 },
            },
        }];
        let mut cfg = config(5, events);
        cfg.network.policy = TreePolicy::BalancedRandom;
        cfg.initial_state.num_members = 6;

        let a = PlacementRunner::new(cfg.clone()).unwrap().run().unwrap();
        let b = PlacementRunner::new(cfg).unwrap().run().unwrap();

        let bars = |r: &SimulationResult| r.final_report.as_ref().map(|report| report.occupancy.clone());
        assert_eq!(bars(&a), bars(&b));
        assert_eq!(a.final_members, 4);
    }

    #[test]
    fn test_distribute_event_without_schedule() {
        let mut cfg = config(2, Vec::new());
        cfg.distribution.every = 0;
        cfg.distribution.at_start = false;
        cfg.events = EventSchedule {
            events: vec![ScheduledEvent {
                round: 1,
                event: PlacementEvent::Distribute { dataset: None },
            }],
        };

        let result = PlacementRunner::new(cfg).unwrap().run().unwrap();
        // three datasets, three members each
        assert_eq!(result.deliveries, 9);
        assert_eq!(result.round_metrics[0].copies, None);
    }
}
