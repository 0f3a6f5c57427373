// Placement Simulator Configuration

use log::LevelFilter;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use replica_placement::rp_interface::{parse_timestamp, ParseError};
use replica_placement::{Frequency, MemberName, Timestamp, TreePolicy};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("unknown log level '{0}'")]
    LogLevel(String),
}

// ============================================================================
// Main Configuration
// ============================================================================

/// Main configuration for a placement simulation
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Number of ticks to simulate
    pub rounds: usize,

    /// Random seed for reproducibility (set from the command line, not YAML)
    #[serde(skip)]
    pub seed: Option<[u8; 32]>,

    /// Network clock and tree layout
    pub network: NetworkSettings,

    /// Members present before the first tick
    pub initial_state: InitialState,

    /// Which dataset gets distributed, and how often
    pub distribution: DistributionConfig,

    /// Scheduled membership changes and reports
    pub events: EventSchedule,

    pub output: OutputConfig,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            rounds: 30,
            seed: None,
            network: NetworkSettings::default(),
            initial_state: InitialState::default(),
            distribution: DistributionConfig::default(),
            events: EventSchedule::default(),
            output: OutputConfig::default(),
        }
    }
}

impl PlacementConfig {
    /// Get or generate seed
    pub fn resolve_seed(&self) -> [u8; 32] {
        self.seed.unwrap_or_else(|| {
            let mut temp_rng = StdRng::from_entropy();
            let mut seed = [0u8; 32];
            temp_rng.fill_bytes(&mut seed);
            seed
        })
    }
}

// ============================================================================
// Network Settings
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// First grid point of the initial datasets, e.g. "2000-01-01" or "2000-01-01 06:00"
    pub start: String,

    /// Clock step, pandas style ("1h", "15min", "1d")
    pub frequency: Frequency,

    pub policy: TreePolicy,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            start: "2000-01-01".to_string(),
            frequency: Frequency::hours(1),
            policy: TreePolicy::default(),
        }
    }
}

impl NetworkSettings {
    pub fn start_time(&self) -> Result<Timestamp, ConfigError> {
        Ok(parse_timestamp(&self.start)?)
    }
}

// ============================================================================
// Initial State
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InitialState {
    pub num_members: usize,

    /// Own datasets per member, named `<member>-1`, `<member>-2`, ...
    pub columns_per_member: usize,

    /// Periods of history each initial dataset covers (default: one per member)
    pub span_periods: Option<usize>,

    pub naming: NamingMode,
}

impl Default for InitialState {
    fn default() -> Self {
        Self {
            num_members: 7,
            columns_per_member: 1,
            span_periods: None,
            naming: NamingMode::default(),
        }
    }
}

impl InitialState {
    pub fn span(&self) -> usize {
        self.span_periods.unwrap_or(self.num_members)
    }
}

/// How new members get their names
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum NamingMode {
    /// `<prefix>-1`, `<prefix>-2`, ...
    Sequential { prefix: String },

    /// Random words drawn from the simulation seed
    Words,
}

impl Default for NamingMode {
    fn default() -> Self {
        Self::Sequential {
            prefix: "node".to_string(),
        }
    }
}

// ============================================================================
// Distribution
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DistributionConfig {
    /// Dataset to follow; the first dataset name (sorted) when absent
    pub dataset: Option<String>,

    /// Distribute after every N ticks (0 = only on events)
    pub every: usize,

    /// Distribute once before the first tick
    pub at_start: bool,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            dataset: None,
            every: 1,
            at_start: true,
        }
    }
}

// ============================================================================
// Event Scheduling
// ============================================================================

/// Schedule of network events
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct EventSchedule {
    pub events: Vec<ScheduledEvent>,
}

impl EventSchedule {
    /// Events due in `round`, in file order
    pub fn due(&self, round: usize) -> impl Iterator<Item = &PlacementEvent> + '_ {
        self.events
            .iter()
            .filter(move |scheduled| scheduled.round == round)
            .map(|scheduled| &scheduled.event)
    }
}

/// A single scheduled event
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduledEvent {
    /// Round number when event triggers (before that round's tick)
    pub round: usize,

    pub event: PlacementEvent,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlacementEvent {
    /// Add members; their own data spans from the initial start to now
    MemberJoin {
        count: usize,
        #[serde(default)]
        columns_per_member: usize,
    },

    /// Remove members (the owner of the followed dataset is never picked at random)
    MemberLeave { selection: MemberSelection },

    /// Switch tree layout; takes effect with the next rebuild
    SetPolicy { policy: TreePolicy },

    /// Extra distribution; all datasets when `dataset` is absent
    Distribute {
        #[serde(default)]
        dataset: Option<String>,
    },

    /// Print intervals and occupancy bars for the followed dataset
    ReportStats,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MemberSelection {
    Random { count: usize },
    Specific { names: Vec<MemberName> },
}

// ============================================================================
// Output Configuration
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Print a progress line per round
    pub verbose: bool,

    /// Print per-member occupancy bars and copy depth bars in the summary
    pub show_bars: bool,

    /// Print the final assignment tree
    pub show_tree: bool,

    /// `error`, `warn`, `info`, `debug` or `trace`
    pub log_level: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            show_bars: true,
            show_tree: true,
            log_level: "warn".to_string(),
        }
    }
}

impl OutputConfig {
    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        self.log_level
            .parse()
            .map_err(|_| ConfigError::LogLevel(self.log_level.clone()))
    }
}

// ============================================================================
// Scenario Files
// ============================================================================

/// Scenario file format
#[derive(Debug, Deserialize)]
pub struct ScenarioFile {
    #[serde(default)]
    pub meta: ScenarioMeta,

    pub config: PlacementConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScenarioMeta {
    pub name: Option<String>,
    pub description: Option<String>,
    pub hypothesis: Option<String>,
}

impl ScenarioFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    pub fn parse(content: &str, origin: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|source| ConfigError::Yaml {
            path: origin.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
meta:
  name: Growing network
config:
  rounds: 12
  network:
    start: "2000-01-01 00:00"
    frequency: 1h
    policy: ordered_ltor
  initial_state:
    num_members: 3
    naming:
      mode: sequential
      prefix: peer
  events:
    - round: 2
      event:
        type: member_join
        count: 2
    - round: 5
      event:
        type: member_leave
        selection:
          mode: specific
          names: [peer-2]
    - round: 5
      event:
        type: report_stats
  output:
    log_level: info
"#;

    #[test]
    fn test_parse_scenario() {
        let scenario = ScenarioFile::parse(SCENARIO, "inline").unwrap();
        let config = scenario.config;

        assert_eq!(scenario.meta.name.as_deref(), Some("Growing network"));
        assert_eq!(config.rounds, 12);
        assert_eq!(config.network.frequency, Frequency::hours(1));
        assert_eq!(config.network.policy, TreePolicy::OrderedLtoR);
        assert_eq!(config.initial_state.num_members, 3);
        assert_eq!(config.initial_state.span(), 3);
        assert!(matches!(
            config.initial_state.naming,
            NamingMode::Sequential { ref prefix } if prefix == "peer"
        ));

        // untouched sections keep their defaults
        assert_eq!(config.distribution.every, 1);
        assert!(config.output.show_bars);
        assert_eq!(config.output.level_filter().unwrap(), LevelFilter::Info);
        assert!(config.seed.is_none());
    }

    #[test]
    fn test_events_due() {
        let config = ScenarioFile::parse(SCENARIO, "inline").unwrap().config;

        assert_eq!(config.events.due(0).count(), 0);
        assert!(matches!(
            config.events.due(2).next(),
            Some(PlacementEvent::MemberJoin { count: 2, columns_per_member: 0 })
        ));

        let round_five: Vec<_> = config.events.due(5).collect();
        assert_eq!(round_five.len(), 2);
        assert!(matches!(round_five[1], PlacementEvent::ReportStats));
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let bad_frequency = "config:\n  network:\n    frequency: often\n";
        assert!(matches!(
            ScenarioFile::parse(bad_frequency, "inline"),
            Err(ConfigError::Yaml { .. })
        ));

        let settings = NetworkSettings {
            start: "yesterday".to_string(),
            ..NetworkSettings::default()
        };
        assert!(matches!(settings.start_time(), Err(ConfigError::Parse(_))));

        let output = OutputConfig {
            log_level: "loud".to_string(),
            ..OutputConfig::default()
        };
        assert!(output.level_filter().is_err());
    }

    #[test]
    fn test_resolve_seed() {
        let config = PlacementConfig {
            seed: Some([9u8; 32]),
            ..PlacementConfig::default()
        };
        assert_eq!(config.resolve_seed(), [9u8; 32]);
    }
}
