// Placement Simulator Module

pub mod config;
pub mod factory;
pub mod runner;
pub mod stats;

// Re-export commonly used types
pub use config::{
    ConfigError,
    PlacementConfig,
    PlacementEvent,
    MemberSelection,
    NamingMode,
    ScenarioFile,
    ScheduledEvent,
    EventSchedule,
};

pub use stats::{
    SimulationResult,
    RoundMetrics,
    DistributionReport,
};

pub use runner::{PlacementRunner, SimulationError};
