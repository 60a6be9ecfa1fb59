//! Data contracts for the disaster-response simulation.
//!
//! Everything here is plain serde data: the scenario document, the action
//! records consumed by storage and analytics, per-timestep state snapshots,
//! run records and metrics. The simulation engine lives in `core_sim`.

mod action;
mod run;
mod scenario;
mod snapshot;

pub use action::{ActionRecord, ActionRequest, ActionSource, ActionType};
pub use run::{
    ActionComparison, ActionDifference, PerformanceComparison, RunRecord, SimulationMetrics,
    SimulationMode, SimulationStatus,
};
pub use scenario::{
    Difficulty, DisasterType, HazardEvent, HazardEventKind, Location, ResourceKind,
    ResourceRecord, RoadRecord, RoadStatus, Scenario, ShelterRecord, ZoneRecord,
};
pub use snapshot::{
    hash_snapshot, ResourceSnapshot, ShelterSnapshot, SnapshotHeader, StateSnapshot,
    ZoneSnapshot,
};

/// Scale of the fixed-point integers carried in snapshots.
pub const FIXED_POINT_SCALE: i64 = 1_000_000;

pub fn scenario_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(Scenario)
}

pub fn action_record_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(ActionRecord)
}

pub fn run_record_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(RunRecord)
}
