//! Disaster-response simulation environment.
//!
//! A scenario is validated into a shared [`Geography`]; each
//! [`SimulationRun`] owns its [`SimulationState`] and advances it one
//! timestep per [`SimulationRun::step`], returning an observation, a reward
//! and a terminal flag. Steps are pure functions of the previous state, the
//! submitted actions and the scenario seed.

pub mod actions;
pub mod batch;
pub mod config;
mod error;
pub mod geography;
mod hashing;
pub mod observation;
pub mod policy;
mod run;
mod scalar;
pub mod scoring;
mod state;
pub mod templates;
pub mod transition;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use sim_schema::Scenario;

pub use actions::{ActionEffect, ActionOutcome, ActionRejection, ActionReport, Placement};
pub use batch::{evaluate_batch, SeedOutcome};
pub use config::{
    load_dynamics_config_from_env, ConfigError, DynamicsConfig, RewardWeights, ScoreWeights,
    BUILTIN_DYNAMICS_CONFIG, DYNAMICS_CONFIG_ENV,
};
pub use error::{EntityKind, EntityRef, ScenarioError, SimError};
pub use geography::{Geography, Route};
pub use hashing::{seed_from_label, stream_seed};
pub use observation::{FeatureKey, ObservationLayout};
pub use policy::{
    compare_actions, run_episode, EpisodeSummary, IdlePolicy, Policy, RandomPolicy,
    ScriptedPolicy, TriagePolicy,
};
pub use run::{SimulationRun, StepInfo, StepReport};
pub use scalar::Scalar;
pub use scoring::{compare, metrics};
pub use state::{InvariantViolation, ResourceState, ShelterState, SimulationState, ZoneState};
pub use templates::TemplateKind;
pub use transition::{Arrival, HazardSchedule, Transition};

/// Start a run and return it with its initial observation.
pub fn reset(
    scenario: Arc<Scenario>,
    config: Arc<DynamicsConfig>,
) -> Result<(SimulationRun, Vec<f32>), SimError> {
    let run = SimulationRun::new(scenario, config)?;
    let observation = run.observe();
    Ok((run, observation))
}

/// Encode a state without its geography. Same values and order as the
/// run's own layout.
pub fn encode(state: &SimulationState) -> Vec<f32> {
    ObservationLayout::for_state(state).encode(state)
}
