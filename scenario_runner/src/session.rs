use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::ValueEnum;
use color_eyre::eyre::{bail, WrapErr};
use color_eyre::Result;
use core_sim::policy::Policy;
use core_sim::{
    compare, compare_actions, load_dynamics_config_from_env, run_episode, DynamicsConfig,
    EpisodeSummary, Geography, IdlePolicy, ObservationLayout, RandomPolicy, ScriptedPolicy,
    SimulationRun, TemplateKind, TriagePolicy,
};
use serde::Serialize;
use sim_runtime::{
    ActionComparison, ActionPlan, ActionRequest, ActionScript, PerformanceComparison, RunRecord,
    Scenario, SimulationMetrics, SimulationMode, SimulationStatus,
};
use tracing::info;

#[derive(Debug, Clone)]
pub enum ScenarioSource {
    File(PathBuf),
    Template(TemplateKind, u64),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum PolicyChoice {
    Idle,
    Random,
    Triage,
}

impl PolicyChoice {
    pub fn build(self, seed: u64) -> Box<dyn Policy> {
        match self {
            PolicyChoice::Idle => Box::new(IdlePolicy),
            PolicyChoice::Random => Box::new(RandomPolicy::new(seed)),
            PolicyChoice::Triage => Box::new(TriagePolicy),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub mode: SimulationMode,
    pub policy: PolicyChoice,
    pub policy_seed: u64,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub scenario_id: String,
    pub mode: SimulationMode,
    pub status: SimulationStatus,
    pub episode: EpisodeSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<PerformanceComparison>,
    /// Operator actions against the policy's choices on the same observations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_agreement: Option<ActionComparison>,
}

pub struct RunOutcome {
    pub record: RunRecord,
    pub summary: RunSummary,
}

/// Operator script merged with policy suggestions, operator actions first.
struct AssistedPolicy {
    operator: ScriptedPolicy,
    assistant: Box<dyn Policy>,
}

impl Policy for AssistedPolicy {
    fn decide(
        &mut self,
        timestep: u32,
        layout: &ObservationLayout,
        observation: &[f32],
    ) -> Vec<ActionRequest> {
        let mut actions = self.operator.decide(timestep, layout, observation);
        actions.extend(self.assistant.decide(timestep, layout, observation));
        actions
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Arc<DynamicsConfig>> {
    match path {
        Some(path) => {
            let config = DynamicsConfig::from_file(path)
                .wrap_err_with(|| format!("failed to load dynamics config {}", path.display()))?;
            Ok(Arc::new(config))
        }
        None => Ok(load_dynamics_config_from_env()),
    }
}

pub fn load_scenario(source: &ScenarioSource) -> Result<Arc<Scenario>> {
    let scenario = match source {
        ScenarioSource::File(path) => {
            let text = fs::read_to_string(path)
                .wrap_err_with(|| format!("failed to read scenario {}", path.display()))?;
            Scenario::from_json_str(&text)
                .wrap_err_with(|| format!("failed to parse scenario {}", path.display()))?
        }
        ScenarioSource::Template(kind, seed) => core_sim::templates::build(*kind, *seed),
    };
    Ok(Arc::new(scenario))
}

/// Action script text, or a JSON `ActionPlan` when the file ends in `.json`.
pub fn load_plan(path: &Path, scenario: &Scenario) -> Result<ActionPlan> {
    let text = fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read script {}", path.display()))?;
    if path.extension().is_some_and(|ext| ext == "json") {
        return serde_json::from_str(&text)
            .wrap_err_with(|| format!("failed to parse action plan {}", path.display()));
    }
    let script = ActionScript::parse(&text)
        .wrap_err_with(|| format!("failed to parse script {}", path.display()))?;
    let plan = script.to_plan(scenario)?;
    info!(path = %path.display(), actions = plan.len(), "script.loaded");
    Ok(plan)
}

pub fn run(
    scenario: Arc<Scenario>,
    config: Arc<DynamicsConfig>,
    plan: ActionPlan,
    options: RunOptions,
) -> Result<RunOutcome> {
    let geography = Arc::new(Geography::from_scenario(scenario, &config)?);
    let mut operator = ScriptedPolicy::new(plan.into_batches());
    let mut assistant = options.policy.build(options.policy_seed);

    let mut primary = SimulationRun::with_geography(Arc::clone(&geography), Arc::clone(&config));
    let mut comparison = None;
    let mut action_agreement = None;
    let episode = match options.mode {
        SimulationMode::Manual => run_episode(&mut primary, &mut operator)?,
        SimulationMode::AiOnly => run_episode(&mut primary, assistant.as_mut())?,
        SimulationMode::AiAssisted => run_episode(
            &mut primary,
            &mut AssistedPolicy {
                operator,
                assistant,
            },
        )?,
        SimulationMode::Comparison => {
            let human = run_episode(&mut primary, &mut operator)?;
            let mut ai_run =
                SimulationRun::with_geography(Arc::clone(&geography), Arc::clone(&config));
            let ai = run_episode(&mut ai_run, assistant.as_mut())?;
            comparison = Some(compare(&human.metrics, &ai.metrics));
            let mut judge = options.policy.build(options.policy_seed);
            action_agreement = Some(compare_actions(
                geography,
                config,
                &primary.to_record(options.mode),
                judge.as_mut(),
            )?);
            human
        }
    };

    info!(
        scenario = primary.scenario().scenario_id(),
        mode = ?options.mode,
        status = ?primary.status(),
        score = episode.metrics.overall_score,
        "run.finished"
    );

    Ok(RunOutcome {
        record: primary.to_record(options.mode),
        summary: RunSummary {
            scenario_id: primary.scenario().scenario_id().to_string(),
            mode: options.mode,
            status: primary.status(),
            episode,
            comparison,
            action_agreement,
        },
    })
}

/// Replay `record` against `scenario` and check every stored snapshot hash.
pub fn verify_replay(
    scenario: Arc<Scenario>,
    config: Arc<DynamicsConfig>,
    record: &RunRecord,
) -> Result<SimulationMetrics> {
    let geography = Arc::new(Geography::from_scenario(scenario, &config)?);
    let replayed = SimulationRun::replay_record(geography, config, record)?;
    if replayed.history().len() != record.states.len() {
        bail!(
            "replay produced {} snapshots, record holds {}",
            replayed.history().len(),
            record.states.len()
        );
    }
    for (replayed, stored) in replayed.history().iter().zip(&record.states) {
        if replayed.header.hash != stored.header.hash {
            bail!(
                "replay diverged at timestep {}: hash {:#x} != {:#x}",
                stored.timestep(),
                replayed.header.hash,
                stored.header.hash
            );
        }
    }
    info!(
        scenario = %record.scenario_id,
        timesteps = record.current_timestep,
        "replay.verified"
    );
    Ok(replayed.metrics())
}
