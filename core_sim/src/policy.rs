//! Decision makers that drive a run through its observations.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use sim_schema::{
    ActionComparison, ActionDifference, ActionRecord, ActionRequest, ActionSource, ActionType,
    RunRecord, SimulationMetrics,
};

use crate::config::DynamicsConfig;
use crate::error::SimError;
use crate::geography::Geography;
use crate::observation::{FeatureKey, ObservationLayout};
use crate::run::SimulationRun;

/// Chooses the actions for the coming timestep.
pub trait Policy {
    fn decide(
        &mut self,
        timestep: u32,
        layout: &ObservationLayout,
        observation: &[f32],
    ) -> Vec<ActionRequest>;
}

impl<P: Policy + ?Sized> Policy for Box<P> {
    fn decide(
        &mut self,
        timestep: u32,
        layout: &ObservationLayout,
        observation: &[f32],
    ) -> Vec<ActionRequest> {
        (**self).decide(timestep, layout, observation)
    }
}

/// Submits nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdlePolicy;

impl Policy for IdlePolicy {
    fn decide(&mut self, _: u32, _: &ObservationLayout, _: &[f32]) -> Vec<ActionRequest> {
        Vec::new()
    }
}

/// Uniformly random actions from a seeded stream. Used as the AI fallback
/// when no trained model is available.
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    rng: ChaCha8Rng,
    actions_per_step: u32,
}

impl RandomPolicy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            actions_per_step: 1,
        }
    }

    pub fn with_actions_per_step(mut self, actions_per_step: u32) -> Self {
        self.actions_per_step = actions_per_step;
        self
    }
}

impl Policy for RandomPolicy {
    fn decide(
        &mut self,
        _timestep: u32,
        layout: &ObservationLayout,
        _observation: &[f32],
    ) -> Vec<ActionRequest> {
        let resources = layout.resource_count();
        let zones = layout.zone_count();
        if resources == 0 || zones == 0 {
            return Vec::new();
        }
        (0..self.actions_per_step)
            .map(|_| {
                let action = ActionType::ALL[self.rng.gen_range(0..ActionType::ALL.len())];
                ActionRequest::new(
                    action,
                    self.rng.gen_range(0..resources),
                    self.rng.gen_range(0..zones),
                )
                .with_source(ActionSource::Ai)
            })
            .collect()
    }
}

/// Evacuates the zone with the largest remaining share each step,
/// rotating through the fleet for the carrying resource.
#[derive(Debug, Clone, Copy, Default)]
pub struct TriagePolicy;

impl Policy for TriagePolicy {
    fn decide(
        &mut self,
        timestep: u32,
        layout: &ObservationLayout,
        observation: &[f32],
    ) -> Vec<ActionRequest> {
        let resources = layout.resource_count();
        if resources == 0 {
            return Vec::new();
        }
        let target = layout
            .features()
            .iter()
            .zip(observation)
            .filter_map(|(feature, value)| match feature {
                FeatureKey::ZoneRemaining { zone } if *value > 0.0 => Some((*zone, *value)),
                _ => None,
            })
            .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)));
        match target {
            Some((zone, _)) => vec![
                ActionRequest::new(ActionType::EvacuateZone, timestep % resources, zone)
                    .with_source(ActionSource::Ai),
            ],
            None => Vec::new(),
        }
    }
}

/// Replays a fixed plan keyed by timestep.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPolicy {
    plan: BTreeMap<u32, Vec<ActionRequest>>,
}

impl ScriptedPolicy {
    pub fn new(plan: BTreeMap<u32, Vec<ActionRequest>>) -> Self {
        Self { plan }
    }

    pub fn push(&mut self, timestep: u32, request: ActionRequest) {
        self.plan.entry(timestep).or_default().push(request);
    }
}

impl Policy for ScriptedPolicy {
    fn decide(&mut self, timestep: u32, _: &ObservationLayout, _: &[f32]) -> Vec<ActionRequest> {
        self.plan.remove(&timestep).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeSummary {
    pub steps: u32,
    pub total_reward: f64,
    pub rejected_actions: u32,
    pub metrics: SimulationMetrics,
}

/// Drive `run` with `policy` until it reaches a terminal status.
pub fn run_episode(
    run: &mut SimulationRun,
    policy: &mut dyn Policy,
) -> Result<EpisodeSummary, SimError> {
    let mut steps = 0;
    let mut total_reward = 0.0;
    let mut rejected_actions = 0;
    let mut observation = run.observe();
    while !run.is_done() {
        let actions = policy.decide(run.state().timestep(), run.layout(), &observation);
        let report = run.step(&actions)?;
        steps += 1;
        total_reward += report.reward;
        rejected_actions += report
            .info
            .actions
            .iter()
            .filter(|action| !action.outcome.is_applied())
            .count() as u32;
        observation = report.observation;
    }
    Ok(EpisodeSummary {
        steps,
        total_reward,
        rejected_actions,
        metrics: run.metrics(),
    })
}

/// Replay the operator actions of `record` and ask `policy` what it would
/// have submitted at each timestep, given the same observation.
///
/// Operator and policy actions are paired by position within a timestep and
/// agree when their action types match.
pub fn compare_actions(
    geography: Arc<Geography>,
    config: Arc<DynamicsConfig>,
    record: &RunRecord,
    policy: &mut dyn Policy,
) -> Result<ActionComparison, SimError> {
    let mut human: BTreeMap<u32, Vec<ActionRecord>> = BTreeMap::new();
    for action in &record.actions {
        human.entry(action.timestep).or_default().push(*action);
    }

    let mut comparison = ActionComparison::default();
    let mut agreements = 0u32;
    let mut run = SimulationRun::with_geography(geography, config);
    while run.state().timestep() < record.current_timestep && !run.is_done() {
        let timestep = run.state().timestep();
        let suggested = policy.decide(timestep, run.layout(), &run.observe());
        let taken = human.remove(&timestep).unwrap_or_default();
        for (position, action) in taken.iter().enumerate() {
            comparison.total_steps += 1;
            let ai_action = suggested.get(position).copied();
            if ai_action.is_some_and(|ai| ai.action_type == action.action_type) {
                agreements += 1;
            } else {
                comparison.differences.push(ActionDifference {
                    timestep,
                    human_action: *action,
                    ai_action,
                });
            }
        }
        if !suggested.is_empty() {
            comparison.ai_actions.insert(timestep, suggested);
        }
        let batch: Vec<ActionRequest> = taken.iter().map(ActionRecord::request).collect();
        run.step(&batch)?;
    }

    if comparison.total_steps > 0 {
        comparison.agreement_rate = agreements as f64 / comparison.total_steps as f64;
    }
    tracing::debug!(
        target: "relief::policy",
        scenario = %record.scenario_id,
        compared = comparison.total_steps,
        agreement_rate = comparison.agreement_rate,
        "actions.compared"
    );
    Ok(comparison)
}
