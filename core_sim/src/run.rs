use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use sim_schema::{
    ActionRecord, ActionRequest, HazardEventKind, RunRecord, Scenario, SimulationMetrics,
    SimulationMode, SimulationStatus, StateSnapshot,
};

use crate::actions::ActionReport;
use crate::config::DynamicsConfig;
use crate::error::SimError;
use crate::geography::Geography;
use crate::observation::ObservationLayout;
use crate::scoring;
use crate::state::SimulationState;
use crate::transition::{advance, Arrival, HazardSchedule};

/// Diagnostic detail of one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepInfo {
    pub actions: Vec<ActionReport>,
    pub arrivals: Vec<Arrival>,
    pub hazards: Vec<HazardEventKind>,
    pub evacuated: u64,
    pub casualties: u64,
    pub logistics_cost: f64,
    pub unmet_shelter_demand: u64,
    pub state_hash: u64,
}

/// Result of a committed step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    /// Timestep reached by this step.
    pub timestep: u32,
    pub observation: Vec<f32>,
    pub reward: f64,
    pub done: bool,
    pub status: SimulationStatus,
    pub info: StepInfo,
}

/// One run of a scenario: the live state plus its action log and history.
#[derive(Debug, Clone)]
pub struct SimulationRun {
    geography: Arc<Geography>,
    config: Arc<DynamicsConfig>,
    schedule: HazardSchedule,
    layout: ObservationLayout,
    state: SimulationState,
    status: SimulationStatus,
    actions: Vec<ActionRecord>,
    history: Vec<StateSnapshot>,
}

impl SimulationRun {
    pub fn new(scenario: Arc<Scenario>, config: Arc<DynamicsConfig>) -> Result<Self, SimError> {
        let geography = Geography::from_scenario(scenario, &config)?;
        Ok(Self::with_geography(Arc::new(geography), config))
    }

    /// Fresh run over an already validated geography.
    pub fn with_geography(geography: Arc<Geography>, config: Arc<DynamicsConfig>) -> Self {
        let schedule = HazardSchedule::for_geography(&geography, &config);
        let layout = ObservationLayout::from_geography(&geography);
        let state = SimulationState::from_geography(&geography, &config);
        let history = vec![state.snapshot()];
        tracing::debug!(
            target: "relief::run",
            scenario = geography.scenario().scenario_id(),
            features = layout.len(),
            hazards = schedule.len(),
            "run.reset"
        );
        Self {
            geography,
            config,
            schedule,
            layout,
            state,
            status: SimulationStatus::Pending,
            actions: Vec::new(),
            history,
        }
    }

    pub fn geography(&self) -> &Arc<Geography> {
        &self.geography
    }

    pub fn scenario(&self) -> &Arc<Scenario> {
        self.geography.scenario()
    }

    pub fn config(&self) -> &Arc<DynamicsConfig> {
        &self.config
    }

    pub fn schedule(&self) -> &HazardSchedule {
        &self.schedule
    }

    pub fn layout(&self) -> &ObservationLayout {
        &self.layout
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn status(&self) -> SimulationStatus {
        self.status
    }

    pub fn is_done(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn actions(&self) -> &[ActionRecord] {
        &self.actions
    }

    /// Snapshots from the initial state onwards, one per committed step.
    pub fn history(&self) -> &[StateSnapshot] {
        &self.history
    }

    pub fn observe(&self) -> Vec<f32> {
        self.layout.encode(&self.state)
    }

    pub fn step(&mut self, actions: &[ActionRequest]) -> Result<StepReport, SimError> {
        if self.status.is_terminal() {
            tracing::warn!(
                target: "relief::run",
                timestep = self.state.timestep(),
                status = ?self.status,
                submitted = actions.len(),
                "step.after_terminal"
            );
            return Err(SimError::RunTerminated);
        }

        let transition = advance(
            &self.geography,
            &self.schedule,
            &self.config,
            &self.state,
            actions,
        );
        let weights = self.config.reward_weights(self.scenario().difficulty);
        let reward = match self.history.last() {
            Some(previous) => scoring::reward_between(previous, &transition.snapshot, &weights),
            None => 0.0,
        };

        self.state = transition.state;
        self.status = transition.status;
        self.actions
            .extend(transition.reports.iter().map(|report| report.record));

        let info = StepInfo {
            actions: transition.reports,
            arrivals: transition.arrivals,
            hazards: transition.hazards,
            evacuated: transition.snapshot.total_evacuated,
            casualties: transition.snapshot.total_casualties,
            logistics_cost: transition.snapshot.logistics_cost_units(),
            unmet_shelter_demand: transition.snapshot.unmet_shelter_demand,
            state_hash: transition.snapshot.header.hash,
        };
        self.history.push(transition.snapshot);

        if self.status.is_terminal() {
            tracing::info!(
                target: "relief::run",
                scenario = self.scenario().scenario_id(),
                timestep = self.state.timestep(),
                status = ?self.status,
                evacuated = self.state.total_evacuated(),
                casualties = self.state.total_casualties(),
                "run.terminated"
            );
        }

        Ok(StepReport {
            timestep: self.state.timestep(),
            observation: self.observe(),
            reward,
            done: self.status.is_terminal(),
            status: self.status,
            info,
        })
    }

    pub fn rewards(&self) -> Vec<f64> {
        scoring::rewards(
            &self.history,
            &self.config.reward_weights(self.scenario().difficulty),
        )
    }

    pub fn metrics(&self) -> SimulationMetrics {
        scoring::metrics(
            &self.history,
            self.scenario().difficulty,
            &self.config.score,
        )
    }

    pub fn to_record(&self, mode: SimulationMode) -> RunRecord {
        RunRecord {
            id: None,
            scenario_id: self.scenario().scenario_id().to_string(),
            mode,
            status: self.status,
            current_timestep: self.state.timestep(),
            max_timesteps: self.state.max_timesteps(),
            actions: self.actions.clone(),
            states: self.history.clone(),
            final_metrics: self.is_done().then(|| self.metrics()),
        }
    }

    /// Re-execute a logged action sequence up to `timesteps` steps.
    ///
    /// Each record is resubmitted at its own timestep in log order,
    /// including records that were rejected the first time.
    pub fn replay(
        geography: Arc<Geography>,
        config: Arc<DynamicsConfig>,
        actions: &[ActionRecord],
        timesteps: u32,
    ) -> Result<Self, SimError> {
        let mut by_step: BTreeMap<u32, Vec<ActionRequest>> = BTreeMap::new();
        for record in actions {
            by_step
                .entry(record.timestep)
                .or_default()
                .push(record.request());
        }

        let mut run = Self::with_geography(geography, config);
        while run.state.timestep() < timesteps && !run.is_done() {
            let batch = by_step.remove(&run.state.timestep()).unwrap_or_default();
            run.step(&batch)?;
        }
        Ok(run)
    }

    pub fn replay_record(
        geography: Arc<Geography>,
        config: Arc<DynamicsConfig>,
        record: &RunRecord,
    ) -> Result<Self, SimError> {
        Self::replay(geography, config, &record.actions, record.current_timestep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{corridor_scenario, two_zone_scenario};
    use sim_schema::ActionType;

    fn run(scenario: Scenario) -> SimulationRun {
        SimulationRun::new(Arc::new(scenario), Arc::new(DynamicsConfig::default()))
            .expect("fixture scenario is valid")
    }

    #[test]
    fn lifecycle_moves_from_pending_to_completed() {
        let mut run = run(two_zone_scenario());
        assert_eq!(run.status(), SimulationStatus::Pending);
        assert_eq!(run.history().len(), 1);

        let report = run.step(&[]).expect("first step");
        assert_eq!(report.timestep, 1);
        assert_eq!(report.status, SimulationStatus::Running);
        assert!(!report.done);

        while !run.is_done() {
            run.step(&[]).expect("step before terminal");
        }
        assert_eq!(run.status(), SimulationStatus::Completed);
        assert_eq!(run.history().len(), 11);
        assert!(run.to_record(SimulationMode::Manual).final_metrics.is_some());
    }

    #[test]
    fn clearing_every_zone_completes_early() {
        let mut scenario = two_zone_scenario();
        scenario.zones.truncate(1);
        scenario.zones[0].population = 10;
        scenario.shelters[0].capacity = 500;
        let mut run = run(scenario);

        let report = run
            .step(&[ActionRequest::new(ActionType::EvacuateZone, 0, 0)])
            .expect("step");
        assert!(report.done);
        assert_eq!(report.status, SimulationStatus::Completed);
        assert_eq!(report.timestep, 1);
        assert!(report.timestep < run.scenario().max_timesteps);
        assert_eq!(run.history().len(), 2);
        assert_eq!(run.metrics().total_evacuated, 10);
        assert_eq!(run.metrics().total_casualties, 0);
    }

    #[test]
    fn steps_after_terminal_are_refused_without_mutation() {
        let mut run = run(two_zone_scenario());
        while !run.is_done() {
            run.step(&[]).expect("step before terminal");
        }
        let history = run.history().to_vec();
        let state = run.state().clone();
        let err = run
            .step(&[ActionRequest::new(ActionType::EvacuateZone, 0, 0)])
            .expect_err("run is terminal");
        assert!(matches!(err, SimError::RunTerminated));
        assert_eq!(run.history(), history.as_slice());
        assert_eq!(run.state(), &state);
        assert_eq!(run.actions().len(), 0);
    }

    #[test]
    fn step_reward_matches_history_reward() {
        let mut run = run(two_zone_scenario());
        let first = run
            .step(&[ActionRequest::new(ActionType::EvacuateZone, 0, 0)])
            .expect("step");
        let second = run.step(&[]).expect("step");
        assert_eq!(run.rewards(), vec![first.reward, second.reward]);
        assert_eq!(first.info.unmet_shelter_demand, 20);
        assert_eq!(first.info.evacuated, 80);
        assert_eq!(first.observation.len(), run.layout().len());
        assert_eq!(second.observation, run.observe());
    }

    #[test]
    fn replaying_a_record_reproduces_history() {
        let mut original = run(corridor_scenario());
        let plan = [
            vec![ActionRequest::new(ActionType::EvacuateZone, 0, 0)],
            vec![ActionRequest::new(ActionType::DispatchAmbulance, 0, 2)],
            vec![
                ActionRequest::new(ActionType::DispatchSupplyTruck, 1, 1),
                ActionRequest::new(ActionType::DispatchSupplyTruck, 1, 2),
            ],
            vec![ActionRequest::new(ActionType::OpenShelter, 9, 0)],
        ];
        for batch in &plan {
            original.step(batch).expect("step");
        }
        while !original.is_done() {
            original.step(&[]).expect("step");
        }
        let record = original.to_record(SimulationMode::AiOnly);
        let json = serde_json::to_string(&record).expect("record serializes");
        let restored: RunRecord = serde_json::from_str(&json).expect("record parses");

        let replayed = SimulationRun::replay_record(
            Arc::clone(original.geography()),
            Arc::clone(original.config()),
            &restored,
        )
        .expect("replay");
        assert_eq!(replayed.history(), original.history());
        assert_eq!(replayed.actions(), original.actions());
        assert_eq!(replayed.metrics(), original.metrics());
        assert_eq!(replayed.status(), original.status());
    }
}
