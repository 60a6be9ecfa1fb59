//! The per-step transition function.
//!
//! [`advance`] takes the current state by reference and returns the next
//! one; the input state is never modified. Within a step the order is:
//! actions in submission order, resource arrivals, evacuation backlog
//! retries, passive hazard dynamics, secondary hazards, then the timestep
//! advance, snapshot and termination check.

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use sim_schema::{
    ActionRecord, ActionRequest, HazardEventKind, ResourceKind, Scenario, SimulationStatus,
    StateSnapshot,
};

use crate::actions::{
    interpret, plan_placements, trip_cost, ActionEffect, ActionOutcome, ActionReport,
};
use crate::config::DynamicsConfig;
use crate::geography::Geography;
use crate::hashing::stream_seed;
use crate::scalar::Scalar;
use crate::state::SimulationState;

const RELIEF_SUPPLY: &str = "relief";

/// Secondary hazards keyed by the timestep they strike in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HazardSchedule {
    events: BTreeMap<u32, Vec<HazardEventKind>>,
}

impl HazardSchedule {
    /// Scripted events when the scenario lists any, otherwise a schedule
    /// drawn from the scenario seed. Empty when secondary hazards are off.
    pub fn for_geography(geography: &Geography, config: &DynamicsConfig) -> Self {
        let scenario = geography.scenario();
        if !scenario.secondary_hazards {
            return Self::default();
        }
        if !scenario.hazard_events.is_empty() {
            let mut events: BTreeMap<u32, Vec<HazardEventKind>> = BTreeMap::new();
            for event in &scenario.hazard_events {
                events
                    .entry(event.timestep)
                    .or_default()
                    .push(event.kind.clone());
            }
            return Self { events };
        }
        Self::generate(scenario, geography.seed(), config)
    }

    fn generate(scenario: &Scenario, seed: u64, config: &DynamicsConfig) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(stream_seed(seed, "secondary_hazards"));
        let mut events: BTreeMap<u32, Vec<HazardEventKind>> = BTreeMap::new();
        let zones = scenario.zones.len() as u32;
        let roads = scenario.roads.len() as u32;
        for timestep in 1..scenario.max_timesteps {
            if rng.gen::<f32>() >= config.hazard_event_rate {
                continue;
            }
            let degrade = roads > 0 && rng.gen_bool(0.5);
            let kind = if degrade {
                HazardEventKind::DegradeRoad {
                    road: rng.gen_range(0..roads),
                }
            } else {
                HazardEventKind::IntensitySpike {
                    zone: rng.gen_range(0..zones),
                    multiplier: rng
                        .gen_range(config.spike_multiplier_min..=config.spike_multiplier_max),
                }
            };
            events.entry(timestep).or_default().push(kind);
        }
        Self { events }
    }

    pub fn events_at(&self, timestep: u32) -> &[HazardEventKind] {
        self.events
            .get(&timestep)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.events.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &HazardEventKind)> {
        self.events
            .iter()
            .flat_map(|(timestep, kinds)| kinds.iter().map(move |kind| (*timestep, kind)))
    }
}

/// Resource that reached its target zone during a step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Arrival {
    pub resource: u32,
    pub zone: u32,
    pub delivered: u32,
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub state: SimulationState,
    pub reports: Vec<ActionReport>,
    pub arrivals: Vec<Arrival>,
    pub hazards: Vec<HazardEventKind>,
    pub snapshot: StateSnapshot,
    pub status: SimulationStatus,
}

pub fn advance(
    geography: &Geography,
    schedule: &HazardSchedule,
    config: &DynamicsConfig,
    state: &SimulationState,
    actions: &[ActionRequest],
) -> Transition {
    let mut next = state.clone();
    let timestep = next.timestep;

    let mut reports = Vec::with_capacity(actions.len());
    for request in actions {
        let outcome = interpret(geography, &next, config, request);
        match &outcome {
            ActionOutcome::Applied(effect) => apply_effect(config, &mut next, effect),
            ActionOutcome::Rejected(reason) => {
                tracing::debug!(
                    target: "relief::actions",
                    timestep,
                    action_type = request.action_type,
                    resource = request.resource_id,
                    zone = request.target_zone_id,
                    reason = %reason,
                    "action.rejected"
                );
            }
        }
        reports.push(ActionReport {
            record: ActionRecord::from_request(timestep, request, outcome.is_applied()),
            outcome,
        });
    }

    let arrivals = process_arrivals(geography, &mut next);
    retry_backlogs(geography, config, &mut next);
    apply_dynamics(config, &mut next);

    let hazards = schedule.events_at(timestep).to_vec();
    for hazard in &hazards {
        apply_hazard(&mut next, hazard);
        tracing::debug!(
            target: "relief::transition",
            timestep,
            hazard = ?hazard,
            "hazard.applied"
        );
    }

    next.timestep += 1;
    let snapshot = next.snapshot();
    let status = evaluate_termination(geography.scenario(), &next);

    tracing::debug!(
        target: "relief::transition",
        timestep = next.timestep,
        applied = reports.iter().filter(|r| r.outcome.is_applied()).count(),
        rejected = reports.iter().filter(|r| !r.outcome.is_applied()).count(),
        evacuated = next.total_evacuated,
        casualties = next.total_casualties,
        hash = snapshot.header.hash,
        "step.completed"
    );

    Transition {
        state: next,
        reports,
        arrivals,
        hazards,
        snapshot,
        status,
    }
}

fn apply_effect(config: &DynamicsConfig, state: &mut SimulationState, effect: &ActionEffect) {
    let timestep = state.timestep;
    let resource = &mut state.resources[effect.resource() as usize];
    resource.committed_at = Some(timestep);
    resource.commitments += 1;

    match effect {
        ActionEffect::Dispatch {
            zone,
            kind,
            arrival,
            mitigation_gain,
            useful,
            ..
        } => {
            resource.en_route_until = Some(*arrival);
            resource.deployed_zone = Some(*zone);
            resource.useful_commitments += u32::from(*useful);
            if *kind != ResourceKind::SupplyTruck {
                resource.load = resource.capacity;
            }
            let cap = Scalar::from_f32(config.mitigation_cap);
            let zone_state = &mut state.zones[*zone as usize];
            zone_state.mitigation = (zone_state.mitigation + *mitigation_gain).min(cap);
        }
        ActionEffect::Evacuate {
            zone,
            ordered,
            placements,
            ..
        } => {
            let moved: u32 = placements.iter().map(|p| p.people).sum();
            resource.useful_commitments += u32::from(moved > 0);
            let zone_state = &mut state.zones[*zone as usize];
            zone_state.backlog = (*ordered).min(zone_state.remaining);
            for placement in placements {
                move_people(state, *zone, placement.shelter, placement.people);
            }
        }
        ActionEffect::OpenShelter { shelter, .. } => {
            resource.useful_commitments += 1;
            state.shelters[*shelter as usize].open = true;
        }
    }
    state.logistics_cost += effect.cost();
}

/// Move people from a zone into a shelter, bounded by both sides.
fn move_people(state: &mut SimulationState, zone: u32, shelter: u32, people: u32) -> u32 {
    let spare = state.shelters[shelter as usize].spare();
    let zone_state = &mut state.zones[zone as usize];
    let moved = people.min(zone_state.remaining).min(spare);
    zone_state.remaining -= moved;
    zone_state.evacuated += moved;
    zone_state.backlog = zone_state.backlog.saturating_sub(moved);
    state.shelters[shelter as usize].occupancy += moved;
    state.total_evacuated += moved as u64;
    moved
}

fn process_arrivals(geography: &Geography, state: &mut SimulationState) -> Vec<Arrival> {
    let timestep = state.timestep;
    let mut arrivals = Vec::new();
    for index in 0..state.resources.len() {
        let resource = &state.resources[index];
        let (Some(arrival), Some(zone)) = (resource.en_route_until, resource.deployed_zone) else {
            continue;
        };
        if arrival > timestep {
            continue;
        }
        let kind = resource.kind;
        let center = geography.zones()[zone as usize].center;

        let mut delivered = 0;
        if kind == ResourceKind::SupplyTruck {
            let target = geography
                .shelters_by_distance(zone)
                .unwrap_or_default()
                .into_iter()
                .map(|(shelter, _)| shelter)
                .find(|shelter| state.shelters[*shelter as usize].open);
            if let Some(shelter) = target {
                delivered = state.resources[index].load;
                *state.shelters[shelter as usize]
                    .supplies
                    .entry(RELIEF_SUPPLY.to_string())
                    .or_insert(0) += delivered;
                state.resources[index].load = 0;
            }
        } else {
            state.resources[index].load = 0;
        }

        let resource = &mut state.resources[index];
        resource.location = center;
        resource.en_route_until = None;
        state.zones[zone as usize]
            .first_arrival
            .get_or_insert(timestep);
        arrivals.push(Arrival {
            resource: index as u32,
            zone,
            delivered,
        });
    }
    arrivals
}

fn retry_backlogs(geography: &Geography, config: &DynamicsConfig, state: &mut SimulationState) {
    for zone in 0..state.zones.len() as u32 {
        let backlog = state.zones[zone as usize].backlog;
        if backlog == 0 {
            continue;
        }
        let placements = plan_placements(geography, state, config, zone, backlog);
        for placement in &placements {
            move_people(state, zone, placement.shelter, placement.people);
        }
        state.logistics_cost += trip_cost(config, &placements);
    }
}

fn apply_dynamics(config: &DynamicsConfig, state: &mut SimulationState) {
    let timestep = state.timestep;
    let growth = Scalar::one()
        + Scalar::from_f32(config.hazard_growth) * (Scalar::from_f32(0.5) + state.intensity);
    let rate = Scalar::from_f32(config.casualty_rate);
    let retained = Scalar::one() - Scalar::from_f32(config.mitigation_decay);
    let distress = Scalar::from_f32(config.distress_hazard);

    let mut lost_total = 0u64;
    for zone in &mut state.zones {
        zone.hazard = (zone.hazard * growth).clamp(Scalar::zero(), Scalar::one());

        let mut lost = 0;
        if zone.remaining > 0 {
            let exposure = zone.hazard * (Scalar::one() - zone.mitigation);
            let expected = Scalar::from_u32(zone.remaining) * rate * exposure + zone.carry;
            lost = expected.floor_u32().min(zone.remaining);
            zone.carry = if lost == zone.remaining {
                Scalar::zero()
            } else {
                expected.fract()
            };
            zone.remaining -= lost;
            zone.casualties += lost;
            zone.backlog = zone.backlog.min(zone.remaining);
        } else {
            zone.carry = Scalar::zero();
        }
        lost_total += lost as u64;

        zone.mitigation = zone.mitigation * retained;
        if zone.first_distress.is_none() && (zone.hazard >= distress || lost > 0) {
            zone.first_distress = Some(timestep);
        }
    }
    state.total_casualties += lost_total;
}

fn apply_hazard(state: &mut SimulationState, hazard: &HazardEventKind) {
    match *hazard {
        HazardEventKind::DegradeRoad { road } => {
            if let Some(status) = state.roads.get_mut(road as usize) {
                *status = status.degrade();
            }
        }
        HazardEventKind::IntensitySpike { zone, multiplier } => {
            if let Some(zone) = state.zones.get_mut(zone as usize) {
                zone.hazard = (zone.hazard * Scalar::from_f32(multiplier))
                    .clamp(Scalar::zero(), Scalar::one());
            }
        }
    }
}

/// Failed when cumulative casualties cross the catastrophic threshold,
/// completed at the timestep limit or once every zone is empty.
pub fn evaluate_termination(scenario: &Scenario, state: &SimulationState) -> SimulationStatus {
    let threshold =
        scenario.catastrophic_casualty_fraction as f64 * state.total_population() as f64;
    if state.total_casualties > 0 && state.total_casualties as f64 >= threshold {
        SimulationStatus::Failed
    } else if state.timestep >= state.max_timesteps || state.all_cleared() {
        SimulationStatus::Completed
    } else {
        SimulationStatus::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{corridor_scenario, geography_for, shelter, two_zone_scenario};
    use sim_schema::{ActionType, RoadStatus};

    fn start(scenario: Scenario) -> (std::sync::Arc<Geography>, HazardSchedule, SimulationState) {
        let config = DynamicsConfig::default();
        let geo = geography_for(scenario);
        let schedule = HazardSchedule::for_geography(&geo, &config);
        let state = SimulationState::from_geography(&geo, &config);
        (geo, schedule, state)
    }

    #[test]
    fn evacuation_overflow_is_carried_as_backlog() {
        let config = DynamicsConfig::default();
        let (geo, schedule, state) = start(two_zone_scenario());
        let evacuate = ActionRequest::new(ActionType::EvacuateZone, 0, 0);

        let step = advance(&geo, &schedule, &config, &state, &[evacuate]);
        let zone = &step.state.zones()[0];
        assert_eq!(zone.evacuated(), 80);
        assert_eq!(zone.backlog(), 20);
        assert_eq!(zone.remaining(), 20);
        assert_eq!(step.state.shelters()[0].occupancy(), 80);
        assert_eq!(step.snapshot.unmet_shelter_demand, 20);
        assert_eq!(step.status, SimulationStatus::Running);
        assert!(step.reports[0].record.success);
        step.state.check_invariants(&geo).expect("conservation holds");

        // The input state is untouched.
        assert_eq!(state.zones()[0].remaining(), 100);
        assert_eq!(state.timestep(), 0);
    }

    #[test]
    fn backlog_fills_newly_opened_shelter() {
        let config = DynamicsConfig::default();
        let mut scenario = two_zone_scenario();
        let mut annex = shelter("annex", 0.0, 0.0005, 50);
        annex.open = false;
        scenario.shelters.push(annex);
        let (geo, schedule, state) = start(scenario);

        let first = advance(
            &geo,
            &schedule,
            &config,
            &state,
            &[ActionRequest::new(ActionType::EvacuateZone, 0, 0)],
        );
        assert_eq!(first.state.zones()[0].backlog(), 20);

        let second = advance(
            &geo,
            &schedule,
            &config,
            &first.state,
            &[ActionRequest::new(ActionType::OpenShelter, 1, 0)],
        );
        assert!(second.reports[0].outcome.is_applied());
        assert_eq!(second.state.zones()[0].backlog(), 0);
        assert_eq!(second.state.zones()[0].evacuated(), 100);
        assert_eq!(second.state.shelters()[1].occupancy(), 20);
        second.state.check_invariants(&geo).expect("conservation holds");
    }

    #[test]
    fn same_resource_twice_in_one_step_is_rejected() {
        let config = DynamicsConfig::default();
        let (geo, schedule, state) = start(two_zone_scenario());
        let step = advance(
            &geo,
            &schedule,
            &config,
            &state,
            &[
                ActionRequest::new(ActionType::DispatchAmbulance, 0, 0),
                ActionRequest::new(ActionType::DispatchAmbulance, 0, 1),
            ],
        );
        assert!(step.reports[0].record.success);
        assert!(!step.reports[1].record.success);
        assert!(matches!(
            step.reports[1].outcome.rejection(),
            Some(crate::actions::ActionRejection::ResourceCommitted { resource: 0 })
        ));
    }

    #[test]
    fn dispatched_resources_arrive_and_release_load() {
        let config = DynamicsConfig::default();
        let (geo, schedule, state) = start(two_zone_scenario());
        let step = advance(
            &geo,
            &schedule,
            &config,
            &state,
            &[
                ActionRequest::new(ActionType::DispatchAmbulance, 0, 1),
                ActionRequest::new(ActionType::DispatchSupplyTruck, 2, 1),
            ],
        );
        let ambulance = &step.state.resources()[0];
        assert!(ambulance.is_en_route());
        assert_eq!(ambulance.load(), ambulance.capacity());
        assert!(step.state.zones()[1].mitigation() > Scalar::zero());
        assert!(step.state.logistics_cost() > Scalar::zero());

        let next = advance(&geo, &schedule, &config, &step.state, &[]);
        assert_eq!(next.arrivals.len(), 2);
        assert_eq!(next.state.resources()[0].load(), 0);
        assert_eq!(next.state.zones()[1].first_arrival(), Some(1));
        assert_eq!(next.state.resources()[2].load(), 0);
        assert_eq!(next.state.shelters()[0].supplies().get("relief"), Some(&20));

        let again = advance(
            &geo,
            &schedule,
            &config,
            &next.state,
            &[ActionRequest::new(ActionType::DispatchSupplyTruck, 2, 0)],
        );
        assert!(matches!(
            again.reports[0].outcome.rejection(),
            Some(crate::actions::ActionRejection::ResourceEmpty { resource: 2 })
        ));
        assert_eq!(again.state.logistics_cost(), next.state.logistics_cost());
    }

    #[test]
    fn distant_shelters_wait_for_later_steps() {
        let config = DynamicsConfig::default();
        let (geo, schedule, state) = start(corridor_scenario());
        let step = advance(
            &geo,
            &schedule,
            &config,
            &state,
            &[ActionRequest::new(ActionType::EvacuateZone, 0, 2)],
        );
        assert!(step.reports[0].outcome.is_applied());
        assert_eq!(step.state.shelters()[0].occupancy(), 0);
        let zone = &step.state.zones()[2];
        assert_eq!(zone.evacuated(), 0);
        assert_eq!(zone.backlog(), zone.remaining());
        step.state.check_invariants(&geo).expect("conservation holds");
    }

    #[test]
    fn casualties_are_whole_people_with_carried_remainder() {
        let config = DynamicsConfig::default();
        let mut scenario = two_zone_scenario();
        scenario.zones[0].risk = Some(0.8);
        scenario.disaster_intensity = 1.0;
        let (geo, schedule, mut state) = start(scenario);
        for _ in 0..5 {
            state = advance(&geo, &schedule, &config, &state, &[]).state;
            let zone = &state.zones()[0];
            assert!(zone.carry < Scalar::one());
            state.check_invariants(&geo).expect("conservation holds");
        }
        assert!(state.total_casualties() > 0);
        assert_eq!(state.zones()[0].first_distress(), Some(0));
    }

    #[test]
    fn scripted_secondary_hazards_strike_on_schedule() {
        let config = DynamicsConfig::default();
        let (geo, schedule, mut state) = start(corridor_scenario());
        assert_eq!(schedule.len(), 2);
        let mut hazard_before_spike = Scalar::zero();
        for timestep in 0..6 {
            if timestep == 5 {
                hazard_before_spike = state.zones()[2].hazard();
            }
            state = advance(&geo, &schedule, &config, &state, &[]).state;
            if timestep == 3 {
                assert_eq!(state.roads()[1], RoadStatus::Degraded);
            }
        }
        assert_eq!(state.roads()[0], RoadStatus::Operational);
        assert!(state.zones()[2].hazard() > hazard_before_spike);
    }

    #[test]
    fn generated_schedule_is_seeded() {
        let config = DynamicsConfig {
            hazard_event_rate: 0.5,
            ..DynamicsConfig::default()
        };
        let mut scenario = corridor_scenario();
        scenario.hazard_events.clear();
        let geo = geography_for(scenario.clone());
        let a = HazardSchedule::for_geography(&geo, &config);
        let b = HazardSchedule::for_geography(&geo, &config);
        assert_eq!(a, b);
        assert!(!a.is_empty());
        assert!(a.iter().all(|(timestep, _)| timestep >= 1 && timestep < 20));

        scenario.secondary_hazards = false;
        let quiet = HazardSchedule::for_geography(&geography_for(scenario), &config);
        assert!(quiet.is_empty());
    }

    #[test]
    fn runs_complete_at_the_timestep_limit() {
        let config = DynamicsConfig::default();
        let (geo, schedule, mut state) = start(two_zone_scenario());
        let mut status = SimulationStatus::Running;
        while status == SimulationStatus::Running {
            let step = advance(&geo, &schedule, &config, &state, &[]);
            state = step.state;
            status = step.status;
        }
        assert_eq!(status, SimulationStatus::Completed);
        assert_eq!(state.timestep(), 10);
    }

    #[test]
    fn catastrophic_losses_fail_the_run() {
        let config = DynamicsConfig {
            casualty_rate: 1.0,
            ..DynamicsConfig::default()
        };
        let mut scenario = two_zone_scenario();
        for zone in &mut scenario.zones {
            zone.risk = Some(1.0);
        }
        scenario.disaster_intensity = 1.0;
        let geo = geography_for(scenario);
        let schedule = HazardSchedule::for_geography(&geo, &config);
        let state = SimulationState::from_geography(&geo, &config);
        let step = advance(&geo, &schedule, &config, &state, &[]);
        assert_eq!(step.status, SimulationStatus::Failed);
        assert_eq!(step.state.total_casualties(), 150);
    }
}
