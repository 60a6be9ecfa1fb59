//! Validation of operator actions and the effects they would have.
//!
//! [`interpret`] never mutates: it checks an [`ActionRequest`] against the
//! current state and returns either the planned [`ActionEffect`] or the
//! violated precondition. The transition engine is the only place effects
//! are written back.

use serde::Serialize;
use sim_schema::{ActionRecord, ActionRequest, ActionType, ResourceKind};
use thiserror::Error;

use crate::config::DynamicsConfig;
use crate::error::EntityRef;
use crate::geography::{Geography, Route};
use crate::scalar::Scalar;
use crate::state::SimulationState;

#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum ActionRejection {
    #[error("{0} not found")]
    NotFound(EntityRef),
    #[error("resource #{resource} is already committed this timestep")]
    ResourceCommitted { resource: u32 },
    #[error("resource #{resource} is en route until timestep {arrival}")]
    ResourceEnRoute { resource: u32, arrival: u32 },
    #[error("unknown action type {0}")]
    UnknownActionType(u8),
    #[error("resource #{resource} is a {actual}, action needs a {expected}")]
    ResourceKindMismatch {
        resource: u32,
        expected: ResourceKind,
        actual: ResourceKind,
    },
    #[error("resource #{resource} has nothing left to deliver")]
    ResourceEmpty { resource: u32 },
    #[error("no passable route from resource #{resource} to zone #{zone}")]
    NoRoute { resource: u32, zone: u32 },
    #[error("zone #{zone} has no shelter")]
    NoShelter { zone: u32 },
    #[error("shelter #{shelter} has no spare capacity")]
    ShelterFull { shelter: u32 },
    #[error("shelter #{shelter} is already open")]
    ShelterAlreadyOpen { shelter: u32 },
    #[error("zone #{zone} has no one left to evacuate")]
    ZoneCleared { zone: u32 },
}

/// People moved from a zone into one shelter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placement {
    pub shelter: u32,
    pub people: u32,
    pub distance_km: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum ActionEffect {
    Dispatch {
        resource: u32,
        zone: u32,
        kind: ResourceKind,
        route: Route,
        arrival: u32,
        mitigation_gain: Scalar,
        /// Whether the zone still had people at risk and room for mitigation.
        useful: bool,
        cost: Scalar,
    },
    Evacuate {
        resource: u32,
        zone: u32,
        ordered: u32,
        placements: Vec<Placement>,
        cost: Scalar,
    },
    OpenShelter {
        resource: u32,
        zone: u32,
        shelter: u32,
        cost: Scalar,
    },
}

impl ActionEffect {
    pub fn resource(&self) -> u32 {
        match self {
            ActionEffect::Dispatch { resource, .. }
            | ActionEffect::Evacuate { resource, .. }
            | ActionEffect::OpenShelter { resource, .. } => *resource,
        }
    }

    pub fn cost(&self) -> Scalar {
        match self {
            ActionEffect::Dispatch { cost, .. }
            | ActionEffect::Evacuate { cost, .. }
            | ActionEffect::OpenShelter { cost, .. } => *cost,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    Applied(ActionEffect),
    Rejected(ActionRejection),
}

impl ActionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ActionOutcome::Applied(_))
    }

    pub fn rejection(&self) -> Option<&ActionRejection> {
        match self {
            ActionOutcome::Rejected(reason) => Some(reason),
            ActionOutcome::Applied(_) => None,
        }
    }
}

/// One submitted action with its logged record and outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionReport {
    pub record: ActionRecord,
    pub outcome: ActionOutcome,
}

pub fn interpret(
    geography: &Geography,
    state: &SimulationState,
    config: &DynamicsConfig,
    request: &ActionRequest,
) -> ActionOutcome {
    match plan(geography, state, config, request) {
        Ok(effect) => ActionOutcome::Applied(effect),
        Err(reason) => ActionOutcome::Rejected(reason),
    }
}

fn plan(
    geography: &Geography,
    state: &SimulationState,
    config: &DynamicsConfig,
    request: &ActionRequest,
) -> Result<ActionEffect, ActionRejection> {
    let resource_index = request.resource_id;
    let zone_index = request.target_zone_id;

    let resource = state
        .resources
        .get(resource_index as usize)
        .ok_or(ActionRejection::NotFound(EntityRef::resource(resource_index)))?;
    if resource.committed_at == Some(state.timestep) {
        return Err(ActionRejection::ResourceCommitted {
            resource: resource_index,
        });
    }
    if let Some(arrival) = resource.en_route_until {
        return Err(ActionRejection::ResourceEnRoute {
            resource: resource_index,
            arrival,
        });
    }

    let zone = state
        .zones
        .get(zone_index as usize)
        .ok_or(ActionRejection::NotFound(EntityRef::zone(zone_index)))?;

    let action = ActionType::from_code(request.action_type)
        .ok_or(ActionRejection::UnknownActionType(request.action_type))?;

    match action {
        ActionType::OpenShelter => {
            let shelter = geography
                .nearest_shelter(zone_index)
                .ok()
                .flatten()
                .ok_or(ActionRejection::NoShelter { zone: zone_index })?;
            let shelter_state = &state.shelters[shelter as usize];
            if shelter_state.spare() == 0 {
                return Err(ActionRejection::ShelterFull { shelter });
            }
            if shelter_state.open {
                return Err(ActionRejection::ShelterAlreadyOpen { shelter });
            }
            Ok(ActionEffect::OpenShelter {
                resource: resource_index,
                zone: zone_index,
                shelter,
                cost: Scalar::from_f32(config.shelter_open_cost),
            })
        }
        ActionType::EvacuateZone => {
            if zone.is_cleared() {
                return Err(ActionRejection::ZoneCleared { zone: zone_index });
            }
            if geography.shelters().is_empty() {
                return Err(ActionRejection::NoShelter { zone: zone_index });
            }
            let ordered = zone.remaining;
            let placements = plan_placements(geography, state, config, zone_index, ordered);
            let cost =
                Scalar::from_f32(config.evacuation_base_cost) + trip_cost(config, &placements);
            Ok(ActionEffect::Evacuate {
                resource: resource_index,
                zone: zone_index,
                ordered,
                placements,
                cost,
            })
        }
        ActionType::DispatchAmbulance
        | ActionType::DispatchMedicalTeam
        | ActionType::DispatchSupplyTruck => {
            let expected = action
                .dispatch_kind()
                .ok_or(ActionRejection::UnknownActionType(request.action_type))?;
            if resource.kind != expected {
                return Err(ActionRejection::ResourceKindMismatch {
                    resource: resource_index,
                    expected,
                    actual: resource.kind,
                });
            }
            if expected == ResourceKind::SupplyTruck && resource.load == 0 {
                return Err(ActionRejection::ResourceEmpty {
                    resource: resource_index,
                });
            }
            let center = geography
                .zone(zone_index)
                .map_err(|_| ActionRejection::NotFound(EntityRef::zone(zone_index)))?
                .center;
            let route = geography
                .route(resource.location, center, &state.roads)
                .ok_or(ActionRejection::NoRoute {
                    resource: resource_index,
                    zone: zone_index,
                })?;
            let travel_steps = route.travel_steps(state.timestep_minutes);
            let gain = config.mitigation.get(expected) as f64 * resource.capacity as f64
                / config.capacity_reference as f64
                / (1.0 + travel_steps as f64);
            let cap = Scalar::from_f32(config.mitigation_cap);
            Ok(ActionEffect::Dispatch {
                resource: resource_index,
                zone: zone_index,
                kind: expected,
                arrival: state.timestep.saturating_add(travel_steps),
                mitigation_gain: Scalar::from_f64(gain),
                useful: !zone.is_cleared() && zone.mitigation < cap,
                cost: config.dispatch_cost(expected, route.distance_km),
                route,
            })
        }
    }
}

/// Place up to `people` from a zone into open shelters reachable within
/// `evacuation_reach_steps`, nearest first.
pub(crate) fn plan_placements(
    geography: &Geography,
    state: &SimulationState,
    config: &DynamicsConfig,
    zone: u32,
    people: u32,
) -> Vec<Placement> {
    let Ok(center) = geography.zone(zone).map(|record| record.center) else {
        return Vec::new();
    };
    let Ok(candidates) = geography.shelters_by_distance(zone) else {
        return Vec::new();
    };

    let mut left = people;
    let mut placements = Vec::new();
    for (shelter, _) in candidates {
        if left == 0 {
            break;
        }
        let shelter_state = &state.shelters[shelter as usize];
        if !shelter_state.open || shelter_state.spare() == 0 {
            continue;
        }
        let location = geography.shelters()[shelter as usize].location;
        let Some(route) = geography.route(center, location, &state.roads) else {
            continue;
        };
        if route.travel_steps(state.timestep_minutes) > config.evacuation_reach_steps {
            continue;
        }
        let moved = left.min(shelter_state.spare());
        left -= moved;
        placements.push(Placement {
            shelter,
            people: moved,
            distance_km: route.distance_km,
        });
    }
    placements
}

pub(crate) fn trip_cost(config: &DynamicsConfig, placements: &[Placement]) -> Scalar {
    placements.iter().fold(Scalar::zero(), |total, placement| {
        total + Scalar::from_f64(config.cost_per_km as f64 * placement.distance_km)
    })
}
