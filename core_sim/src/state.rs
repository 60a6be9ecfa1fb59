use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sim_schema::{
    Location, ResourceKind, ResourceSnapshot, RoadStatus, ShelterSnapshot, SnapshotHeader,
    StateSnapshot, ZoneSnapshot,
};
use thiserror::Error;

use crate::config::DynamicsConfig;
use crate::geography::Geography;
use crate::hashing::stream_seed;
use crate::scalar::Scalar;

#[derive(Debug, Clone, PartialEq)]
pub struct ZoneState {
    pub(crate) population: u32,
    pub(crate) remaining: u32,
    pub(crate) evacuated: u32,
    pub(crate) casualties: u32,
    /// People ordered out who are still waiting for shelter space.
    pub(crate) backlog: u32,
    pub(crate) hazard: Scalar,
    pub(crate) mitigation: Scalar,
    /// Fractional casualties not yet realised.
    pub(crate) carry: Scalar,
    pub(crate) first_distress: Option<u32>,
    pub(crate) first_arrival: Option<u32>,
}

impl ZoneState {
    pub fn population(&self) -> u32 {
        self.population
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn evacuated(&self) -> u32 {
        self.evacuated
    }

    pub fn casualties(&self) -> u32 {
        self.casualties
    }

    pub fn backlog(&self) -> u32 {
        self.backlog
    }

    pub fn hazard(&self) -> Scalar {
        self.hazard
    }

    pub fn mitigation(&self) -> Scalar {
        self.mitigation
    }

    pub fn first_distress(&self) -> Option<u32> {
        self.first_distress
    }

    pub fn first_arrival(&self) -> Option<u32> {
        self.first_arrival
    }

    pub fn is_cleared(&self) -> bool {
        self.remaining == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShelterState {
    pub(crate) capacity: u32,
    pub(crate) occupancy: u32,
    pub(crate) open: bool,
    pub(crate) supplies: BTreeMap<String, u32>,
}

impl ShelterState {
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn occupancy(&self) -> u32 {
        self.occupancy
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn supplies(&self) -> &BTreeMap<String, u32> {
        &self.supplies
    }

    pub fn spare(&self) -> u32 {
        self.capacity.saturating_sub(self.occupancy)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceState {
    pub(crate) kind: ResourceKind,
    pub(crate) location: Location,
    pub(crate) capacity: u32,
    pub(crate) load: u32,
    /// Timestep of the last action that used this resource.
    pub(crate) committed_at: Option<u32>,
    /// Arrival timestep while travelling.
    pub(crate) en_route_until: Option<u32>,
    pub(crate) deployed_zone: Option<u32>,
    pub(crate) commitments: u32,
    pub(crate) useful_commitments: u32,
}

impl ResourceState {
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn load(&self) -> u32 {
        self.load
    }

    pub fn is_en_route(&self) -> bool {
        self.en_route_until.is_some()
    }

    pub fn en_route_until(&self) -> Option<u32> {
        self.en_route_until
    }

    pub fn deployed_zone(&self) -> Option<u32> {
        self.deployed_zone
    }

    pub fn committed_at(&self) -> Option<u32> {
        self.committed_at
    }

    pub fn commitments(&self) -> u32 {
        self.commitments
    }

    pub fn useful_commitments(&self) -> u32 {
        self.useful_commitments
    }
}

/// Live state of one run. Written only by the transition engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    pub(crate) timestep: u32,
    pub(crate) max_timesteps: u32,
    pub(crate) timestep_minutes: u32,
    pub(crate) intensity: Scalar,
    pub(crate) zones: Vec<ZoneState>,
    pub(crate) shelters: Vec<ShelterState>,
    pub(crate) roads: Vec<RoadStatus>,
    pub(crate) resources: Vec<ResourceState>,
    pub(crate) total_evacuated: u64,
    pub(crate) total_casualties: u64,
    pub(crate) logistics_cost: Scalar,
}

impl SimulationState {
    /// Deep copy of the scenario's mutable fields with seeded initial hazard.
    pub fn from_geography(geography: &Geography, config: &DynamicsConfig) -> Self {
        let scenario = geography.scenario();
        let intensity = Scalar::from_f32(scenario.disaster_intensity);
        let distress = Scalar::from_f32(config.distress_hazard);
        let mut rng = ChaCha8Rng::seed_from_u64(stream_seed(geography.seed(), "initial_risk"));

        let zones: Vec<ZoneState> = scenario
            .zones
            .iter()
            .map(|zone| {
                let drawn = rng.gen_range(config.initial_risk_min..=config.initial_risk_max);
                let risk = zone.risk.unwrap_or(drawn);
                let hazard =
                    (Scalar::from_f32(risk) * intensity).clamp(Scalar::zero(), Scalar::one());
                ZoneState {
                    population: zone.population,
                    remaining: zone.population - zone.evacuated - zone.casualties,
                    evacuated: zone.evacuated,
                    casualties: zone.casualties,
                    backlog: 0,
                    hazard,
                    mitigation: Scalar::zero(),
                    carry: Scalar::zero(),
                    first_distress: (hazard >= distress).then_some(0),
                    first_arrival: None,
                }
            })
            .collect();

        let shelters = scenario
            .shelters
            .iter()
            .map(|shelter| ShelterState {
                capacity: shelter.capacity,
                occupancy: shelter.current_occupancy,
                open: shelter.open,
                supplies: shelter.supplies.clone(),
            })
            .collect();

        let resources = scenario
            .resources
            .iter()
            .map(|resource| ResourceState {
                kind: resource.kind,
                location: resource.location,
                capacity: resource.capacity,
                load: resource.current_load,
                committed_at: None,
                en_route_until: None,
                deployed_zone: None,
                commitments: 0,
                useful_commitments: 0,
            })
            .collect();

        let total_evacuated = zones.iter().map(|z| z.evacuated as u64).sum();
        let total_casualties = zones.iter().map(|z| z.casualties as u64).sum();

        Self {
            timestep: 0,
            max_timesteps: scenario.max_timesteps,
            timestep_minutes: scenario.timestep_minutes,
            intensity,
            zones,
            shelters,
            roads: geography.initial_road_status(),
            resources,
            total_evacuated,
            total_casualties,
            logistics_cost: Scalar::zero(),
        }
    }

    pub fn timestep(&self) -> u32 {
        self.timestep
    }

    pub fn max_timesteps(&self) -> u32 {
        self.max_timesteps
    }

    pub fn timestep_minutes(&self) -> u32 {
        self.timestep_minutes
    }

    pub fn zones(&self) -> &[ZoneState] {
        &self.zones
    }

    pub fn shelters(&self) -> &[ShelterState] {
        &self.shelters
    }

    pub fn roads(&self) -> &[RoadStatus] {
        &self.roads
    }

    pub fn resources(&self) -> &[ResourceState] {
        &self.resources
    }

    pub fn total_evacuated(&self) -> u64 {
        self.total_evacuated
    }

    pub fn total_casualties(&self) -> u64 {
        self.total_casualties
    }

    pub fn total_population(&self) -> u64 {
        self.zones.iter().map(|z| z.population as u64).sum()
    }

    pub fn logistics_cost(&self) -> Scalar {
        self.logistics_cost
    }

    pub fn unmet_shelter_demand(&self) -> u64 {
        self.zones.iter().map(|z| z.backlog as u64).sum()
    }

    pub fn all_cleared(&self) -> bool {
        self.zones.iter().all(ZoneState::is_cleared)
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            header: SnapshotHeader::new(
                self.timestep,
                self.zones.len(),
                self.shelters.len(),
                self.roads.len(),
                self.resources.len(),
            ),
            zones: self
                .zones
                .iter()
                .map(|zone| ZoneSnapshot {
                    remaining: zone.remaining,
                    evacuated: zone.evacuated,
                    casualties: zone.casualties,
                    evacuation_backlog: zone.backlog,
                    hazard: zone.hazard.raw(),
                    mitigation: zone.mitigation.raw(),
                    casualty_carry: zone.carry.raw(),
                    first_distress: zone.first_distress,
                    first_arrival: zone.first_arrival,
                })
                .collect(),
            shelters: self
                .shelters
                .iter()
                .map(|shelter| ShelterSnapshot {
                    occupancy: shelter.occupancy,
                    capacity: shelter.capacity,
                    open: shelter.open,
                    supplies: shelter.supplies.clone(),
                })
                .collect(),
            roads: self.roads.clone(),
            resources: self
                .resources
                .iter()
                .map(|resource| ResourceSnapshot {
                    location: resource.location,
                    load: resource.load,
                    capacity: resource.capacity,
                    en_route_until: resource.en_route_until,
                    deployed_zone: resource.deployed_zone,
                    commitments: resource.commitments,
                    useful_commitments: resource.useful_commitments,
                })
                .collect(),
            total_evacuated: self.total_evacuated,
            total_casualties: self.total_casualties,
            logistics_cost: self.logistics_cost.raw(),
            unmet_shelter_demand: self.unmet_shelter_demand(),
        }
        .finalize()
    }

    /// Verify the accounting invariants against the scenario populations.
    pub fn check_invariants(&self, geography: &Geography) -> Result<(), InvariantViolation> {
        for (index, (zone, record)) in self.zones.iter().zip(geography.zones()).enumerate() {
            let accounted = zone.remaining as u64 + zone.evacuated as u64 + zone.casualties as u64;
            if accounted != record.population as u64 {
                return Err(InvariantViolation::Conservation {
                    zone: index as u32,
                    accounted,
                    population: record.population,
                });
            }
            if zone.backlog > zone.remaining {
                return Err(InvariantViolation::BacklogExceedsRemaining { zone: index as u32 });
            }
            if zone.mitigation < Scalar::zero() || zone.hazard < Scalar::zero() {
                return Err(InvariantViolation::NegativeLevel { zone: index as u32 });
            }
        }
        for (index, shelter) in self.shelters.iter().enumerate() {
            if shelter.occupancy > shelter.capacity {
                return Err(InvariantViolation::ShelterOverflow {
                    shelter: index as u32,
                });
            }
        }
        for (index, resource) in self.resources.iter().enumerate() {
            if resource.load > resource.capacity {
                return Err(InvariantViolation::ResourceOverload {
                    resource: index as u32,
                });
            }
        }
        let evacuated: u64 = self.zones.iter().map(|z| z.evacuated as u64).sum();
        let casualties: u64 = self.zones.iter().map(|z| z.casualties as u64).sum();
        if evacuated != self.total_evacuated || casualties != self.total_casualties {
            return Err(InvariantViolation::TotalsDrift);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("zone #{zone} accounts for {accounted} of {population} people")]
    Conservation {
        zone: u32,
        accounted: u64,
        population: u32,
    },
    #[error("zone #{zone} backlog exceeds its remaining population")]
    BacklogExceedsRemaining { zone: u32 },
    #[error("zone #{zone} has a negative hazard or mitigation level")]
    NegativeLevel { zone: u32 },
    #[error("shelter #{shelter} occupancy exceeds capacity")]
    ShelterOverflow { shelter: u32 },
    #[error("resource #{resource} load exceeds capacity")]
    ResourceOverload { resource: u32 },
    #[error("cumulative totals disagree with zone counts")]
    TotalsDrift,
}
