//! Immutable geography of a scenario: id lookups and spatial queries.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use pathfinding::prelude::dijkstra;
use serde::Serialize;
use sim_schema::{
    HazardEventKind, Location, ResourceRecord, RoadRecord, RoadStatus, Scenario, ShelterRecord,
    ZoneRecord,
};

use crate::config::DynamicsConfig;
use crate::error::{EntityKind, EntityRef, ScenarioError, SimError};
use crate::hashing::seed_from_label;

/// Ceiling on a single road's search cost, so path sums cannot overflow.
const MAX_EDGE_MILLIS: u64 = u32::MAX as u64;

/// Travel between two locations under a given road condition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Route {
    pub distance_km: f64,
    pub travel_minutes: f64,
    /// Worst condition among the roads used; operational for off-road legs.
    pub worst_status: RoadStatus,
}

impl Route {
    pub fn travel_steps(&self, timestep_minutes: u32) -> u32 {
        (self.travel_minutes / timestep_minutes.max(1) as f64).ceil() as u32
    }
}

#[derive(Debug, Clone, Copy)]
struct RouteParams {
    base_speed_kmh: f64,
    degraded_speed_factor: f64,
    local_access_km: f64,
    road_access_km: f64,
}

impl RouteParams {
    fn from_config(config: &DynamicsConfig) -> Self {
        Self {
            base_speed_kmh: config.base_speed_kmh as f64,
            degraded_speed_factor: config.degraded_speed_factor as f64,
            local_access_km: config.local_access_km as f64,
            road_access_km: config.road_access_km as f64,
        }
    }

    /// Speed over a road in the given condition, `None` when it cannot be
    /// travelled at all.
    fn speed(&self, status: RoadStatus) -> Option<f64> {
        let speed = match status {
            RoadStatus::Operational => self.base_speed_kmh,
            RoadStatus::Degraded => self.base_speed_kmh * self.degraded_speed_factor,
            RoadStatus::Impassable => return None,
        };
        (speed.is_finite() && speed > 0.0).then_some(speed)
    }

    fn minutes(&self, distance_km: f64, status: RoadStatus) -> Option<f64> {
        self.speed(status).map(|speed| distance_km / speed * 60.0)
    }
}

/// Road endpoints merged into nodes; edges remember their road index.
#[derive(Debug, Clone, Default)]
struct RoadGraph {
    nodes: Vec<Location>,
    adjacency: Vec<Vec<(usize, usize)>>,
}

impl RoadGraph {
    fn build(roads: &[RoadRecord]) -> Self {
        let mut graph = RoadGraph::default();
        let mut index: BTreeMap<(i64, i64), usize> = BTreeMap::new();
        let mut node_for = |graph: &mut RoadGraph, location: Location| -> usize {
            let key = (
                (location.lat * 1e6).round() as i64,
                (location.lon * 1e6).round() as i64,
            );
            *index.entry(key).or_insert_with(|| {
                graph.nodes.push(location);
                graph.adjacency.push(Vec::new());
                graph.nodes.len() - 1
            })
        };
        for (road_index, road) in roads.iter().enumerate() {
            let a = node_for(&mut graph, road.start);
            let b = node_for(&mut graph, road.end);
            graph.adjacency[a].push((b, road_index));
            if a != b {
                graph.adjacency[b].push((a, road_index));
            }
        }
        graph
    }

    fn nearest_node(&self, location: Location, max_km: f64) -> Option<(usize, f64)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (index, location.distance_km(node)))
            .filter(|(_, distance)| *distance <= max_km)
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
    }
}

/// Read-only geography shared by every run of a scenario.
#[derive(Debug, Clone)]
pub struct Geography {
    scenario: Arc<Scenario>,
    seed: u64,
    zone_ids: HashMap<String, u32>,
    shelter_ids: HashMap<String, u32>,
    road_ids: HashMap<String, u32>,
    resource_ids: HashMap<String, u32>,
    graph: RoadGraph,
    params: RouteParams,
}

impl Geography {
    pub fn from_scenario(
        scenario: Arc<Scenario>,
        config: &DynamicsConfig,
    ) -> Result<Self, SimError> {
        validate(&scenario)?;
        let zone_ids = index_ids(scenario.zones.iter().map(|z| z.id.as_str()));
        let shelter_ids = index_ids(scenario.shelters.iter().map(|s| s.id.as_str()));
        let road_ids = index_ids(scenario.roads.iter().map(|r| r.id.as_str()));
        let resource_ids = index_ids(scenario.resources.iter().map(|r| r.id.as_str()));
        let graph = RoadGraph::build(&scenario.roads);
        let seed = scenario
            .seed
            .unwrap_or_else(|| seed_from_label(scenario.scenario_id()));
        tracing::debug!(
            target: "relief::geography",
            scenario = scenario.scenario_id(),
            zones = scenario.zones.len(),
            shelters = scenario.shelters.len(),
            roads = scenario.roads.len(),
            road_nodes = graph.nodes.len(),
            resources = scenario.resources.len(),
            seed,
            "geography.built"
        );
        Ok(Self {
            scenario,
            seed,
            zone_ids,
            shelter_ids,
            road_ids,
            resource_ids,
            graph,
            params: RouteParams::from_config(config),
        })
    }

    pub fn scenario(&self) -> &Arc<Scenario> {
        &self.scenario
    }

    /// Scenario seed, or one derived from the scenario id when unset.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn zones(&self) -> &[ZoneRecord] {
        &self.scenario.zones
    }

    pub fn shelters(&self) -> &[ShelterRecord] {
        &self.scenario.shelters
    }

    pub fn roads(&self) -> &[RoadRecord] {
        &self.scenario.roads
    }

    pub fn resources(&self) -> &[ResourceRecord] {
        &self.scenario.resources
    }

    pub fn zone(&self, index: u32) -> Result<&ZoneRecord, SimError> {
        self.scenario
            .zones
            .get(index as usize)
            .ok_or(SimError::NotFound(EntityRef::zone(index)))
    }

    pub fn shelter(&self, index: u32) -> Result<&ShelterRecord, SimError> {
        self.scenario
            .shelters
            .get(index as usize)
            .ok_or(SimError::NotFound(EntityRef::shelter(index)))
    }

    pub fn road(&self, index: u32) -> Result<&RoadRecord, SimError> {
        self.scenario
            .roads
            .get(index as usize)
            .ok_or(SimError::NotFound(EntityRef::road(index)))
    }

    pub fn resource(&self, index: u32) -> Result<&ResourceRecord, SimError> {
        self.scenario
            .resources
            .get(index as usize)
            .ok_or(SimError::NotFound(EntityRef::resource(index)))
    }

    pub fn zone_index(&self, id: &str) -> Result<u32, SimError> {
        lookup(&self.zone_ids, EntityKind::Zone, id)
    }

    pub fn shelter_index(&self, id: &str) -> Result<u32, SimError> {
        lookup(&self.shelter_ids, EntityKind::Shelter, id)
    }

    pub fn road_index(&self, id: &str) -> Result<u32, SimError> {
        lookup(&self.road_ids, EntityKind::Road, id)
    }

    pub fn resource_index(&self, id: &str) -> Result<u32, SimError> {
        lookup(&self.resource_ids, EntityKind::Resource, id)
    }

    /// Shelters ordered by distance from the zone center, ties by index.
    pub fn shelters_by_distance(&self, zone: u32) -> Result<Vec<(u32, f64)>, SimError> {
        let center = self.zone(zone)?.center;
        let mut shelters: Vec<(u32, f64)> = self
            .scenario
            .shelters
            .iter()
            .enumerate()
            .map(|(index, shelter)| (index as u32, center.distance_km(&shelter.location)))
            .collect();
        shelters.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        Ok(shelters)
    }

    pub fn nearest_shelter(&self, zone: u32) -> Result<Option<u32>, SimError> {
        Ok(self
            .shelters_by_distance(zone)?
            .first()
            .map(|(index, _)| *index))
    }

    /// Fastest route between two points given current road conditions.
    ///
    /// Points within `local_access_km` of each other, and every pair of
    /// points in a scenario without roads, are joined directly. Otherwise
    /// both ends join their nearest road endpoint and the path follows
    /// passable roads only.
    pub fn route(&self, from: Location, to: Location, roads: &[RoadStatus]) -> Option<Route> {
        let direct = from.distance_km(&to);
        if direct <= self.params.local_access_km || self.scenario.roads.is_empty() {
            return Some(Route {
                distance_km: direct,
                travel_minutes: self.params.minutes(direct, RoadStatus::Operational)?,
                worst_status: RoadStatus::Operational,
            });
        }

        let (start, start_leg) = self.graph.nearest_node(from, self.params.road_access_km)?;
        let (goal, goal_leg) = self.graph.nearest_node(to, self.params.road_access_km)?;
        let (path, _) = dijkstra(
            &start,
            |&node| {
                self.graph.adjacency[node]
                    .iter()
                    .filter_map(|&(next, road)| {
                        self.edge_millis(road, roads).map(|cost| (next, cost))
                    })
                    .collect::<Vec<_>>()
            },
            |&node| node == goal,
        )?;

        let access_km = start_leg + goal_leg;
        let mut route = Route {
            distance_km: access_km,
            travel_minutes: self.params.minutes(access_km, RoadStatus::Operational)?,
            worst_status: RoadStatus::Operational,
        };
        for pair in path.windows(2) {
            let (road, _) = self.graph.adjacency[pair[0]]
                .iter()
                .filter(|(next, _)| *next == pair[1])
                .filter_map(|&(_, road)| self.edge_millis(road, roads).map(|cost| (road, cost)))
                .min_by_key(|&(road, cost)| (cost, road))?;
            let status = road_status(&self.scenario.roads, roads, road);
            let length = self.scenario.roads[road].length_km;
            route.distance_km += length;
            route.travel_minutes += self.params.minutes(length, status)?;
            route.worst_status = route.worst_status.max(status);
        }
        Some(route)
    }

    fn edge_millis(&self, road: usize, roads: &[RoadStatus]) -> Option<u64> {
        let status = road_status(&self.scenario.roads, roads, road);
        let minutes = self
            .params
            .minutes(self.scenario.roads[road].length_km, status)?;
        Some(((minutes * 1000.0).round() as u64).min(MAX_EDGE_MILLIS))
    }

    /// Road status vector as authored in the scenario.
    pub fn initial_road_status(&self) -> Vec<RoadStatus> {
        self.scenario.roads.iter().map(|road| road.status).collect()
    }
}

fn road_status(records: &[RoadRecord], current: &[RoadStatus], road: usize) -> RoadStatus {
    current
        .get(road)
        .copied()
        .unwrap_or_else(|| records[road].status)
}

fn index_ids<'a>(ids: impl Iterator<Item = &'a str>) -> HashMap<String, u32> {
    ids.enumerate()
        .map(|(index, id)| (id.to_string(), index as u32))
        .collect()
}

fn lookup(ids: &HashMap<String, u32>, kind: EntityKind, id: &str) -> Result<u32, SimError> {
    ids.get(id)
        .copied()
        .ok_or_else(|| SimError::NotFound(EntityRef::Id(kind, id.to_string())))
}

fn check_unique<'a>(
    kind: EntityKind,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), ScenarioError> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ScenarioError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}

fn check_location(kind: EntityKind, id: &str, location: &Location) -> Result<(), ScenarioError> {
    if location.is_valid() {
        Ok(())
    } else {
        Err(ScenarioError::InvalidLocation {
            kind,
            id: id.to_string(),
        })
    }
}

pub fn validate(scenario: &Scenario) -> Result<(), ScenarioError> {
    if scenario.zones.is_empty() {
        return Err(ScenarioError::NoZones);
    }
    if scenario.max_timesteps == 0 {
        return Err(ScenarioError::ZeroMaxTimesteps);
    }
    if scenario.timestep_minutes == 0 {
        return Err(ScenarioError::ZeroTimestepMinutes);
    }
    if !(0.0..=1.0).contains(&scenario.disaster_intensity) {
        return Err(ScenarioError::InvalidIntensity(scenario.disaster_intensity));
    }
    if !(0.0..=1.0).contains(&scenario.catastrophic_casualty_fraction) {
        return Err(ScenarioError::InvalidCatastrophicFraction(
            scenario.catastrophic_casualty_fraction,
        ));
    }

    check_unique(EntityKind::Zone, scenario.zones.iter().map(|z| z.id.as_str()))?;
    check_unique(
        EntityKind::Shelter,
        scenario.shelters.iter().map(|s| s.id.as_str()),
    )?;
    check_unique(EntityKind::Road, scenario.roads.iter().map(|r| r.id.as_str()))?;
    check_unique(
        EntityKind::Resource,
        scenario.resources.iter().map(|r| r.id.as_str()),
    )?;

    for zone in &scenario.zones {
        check_location(EntityKind::Zone, &zone.id, &zone.center)?;
        if zone.evacuated as u64 + zone.casualties as u64 > zone.population as u64 {
            return Err(ScenarioError::ZoneOverAccounted {
                id: zone.id.clone(),
            });
        }
        if let Some(risk) = zone.risk {
            if !(0.0..=1.0).contains(&risk) {
                return Err(ScenarioError::InvalidRisk {
                    id: zone.id.clone(),
                    risk,
                });
            }
        }
    }
    for shelter in &scenario.shelters {
        check_location(EntityKind::Shelter, &shelter.id, &shelter.location)?;
        if shelter.current_occupancy > shelter.capacity {
            return Err(ScenarioError::ShelterOverCapacity {
                id: shelter.id.clone(),
            });
        }
    }
    for road in &scenario.roads {
        check_location(EntityKind::Road, &road.id, &road.start)?;
        check_location(EntityKind::Road, &road.id, &road.end)?;
        if !road.length_km.is_finite() || road.length_km < 0.0 {
            return Err(ScenarioError::InvalidRoadLength {
                id: road.id.clone(),
            });
        }
    }
    for resource in &scenario.resources {
        check_location(EntityKind::Resource, &resource.id, &resource.location)?;
        if resource.current_load > resource.capacity {
            return Err(ScenarioError::ResourceOverloaded {
                id: resource.id.clone(),
            });
        }
    }
    for event in &scenario.hazard_events {
        match event.kind {
            HazardEventKind::DegradeRoad { road } => {
                if road as usize >= scenario.roads.len() {
                    return Err(ScenarioError::HazardTargetMissing {
                        timestep: event.timestep,
                        target: EntityRef::road(road),
                    });
                }
            }
            HazardEventKind::IntensitySpike { zone, multiplier } => {
                if zone as usize >= scenario.zones.len() {
                    return Err(ScenarioError::HazardTargetMissing {
                        timestep: event.timestep,
                        target: EntityRef::zone(zone),
                    });
                }
                if !multiplier.is_finite() || multiplier <= 0.0 {
                    return Err(ScenarioError::InvalidSpikeMultiplier {
                        timestep: event.timestep,
                        multiplier,
                    });
                }
            }
        }
    }
    Ok(())
}
