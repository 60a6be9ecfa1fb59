use std::collections::BTreeMap;
use std::sync::Arc;

use sim_schema::{
    Difficulty, DisasterType, HazardEvent, HazardEventKind, Location, ResourceKind,
    ResourceRecord, RoadRecord, RoadStatus, Scenario, ShelterRecord, ZoneRecord,
};

use crate::config::DynamicsConfig;
use crate::geography::Geography;

pub fn zone(id: &str, lat: f64, lon: f64, population: u32, risk: f32) -> ZoneRecord {
    ZoneRecord {
        id: id.into(),
        center: Location::new(lat, lon),
        radius_km: 1.0,
        population,
        evacuated: 0,
        casualties: 0,
        risk: Some(risk),
    }
}

pub fn shelter(id: &str, lat: f64, lon: f64, capacity: u32) -> ShelterRecord {
    ShelterRecord {
        id: id.into(),
        location: Location::new(lat, lon),
        capacity,
        current_occupancy: 0,
        supplies: BTreeMap::new(),
        open: true,
    }
}

pub fn resource(id: &str, kind: ResourceKind, lat: f64, lon: f64, capacity: u32) -> ResourceRecord {
    ResourceRecord {
        id: id.into(),
        kind,
        location: Location::new(lat, lon),
        capacity,
        current_load: 0,
    }
}

/// Two zones (100 and 50 people) next to one 80-place shelter, no roads.
pub fn two_zone_scenario() -> Scenario {
    let mut truck = resource("truck", ResourceKind::SupplyTruck, 0.0, 0.001, 20);
    truck.current_load = 20;
    Scenario {
        id: None,
        name: "two-zone drill".into(),
        description: String::new(),
        disaster_type: DisasterType::Earthquake,
        difficulty: Difficulty::Medium,
        zones: vec![
            zone("z0", 0.0, 0.0, 100, 0.1),
            zone("z1", 0.0, 0.005, 50, 0.1),
        ],
        shelters: vec![shelter("s0", 0.0, 0.002, 80)],
        roads: Vec::new(),
        resources: vec![
            resource("amb", ResourceKind::Ambulance, 0.0, 0.001, 4),
            resource("med", ResourceKind::MedicalTeam, 0.0, 0.001, 6),
            truck,
        ],
        max_timesteps: 10,
        timestep_minutes: 15,
        disaster_intensity: 0.5,
        secondary_hazards: false,
        seed: Some(42),
        hazard_events: Vec::new(),
        catastrophic_casualty_fraction: 0.5,
    }
}

/// Three zones along a two-road corridor with scripted secondary hazards.
pub fn corridor_scenario() -> Scenario {
    let road = |id: &str, from: f64, to: f64| RoadRecord {
        id: id.into(),
        start: Location::new(0.0, from),
        end: Location::new(0.0, to),
        status: RoadStatus::Operational,
        length_km: 5.5,
    };
    let mut truck = resource("truck", ResourceKind::SupplyTruck, 0.0, 0.0, 10);
    truck.current_load = 10;
    Scenario {
        id: Some("corridor".into()),
        name: "corridor".into(),
        description: String::new(),
        disaster_type: DisasterType::Flood,
        difficulty: Difficulty::Hard,
        zones: vec![
            zone("a", 0.0, 0.0, 300, 0.5),
            zone("b", 0.0, 0.05, 200, 0.5),
            zone("c", 0.0, 0.1, 100, 0.5),
        ],
        shelters: vec![shelter("s0", 0.0, 0.0005, 250)],
        roads: vec![road("r0", 0.0, 0.05), road("r1", 0.05, 0.1)],
        resources: vec![
            resource("amb", ResourceKind::Ambulance, 0.0, 0.0, 4),
            truck,
        ],
        max_timesteps: 20,
        timestep_minutes: 15,
        disaster_intensity: 0.6,
        secondary_hazards: true,
        seed: Some(7),
        hazard_events: vec![
            HazardEvent {
                timestep: 3,
                kind: HazardEventKind::DegradeRoad { road: 1 },
            },
            HazardEvent {
                timestep: 5,
                kind: HazardEventKind::IntensitySpike {
                    zone: 2,
                    multiplier: 1.5,
                },
            },
        ],
        catastrophic_casualty_fraction: 0.5,
    }
}

pub fn geography_for(scenario: Scenario) -> Arc<Geography> {
    Arc::new(
        Geography::from_scenario(Arc::new(scenario), &DynamicsConfig::default())
            .expect("fixture scenario is valid"),
    )
}
