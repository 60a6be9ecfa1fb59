//! Built-in scenario templates generated from a seed.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sim_schema::{
    Difficulty, DisasterType, Location, ResourceKind, ResourceRecord, RoadRecord, RoadStatus,
    Scenario, ShelterRecord, ZoneRecord,
};

use crate::hashing::stream_seed;

/// Zone grid spacing in degrees, roughly 2.2 km.
const GRID_SPACING_DEG: f64 = 0.02;
/// Shelter offset from the zone center it serves, roughly 0.5 km.
const SHELTER_OFFSET_DEG: f64 = 0.005;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    UrbanEarthquake,
    CoastalFlood,
    TropicalCyclone,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 3] = [
        TemplateKind::UrbanEarthquake,
        TemplateKind::CoastalFlood,
        TemplateKind::TropicalCyclone,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TemplateKind::UrbanEarthquake => "urban_earthquake",
            TemplateKind::CoastalFlood => "coastal_flood",
            TemplateKind::TropicalCyclone => "tropical_cyclone",
        }
    }

    fn profile(self) -> TemplateProfile {
        match self {
            TemplateKind::UrbanEarthquake => TemplateProfile {
                name: "Urban Earthquake",
                description: "Magnitude 7.2 earthquake in a dense downtown core",
                disaster_type: DisasterType::Earthquake,
                difficulty: Difficulty::Medium,
                origin: Location::new(37.77, -122.42),
                rows: 3,
                cols: 3,
                shelters: 3,
                closed_shelters: 1,
                fleet: [2, 2, 2],
                intensity: 0.6,
                secondary_hazards: false,
                max_timesteps: 100,
            },
            TemplateKind::CoastalFlood => TemplateProfile {
                name: "Coastal Flood",
                description: "Storm surge flooding low-lying coastal districts",
                disaster_type: DisasterType::Flood,
                difficulty: Difficulty::Hard,
                origin: Location::new(29.95, -90.07),
                rows: 3,
                cols: 4,
                shelters: 4,
                closed_shelters: 2,
                fleet: [2, 2, 3],
                intensity: 0.7,
                secondary_hazards: true,
                max_timesteps: 120,
            },
            TemplateKind::TropicalCyclone => TemplateProfile {
                name: "Tropical Cyclone",
                description: "Category 4 cyclone making landfall over a port city",
                disaster_type: DisasterType::Cyclone,
                difficulty: Difficulty::Expert,
                origin: Location::new(22.3, 114.17),
                rows: 4,
                cols: 4,
                shelters: 5,
                closed_shelters: 2,
                fleet: [3, 2, 3],
                intensity: 0.85,
                secondary_hazards: true,
                max_timesteps: 150,
            },
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        TemplateKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| format!("unknown template '{value}'"))
    }
}

struct TemplateProfile {
    name: &'static str,
    description: &'static str,
    disaster_type: DisasterType,
    difficulty: Difficulty,
    origin: Location,
    rows: u32,
    cols: u32,
    shelters: u32,
    closed_shelters: u32,
    /// Ambulances, medical teams and supply trucks.
    fleet: [u32; 3],
    intensity: f32,
    secondary_hazards: bool,
    max_timesteps: u32,
}

/// Scenario for a template. The same kind and seed always give the same scenario.
pub fn build(kind: TemplateKind, seed: u64) -> Scenario {
    let profile = kind.profile();
    let mut rng = ChaCha8Rng::seed_from_u64(stream_seed(seed, kind.as_str()));

    let cell = |row: u32, col: u32| {
        Location::new(
            profile.origin.lat + row as f64 * GRID_SPACING_DEG,
            profile.origin.lon + col as f64 * GRID_SPACING_DEG,
        )
    };

    let mut zones = Vec::new();
    for row in 0..profile.rows {
        for col in 0..profile.cols {
            zones.push(ZoneRecord {
                id: format!("zone-{row}-{col}"),
                center: cell(row, col),
                radius_km: 1.0,
                population: rng.gen_range(100..1000),
                evacuated: 0,
                casualties: 0,
                risk: None,
            });
        }
    }

    let mut roads = Vec::new();
    let mut link = |from: (u32, u32), to: (u32, u32)| {
        let start = cell(from.0, from.1);
        let end = cell(to.0, to.1);
        roads.push(RoadRecord {
            id: format!("road-{}-{}-{}-{}", from.0, from.1, to.0, to.1),
            start,
            end,
            status: RoadStatus::Operational,
            length_km: (start.distance_km(&end) * 1000.0).round() / 1000.0,
        });
    };
    for row in 0..profile.rows {
        for col in 0..profile.cols {
            if col + 1 < profile.cols {
                link((row, col), (row, col + 1));
            }
            if row + 1 < profile.rows {
                link((row, col), (row + 1, col));
            }
        }
    }

    let zone_count = profile.rows * profile.cols;
    let shelters = (0..profile.shelters)
        .map(|index| {
            let host = (index * zone_count / profile.shelters) as usize;
            let center = zones[host].center;
            ShelterRecord {
                id: format!("shelter-{index}"),
                location: Location::new(center.lat + SHELTER_OFFSET_DEG, center.lon),
                capacity: rng.gen_range(200..500),
                current_occupancy: 0,
                supplies: BTreeMap::from([
                    ("water".to_string(), rng.gen_range(100..400)),
                    ("food".to_string(), rng.gen_range(100..400)),
                ]),
                open: index < profile.shelters - profile.closed_shelters,
            }
        })
        .collect();

    let depot = zones[0].center;
    let mut resources = Vec::new();
    for (kind, count) in ResourceKind::ALL.into_iter().zip(profile.fleet) {
        for index in 0..count {
            let capacity = match kind {
                ResourceKind::Ambulance => 4,
                ResourceKind::MedicalTeam => 8,
                ResourceKind::SupplyTruck => 50,
            };
            resources.push(ResourceRecord {
                id: format!("{}-{index}", kind.as_str()),
                kind,
                location: depot,
                capacity,
                current_load: if kind == ResourceKind::SupplyTruck {
                    capacity
                } else {
                    0
                },
            });
        }
    }

    Scenario {
        id: Some(format!("{}-{seed}", kind.as_str())),
        name: profile.name.to_string(),
        description: profile.description.to_string(),
        disaster_type: profile.disaster_type,
        difficulty: profile.difficulty,
        zones,
        shelters,
        roads,
        resources,
        max_timesteps: profile.max_timesteps,
        timestep_minutes: 15,
        disaster_intensity: profile.intensity,
        secondary_hazards: profile.secondary_hazards,
        seed: Some(seed),
        hazard_events: Vec::new(),
        catastrophic_casualty_fraction: 0.5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DynamicsConfig;
    use crate::geography::{validate, Geography};
    use std::sync::Arc;

    #[test]
    fn templates_are_valid_and_seeded() {
        for kind in TemplateKind::ALL {
            let a = build(kind, 11);
            let b = build(kind, 11);
            assert_eq!(a, b, "{kind} is not deterministic");
            assert_ne!(a, build(kind, 12), "{kind} ignores its seed");
            validate(&a).expect("template validates");
            assert!(a
                .zones
                .iter()
                .all(|zone| (100..1000).contains(&zone.population)));
            assert!(a
                .shelters
                .iter()
                .all(|shelter| (200..500).contains(&shelter.capacity)));
        }
    }

    #[test]
    fn template_shelters_and_zones_are_connected() {
        let scenario = build(TemplateKind::UrbanEarthquake, 3);
        let geo = Geography::from_scenario(Arc::new(scenario), &DynamicsConfig::default())
            .expect("template is valid");
        let roads = geo.initial_road_status();
        let depot = geo.resources()[0].location;
        for zone in geo.zones() {
            assert!(geo.route(depot, zone.center, &roads).is_some());
        }
        for shelter in geo.shelters() {
            assert!(geo.route(geo.zones()[0].center, shelter.location, &roads).is_some());
        }
    }

    #[test]
    fn template_names_parse() {
        assert_eq!(
            "coastal_flood".parse::<TemplateKind>(),
            Ok(TemplateKind::CoastalFlood)
        );
        assert!("volcano".parse::<TemplateKind>().is_err());
    }
}
