use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Geographic point in degrees.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Great-circle distance in kilometres.
    pub fn distance_km(&self, other: &Location) -> f64 {
        const EARTH_RADIUS_KM: f64 = 6371.0;
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let dlat = (other.lat - self.lat).to_radians();
        let dlon = (other.lon - self.lon).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DisasterType {
    Earthquake,
    Flood,
    Cyclone,
    Wildfire,
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Expert,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::Expert => "expert",
        }
    }
}

/// Road condition, ordered from best to worst.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum RoadStatus {
    #[default]
    Operational,
    Degraded,
    Impassable,
}

impl RoadStatus {
    /// One level worse; impassable stays impassable.
    pub fn degrade(self) -> Self {
        match self {
            RoadStatus::Operational => RoadStatus::Degraded,
            RoadStatus::Degraded | RoadStatus::Impassable => RoadStatus::Impassable,
        }
    }

    pub fn is_passable(self) -> bool {
        self != RoadStatus::Impassable
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Ambulance,
    MedicalTeam,
    SupplyTruck,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Ambulance,
        ResourceKind::MedicalTeam,
        ResourceKind::SupplyTruck,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Ambulance => "ambulance",
            ResourceKind::MedicalTeam => "medical_team",
            ResourceKind::SupplyTruck => "supply_truck",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ZoneRecord {
    pub id: String,
    pub center: Location,
    pub radius_km: f64,
    pub population: u32,
    #[serde(default)]
    pub evacuated: u32,
    #[serde(default)]
    pub casualties: u32,
    /// Relative hazard exposure in `0..=1`. Derived from the scenario seed when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ShelterRecord {
    pub id: String,
    pub location: Location,
    pub capacity: u32,
    #[serde(default)]
    pub current_occupancy: u32,
    #[serde(default)]
    pub supplies: BTreeMap<String, u32>,
    #[serde(default = "default_open")]
    pub open: bool,
}

fn default_open() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct RoadRecord {
    pub id: String,
    pub start: Location,
    pub end: Location,
    #[serde(default)]
    pub status: RoadStatus,
    pub length_km: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ResourceRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub location: Location,
    pub capacity: u32,
    #[serde(default)]
    pub current_load: u32,
}

/// Hazard injected at a fixed timestep when secondary hazards are enabled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct HazardEvent {
    pub timestep: u32,
    #[serde(flatten)]
    pub kind: HazardEventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HazardEventKind {
    /// Worsen a road's status by one level.
    DegradeRoad { road: u32 },
    /// Multiply a zone's hazard level.
    IntensitySpike { zone: u32, multiplier: f32 },
}

/// Persisted scenario document. Immutable once authored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Scenario {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub disaster_type: DisasterType,
    pub difficulty: Difficulty,
    pub zones: Vec<ZoneRecord>,
    #[serde(default)]
    pub shelters: Vec<ShelterRecord>,
    #[serde(default)]
    pub roads: Vec<RoadRecord>,
    #[serde(default)]
    pub resources: Vec<ResourceRecord>,
    #[serde(default = "default_max_timesteps")]
    pub max_timesteps: u32,
    #[serde(default = "default_timestep_minutes")]
    pub timestep_minutes: u32,
    pub disaster_intensity: f32,
    #[serde(default)]
    pub secondary_hazards: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Explicit secondary-hazard schedule. Generated from the seed when empty.
    #[serde(default)]
    pub hazard_events: Vec<HazardEvent>,
    /// Share of the total population whose loss ends the run as failed.
    #[serde(default = "default_catastrophic_fraction")]
    pub catastrophic_casualty_fraction: f32,
}

fn default_max_timesteps() -> u32 {
    100
}

fn default_timestep_minutes() -> u32 {
    15
}

fn default_catastrophic_fraction() -> f32 {
    0.5
}

impl Scenario {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn total_population(&self) -> u64 {
        self.zones.iter().map(|zone| zone.population as u64).sum()
    }

    /// Identifier used in run records; falls back to the scenario name.
    pub fn scenario_id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_defaults_fill_optional_fields() {
        let json = r#"{
            "name": "drill",
            "disaster_type": "flood",
            "difficulty": "easy",
            "disaster_intensity": 0.4,
            "zones": [
                {
                    "id": "z0",
                    "center": {"lat": 10.0, "lon": 20.0},
                    "radius_km": 1.0,
                    "population": 120
                }
            ],
            "shelters": [
                {"id": "s0", "location": {"lat": 10.0, "lon": 20.01}, "capacity": 60}
            ],
            "resources": [
                {
                    "id": "r0",
                    "type": "medical_team",
                    "location": {"lat": 10.0, "lon": 20.0},
                    "capacity": 8
                }
            ]
        }"#;
        let scenario = Scenario::from_json_str(json).expect("scenario parses");
        assert_eq!(scenario.max_timesteps, 100);
        assert_eq!(scenario.timestep_minutes, 15);
        assert!(!scenario.secondary_hazards);
        assert!(scenario.shelters[0].open);
        assert_eq!(scenario.resources[0].kind, ResourceKind::MedicalTeam);
        assert_eq!(scenario.catastrophic_casualty_fraction, 0.5);
        assert_eq!(scenario.scenario_id(), "drill");
        assert_eq!(scenario.total_population(), 120);
    }

    #[test]
    fn road_status_degrades_towards_impassable() {
        assert!(RoadStatus::Operational < RoadStatus::Degraded);
        assert!(RoadStatus::Degraded < RoadStatus::Impassable);
        assert_eq!(RoadStatus::Operational.degrade(), RoadStatus::Degraded);
        assert_eq!(RoadStatus::Impassable.degrade(), RoadStatus::Impassable);
        assert!(!RoadStatus::Impassable.is_passable());
    }

    #[test]
    fn hazard_event_uses_flat_tagged_layout() {
        let event: HazardEvent =
            serde_json::from_str(r#"{"timestep": 4, "kind": "degrade_road", "road": 2}"#)
                .expect("event parses");
        assert_eq!(event.timestep, 4);
        assert_eq!(event.kind, HazardEventKind::DegradeRoad { road: 2 });
    }

    #[test]
    fn distance_between_nearby_points_is_small() {
        let a = Location::new(0.0, 0.0);
        let b = Location::new(0.0, 0.01);
        let km = a.distance_km(&b);
        assert!((km - 1.111).abs() < 0.01, "unexpected distance {km}");
        assert_eq!(a.distance_km(&a), 0.0);
    }
}
