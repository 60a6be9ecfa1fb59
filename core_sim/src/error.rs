use std::fmt;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Zone,
    Shelter,
    Road,
    Resource,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Zone => "zone",
            EntityKind::Shelter => "shelter",
            EntityKind::Road => "road",
            EntityKind::Resource => "resource",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a scenario entity, either by index or by authored id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityRef {
    Index(EntityKind, u32),
    Id(EntityKind, String),
}

impl EntityRef {
    pub fn zone(index: u32) -> Self {
        EntityRef::Index(EntityKind::Zone, index)
    }

    pub fn shelter(index: u32) -> Self {
        EntityRef::Index(EntityKind::Shelter, index)
    }

    pub fn road(index: u32) -> Self {
        EntityRef::Index(EntityKind::Road, index)
    }

    pub fn resource(index: u32) -> Self {
        EntityRef::Index(EntityKind::Resource, index)
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::Index(kind, _) | EntityRef::Id(kind, _) => *kind,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Index(kind, index) => write!(f, "{kind} #{index}"),
            EntityRef::Id(kind, id) => write!(f, "{kind} '{id}'"),
        }
    }
}

/// Caller errors. Rejected actions are not errors; see `ActionRejection`.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("run is terminated; no further steps are accepted")]
    RunTerminated,
    #[error("unknown {0}")]
    NotFound(EntityRef),
    #[error("invalid scenario: {0}")]
    ScenarioInvalid(#[from] ScenarioError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScenarioError {
    #[error("scenario has no zones")]
    NoZones,
    #[error("max_timesteps must be positive")]
    ZeroMaxTimesteps,
    #[error("timestep_minutes must be positive")]
    ZeroTimestepMinutes,
    #[error("disaster intensity {0} outside 0..=1")]
    InvalidIntensity(f32),
    #[error("catastrophic casualty fraction {0} outside 0..=1")]
    InvalidCatastrophicFraction(f32),
    #[error("duplicate {kind} id '{id}'")]
    DuplicateId { kind: EntityKind, id: String },
    #[error("{kind} '{id}' has an invalid location")]
    InvalidLocation { kind: EntityKind, id: String },
    #[error("zone '{id}' accounts for more people than its population")]
    ZoneOverAccounted { id: String },
    #[error("zone '{id}' risk {risk} outside 0..=1")]
    InvalidRisk { id: String, risk: f32 },
    #[error("shelter '{id}' occupancy exceeds capacity")]
    ShelterOverCapacity { id: String },
    #[error("resource '{id}' load exceeds capacity")]
    ResourceOverloaded { id: String },
    #[error("road '{id}' has invalid length")]
    InvalidRoadLength { id: String },
    #[error("hazard event at timestep {timestep} references unknown {target}")]
    HazardTargetMissing { timestep: u32, target: EntityRef },
    #[error("hazard event at timestep {timestep} has invalid multiplier {multiplier}")]
    InvalidSpikeMultiplier { timestep: u32, multiplier: f32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_entity() {
        assert_eq!(
            SimError::NotFound(EntityRef::resource(7)).to_string(),
            "unknown resource #7"
        );
        assert_eq!(
            SimError::NotFound(EntityRef::Id(EntityKind::Zone, "z9".into())).to_string(),
            "unknown zone 'z9'"
        );
        let err = ScenarioError::DuplicateId {
            kind: EntityKind::Shelter,
            id: "s1".into(),
        };
        assert_eq!(err.to_string(), "duplicate shelter id 's1'");
    }
}
