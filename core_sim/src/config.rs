use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use sim_schema::{Difficulty, ResourceKind};
use thiserror::Error;

use crate::scalar::Scalar;

pub const BUILTIN_DYNAMICS_CONFIG: &str = include_str!("data/dynamics_config.json");
pub const DYNAMICS_CONFIG_ENV: &str = "SIM_DYNAMICS_CONFIG_PATH";

/// Per resource kind value table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KindTable<T> {
    pub ambulance: T,
    pub medical_team: T,
    pub supply_truck: T,
}

impl<T: Copy> KindTable<T> {
    pub fn get(&self, kind: ResourceKind) -> T {
        match kind {
            ResourceKind::Ambulance => self.ambulance,
            ResourceKind::MedicalTeam => self.medical_team,
            ResourceKind::SupplyTruck => self.supply_truck,
        }
    }
}

/// Per difficulty value table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyTable<T> {
    pub easy: T,
    pub medium: T,
    pub hard: T,
    pub expert: T,
}

impl<T: Copy> DifficultyTable<T> {
    pub fn get(&self, difficulty: Difficulty) -> T {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
            Difficulty::Expert => self.expert,
        }
    }
}

/// Weights of the per-step reward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardWeights {
    pub evacuated: f64,
    pub casualties: f64,
    pub logistics_cost: f64,
    pub unmet_demand: f64,
}

/// Weights of the end-of-run overall score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub base: f64,
    pub per_casualty: f64,
    pub evacuation_rate: f64,
    pub per_response_step: f64,
    pub resource_efficiency: f64,
    pub per_cost_unit: f64,
    pub difficulty_scale: DifficultyTable<f64>,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            base: 1000.0,
            per_casualty: 10.0,
            evacuation_rate: 500.0,
            per_response_step: 5.0,
            resource_efficiency: 200.0,
            per_cost_unit: 0.1,
            difficulty_scale: DifficultyTable {
                easy: 0.8,
                medium: 1.0,
                hard: 1.25,
                expert: 1.5,
            },
        }
    }
}

/// Tunable constants of the transition engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicsConfig {
    /// Share of at-risk people lost per step at full hazard.
    pub casualty_rate: f32,
    /// Relative hazard growth per step, scaled by `0.5 + intensity`.
    pub hazard_growth: f32,
    pub initial_risk_min: f32,
    pub initial_risk_max: f32,
    /// Hazard level at which a zone counts as in distress.
    pub distress_hazard: f32,
    pub mitigation_cap: f32,
    pub mitigation_decay: f32,
    pub capacity_reference: f32,
    pub mitigation: KindTable<f32>,
    pub dispatch_cost: KindTable<f32>,
    pub cost_per_km: f32,
    pub evacuation_base_cost: f32,
    pub shelter_open_cost: f32,
    /// Furthest shelter, in timesteps of travel, an evacuation may fill
    /// within the step it is ordered in.
    pub evacuation_reach_steps: u32,
    pub base_speed_kmh: f32,
    pub degraded_speed_factor: f32,
    /// Points closer than this are connected without a road.
    pub local_access_km: f32,
    /// Largest gap between a point and the road endpoint it joins.
    pub road_access_km: f32,
    /// Chance per timestep of a generated secondary hazard.
    pub hazard_event_rate: f32,
    pub spike_multiplier_min: f32,
    pub spike_multiplier_max: f32,
    pub reward_weights: DifficultyTable<RewardWeights>,
    pub score: ScoreWeights,
}

impl Default for DynamicsConfig {
    fn default() -> Self {
        Self {
            casualty_rate: 0.01,
            hazard_growth: 0.02,
            initial_risk_min: 0.2,
            initial_risk_max: 0.9,
            distress_hazard: 0.3,
            mitigation_cap: 0.9,
            mitigation_decay: 0.05,
            capacity_reference: 10.0,
            mitigation: KindTable {
                ambulance: 0.1,
                medical_team: 0.15,
                supply_truck: 0.05,
            },
            dispatch_cost: KindTable {
                ambulance: 5.0,
                medical_team: 8.0,
                supply_truck: 4.0,
            },
            cost_per_km: 0.5,
            evacuation_base_cost: 10.0,
            shelter_open_cost: 15.0,
            evacuation_reach_steps: 1,
            base_speed_kmh: 40.0,
            degraded_speed_factor: 0.5,
            local_access_km: 1.0,
            road_access_km: 2.0,
            hazard_event_rate: 0.05,
            spike_multiplier_min: 1.25,
            spike_multiplier_max: 1.75,
            reward_weights: DifficultyTable {
                easy: RewardWeights {
                    evacuated: 1.0,
                    casualties: 5.0,
                    logistics_cost: 0.01,
                    unmet_demand: 0.02,
                },
                medium: RewardWeights {
                    evacuated: 1.0,
                    casualties: 10.0,
                    logistics_cost: 0.01,
                    unmet_demand: 0.05,
                },
                hard: RewardWeights {
                    evacuated: 1.0,
                    casualties: 15.0,
                    logistics_cost: 0.02,
                    unmet_demand: 0.1,
                },
                expert: RewardWeights {
                    evacuated: 1.0,
                    casualties: 20.0,
                    logistics_cost: 0.02,
                    unmet_demand: 0.2,
                },
            },
            score: ScoreWeights::default(),
        }
    }
}

impl DynamicsConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            serde_json::from_str(BUILTIN_DYNAMICS_CONFIG)
                .expect("builtin dynamics config should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: DynamicsConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let unit = |name: &'static str, value: f32| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ConfigError::OutOfRange { field: name, value })
            }
        };
        unit("casualty_rate", self.casualty_rate)?;
        unit("initial_risk_min", self.initial_risk_min)?;
        unit("initial_risk_max", self.initial_risk_max)?;
        unit("mitigation_cap", self.mitigation_cap)?;
        unit("mitigation_decay", self.mitigation_decay)?;
        if !(self.degraded_speed_factor > 0.0 && self.degraded_speed_factor <= 1.0) {
            return Err(ConfigError::OutOfRange {
                field: "degraded_speed_factor",
                value: self.degraded_speed_factor,
            });
        }
        unit("hazard_event_rate", self.hazard_event_rate)?;
        if self.initial_risk_min > self.initial_risk_max {
            return Err(ConfigError::OutOfRange {
                field: "initial_risk_min",
                value: self.initial_risk_min,
            });
        }
        if self.spike_multiplier_min < 1.0 || self.spike_multiplier_min > self.spike_multiplier_max
        {
            return Err(ConfigError::OutOfRange {
                field: "spike_multiplier_min",
                value: self.spike_multiplier_min,
            });
        }
        if self.base_speed_kmh <= 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "base_speed_kmh",
                value: self.base_speed_kmh,
            });
        }
        if self.capacity_reference <= 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "capacity_reference",
                value: self.capacity_reference,
            });
        }
        Ok(())
    }

    pub fn reward_weights(&self, difficulty: Difficulty) -> RewardWeights {
        self.reward_weights.get(difficulty)
    }

    pub(crate) fn dispatch_cost(&self, kind: ResourceKind, distance_km: f64) -> Scalar {
        Scalar::from_f32(self.dispatch_cost.get(kind))
            + Scalar::from_f64(self.cost_per_km as f64 * distance_km)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse dynamics config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read dynamics config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("dynamics config field {field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f32 },
}

/// Config named by `SIM_DYNAMICS_CONFIG_PATH`, else the crate's data file,
/// else the builtin.
pub fn load_dynamics_config_from_env() -> Arc<DynamicsConfig> {
    let override_path = env::var(DYNAMICS_CONFIG_ENV).ok().map(PathBuf::from);
    let default_path =
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src/data/dynamics_config.json");

    let candidates: Vec<PathBuf> = match override_path {
        Some(ref path) => vec![path.clone()],
        None => vec![default_path],
    };

    for path in candidates {
        match DynamicsConfig::from_file(&path) {
            Ok(config) => {
                tracing::info!(
                    target: "relief::config",
                    path = %path.display(),
                    "dynamics_config.loaded=file"
                );
                return Arc::new(config);
            }
            Err(err) => {
                tracing::warn!(
                    target: "relief::config",
                    path = %path.display(),
                    error = %err,
                    "dynamics_config.load_failed"
                );
            }
        }
    }

    tracing::info!(target: "relief::config", "dynamics_config.loaded=builtin");
    DynamicsConfig::builtin()
}
