use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{ActionRecord, ActionRequest, StateSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SimulationStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl SimulationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SimulationStatus::Completed | SimulationStatus::Failed)
    }
}

/// How the operator seat of a run was filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SimulationMode {
    #[default]
    Manual,
    AiAssisted,
    AiOnly,
    Comparison,
}

/// Aggregate end-of-run metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SimulationMetrics {
    pub timesteps: u32,
    pub total_casualties: u64,
    pub total_evacuated: u64,
    pub evacuation_rate: f64,
    /// Mean timesteps between a zone's first distress and first resource arrival.
    pub avg_response_time: f64,
    pub resource_efficiency: f64,
    pub logistics_cost: f64,
    pub overall_score: f64,
}

/// Human run measured against an AI run of the same scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PerformanceComparison {
    pub ai_casualties: u64,
    pub ai_evacuated: u64,
    /// Percentage difference of the overall score relative to the AI run.
    pub performance_vs_ai: f64,
}

/// Operator action whose type differs from the policy's suggestion at the
/// same position of the same timestep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ActionDifference {
    pub timestep: u32,
    pub human_action: ActionRecord,
    /// `None` when the policy suggested fewer actions than the operator took.
    pub ai_action: Option<ActionRequest>,
}

/// Operator decisions measured against what a policy would have chosen
/// from the same observations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ActionComparison {
    /// Share of operator actions whose type matches the policy's.
    pub agreement_rate: f64,
    /// Number of operator actions compared.
    pub total_steps: u32,
    pub ai_actions: BTreeMap<u32, Vec<ActionRequest>>,
    pub differences: Vec<ActionDifference>,
}

/// Persisted simulation document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RunRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub scenario_id: String,
    pub mode: SimulationMode,
    pub status: SimulationStatus,
    pub current_timestep: u32,
    pub max_timesteps: u32,
    pub actions: Vec<ActionRecord>,
    pub states: Vec<StateSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_metrics: Option<SimulationMetrics>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_terminality() {
        assert!(!SimulationStatus::Pending.is_terminal());
        assert!(!SimulationStatus::Running.is_terminal());
        assert!(SimulationStatus::Completed.is_terminal());
        assert!(SimulationStatus::Failed.is_terminal());
    }

    #[test]
    fn mode_uses_snake_case_on_the_wire() {
        let json = serde_json::to_string(&SimulationMode::AiAssisted).expect("serializes");
        assert_eq!(json, "\"ai_assisted\"");
    }
}
