use sim_schema::{Difficulty, PerformanceComparison, SimulationMetrics, StateSnapshot};

use crate::config::{RewardWeights, ScoreWeights};

/// Reward for the step that turned `previous` into `next`.
///
/// Depends on the two snapshots only, so it can be recomputed offline from
/// a stored history.
pub fn reward_between(
    previous: &StateSnapshot,
    next: &StateSnapshot,
    weights: &RewardWeights,
) -> f64 {
    let evacuated = next.total_evacuated.saturating_sub(previous.total_evacuated) as f64;
    let casualties = next.total_casualties.saturating_sub(previous.total_casualties) as f64;
    let cost = next.logistics_cost_units() - previous.logistics_cost_units();
    let unmet = next.unmet_shelter_demand as f64;
    weights.evacuated * evacuated
        - weights.casualties * casualties
        - weights.logistics_cost * cost
        - weights.unmet_demand * unmet
}

/// Per-step rewards of a whole history, in order.
pub fn rewards(history: &[StateSnapshot], weights: &RewardWeights) -> Vec<f64> {
    history
        .windows(2)
        .map(|pair| reward_between(&pair[0], &pair[1], weights))
        .collect()
}

pub fn metrics(
    history: &[StateSnapshot],
    difficulty: Difficulty,
    weights: &ScoreWeights,
) -> SimulationMetrics {
    let Some(last) = history.last() else {
        return SimulationMetrics::default();
    };
    let population: u64 = last.zones.iter().map(|zone| zone.population()).sum();
    let evacuation_rate = ratio(last.total_evacuated, population);

    let final_timestep = last.timestep();
    let responses: Vec<u32> = last
        .zones
        .iter()
        .filter_map(|zone| {
            let distress = zone.first_distress?;
            let arrival = zone.first_arrival.unwrap_or(final_timestep);
            Some(arrival.saturating_sub(distress))
        })
        .collect();
    let avg_response_time = if responses.is_empty() {
        0.0
    } else {
        responses.iter().map(|&r| r as f64).sum::<f64>() / responses.len() as f64
    };

    let commitments: u64 = last.resources.iter().map(|r| r.commitments as u64).sum();
    let useful: u64 = last
        .resources
        .iter()
        .map(|r| r.useful_commitments as u64)
        .sum();
    let resource_efficiency = ratio(useful, commitments);
    let logistics_cost = last.logistics_cost_units();

    let raw_score = weights.base - weights.per_casualty * last.total_casualties as f64
        + weights.evacuation_rate * evacuation_rate
        - weights.per_response_step * avg_response_time
        + weights.resource_efficiency * resource_efficiency
        - weights.per_cost_unit * logistics_cost;

    SimulationMetrics {
        timesteps: final_timestep,
        total_casualties: last.total_casualties,
        total_evacuated: last.total_evacuated,
        evacuation_rate,
        avg_response_time,
        resource_efficiency,
        logistics_cost,
        overall_score: raw_score * weights.difficulty_scale.get(difficulty),
    }
}

/// Human run measured against an AI run of the same scenario.
pub fn compare(human: &SimulationMetrics, ai: &SimulationMetrics) -> PerformanceComparison {
    let performance_vs_ai = if ai.overall_score == 0.0 {
        0.0
    } else {
        (human.overall_score - ai.overall_score) / ai.overall_score.abs() * 100.0
    };
    PerformanceComparison {
        ai_casualties: ai.total_casualties,
        ai_evacuated: ai.total_evacuated,
        performance_vs_ai,
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
