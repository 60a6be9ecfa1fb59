//! Parallel evaluation of independent runs over one shared geography.

use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;

use crate::config::DynamicsConfig;
use crate::error::SimError;
use crate::geography::Geography;
use crate::policy::{run_episode, EpisodeSummary, Policy};
use crate::run::SimulationRun;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeedOutcome {
    pub seed: u64,
    pub summary: EpisodeSummary,
}

/// Run one episode per policy seed, in parallel, returning outcomes in seed order.
///
/// Every run starts from the same geography; only the policy differs.
pub fn evaluate_batch<P, F>(
    geography: Arc<Geography>,
    config: Arc<DynamicsConfig>,
    seeds: &[u64],
    make_policy: F,
) -> Result<Vec<SeedOutcome>, SimError>
where
    P: Policy,
    F: Fn(u64) -> P + Sync,
{
    let outcomes = seeds
        .par_iter()
        .map(|&seed| {
            let mut run =
                SimulationRun::with_geography(Arc::clone(&geography), Arc::clone(&config));
            let mut policy = make_policy(seed);
            let summary = run_episode(&mut run, &mut policy)?;
            Ok(SeedOutcome { seed, summary })
        })
        .collect::<Result<Vec<_>, SimError>>()?;

    tracing::info!(
        target: "relief::batch",
        scenario = geography.scenario().scenario_id(),
        runs = outcomes.len(),
        mean_score = mean_score(&outcomes),
        "batch.completed"
    );
    Ok(outcomes)
}

pub fn mean_score(outcomes: &[SeedOutcome]) -> f64 {
    if outcomes.is_empty() {
        return 0.0;
    }
    outcomes
        .iter()
        .map(|outcome| outcome.summary.metrics.overall_score)
        .sum::<f64>()
        / outcomes.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::RandomPolicy;
    use crate::test_support::{corridor_scenario, geography_for};

    #[test]
    fn batch_matches_sequential_runs() {
        let geo = geography_for(corridor_scenario());
        let config = Arc::new(DynamicsConfig::default());
        let seeds = [1, 2, 3, 4];
        let outcomes = evaluate_batch(Arc::clone(&geo), Arc::clone(&config), &seeds, |seed| {
            RandomPolicy::new(seed).with_actions_per_step(2)
        })
        .expect("batch runs");

        assert_eq!(
            outcomes.iter().map(|o| o.seed).collect::<Vec<_>>(),
            seeds.to_vec()
        );
        for outcome in &outcomes {
            let mut run = SimulationRun::with_geography(Arc::clone(&geo), Arc::clone(&config));
            let mut policy = RandomPolicy::new(outcome.seed).with_actions_per_step(2);
            let sequential = run_episode(&mut run, &mut policy).expect("episode");
            assert_eq!(outcome.summary, sequential);
        }
    }

    #[test]
    fn empty_batch_scores_zero() {
        let geo = geography_for(corridor_scenario());
        let config = Arc::new(DynamicsConfig::default());
        let outcomes =
            evaluate_batch(geo, config, &[], RandomPolicy::new).expect("empty batch");
        assert!(outcomes.is_empty());
        assert_eq!(mean_score(&outcomes), 0.0);
    }
}
