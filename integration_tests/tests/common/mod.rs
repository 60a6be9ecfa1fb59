#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Once};

use anyhow::{Context, Result};
use core_sim::{DynamicsConfig, SimulationRun, DYNAMICS_CONFIG_ENV};
use sim_runtime::Scenario;

static INIT: Once = Once::new();

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn ensure_test_config() {
    INIT.call_once(|| {
        let config_path = fixture_path("test_dynamics_config.json");

        debug_assert!(
            config_path.exists(),
            "missing test dynamics config at {}",
            config_path.display()
        );

        std::env::set_var(DYNAMICS_CONFIG_ENV, &config_path);
    });
}

pub fn read_fixture(name: &str) -> Result<String> {
    let path = fixture_path(name);
    fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))
}

/// Two zones of 100 and 50 people sharing one shelter of 80, ten timesteps.
pub fn two_zone_scenario() -> Result<Arc<Scenario>> {
    let text = read_fixture("two_zone.json")?;
    let scenario = Scenario::from_json_str(&text).context("two_zone.json does not parse")?;
    Ok(Arc::new(scenario))
}

pub fn default_config() -> Arc<DynamicsConfig> {
    Arc::new(DynamicsConfig::default())
}

pub fn fresh_run(scenario: Arc<Scenario>) -> Result<SimulationRun> {
    Ok(SimulationRun::new(scenario, default_config())?)
}
